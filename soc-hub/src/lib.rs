//! # soc-hub
//!
//! The peripheral I/O broker of a multicore system-on-chip. Device-driver
//! tasks, each possibly bound to a different core, exchange bulk data with
//! the application through per-peripheral DMA rings and receive interrupt
//! notifications, all over a small fixed set of rendezvous channels instead
//! of shared memory.
//!
//! ## Architecture
//!
//! | Layer | Module | Purpose |
//! |-------|--------|---------|
//! | Config | [`constants`] | Table sizes, ring geometry, channel indices, status bits |
//! | Masking | [`irq`] | `InterruptMask` / `Platform` capabilities, `IrqMutex`, non-reentrant `IsrScope` |
//! | DMA | [`dma`] | Fixed-capacity descriptor ring with `Empty → Filled → InFlight` slots |
//! | Peripheral | [`peripheral`] | Handles, read-clear status word, diagnostic counters |
//! | Hub | `hub` | Registry, dispatch loop, interrupt delivery, endpoints (`std`) |
//! | Client | `gpio` | GPIO port over the control channel, `embedded-hal` pins (`gpio`) |
//!
//! ## Quick start
//!
//! ```ignore
//! use std::sync::Arc;
//! use soc_hub::hub::{IsrContext, Registry};
//! use soc_hub::irq::{sim::SimPlatform, CoreId};
//! use soc_hub::peripheral::{DmaDirections, IrqStatus};
//!
//! fn on_irq(ctx: &IsrContext<'_, ()>) {
//!     if ctx.take_status().contains(IrqStatus::RX_DONE) {
//!         // schedule a drain of ctx.rx_ring()
//!     }
//! }
//!
//! let platform = Arc::new(SimPlatform::new(4));
//! let mut registry = Registry::new(platform.clone());
//! let (uart, device) = registry.register(DmaDirections::BOTH)?;
//! registry.set_handler(uart, CoreId(1), (), on_irq)?;
//!
//! let hub = Arc::new(registry.build());
//! hub.spawn(CoreId(2))?;
//!
//! // Device task (any core):
//! device.rx.unwrap().xfer(b"hello");
//!
//! // Application:
//! let mut buf = [0u8; 64];
//! let n = hub.rx_ring(uart).unwrap().transfer(&mut buf, 64);
//! ```
//!
//! ## Features
//!
//! | Feature | Default | Enables |
//! |---------|---------|---------|
//! | `std` | yes | Hub runtime, rendezvous channels, simulated multicore platform |
//! | `gpio` | no | GPIO client (requires `embedded-hal`) |
//! | `instrumented` | no | Status-word overlap probe in release builds |
//!
//! Without `std` the crate is `no_std` and provides the masking discipline,
//! the DMA ring and the per-peripheral state for use on bare metal.
//!
//! ## Parameters
//!
//! - **Peripheral table:** 8 entries ([`constants::SOC_PERIPHERAL_COUNT`])
//! - **Ring capacity:** 4 slots ([`constants::DMA_RING_SLOTS`])
//! - **Slot size:** 256 bytes ([`constants::DMA_SLOT_BYTES`])

#![cfg_attr(not(any(feature = "std", test)), no_std)]

pub mod constants;
pub mod error;
pub mod irq;
pub mod dma;
pub mod peripheral;

#[cfg(feature = "std")]
pub mod hub;

#[cfg(feature = "gpio")]
pub mod gpio;
