//! Loopback device on the simulated platform.
//!
//! A device task echoes every transmit slot back into the receive ring. The
//! application sends numbered messages and reads the echoes while interrupt
//! callbacks count completions.
//!
//! ```text
//!   app (core0) ──tx ring──► hub (core2) ──tx lane──► loopback (core3)
//!   app (core0) ◄─rx ring─── hub (core2) ◄─rx lane─── loopback (core3)
//!                              └─ RX_DONE / TX_DONE ──► callback (core1)
//! ```
//!
//! Run with `RUST_LOG=trace` to watch every transfer.

use std::error::Error;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use log::info;

use soc_hub::constants::DMA_SLOT_BYTES;
use soc_hub::hub::{IsrContext, Registry};
use soc_hub::irq::sim::{spawn_on, SimPlatform};
use soc_hub::irq::CoreId;
use soc_hub::peripheral::{DmaDirections, IrqStatus};

const APP_CORE: CoreId = CoreId(0);
const ISR_CORE: CoreId = CoreId(1);
const HUB_CORE: CoreId = CoreId(2);
const DEVICE_CORE: CoreId = CoreId(3);

const MESSAGES: u32 = 16;

#[derive(Default)]
struct Completions {
    rx: AtomicU32,
    tx: AtomicU32,
}

fn on_irq(ctx: &IsrContext<'_, Arc<Completions>>) {
    let status = ctx.take_status();
    let done = ctx.app_context();
    if status.contains(IrqStatus::RX_DONE) {
        done.rx.fetch_add(1, Ordering::Relaxed);
    }
    if status.contains(IrqStatus::TX_DONE) {
        done.tx.fetch_add(1, Ordering::Relaxed);
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();
    soc_hub::irq::sim::bind_current(APP_CORE);

    let platform = Arc::new(SimPlatform::new(4));
    let mut registry = Registry::new(platform.clone());
    let (handle, device) = registry.register(DmaDirections::BOTH)?;
    let completions = Arc::new(Completions::default());
    registry.set_handler(handle, ISR_CORE, Arc::clone(&completions), on_irq)?;

    let hub = Arc::new(registry.build());
    hub.spawn(HUB_CORE)?;
    let isr_hub = Arc::clone(&hub);
    platform.spawn_interrupt_core(ISR_CORE, move |core, lines| {
        isr_hub.service_interrupts(core, lines)
    })?;

    let rx = device.rx.ok_or("loopback needs a receive ring")?;
    let tx = device.tx.ok_or("loopback needs a transmit ring")?;
    spawn_on(DEVICE_CORE, "loopback", move || {
        let mut buf = [0u8; DMA_SLOT_BYTES];
        loop {
            let n = tx.xfer(&mut buf);
            rx.xfer(&buf[..n]);
        }
    })?;

    let tx_ring = hub.tx_ring(handle).ok_or("no transmit ring")?;
    let rx_ring = hub.rx_ring(handle).ok_or("no receive ring")?;
    let mut echo = [0u8; DMA_SLOT_BYTES];
    for seq in 0..MESSAGES {
        let mut msg = format!("ping {seq}").into_bytes();
        let len = msg.len();
        tx_ring.ready()?;
        tx_ring.transfer(&mut msg, len);

        rx_ring.ready()?;
        let n = rx_ring.transfer(&mut echo, DMA_SLOT_BYTES);
        info!("echo: {}", String::from_utf8_lossy(&echo[..n]));
    }

    let counters = hub.counters(handle);
    println!(
        "{MESSAGES} messages looped back: {} bytes out, {} bytes in, {} stalls",
        counters.tx_bytes,
        counters.rx_bytes,
        counters.rx_stalls + counters.tx_stalls,
    );
    println!(
        "callbacks saw {} receive and {} transmit completions",
        completions.rx.load(Ordering::Relaxed),
        completions.tx.load(Ordering::Relaxed),
    );
    Ok(())
}
