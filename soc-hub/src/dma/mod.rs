//! DMA descriptor rings.
//!
//! Every peripheral owns up to two rings: a receive ring the hub fills with
//! data arriving from the device, and a transmit ring the application fills
//! with data the hub hands to the device. See [`ring`] for the slot protocol.

pub mod ring;

pub use ring::{Direction, DmaRingBuf, SlotState};
