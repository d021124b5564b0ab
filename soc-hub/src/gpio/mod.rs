//! GPIO client of the peripheral hub.
//!
//! A GPIO port moves no bulk data, so it uses only the control channel:
//!
//! - the application drives and samples pins through [`GpioPin`], which
//!   implements the [`embedded_hal::digital`] traits on top of
//!   [`ControlEndpoint`](crate::hub::ControlEndpoint) requests,
//! - the device task owns a [`GpioDevice`], answers those requests, and
//!   raises [`IrqStatus::DEVICE`](crate::peripheral::IrqStatus::DEVICE) when
//!   an input with interrupts enabled changes level.
//!
//! Pin requests wait for the device, so they cannot be made from an
//! interrupt callback. A callback notes the device bit; mainline code then
//! calls [`GpioPin::take_edge`].
//!
//! ## Function codes
//!
//! | Code | Request payload | Reply payload |
//! |------|-----------------|---------------|
//! | [`GPIO_FN_READ`] | `[pin]` | `[level]` |
//! | [`GPIO_FN_WRITE`] | `[pin, level]` | empty |
//! | [`GPIO_FN_IRQ_ENABLE`] | `[pin, enable]` | empty |
//! | [`GPIO_FN_TAKE_EDGE`] | `[pin]` | `[edge seen]` |

mod device;
mod pin;

use thiserror::Error;

use crate::error::ProtocolError;

pub use device::{GpioDevice, GpioPort};
pub use pin::GpioPin;

/// Number of pins on a port.
pub const GPIO_PIN_COUNT: u8 = 32;

/// Sample a pin.
pub const GPIO_FN_READ: u8 = 0x01;
/// Drive a pin.
pub const GPIO_FN_WRITE: u8 = 0x02;
/// Enable or disable edge interrupts on a pin.
pub const GPIO_FN_IRQ_ENABLE: u8 = 0x03;
/// Read and clear a pin's latched edge.
pub const GPIO_FN_TAKE_EDGE: u8 = 0x04;

pub const GPIO_STATUS_OK: u8 = 0;
pub const GPIO_STATUS_BAD_PIN: u8 = 1;
pub const GPIO_STATUS_BAD_REQUEST: u8 = 2;

/// Errors of [`GpioPin`] operations.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum GpioError {
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    #[error("pin {0} does not exist")]
    BadPin(u8),
    #[error("device rejected request with status {0}")]
    Rejected(u8),
    #[error("malformed reply from device")]
    MalformedReply,
}

impl embedded_hal::digital::Error for GpioError {
    fn kind(&self) -> embedded_hal::digital::ErrorKind {
        embedded_hal::digital::ErrorKind::Other
    }
}
