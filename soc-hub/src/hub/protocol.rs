//! Messages carried by the channel triplet of a peripheral.
//!
//! | Channel | Index | Direction | Request → Reply |
//! |---------|-------|-----------|-----------------|
//! | receive-DMA | [`SOC_PERIPHERAL_FROM_DMA_CH`](crate::constants::SOC_PERIPHERAL_FROM_DMA_CH) | device → hub | [`RxRequest`] → [`RxReply`] |
//! | transmit-DMA | [`SOC_PERIPHERAL_TO_DMA_CH`](crate::constants::SOC_PERIPHERAL_TO_DMA_CH) | hub → device | [`TxRequest`] → [`TxReply`] |
//! | control | [`SOC_PERIPHERAL_CONTROL_CH`](crate::constants::SOC_PERIPHERAL_CONTROL_CH) | device → hub | [`HubControl`] → `()` |
//! | control | [`SOC_PERIPHERAL_CONTROL_CH`](crate::constants::SOC_PERIPHERAL_CONTROL_CH) | application → device | [`ControlRequest`] → [`ControlReply`] |
//!
//! No error crosses a channel: a request that cannot be honoured is either
//! parked (blocking) or answered with a zero length (polling).

use std::sync::Arc;

use heapless::Vec;

use super::channel::{Doorbell, Lane};
use crate::constants::{CONTROL_PAYLOAD_BYTES, DMA_SLOT_BYTES};
use crate::peripheral::IrqStatus;

/// Whether a device-side request may wait for the hub.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wait {
    /// Park until the request can be honoured.
    Blocking,
    /// Answer at once, with "not ready" if need be.
    Poll,
}

/// Contents of one DMA slot in transit.
pub(crate) type Frame = Vec<u8, DMA_SLOT_BYTES>;

/// Copy at most one slot's worth of `data`.
pub(crate) fn frame_from(data: &[u8]) -> Frame {
    Frame::from_slice(&data[..data.len().min(DMA_SLOT_BYTES)]).unwrap_or_default()
}

pub(crate) enum RxRequest {
    /// Wait for a free receive slot.
    Ready(Wait),
    /// Store a frame in the receive ring.
    Xfer { data: Frame, wait: Wait },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RxReply {
    Ready,
    NotReady,
    Stored(usize),
}

pub(crate) struct TxRequest {
    pub(crate) wait: Wait,
}

pub(crate) enum TxReply {
    Frame(Frame),
    Empty,
}

/// Device → hub control messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum HubControl {
    /// Deliver device-specific status bits to the peripheral's callback.
    Raise(IrqStatus),
    /// Return both rings to all-`Empty`.
    Reset,
}

/// Out-of-band configuration request from the application to its device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlRequest {
    /// Device-defined function code.
    pub code: u8,
    /// Arguments, at most [`CONTROL_PAYLOAD_BYTES`].
    pub payload: Vec<u8, CONTROL_PAYLOAD_BYTES>,
}

impl ControlRequest {
    /// Build a request. A payload longer than [`CONTROL_PAYLOAD_BYTES`] is
    /// truncated.
    pub fn new(code: u8, payload: &[u8]) -> Self {
        ControlRequest {
            code,
            payload: truncated(payload),
        }
    }
}

/// Device answer to a [`ControlRequest`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlReply {
    /// Device-defined status. Zero is success by convention.
    pub status: u8,
    pub payload: Vec<u8, CONTROL_PAYLOAD_BYTES>,
}

impl ControlReply {
    /// Successful reply carrying `payload` (truncated like a request).
    pub fn ok(payload: &[u8]) -> Self {
        ControlReply {
            status: 0,
            payload: truncated(payload),
        }
    }

    /// Failure reply with no payload.
    pub fn error(status: u8) -> Self {
        ControlReply {
            status,
            payload: Vec::new(),
        }
    }

    /// `true` for a zero status.
    pub fn is_ok(&self) -> bool {
        self.status == 0
    }
}

fn truncated(payload: &[u8]) -> Vec<u8, CONTROL_PAYLOAD_BYTES> {
    Vec::from_slice(&payload[..payload.len().min(CONTROL_PAYLOAD_BYTES)]).unwrap_or_default()
}

/// The channel triplet of one peripheral. The control channel is two-way,
/// hence two lanes.
pub(crate) struct PeripheralChannels {
    pub(crate) rx: Lane<RxRequest, RxReply>,
    pub(crate) tx: Lane<TxRequest, TxReply>,
    pub(crate) to_hub: Lane<HubControl, ()>,
    pub(crate) to_device: Lane<ControlRequest, ControlReply>,
}

impl PeripheralChannels {
    pub(crate) fn new(bell: &Arc<Doorbell>) -> Self {
        PeripheralChannels {
            rx: Lane::new(Arc::clone(bell)),
            tx: Lane::new(Arc::clone(bell)),
            to_hub: Lane::new(Arc::clone(bell)),
            to_device: Lane::new(Arc::clone(bell)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_is_capped_to_one_slot() {
        let big = [1u8; DMA_SLOT_BYTES * 2];
        assert_eq!(frame_from(&big).len(), DMA_SLOT_BYTES);
        assert_eq!(frame_from(b"abc").as_slice(), b"abc");
    }

    #[test]
    fn control_payload_is_truncated() {
        let long = [0xAAu8; CONTROL_PAYLOAD_BYTES + 5];
        let req = ControlRequest::new(7, &long);
        assert_eq!(req.code, 7);
        assert_eq!(req.payload.len(), CONTROL_PAYLOAD_BYTES);
    }

    #[test]
    fn reply_constructors() {
        assert!(ControlReply::ok(&[1, 2]).is_ok());
        let err = ControlReply::error(3);
        assert!(!err.is_ok());
        assert!(err.payload.is_empty());
    }
}
