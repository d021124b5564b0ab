//! Channel endpoints held outside the hub.
//!
//! A device task receives [`DeviceEndpoints`] at registration and never sees
//! the hub's tables. The application reaches its device through a
//! [`ControlEndpoint`].

use std::sync::Arc;

use log::trace;

use super::channel::Service;
use super::protocol::{
    frame_from, ControlReply, ControlRequest, HubControl, PeripheralChannels, RxReply, RxRequest,
    TxReply, TxRequest, Wait,
};
use crate::constants::DMA_SLOT_BYTES;
use crate::error::ProtocolError;
use crate::irq::Platform;
use crate::peripheral::IrqStatus;

/// Device-side endpoints of one peripheral.
///
/// `rx` and `tx` are present only for the directions the peripheral was
/// registered with.
pub struct DeviceEndpoints {
    pub rx: Option<RxEndpoint>,
    pub tx: Option<TxEndpoint>,
    pub control: DeviceControl,
}

/// Receive-DMA endpoint: the device pushes data toward the application.
#[derive(Clone)]
pub struct RxEndpoint {
    channels: Arc<PeripheralChannels>,
}

impl RxEndpoint {
    pub(crate) fn new(channels: Arc<PeripheralChannels>) -> Self {
        RxEndpoint { channels }
    }

    /// Block until the receive ring has a free slot.
    pub fn ready(&self) {
        self.channels.rx.call(RxRequest::Ready(Wait::Blocking));
    }

    /// `true` if the receive ring has a free slot right now.
    pub fn try_ready(&self) -> bool {
        self.channels.rx.call(RxRequest::Ready(Wait::Poll)) == RxReply::Ready
    }

    /// Store `data` in the next receive slot, waiting for one to free up.
    ///
    /// At most [`DMA_SLOT_BYTES`] bytes are taken. Returns the number
    /// stored; empty `data` returns 0 without contacting the hub.
    pub fn xfer(&self, data: &[u8]) -> usize {
        self.send(data, Wait::Blocking)
    }

    /// Like [`xfer()`](Self::xfer), but returns 0 instead of waiting.
    pub fn try_xfer(&self, data: &[u8]) -> usize {
        self.send(data, Wait::Poll)
    }

    fn send(&self, data: &[u8], wait: Wait) -> usize {
        if data.is_empty() {
            return 0;
        }
        let reply = self.channels.rx.call(RxRequest::Xfer {
            data: frame_from(data),
            wait,
        });
        match reply {
            RxReply::Stored(n) => n,
            RxReply::Ready | RxReply::NotReady => 0,
        }
    }
}

/// Transmit-DMA endpoint: the device pulls data the application queued.
#[derive(Clone)]
pub struct TxEndpoint {
    channels: Arc<PeripheralChannels>,
}

impl TxEndpoint {
    pub(crate) fn new(channels: Arc<PeripheralChannels>) -> Self {
        TxEndpoint { channels }
    }

    /// Take the oldest transmit slot into `buf`, waiting for one to be
    /// filled. Returns the slot length.
    pub fn xfer(&self, buf: &mut [u8; DMA_SLOT_BYTES]) -> usize {
        self.recv(buf, Wait::Blocking)
    }

    /// Like [`xfer()`](Self::xfer), but returns 0 instead of waiting.
    pub fn try_xfer(&self, buf: &mut [u8; DMA_SLOT_BYTES]) -> usize {
        self.recv(buf, Wait::Poll)
    }

    fn recv(&self, buf: &mut [u8; DMA_SLOT_BYTES], wait: Wait) -> usize {
        match self.channels.tx.call(TxRequest { wait }) {
            TxReply::Frame(frame) => {
                buf[..frame.len()].copy_from_slice(&frame);
                frame.len()
            }
            TxReply::Empty => 0,
        }
    }
}

/// Device side of the control channel.
#[derive(Clone)]
pub struct DeviceControl {
    channels: Arc<PeripheralChannels>,
}

impl DeviceControl {
    pub(crate) fn new(channels: Arc<PeripheralChannels>) -> Self {
        DeviceControl { channels }
    }

    /// Ask the hub to deliver `bits` to the peripheral's callback.
    pub fn raise(&self, bits: IrqStatus) {
        trace!("device raising {bits:?}");
        self.channels.to_hub.call(HubControl::Raise(bits));
    }

    /// Ask the hub to return both rings to all-`Empty`.
    pub fn reset_rings(&self) {
        self.channels.to_hub.call(HubControl::Reset);
    }

    /// Block until the application sends a configuration request, then
    /// answer it with `f`.
    pub fn serve(&self, f: impl FnOnce(&ControlRequest) -> ControlReply) {
        self.channels.to_device.serve_blocking(f);
    }

    /// Answer a pending configuration request if there is one. Returns
    /// `true` if a request was answered.
    pub fn try_serve(&self, f: impl FnOnce(&ControlRequest) -> ControlReply) -> bool {
        self.channels.to_device.serve(|req| Some(f(req))) == Service::Answered
    }
}

/// Application side of the control channel.
#[derive(Clone)]
pub struct ControlEndpoint {
    channels: Arc<PeripheralChannels>,
    platform: Arc<dyn Platform>,
}

impl ControlEndpoint {
    pub(crate) fn new(channels: Arc<PeripheralChannels>, platform: Arc<dyn Platform>) -> Self {
        ControlEndpoint { channels, platform }
    }

    /// Send `(code, payload)` to the device and wait for its reply.
    ///
    /// The payload is truncated to
    /// [`CONTROL_PAYLOAD_BYTES`](crate::constants::CONTROL_PAYLOAD_BYTES).
    /// Refused from interrupt context, where waiting is not allowed.
    pub fn request(&self, code: u8, payload: &[u8]) -> Result<ControlReply, ProtocolError> {
        if self.platform.isr_running() {
            return Err(ProtocolError::BlockingInIsr);
        }
        Ok(self
            .channels
            .to_device
            .call(ControlRequest::new(code, payload)))
    }
}
