//! Device side of the GPIO client.

use log::trace;

use super::{
    GPIO_FN_IRQ_ENABLE, GPIO_FN_READ, GPIO_FN_TAKE_EDGE, GPIO_FN_WRITE, GPIO_PIN_COUNT,
    GPIO_STATUS_BAD_PIN, GPIO_STATUS_BAD_REQUEST,
};
use crate::hub::{ControlReply, ControlRequest, DeviceControl};
use crate::peripheral::IrqStatus;

/// Pin state of one port. One bit per pin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GpioPort {
    levels: u32,
    irq_enabled: u32,
    edges: u32,
}

impl GpioPort {
    pub const fn new() -> Self {
        GpioPort {
            levels: 0,
            irq_enabled: 0,
            edges: 0,
        }
    }

    /// Current pin levels.
    pub fn levels(&self) -> u32 {
        self.levels
    }

    /// Pins with a latched, unread edge.
    pub fn edges(&self) -> u32 {
        self.edges
    }

    /// Answer one control request.
    pub fn handle(&mut self, req: &ControlRequest) -> ControlReply {
        let Some(&pin) = req.payload.first() else {
            return ControlReply::error(GPIO_STATUS_BAD_REQUEST);
        };
        if pin >= GPIO_PIN_COUNT {
            return ControlReply::error(GPIO_STATUS_BAD_PIN);
        }
        let bit = 1u32 << pin;
        let arg = req.payload.get(1).copied();

        match (req.code, arg) {
            (GPIO_FN_READ, _) => ControlReply::ok(&[u8::from(self.levels & bit != 0)]),
            (GPIO_FN_WRITE, Some(level)) => {
                set_bit(&mut self.levels, bit, level != 0);
                ControlReply::ok(&[])
            }
            (GPIO_FN_IRQ_ENABLE, Some(enable)) => {
                set_bit(&mut self.irq_enabled, bit, enable != 0);
                if enable == 0 {
                    self.edges &= !bit;
                }
                ControlReply::ok(&[])
            }
            (GPIO_FN_TAKE_EDGE, _) => {
                let seen = self.edges & bit != 0;
                self.edges &= !bit;
                ControlReply::ok(&[u8::from(seen)])
            }
            _ => ControlReply::error(GPIO_STATUS_BAD_REQUEST),
        }
    }

    /// An external signal drives `pin` to `level`. Returns `true` if this
    /// latched a new edge on an interrupt-enabled pin.
    pub fn drive(&mut self, pin: u8, level: bool) -> bool {
        if pin >= GPIO_PIN_COUNT {
            return false;
        }
        let bit = 1u32 << pin;
        let changed = (self.levels & bit != 0) != level;
        set_bit(&mut self.levels, bit, level);
        if !changed || self.irq_enabled & bit == 0 {
            return false;
        }
        let fresh = self.edges & bit == 0;
        self.edges |= bit;
        fresh
    }
}

fn set_bit(word: &mut u32, bit: u32, on: bool) {
    if on {
        *word |= bit;
    } else {
        *word &= !bit;
    }
}

/// A GPIO port bound to the control channel of its peripheral.
pub struct GpioDevice {
    port: GpioPort,
    control: DeviceControl,
}

impl GpioDevice {
    pub fn new(control: DeviceControl) -> Self {
        GpioDevice {
            port: GpioPort::new(),
            control,
        }
    }

    pub fn port(&self) -> &GpioPort {
        &self.port
    }

    /// Wait for one request from the application and answer it.
    pub fn serve(&mut self) {
        let GpioDevice { port, control } = self;
        control.serve(|req| port.handle(req));
    }

    /// Answer a waiting request, if any. Returns `true` if one was answered.
    pub fn poll(&mut self) -> bool {
        let GpioDevice { port, control } = self;
        control.try_serve(|req| port.handle(req))
    }

    /// Drive an input from outside, interrupting the application on a new
    /// edge.
    pub fn drive_input(&mut self, pin: u8, level: bool) {
        if self.port.drive(pin, level) {
            trace!("gpio: edge on pin {pin}");
            self.control.raise(IrqStatus::DEVICE);
        }
    }
}
