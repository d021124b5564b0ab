//! Application side of the GPIO client.

use embedded_hal::digital::{ErrorType, InputPin, OutputPin, StatefulOutputPin};

use super::{
    GpioError, GPIO_FN_IRQ_ENABLE, GPIO_FN_READ, GPIO_FN_TAKE_EDGE, GPIO_FN_WRITE,
    GPIO_PIN_COUNT, GPIO_STATUS_BAD_PIN, GPIO_STATUS_OK,
};
use crate::hub::{ControlEndpoint, ControlReply};

/// One pin of a hub-attached GPIO port.
///
/// Every operation is a control-channel round trip to the device task.
pub struct GpioPin {
    endpoint: ControlEndpoint,
    pin: u8,
}

impl GpioPin {
    pub fn new(endpoint: ControlEndpoint, pin: u8) -> Result<Self, GpioError> {
        if pin >= GPIO_PIN_COUNT {
            return Err(GpioError::BadPin(pin));
        }
        Ok(GpioPin { endpoint, pin })
    }

    pub fn pin(&self) -> u8 {
        self.pin
    }

    /// Enable or disable edge interrupts on this pin.
    pub fn set_interrupt(&mut self, enabled: bool) -> Result<(), GpioError> {
        self.call(GPIO_FN_IRQ_ENABLE, Some(enabled)).map(drop)
    }

    /// Read and clear the edge latched on this pin since the last call.
    pub fn take_edge(&mut self) -> Result<bool, GpioError> {
        self.flag(GPIO_FN_TAKE_EDGE)
    }

    fn call(&self, code: u8, arg: Option<bool>) -> Result<ControlReply, GpioError> {
        let reply = match arg {
            Some(arg) => self.endpoint.request(code, &[self.pin, u8::from(arg)])?,
            None => self.endpoint.request(code, &[self.pin])?,
        };
        match reply.status {
            GPIO_STATUS_OK => Ok(reply),
            GPIO_STATUS_BAD_PIN => Err(GpioError::BadPin(self.pin)),
            status => Err(GpioError::Rejected(status)),
        }
    }

    fn flag(&self, code: u8) -> Result<bool, GpioError> {
        let reply = self.call(code, None)?;
        match reply.payload.first() {
            Some(&b) => Ok(b != 0),
            None => Err(GpioError::MalformedReply),
        }
    }
}

impl ErrorType for GpioPin {
    type Error = GpioError;
}

impl OutputPin for GpioPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.call(GPIO_FN_WRITE, Some(false)).map(drop)
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.call(GPIO_FN_WRITE, Some(true)).map(drop)
    }
}

impl StatefulOutputPin for GpioPin {
    fn is_set_high(&mut self) -> Result<bool, Self::Error> {
        self.flag(GPIO_FN_READ)
    }

    fn is_set_low(&mut self) -> Result<bool, Self::Error> {
        self.flag(GPIO_FN_READ).map(|high| !high)
    }
}

impl InputPin for GpioPin {
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        self.flag(GPIO_FN_READ)
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        self.flag(GPIO_FN_READ).map(|high| !high)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpio::GpioDevice;
    use crate::hub::{IsrContext, PeripheralHub, Registry};
    use crate::irq::sim::{spawn_on, SimPlatform};
    use crate::irq::CoreId;
    use crate::peripheral::{DmaDirections, IrqStatus, PeripheralHandle};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    fn note(ctx: &IsrContext<'_, Arc<AtomicU32>>) {
        ctx.app_context()
            .fetch_or(ctx.take_status().bits(), Ordering::AcqRel);
    }

    /// Hub with one GPIO peripheral. The device task runs `script`.
    fn setup(
        script: impl FnOnce(GpioDevice) + Send + 'static,
    ) -> (Arc<PeripheralHub<Arc<AtomicU32>>>, PeripheralHandle, Arc<AtomicU32>) {
        let platform = Arc::new(SimPlatform::new(4));
        let mut registry = Registry::new(platform.clone());
        let (handle, endpoints) = registry.register(DmaDirections::empty()).unwrap();
        let seen = Arc::new(AtomicU32::new(0));
        registry
            .set_handler(handle, CoreId(1), Arc::clone(&seen), note)
            .unwrap();
        let hub = Arc::new(registry.build());
        hub.spawn(CoreId(2)).unwrap();
        let isr_hub = Arc::clone(&hub);
        platform
            .spawn_interrupt_core(CoreId(1), move |core, lines| {
                isr_hub.service_interrupts(core, lines)
            })
            .unwrap();
        let device = GpioDevice::new(endpoints.control);
        spawn_on(CoreId(3), "gpio", move || script(device)).unwrap();
        (hub, handle, seen)
    }

    #[test]
    fn rejects_nonexistent_pin() {
        let (hub, handle, _) = setup(|_| {});
        let endpoint = hub.control_endpoint(handle).unwrap();
        assert_eq!(
            GpioPin::new(endpoint, GPIO_PIN_COUNT).err(),
            Some(GpioError::BadPin(GPIO_PIN_COUNT))
        );
    }

    #[test]
    fn output_pin_round_trip() {
        let (hub, handle, _) = setup(|mut device| loop {
            device.serve();
        });
        let mut led = GpioPin::new(hub.control_endpoint(handle).unwrap(), 4).unwrap();

        led.set_high().unwrap();
        assert!(led.is_set_high().unwrap());
        led.set_low().unwrap();
        assert!(led.is_set_low().unwrap());
        assert!(led.is_low().unwrap());
    }

    #[test]
    fn input_edge_interrupts_application() {
        let (hub, handle, seen) = setup(|mut device| {
            device.serve(); // enable interrupts
            device.drive_input(3, true);
            loop {
                device.serve();
            }
        });
        let mut button = GpioPin::new(hub.control_endpoint(handle).unwrap(), 3).unwrap();
        button.set_interrupt(true).unwrap();

        let deadline = Instant::now() + Duration::from_secs(5);
        while seen.load(Ordering::Acquire) & IrqStatus::DEVICE.bits() == 0 {
            assert!(Instant::now() < deadline, "no edge interrupt");
            std::thread::sleep(Duration::from_millis(1));
        }
        assert!(button.take_edge().unwrap());
        assert!(!button.take_edge().unwrap());
        assert!(button.is_high().unwrap());
    }
}
