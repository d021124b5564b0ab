//! GPIO blinky on the simulated platform.
//!
//! The application toggles an LED pin through `embedded-hal` traits and
//! watches a button pin for edge interrupts. The GPIO device task answers
//! pin requests and, every few requests, "presses" the button.
//!
//! ```text
//!   app (core0) ──GpioPin──► control channel ──► GpioDevice (core3)
//!   callback (core1) ◄── IrqStatus::DEVICE ◄── hub (core2) ◄── button edge
//! ```

use std::error::Error;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use embedded_hal::digital::{InputPin, StatefulOutputPin};
use log::info;

use soc_hub::gpio::{GpioDevice, GpioPin};
use soc_hub::hub::{IsrContext, Registry};
use soc_hub::irq::sim::{spawn_on, SimPlatform};
use soc_hub::irq::CoreId;
use soc_hub::peripheral::{DmaDirections, IrqStatus};

const ISR_CORE: CoreId = CoreId(1);
const HUB_CORE: CoreId = CoreId(2);
const DEVICE_CORE: CoreId = CoreId(3);

const LED_PIN: u8 = 13;
const BUTTON_PIN: u8 = 2;
const BLINKS: u32 = 10;

fn on_irq(ctx: &IsrContext<'_, Arc<AtomicU32>>) {
    if ctx.take_status().contains(IrqStatus::DEVICE) {
        ctx.app_context().fetch_add(1, Ordering::Relaxed);
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    let platform = Arc::new(SimPlatform::new(4));
    let mut registry = Registry::new(platform.clone());
    let (handle, device) = registry.register(DmaDirections::empty())?;
    let edges = Arc::new(AtomicU32::new(0));
    registry.set_handler(handle, ISR_CORE, Arc::clone(&edges), on_irq)?;

    let hub = Arc::new(registry.build());
    hub.spawn(HUB_CORE)?;
    let isr_hub = Arc::clone(&hub);
    platform.spawn_interrupt_core(ISR_CORE, move |core, lines| {
        isr_hub.service_interrupts(core, lines)
    })?;

    let mut gpio = GpioDevice::new(device.control);
    spawn_on(DEVICE_CORE, "gpio", move || {
        let mut served = 0u32;
        loop {
            gpio.serve();
            served += 1;
            if served % 4 == 0 {
                gpio.drive_input(BUTTON_PIN, served % 8 == 0);
            }
        }
    })?;

    let endpoint = hub.control_endpoint(handle).ok_or("gpio peripheral missing")?;
    let mut led = GpioPin::new(endpoint.clone(), LED_PIN)?;
    let mut button = GpioPin::new(endpoint, BUTTON_PIN)?;
    button.set_interrupt(true)?;

    let mut presses = 0;
    for _ in 0..BLINKS {
        led.toggle()?;
        info!("led {}", if led.is_set_high()? { "on" } else { "off" });
        if button.take_edge()? {
            presses += 1;
            info!("button edge, now {}", if button.is_high()? { "high" } else { "low" });
        }
    }

    println!(
        "{BLINKS} blinks, {presses} button edges seen, {} edge interrupts delivered",
        edges.load(Ordering::Relaxed)
    );
    Ok(())
}
