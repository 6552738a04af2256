use embedded_hal::digital::v2::OutputPin;
use usb_device::device::UsbDeviceState;

/// The discrete indicator LEDs.
///
/// The input-activity LED is not here; it lives with the sampler, which
/// flashes it from interrupt context.
pub struct StatusLeds<P, L, E> {
    pub power: P,
    pub link: L,
    pub error: E,
}

impl<P, L, E, ERR> StatusLeds<P, L, E>
where
    P: OutputPin<Error = ERR>,
    L: OutputPin<Error = ERR>,
    E: OutputPin<Error = ERR>,
{
    pub fn set_power(&mut self, on: bool) -> Result<(), ERR> {
        if on {
            self.power.set_high()
        } else {
            self.power.set_low()
        }
    }

    /// Reflect the USB device state on the link LED: lit while the device is
    /// configured.
    pub fn set_usb_state(&mut self, state: UsbDeviceState) -> Result<(), ERR> {
        match state {
            UsbDeviceState::Configured => self.link.set_high(),
            _ => self.link.set_low(),
        }
    }

    pub fn set_error(&mut self, on: bool) -> Result<(), ERR> {
        if on {
            self.error.set_high()
        } else {
            self.error.set_low()
        }
    }
}
