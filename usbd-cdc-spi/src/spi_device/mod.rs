// embedded_hal digital output trait
use embedded_hal::digital::v2::OutputPin;

/// The discrete lines between the bridge and the SPI-connected peripheral
///
/// This is a trait because the chip select handling might be more complicated
/// than writing a GPIO pin, e.g. a shared port register or an I/O expander.
/// Both lines follow the host's request bits as levels: a set bit drives the
/// line high.
pub trait SpiDevice {
    /// DTR from SET_CONTROL_LINE_STATE
    fn set_chip_select(&mut self, level: bool);

    /// Bit 0 of SEND_BREAK's wValue; usually wired to the peripheral's reset
    fn set_break_line(&mut self, level: bool);
}

/// An SPI peripheral with a chip select / DTS pin and a break / reset pin
pub struct BasicSpiDevice<P, R>
where
    P: OutputPin,
    R: OutputPin,
{
    cs_pin: P,
    break_pin: R,
}

impl<P, R> BasicSpiDevice<P, R>
where
    P: OutputPin,
    R: OutputPin,
{
    pub fn new(cs_pin: P, break_pin: R) -> Self {
        Self { cs_pin, break_pin }
    }

    /// Gives the pins back
    pub fn free(self) -> (P, R) {
        (self.cs_pin, self.break_pin)
    }
}

fn write_level<O: OutputPin>(pin: &mut O, level: bool) -> Result<(), O::Error> {
    if level {
        pin.set_high()
    } else {
        pin.set_low()
    }
}

impl<P, R> SpiDevice for BasicSpiDevice<P, R>
where
    P: OutputPin,
    R: OutputPin,
{
    fn set_chip_select(&mut self, level: bool) {
        if write_level(&mut self.cs_pin, level).is_err() {
            error!("Failed to drive chip select");
        }
    }

    fn set_break_line(&mut self, level: bool) {
        if write_level(&mut self.break_pin, level).is_err() {
            error!("Failed to drive break line");
        }
    }
}
