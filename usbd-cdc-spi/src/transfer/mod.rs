//! Byte-transfer backends
//!
//! The bridge engine only ever asks for one thing: clock a byte out, hand back
//! the byte clocked in. How that happens depends on the silicon. A dedicated
//! SPI peripheral is loaded and polled for completion ([`HardwareSpi`]); a
//! universal shift register has to have its clock strobed by software
//! ([`UsiTransfer`]).

use embedded_hal::watchdog::Watchdog;

pub mod spi;
pub mod usi;

pub use self::spi::{FixedMode, HardwareSpi, ModePins, ModeSource, SetMode};
pub use self::usi::{
    Cadence, FixedSpeed, ShiftRegister, SoftShiftRegister, SpeedPin, SpeedSource, UsiTiming,
    UsiTransfer,
};

/// A full-duplex, blocking, single byte exchange
pub trait ByteTransfer {
    type Error;

    /// Called once when a batch starts draining, before its first byte
    ///
    /// Backends with a sampled clock mode or speed pin latch it here.
    fn begin_batch(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }

    /// Shifts `out` onto the bus and returns the byte shifted in
    ///
    /// Any busy-wait inside must keep feeding `watchdog`; a peripheral that
    /// never completes is left for the watchdog to reset.
    fn transfer_byte<W: Watchdog>(&mut self, out: u8, watchdog: &mut W) -> Result<u8, Self::Error>;
}

/// Retries a non-blocking operation until it completes, feeding the watchdog
/// on every miss
pub(crate) fn poll_with_keepalive<T, E, W>(
    watchdog: &mut W,
    mut op: impl FnMut() -> nb::Result<T, E>,
) -> Result<T, E>
where
    W: Watchdog,
{
    loop {
        match op() {
            Ok(value) => return Ok(value),
            Err(nb::Error::WouldBlock) => watchdog.feed(),
            Err(nb::Error::Other(e)) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::fakes::CountingWatchdog;
    use super::*;

    #[test]
    fn keepalive_fed_on_every_miss() {
        let mut watchdog = CountingWatchdog::default();
        let mut misses = 5;
        let result: Result<u8, ()> = poll_with_keepalive(&mut watchdog, || {
            if misses > 0 {
                misses -= 1;
                Err(nb::Error::WouldBlock)
            } else {
                Ok(0x42)
            }
        });
        assert_eq!(result, Ok(0x42));
        assert_eq!(watchdog.feeds, 5);
    }

    #[test]
    fn errors_stop_the_loop() {
        let mut watchdog = CountingWatchdog::default();
        let result: Result<u8, u8> =
            poll_with_keepalive(&mut watchdog, || Err(nb::Error::Other(3)));
        assert_eq!(result, Err(3));
        assert_eq!(watchdog.feeds, 0);
    }
}
