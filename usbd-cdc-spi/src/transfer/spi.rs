//! Dedicated SPI peripheral: load the data register, poll the completion flag

use embedded_hal::{
    digital::v2::InputPin,
    spi::{FullDuplex, Mode, Phase, Polarity},
    watchdog::Watchdog,
};

use super::{poll_with_keepalive, ByteTransfer};

/// An SPI peripheral whose clock polarity and phase can change between batches
pub trait SetMode {
    fn set_mode(&mut self, mode: Mode);
}

/// Where the SPI mode for the next batch comes from
pub trait ModeSource<SPI> {
    /// Called before the first byte of every batch
    fn latch(&mut self, spi: &mut SPI);
}

/// Whatever the peripheral was configured with stays
pub struct FixedMode;

impl<SPI> ModeSource<SPI> for FixedMode {
    fn latch(&mut self, _spi: &mut SPI) {}
}

/// Two jumper inputs with pull-ups; a grounded pin sets its bit
///
/// The phase pin selects CPHA and the polarity pin selects CPOL, so with both
/// open the bus runs in mode 0.
pub struct ModePins<PHA, POL> {
    phase: PHA,
    polarity: POL,
}

impl<PHA, POL> ModePins<PHA, POL>
where
    PHA: InputPin,
    POL: InputPin,
{
    pub fn new(phase: PHA, polarity: POL) -> Self {
        Self { phase, polarity }
    }

    /// Reads both jumpers; an unreadable pin counts as open
    pub fn sample(&self) -> Mode {
        let phase = if self.phase.is_low().unwrap_or(false) {
            Phase::CaptureOnSecondTransition
        } else {
            Phase::CaptureOnFirstTransition
        };
        let polarity = if self.polarity.is_low().unwrap_or(false) {
            Polarity::IdleHigh
        } else {
            Polarity::IdleLow
        };
        Mode { polarity, phase }
    }

    pub fn free(self) -> (PHA, POL) {
        (self.phase, self.polarity)
    }
}

impl<SPI, PHA, POL> ModeSource<SPI> for ModePins<PHA, POL>
where
    SPI: SetMode,
    PHA: InputPin,
    POL: InputPin,
{
    fn latch(&mut self, spi: &mut SPI) {
        let mode = self.sample();
        debug!("SPI mode {}", mode_number(mode));
        spi.set_mode(mode);
    }
}

/// Conventional mode number, `CPOL << 1 | CPHA`
pub fn mode_number(mode: Mode) -> u8 {
    let cpol = match mode.polarity {
        Polarity::IdleLow => 0,
        Polarity::IdleHigh => 1,
    };
    let cpha = match mode.phase {
        Phase::CaptureOnFirstTransition => 0,
        Phase::CaptureOnSecondTransition => 1,
    };
    (cpol << 1) | cpha
}

/// Byte transfers on a peripheral implementing [`FullDuplex`]
pub struct HardwareSpi<SPI, M = FixedMode> {
    spi: SPI,
    mode: M,
}

impl<SPI> HardwareSpi<SPI, FixedMode>
where
    SPI: FullDuplex<u8>,
{
    pub fn new(spi: SPI) -> Self {
        Self {
            spi,
            mode: FixedMode,
        }
    }
}

impl<SPI, M> HardwareSpi<SPI, M>
where
    SPI: FullDuplex<u8>,
    M: ModeSource<SPI>,
{
    /// Re-reads `mode` at the start of every batch
    pub fn with_mode_source(spi: SPI, mode: M) -> Self {
        Self { spi, mode }
    }

    pub fn free(self) -> (SPI, M) {
        (self.spi, self.mode)
    }
}

impl<SPI, M> ByteTransfer for HardwareSpi<SPI, M>
where
    SPI: FullDuplex<u8>,
    M: ModeSource<SPI>,
{
    type Error = SPI::Error;

    fn begin_batch(&mut self) -> Result<(), Self::Error> {
        self.mode.latch(&mut self.spi);
        Ok(())
    }

    fn transfer_byte<W: Watchdog>(&mut self, out: u8, watchdog: &mut W) -> Result<u8, Self::Error> {
        let spi = &mut self.spi;
        poll_with_keepalive(watchdog, || spi.send(out))?;
        let byte = poll_with_keepalive(watchdog, || spi.read())?;
        trace!("SPI {=u8:#x} -> {=u8:#x}", out, byte);
        Ok(byte)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::CountingWatchdog;
    use embedded_hal_mock::pin::{Mock as PinMock, State, Transaction as PinTransaction};
    use embedded_hal_mock::spi::{Mock as SpiMock, Transaction as SpiTransaction};

    #[test]
    fn exchanges_one_byte_per_call() {
        let mut spi = SpiMock::new(&[
            SpiTransaction::send(0x9f),
            SpiTransaction::read(0xc2),
            SpiTransaction::send(0x00),
            SpiTransaction::read(0x20),
        ]);
        let mut watchdog = CountingWatchdog::default();

        let mut backend = HardwareSpi::new(spi.clone());
        backend.begin_batch().unwrap();
        assert_eq!(backend.transfer_byte(0x9f, &mut watchdog).unwrap(), 0xc2);
        assert_eq!(backend.transfer_byte(0x00, &mut watchdog).unwrap(), 0x20);

        spi.done();
    }

    /// Completes after `busy` polls, echoing the inverted byte
    struct SlowSpi {
        busy: usize,
        remaining: usize,
        data: u8,
        mode: Option<Mode>,
    }

    impl FullDuplex<u8> for SlowSpi {
        type Error = ();

        fn read(&mut self) -> nb::Result<u8, ()> {
            if self.remaining > 0 {
                self.remaining -= 1;
                return Err(nb::Error::WouldBlock);
            }
            Ok(!self.data)
        }

        fn send(&mut self, word: u8) -> nb::Result<(), ()> {
            self.data = word;
            self.remaining = self.busy;
            Ok(())
        }
    }

    impl SetMode for SlowSpi {
        fn set_mode(&mut self, mode: Mode) {
            self.mode = Some(mode);
        }
    }

    #[test]
    fn busy_wait_feeds_watchdog() {
        let spi = SlowSpi {
            busy: 7,
            remaining: 0,
            data: 0,
            mode: None,
        };
        let mut watchdog = CountingWatchdog::default();
        let mut backend = HardwareSpi::new(spi);

        assert_eq!(backend.transfer_byte(0x0f, &mut watchdog), Ok(0xf0));
        assert_eq!(watchdog.feeds, 7);
        assert_eq!(backend.transfer_byte(0x55, &mut watchdog), Ok(0xaa));
        assert_eq!(watchdog.feeds, 14);
    }

    #[test]
    fn grounded_jumpers_select_mode_3() {
        let phase = PinMock::new(&[PinTransaction::get(State::Low)]);
        let polarity = PinMock::new(&[PinTransaction::get(State::Low)]);
        let spi = SlowSpi {
            busy: 0,
            remaining: 0,
            data: 0,
            mode: None,
        };

        let mut backend = HardwareSpi::with_mode_source(spi, ModePins::new(phase, polarity));
        backend.begin_batch().unwrap();

        let (spi, pins) = backend.free();
        let mode = spi.mode.unwrap();
        assert_eq!(mode_number(mode), 3);

        let (mut phase, mut polarity) = pins.free();
        phase.done();
        polarity.done();
    }

    #[test]
    fn open_jumpers_select_mode_0() {
        let pins = ModePins::new(
            PinMock::new(&[PinTransaction::get(State::High)]),
            PinMock::new(&[PinTransaction::get(State::High)]),
        );
        assert_eq!(mode_number(pins.sample()), 0);
        let (mut phase, mut polarity) = pins.free();
        phase.done();
        polarity.done();

        let pins = ModePins::new(
            PinMock::new(&[PinTransaction::get(State::Low)]),
            PinMock::new(&[PinTransaction::get(State::High)]),
        );
        assert_eq!(mode_number(pins.sample()), 1);
        let (mut phase, mut polarity) = pins.free();
        phase.done();
        polarity.done();
    }
}
