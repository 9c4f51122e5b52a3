//! Universal serial interface: a bare shift register whose clock software
//! has to strobe
//!
//! In three-wire mode a byte takes 16 clock edges; the 4-bit edge counter
//! overflows on the last one, which is how completion is detected. The rate
//! at which software strobes the clock is the bus clock, so the cadence is
//! picked per batch:
//!
//! - [`Cadence::Fast`]: strobe back to back, feeding the watchdog between
//!   strobes (that feed is most of the half-period)
//! - [`Cadence::Slow`]: wait [`UsiTiming::slow_half_period_us`] before every
//!   strobe

use core::convert::Infallible;

use embedded_hal::{
    blocking::delay::DelayUs,
    digital::v2::{InputPin, OutputPin},
    watchdog::Watchdog,
};

use super::ByteTransfer;

/// Clock edges per byte
const EDGES_PER_BYTE: u8 = 16;

/// Register-level access to a USI-style peripheral
pub trait ShiftRegister {
    /// Writes the data register and clears the counter overflow flag
    fn load(&mut self, byte: u8);

    /// Toggles the clock line once, advancing the edge counter
    fn strobe_clock(&mut self);

    /// The counter wrapped, i.e. the byte is complete
    fn overflowed(&self) -> bool;

    /// Reads the data register
    fn data(&self) -> u8;
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Cadence {
    /// Around 1 MHz on an AVR at 12 MHz
    Fast,
    /// Delay-paced, 125 kHz with the default timing
    Slow,
}

/// Where the cadence for the next batch comes from
pub trait SpeedSource {
    fn sample(&mut self) -> Cadence;
}

/// For parts without a speed-select pin
pub struct FixedSpeed(pub Cadence);

impl SpeedSource for FixedSpeed {
    fn sample(&mut self) -> Cadence {
        self.0
    }
}

/// A speed-select input: high selects [`Cadence::Fast`]
///
/// The pin usually has a pull-up, so a jumper to ground slows the bus down.
pub struct SpeedPin<P>(pub P);

impl<P: InputPin> SpeedSource for SpeedPin<P> {
    fn sample(&mut self) -> Cadence {
        match self.0.is_high() {
            Ok(true) => Cadence::Fast,
            Ok(false) => Cadence::Slow,
            Err(_) => {
                warn!("Speed pin unreadable, using slow clock");
                Cadence::Slow
            }
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct UsiTiming {
    /// Delay before each strobe in [`Cadence::Slow`]
    pub slow_half_period_us: u32,

    /// Watchdog feeds before each strobe in [`Cadence::Fast`]; parts running
    /// a faster core clock use more than one to stretch the half-period
    pub fast_feeds_per_edge: u8,
}

impl UsiTiming {
    pub const fn new() -> Self {
        Self {
            slow_half_period_us: 4,
            fast_feeds_per_edge: 1,
        }
    }

    pub const fn slow_half_period_us(mut self, us: u32) -> Self {
        self.slow_half_period_us = us;
        self
    }

    pub const fn fast_feeds_per_edge(mut self, feeds: u8) -> Self {
        self.fast_feeds_per_edge = feeds;
        self
    }
}

impl Default for UsiTiming {
    fn default() -> Self {
        Self::new()
    }
}

/// Byte transfers over a [`ShiftRegister`], clocked by software
pub struct UsiTransfer<R, D, S = FixedSpeed> {
    usi: R,
    delay: D,
    speed: S,
    timing: UsiTiming,
    cadence: Cadence,
}

impl<R, D, S> UsiTransfer<R, D, S>
where
    R: ShiftRegister,
    D: DelayUs<u32>,
    S: SpeedSource,
{
    pub fn new(usi: R, delay: D, speed: S, timing: UsiTiming) -> Self {
        Self {
            usi,
            delay,
            speed,
            timing,
            cadence: Cadence::Slow,
        }
    }

    /// Cadence latched for the current batch
    pub fn cadence(&self) -> Cadence {
        self.cadence
    }

    pub fn free(self) -> (R, D, S) {
        (self.usi, self.delay, self.speed)
    }
}

impl<R, D, S> ByteTransfer for UsiTransfer<R, D, S>
where
    R: ShiftRegister,
    D: DelayUs<u32>,
    S: SpeedSource,
{
    type Error = Infallible;

    fn begin_batch(&mut self) -> Result<(), Infallible> {
        self.cadence = self.speed.sample();
        debug!("USI cadence {}", self.cadence);
        Ok(())
    }

    fn transfer_byte<W: Watchdog>(&mut self, out: u8, watchdog: &mut W) -> Result<u8, Infallible> {
        self.usi.load(out);

        match self.cadence {
            Cadence::Fast => loop {
                for _ in 0..self.timing.fast_feeds_per_edge {
                    watchdog.feed();
                }
                self.usi.strobe_clock();
                if self.usi.overflowed() {
                    break;
                }
            },
            Cadence::Slow => loop {
                self.delay.delay_us(self.timing.slow_half_period_us);
                self.usi.strobe_clock();
                if self.usi.overflowed() {
                    break;
                }
            },
        }

        let byte = self.usi.data();
        trace!("USI {=u8:#x} -> {=u8:#x}", out, byte);
        Ok(byte)
    }
}

/// A [`ShiftRegister`] made from three GPIOs, SPI mode 0, MSB first
///
/// Data is sampled on the rising edge and the next bit is presented on the
/// falling edge, so after 16 strobes the register holds the byte read from
/// MISO.
pub struct SoftShiftRegister<SCK, MOSI, MISO> {
    sck: SCK,
    mosi: MOSI,
    miso: MISO,
    data: u8,
    edges: u8,
    sampled: bool,
}

impl<SCK, MOSI, MISO> SoftShiftRegister<SCK, MOSI, MISO>
where
    SCK: OutputPin<Error = Infallible>,
    MOSI: OutputPin<Error = Infallible>,
    MISO: InputPin<Error = Infallible>,
{
    pub fn new(mut sck: SCK, mosi: MOSI, miso: MISO) -> Self {
        sck.set_low().ok();
        Self {
            sck,
            mosi,
            miso,
            data: 0,
            edges: EDGES_PER_BYTE,
            sampled: false,
        }
    }

    pub fn free(self) -> (SCK, MOSI, MISO) {
        (self.sck, self.mosi, self.miso)
    }

    fn present_msb(&mut self) {
        if self.data & 0x80 != 0 {
            self.mosi.set_high().ok();
        } else {
            self.mosi.set_low().ok();
        }
    }
}

impl<SCK, MOSI, MISO> ShiftRegister for SoftShiftRegister<SCK, MOSI, MISO>
where
    SCK: OutputPin<Error = Infallible>,
    MOSI: OutputPin<Error = Infallible>,
    MISO: InputPin<Error = Infallible>,
{
    fn load(&mut self, byte: u8) {
        self.data = byte;
        self.edges = 0;
        self.sck.set_low().ok();
        self.present_msb();
    }

    fn strobe_clock(&mut self) {
        if self.overflowed() {
            return;
        }

        if self.edges % 2 == 0 {
            self.sck.set_high().ok();
            self.sampled = self.miso.is_high().unwrap_or(false);
        } else {
            self.sck.set_low().ok();
            self.data = (self.data << 1) | self.sampled as u8;
            self.present_msb();
        }
        self.edges += 1;
    }

    fn overflowed(&self) -> bool {
        self.edges >= EDGES_PER_BYTE
    }

    fn data(&self) -> u8 {
        self.data
    }
}
