//! Test doubles shared by the unit tests

use core::convert::Infallible;

use embedded_hal::{blocking::delay::DelayUs, watchdog::Watchdog};
use heapless::Vec;
use usb_device::{Result, UsbError};

use crate::buffers::PACKET_SIZE;
use crate::link::HostLink;
use crate::spi_device::SpiDevice;
use crate::transfer::ByteTransfer;

/// Counts feeds
#[derive(Default)]
pub struct CountingWatchdog {
    pub feeds: usize,
}

impl Watchdog for CountingWatchdog {
    fn feed(&mut self) {
        self.feeds += 1;
    }
}

/// Accumulates requested delay
#[derive(Default)]
pub struct CountingDelay {
    pub calls: usize,
    pub total_us: u32,
}

impl DelayUs<u32> for CountingDelay {
    fn delay_us(&mut self, us: u32) {
        self.calls += 1;
        self.total_us += us;
    }
}

/// A peripheral that answers each byte with `respond(byte)` and records
/// what was clocked out
pub struct FakeSpi<F: FnMut(u8) -> u8> {
    pub respond: F,
    pub sent: Vec<u8, 64>,
    pub batches: usize,
}

impl<F: FnMut(u8) -> u8> FakeSpi<F> {
    pub fn new(respond: F) -> Self {
        Self {
            respond,
            sent: Vec::new(),
            batches: 0,
        }
    }
}

impl<F: FnMut(u8) -> u8> ByteTransfer for FakeSpi<F> {
    type Error = Infallible;

    fn begin_batch(&mut self) -> core::result::Result<(), Infallible> {
        self.batches += 1;
        Ok(())
    }

    fn transfer_byte<W: Watchdog>(
        &mut self,
        out: u8,
        watchdog: &mut W,
    ) -> core::result::Result<u8, Infallible> {
        watchdog.feed();
        self.sent.push(out).ok();
        Ok((self.respond)(out))
    }
}

/// Echoes, except that the byte at index `fail_at` faults with 0xee
pub struct FaultySpi {
    pub fail_at: usize,
    pub count: usize,
}

impl ByteTransfer for FaultySpi {
    type Error = u8;

    fn transfer_byte<W: Watchdog>(&mut self, out: u8, _watchdog: &mut W) -> core::result::Result<u8, u8> {
        let index = self.count;
        self.count += 1;
        if index == self.fail_at {
            Err(0xee)
        } else {
            Ok(out)
        }
    }
}

/// Records the last level written to each line and how many writes each saw
#[derive(Default)]
pub struct RecordingLines {
    pub chip_select: Option<bool>,
    pub break_line: Option<bool>,
    pub chip_select_writes: usize,
    pub break_writes: usize,
}

impl SpiDevice for RecordingLines {
    fn set_chip_select(&mut self, level: bool) {
        self.chip_select = Some(level);
        self.chip_select_writes += 1;
    }

    fn set_break_line(&mut self, level: bool) {
        self.break_line = Some(level);
        self.break_writes += 1;
    }
}

pub type Packet = Vec<u8, PACKET_SIZE>;

/// A USB stack whose IN endpoints accept every packet unless marked busy
///
/// Packets queued with `host_sends` are handed out by `read_data` in order.
pub struct FakeLink {
    pub out_enabled: bool,
    pub data_busy: bool,
    pub notify_busy: bool,
    pub data: Vec<Packet, 32>,
    pub notifications: Vec<Packet, 32>,
    pub host_out: Vec<Packet, 8>,
    pub out_reads: usize,
}

impl FakeLink {
    pub fn new() -> Self {
        Self {
            out_enabled: true,
            data_busy: false,
            notify_busy: false,
            data: Vec::new(),
            notifications: Vec::new(),
            host_out: Vec::new(),
            out_reads: 0,
        }
    }

    pub fn host_sends(&mut self, packet: &[u8]) {
        record(&mut self.host_out, packet).ok();
    }

    /// Packets the host queued that haven't been read yet
    pub fn out_pending(&self) -> usize {
        self.host_out.len() - self.out_reads
    }
}

fn record<const N: usize>(log: &mut Vec<Packet, N>, data: &[u8]) -> Result<usize> {
    let packet = Packet::from_slice(data).map_err(|_| UsbError::BufferOverflow)?;
    log.push(packet).map_err(|_| UsbError::BufferOverflow)?;
    Ok(data.len())
}

impl HostLink for FakeLink {
    fn set_out_enabled(&mut self, enabled: bool) {
        self.out_enabled = enabled;
    }

    fn out_enabled(&self) -> bool {
        self.out_enabled
    }

    fn read_data(&mut self, buf: &mut [u8]) -> Result<usize> {
        let packet = self.host_out.get(self.out_reads).ok_or(UsbError::WouldBlock)?;
        if packet.len() > buf.len() {
            return Err(UsbError::BufferOverflow);
        }
        buf[..packet.len()].copy_from_slice(packet);
        self.out_reads += 1;
        Ok(packet.len())
    }

    fn write_data(&mut self, data: &[u8]) -> Result<usize> {
        if self.data_busy {
            return Err(UsbError::WouldBlock);
        }
        record(&mut self.data, data)
    }

    fn write_notification(&mut self, data: &[u8]) -> Result<usize> {
        if self.notify_busy {
            return Err(UsbError::WouldBlock);
        }
        record(&mut self.notifications, data)
    }
}
