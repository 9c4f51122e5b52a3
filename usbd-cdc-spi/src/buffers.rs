//! Host-to-device and device-to-host batch buffers
//!
//! `tx.len()` is the write cursor (bytes loaded by the last bulk OUT packet)
//! and `rx.len()` is the read cursor (bytes clocked back in from the SPI
//! peripheral). While a batch drains, `rx.len() <= tx.len() <= PACKET_SIZE`.

use heapless::Vec;

/// Bulk endpoint packet size; one packet is one batch
pub const PACKET_SIZE: usize = 8;

/// Returned when a batch would not fit
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Overrun;

pub struct TransferBuffers {
    /// Host to device, waiting to be clocked out
    tx: Vec<u8, PACKET_SIZE>,
    /// Device to host, waiting for the IN endpoint
    rx: Vec<u8, PACKET_SIZE>,
    /// Send a frame on the next IN opportunity even if `rx` is empty
    send_empty_frame: bool,
}

impl TransferBuffers {
    pub const fn new() -> Self {
        Self {
            tx: Vec::new(),
            rx: Vec::new(),
            send_empty_frame: false,
        }
    }

    /// Ingress: load one bulk OUT packet
    ///
    /// The caller is responsible for back-pressure; the bridge only enables
    /// OUT transfers while `tx` is empty, so a second packet landing on top of
    /// an undrained one is a contract violation and is refused whole.
    pub fn submit(&mut self, data: &[u8]) -> Result<(), Overrun> {
        if self.tx.len() + data.len() > PACKET_SIZE {
            return Err(Overrun);
        }
        self.tx.extend_from_slice(data).map_err(|_| Overrun)
    }

    /// Write cursor
    pub fn loaded(&self) -> usize {
        self.tx.len()
    }

    /// Read cursor
    pub fn drained(&self) -> usize {
        self.rx.len()
    }

    /// A batch is waiting, the previous response has left, and no empty
    /// frame is owed to the host
    ///
    /// An owed empty frame always leaves before the next response exists.
    pub fn batch_ready(&self) -> bool {
        !self.tx.is_empty() && self.rx.is_empty() && !self.send_empty_frame
    }

    /// The next byte to clock out, if the batch isn't finished
    pub(crate) fn next_out(&self) -> Option<u8> {
        self.tx.get(self.rx.len()).copied()
    }

    /// Stores the byte clocked in alongside the last one clocked out
    pub(crate) fn push_in(&mut self, byte: u8) -> Result<(), Overrun> {
        if self.rx.len() >= self.tx.len() {
            return Err(Overrun);
        }
        self.rx.push(byte).map_err(|_| Overrun)
    }

    /// Batch complete: reset the write cursor, keep the response
    pub(crate) fn complete_batch(&mut self) {
        self.tx.clear();
    }

    /// Drops both the batch and whatever part of its response was collected
    pub(crate) fn abandon_batch(&mut self) {
        self.tx.clear();
        self.rx.clear();
    }

    pub fn arm_empty_frame(&mut self) {
        self.send_empty_frame = true;
    }

    pub fn empty_frame_armed(&self) -> bool {
        self.send_empty_frame
    }

    /// Egress has something to send, possibly a zero-length frame
    pub fn egress_pending(&self) -> bool {
        !self.rx.is_empty() || self.send_empty_frame
    }

    /// Response bytes for the next IN transmission
    pub fn response(&self) -> &[u8] {
        &self.rx
    }

    /// Called once the IN endpoint took `response()`
    ///
    /// A full packet doesn't end a bulk transfer on the host side, so the
    /// next opportunity must carry a short or empty one.
    pub fn finish_egress(&mut self) {
        self.send_empty_frame = self.rx.len() == PACKET_SIZE;
        self.rx.clear();
    }

    pub fn clear(&mut self) {
        self.tx.clear();
        self.rx.clear();
        self.send_empty_frame = false;
    }
}

impl Default for TransferBuffers {
    fn default() -> Self {
        Self::new()
    }
}
