//! Drains a loaded batch through the byte-transfer backend

use embedded_hal::watchdog::Watchdog;

use crate::buffers::TransferBuffers;
use crate::error::Error;
use crate::link::HostLink;
use crate::transfer::ByteTransfer;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum EngineState {
    /// Nothing clocked in and waiting for the host
    Idle,
    /// Shifting the batch out, one byte at a time
    Draining,
    /// The response is waiting for the data IN endpoint
    ReadyToSend,
}

pub struct BridgeEngine {
    state: EngineState,
}

impl BridgeEngine {
    pub const fn new() -> Self {
        Self {
            state: EngineState::Idle,
        }
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    /// One main-loop step. Returns whether a batch was drained.
    ///
    /// Nothing happens unless a batch is loaded and the previous response has
    /// left, so at most one batch is ever between ingress and egress.
    pub fn drain<T, W, L>(
        &mut self,
        buffers: &mut TransferBuffers,
        spi: &mut T,
        watchdog: &mut W,
        link: &mut L,
    ) -> Result<bool, Error<T::Error>>
    where
        T: ByteTransfer,
        W: Watchdog,
        L: HostLink,
    {
        if !buffers.batch_ready() {
            return Ok(false);
        }

        self.state = EngineState::Draining;
        debug!("Draining {} byte batch", buffers.loaded());

        // The next packet can land in the transmit buffer while this one is
        // shifted; it won't be drained before the response goes out
        link.set_out_enabled(true);

        if let Err(e) = Self::shift_batch(buffers, spi, watchdog) {
            error!("SPI fault, dropping batch at byte {}", buffers.drained());
            buffers.abandon_batch();
            self.state = EngineState::Idle;
            return Err(e);
        }

        buffers.complete_batch();
        self.state = EngineState::ReadyToSend;
        Ok(true)
    }

    fn shift_batch<T, W>(
        buffers: &mut TransferBuffers,
        spi: &mut T,
        watchdog: &mut W,
    ) -> Result<(), Error<T::Error>>
    where
        T: ByteTransfer,
        W: Watchdog,
    {
        spi.begin_batch()?;
        while let Some(out) = buffers.next_out() {
            let byte = spi.transfer_byte(out, watchdog)?;
            buffers.push_in(byte).map_err(|_| Error::Overrun)?;
        }
        Ok(())
    }

    /// The response was handed to the IN endpoint
    pub fn response_sent(&mut self) {
        if self.state == EngineState::ReadyToSend {
            self.state = EngineState::Idle;
        }
    }

    pub fn reset(&mut self) {
        self.state = EngineState::Idle;
    }
}

impl Default for BridgeEngine {
    fn default() -> Self {
        Self::new()
    }
}
