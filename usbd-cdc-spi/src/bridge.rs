//! The bridge context: everything the firmware kept in globals, in one place
//!
//! [`Bridge`] is independent of the USB stack. The stack feeds it control
//! requests and bulk OUT data, and calls [`Bridge::service`] once per main
//! loop iteration with a [`HostLink`] to send through. Order within an
//! iteration is fixed: feed the watchdog, drain the loaded batch, send the
//! response, advance the notifier.

use cdc_spi_protocol::LineCoding;
use embedded_hal::watchdog::Watchdog;
use usb_device::UsbError;

use crate::buffers::{TransferBuffers, PACKET_SIZE};
use crate::config::BridgeConfig;
use crate::control::{ControlAction, ControlHandler, SetupRequest};
use crate::engine::{BridgeEngine, EngineState};
use crate::error::Error;
use crate::link::HostLink;
use crate::notify::{NotifyState, SerialStateNotifier};
use crate::spi_device::SpiDevice;
use crate::transfer::ByteTransfer;

pub struct Bridge<T, D, W> {
    buffers: TransferBuffers,
    control: ControlHandler,
    engine: BridgeEngine,
    notifier: Option<SerialStateNotifier>,
    spi: T,
    lines: D,
    watchdog: W,
}

impl<T, D, W> Bridge<T, D, W>
where
    T: ByteTransfer,
    D: SpiDevice,
    W: Watchdog,
{
    pub fn new(spi: T, lines: D, watchdog: W, config: BridgeConfig) -> Self {
        Self {
            buffers: TransferBuffers::new(),
            control: ControlHandler::new(config.line_coding, config.line_coding_writable),
            engine: BridgeEngine::new(),
            notifier: if config.serial_state {
                Some(SerialStateNotifier::new(config.comm_interface))
            } else {
                None
            },
            spi,
            lines,
            watchdog,
        }
    }

    /// Setup stage of a request addressed to the communications interface
    pub fn on_control_request(&mut self, req: SetupRequest) -> ControlAction {
        let (action, effects) = self.control.on_request(req, &mut self.lines);

        if effects.empty_frame {
            self.buffers.arm_empty_frame();
        }
        if effects.line_state_set {
            if let Some(notifier) = self.notifier.as_mut() {
                notifier.arm();
            }
        }

        action
    }

    /// Data stage after [`ControlAction::DeferRead`]
    pub fn on_read(&mut self, buf: &mut [u8]) -> usize {
        self.control.on_read(buf)
    }

    /// Data stage after [`ControlAction::DeferWrite`]; returns whether the
    /// line coding was replaced
    ///
    /// The status stage is acknowledged either way. A malformed record
    /// leaves the line coding as it was.
    pub fn on_write(&mut self, data: &[u8]) -> bool {
        self.control.on_write(data)
    }

    /// Ingress: one bulk OUT packet
    ///
    /// OUT acceptance is switched off until the engine starts draining this
    /// batch. A zero-length packet carries nothing to shift and is ignored.
    pub fn on_bulk_out<L: HostLink>(
        &mut self,
        data: &[u8],
        link: &mut L,
    ) -> Result<(), Error<T::Error>> {
        if data.is_empty() {
            return Ok(());
        }

        if self.buffers.submit(data).is_err() {
            warn!("Dropping {} byte packet, batch still loaded", data.len());
            return Err(Error::Overrun);
        }

        link.set_out_enabled(false);
        Ok(())
    }

    /// Reads a bulk OUT packet into the transmit buffer, unless back-pressure
    /// is on
    pub fn pull_out<L: HostLink>(&mut self, link: &mut L) {
        if !link.out_enabled() {
            return;
        }

        let mut packet = [0u8; PACKET_SIZE];
        match link.read_data(&mut packet) {
            Ok(count) => {
                // Overrun is logged in on_bulk_out, and the packet is gone
                self.on_bulk_out(&packet[..count], link).ok();
            }
            Err(UsbError::WouldBlock) => {}
            Err(_) => {
                error!("Error reading bulk OUT data");
            }
        }
    }

    /// One main-loop iteration
    ///
    /// Egress and the notifier still run when the backend faults; the fault
    /// is returned afterwards.
    pub fn service<L: HostLink>(&mut self, link: &mut L) -> Result<(), Error<T::Error>> {
        self.watchdog.feed();

        let drained = self
            .engine
            .drain(&mut self.buffers, &mut self.spi, &mut self.watchdog, link);

        self.send_response(link);

        if let Some(notifier) = self.notifier.as_mut() {
            notifier.poll(link);
        }

        drained.map(|_| ())
    }

    fn send_response<L: HostLink>(&mut self, link: &mut L) {
        if !self.buffers.egress_pending() {
            return;
        }

        match link.write_data(self.buffers.response()) {
            Ok(_count) => {
                trace!("Sent {} byte response", _count);
                self.buffers.finish_egress();
                self.engine.response_sent();
            }
            Err(UsbError::WouldBlock) => {}
            Err(_) => {
                error!("Error writing response packet");
            }
        }
    }

    /// USB bus reset: drops the batch, the response and any notification in
    /// progress, and accepts OUT data again
    pub fn reset<L: HostLink>(&mut self, link: &mut L) {
        self.buffers.clear();
        self.engine.reset();
        if let Some(notifier) = self.notifier.as_mut() {
            notifier.reset();
        }
        link.set_out_enabled(true);
    }

    pub fn engine_state(&self) -> EngineState {
        self.engine.state()
    }

    /// `None` when the notifier is configured out
    pub fn notify_state(&self) -> Option<NotifyState> {
        self.notifier.as_ref().map(|n| n.state())
    }

    pub fn line_coding(&self) -> LineCoding {
        self.control.line_coding()
    }

    pub fn buffers(&self) -> &TransferBuffers {
        &self.buffers
    }

    pub fn lines(&self) -> &D {
        &self.lines
    }

    pub fn spi(&self) -> &T {
        &self.spi
    }

    pub fn release(self) -> (T, D, W) {
        (self.spi, self.lines, self.watchdog)
    }
}
