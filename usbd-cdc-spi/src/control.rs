//! Class-specific control requests on the communications interface

use cdc_spi_protocol::{
    ClassRequest, ControlLineState, LineCoding, LINE_CODING_LEN, REQUEST_DIR_DEVICE_TO_HOST,
    REQUEST_TYPE_CLASS, REQUEST_TYPE_MASK,
};

use crate::spi_device::SpiDevice;

/// The setup stage of a control transfer, as far as the bridge cares
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SetupRequest {
    /// `bmRequestType`
    pub request_type: u8,
    /// `bRequest`
    pub request: u8,
    /// `wValue`
    pub value: u16,
}

impl SetupRequest {
    pub const fn new(request_type: u8, request: u8, value: u16) -> Self {
        Self {
            request_type,
            request,
            value,
        }
    }

    pub fn is_class(&self) -> bool {
        self.request_type & REQUEST_TYPE_MASK == REQUEST_TYPE_CLASS
    }

    pub fn is_host_to_device(&self) -> bool {
        self.request_type & REQUEST_DIR_DEVICE_TO_HOST == 0
    }
}

/// What the USB stack should do with the data stage
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ControlAction {
    /// No data stage from the bridge; complete with a zero-length status
    Ack,
    /// The bridge supplies the IN data stage through `on_read`
    DeferRead,
    /// The bridge consumes the OUT data stage through `on_write`
    DeferWrite,
}

/// Side effects of a request that belong to other components
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct ControlEffects {
    /// SET_CONTROL_LINE_STATE was received, whatever the bits
    pub line_state_set: bool,
    /// The next IN opportunity must carry a frame even if there is no data
    pub empty_frame: bool,
}

pub struct ControlHandler {
    line_coding: LineCoding,
    line_coding_writable: bool,
}

impl ControlHandler {
    pub const fn new(line_coding: LineCoding, line_coding_writable: bool) -> Self {
        Self {
            line_coding,
            line_coding_writable,
        }
    }

    pub fn line_coding(&self) -> LineCoding {
        self.line_coding
    }

    /// Handles the setup stage; hardware lines are updated before this
    /// returns, so before the status stage completes
    pub fn on_request<D: SpiDevice>(
        &mut self,
        req: SetupRequest,
        device: &mut D,
    ) -> (ControlAction, ControlEffects) {
        let mut effects = ControlEffects::default();

        if !req.is_class() {
            return (ControlAction::Ack, effects);
        }

        // Lets a host that gave up on a read see its transfer end
        effects.empty_frame = req.is_host_to_device();

        let action = match ClassRequest::n(req.request) {
            Some(ClassRequest::GET_LINE_CODING) => ControlAction::DeferRead,

            Some(ClassRequest::SET_LINE_CODING) if self.line_coding_writable => {
                ControlAction::DeferWrite
            }

            Some(ClassRequest::SET_LINE_CODING) => {
                debug!("Ignoring SET_LINE_CODING, line coding is fixed");
                ControlAction::Ack
            }

            Some(ClassRequest::SET_CONTROL_LINE_STATE) => {
                let state = ControlLineState::from_bits_truncate(req.value);
                let dtr = state.contains(ControlLineState::DTR);
                info!("DTR {}, RTS {}", dtr, state.contains(ControlLineState::RTS));
                device.set_chip_select(dtr);
                effects.line_state_set = true;
                ControlAction::Ack
            }

            Some(ClassRequest::SEND_BREAK) => {
                let level = req.value & 0x0001 != 0;
                debug!("Break line {}", level);
                device.set_break_line(level);
                ControlAction::Ack
            }

            _ => {
                debug!("Acknowledging unhandled class request {=u8:#x}", req.request);
                ControlAction::Ack
            }
        };

        (action, effects)
    }

    /// IN data stage of GET_LINE_CODING; returns the number of bytes written
    pub fn on_read(&self, buf: &mut [u8]) -> usize {
        let coding = self.line_coding.encode();
        let len = buf.len().min(LINE_CODING_LEN);
        buf[..len].copy_from_slice(&coding[..len]);
        len
    }

    /// OUT data stage of SET_LINE_CODING; returns whether the line coding
    /// changed. A short record leaves it as it was.
    pub fn on_write(&mut self, data: &[u8]) -> bool {
        if !self.line_coding_writable {
            return false;
        }

        match LineCoding::decode(data) {
            Some(coding) => {
                info!(
                    "Line coding {} baud, {} data bits, stop {}, parity {}",
                    coding.baud, coding.data_bits, coding.stop_bits, coding.parity
                );
                self.line_coding = coding;
                true
            }
            None => {
                warn!("Ignoring {} byte line coding", data.len());
                false
            }
        }
    }
}
