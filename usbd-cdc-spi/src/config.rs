use cdc_spi_protocol::LineCoding;

/// Run-time selection between the firmware variants
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct BridgeConfig {
    /// Reported by GET_LINE_CODING until the host writes a new one
    pub line_coding: LineCoding,

    /// When false, SET_LINE_CODING is acknowledged and ignored, and
    /// `line_coding` is always reported
    pub line_coding_writable: bool,

    /// Whether the SERIAL_STATE notifier runs on the interrupt endpoint
    pub serial_state: bool,

    /// wIndex of the SERIAL_STATE notification
    pub comm_interface: u8,
}

impl BridgeConfig {
    pub const fn new() -> Self {
        Self {
            line_coding: LineCoding::new(9600, 0, 0, 8),
            line_coding_writable: true,
            serial_state: true,
            comm_interface: 0,
        }
    }

    /// Always report `line_coding`, ignoring SET_LINE_CODING
    pub const fn fixed_line_coding(mut self, line_coding: LineCoding) -> Self {
        self.line_coding = line_coding;
        self.line_coding_writable = false;
        self
    }

    pub const fn initial_line_coding(mut self, line_coding: LineCoding) -> Self {
        self.line_coding = line_coding;
        self
    }

    /// For descriptors without a notification endpoint
    pub const fn without_serial_state(mut self) -> Self {
        self.serial_state = false;
        self
    }

    pub const fn comm_interface(mut self, interface: u8) -> Self {
        self.comm_interface = interface;
        self
    }
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self::new()
    }
}
