use usb_device::Result;

/// The USB stack, seen from the bridge
///
/// Reads and writes follow the `usb-device` endpoint convention:
/// `UsbError::WouldBlock` means there is no packet to read, or the endpoint
/// still holds an earlier packet, and the caller should try again on a later
/// iteration.
pub trait HostLink {
    /// Applies (`false`) or lifts (`true`) back-pressure on bulk OUT
    fn set_out_enabled(&mut self, enabled: bool);

    /// While false the bulk OUT endpoint must not be read, so the hardware
    /// NAKs the host
    fn out_enabled(&self) -> bool;

    /// Takes one packet from the bulk OUT endpoint
    fn read_data(&mut self, buf: &mut [u8]) -> Result<usize>;

    /// Queues one packet, possibly empty, on the data IN endpoint
    fn write_data(&mut self, data: &[u8]) -> Result<usize>;

    /// Queues one packet on the notification (interrupt IN) endpoint
    fn write_notification(&mut self, data: &[u8]) -> Result<usize>;
}
