/// Errors surfaced by the bridge's main-loop step and ingress path
///
/// `E` is the byte-transfer backend's error type.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error<E> {
    /// Bulk OUT data arrived while the previous batch was still loaded, or a
    /// packet was longer than the transfer buffer. The data is dropped.
    Overrun,

    /// The SPI backend reported a fault; the batch in progress was abandoned
    Spi(E),
}

impl<E> From<E> for Error<E> {
    fn from(e: E) -> Self {
        Error::Spi(e)
    }
}
