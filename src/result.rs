use core::fmt::Debug;

/// Error type
///
/// Every protocol operation returns exactly one of these; composite
/// operations forward the first failure unchanged.
#[derive(Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error<E: Sized + Debug> {
    /// No presence pulse after a bus reset
    NoPresence,
    /// Scratchpad checksum mismatch (computed, received)
    CrcMismatch(u8, u8),
    /// The operation needs a resolved power mode; probe the sensor or
    /// construct it with a known mode first
    UnknownPowerMode,
    /// The operation needs a known resolution; probe or configure first
    UnknownResolution,
    /// A written configuration did not read back correctly
    VerificationFailed,
    /// The scratchpad reports a different resolution than the one
    /// recorded for the sensor (recorded bits, reported bits)
    UnexpectedResolution(u8, u8),
    PortError(E),
}

impl<E: Sized + Debug> From<E> for Error<E> {
    fn from(e: E) -> Self {
        Error::PortError(e)
    }
}
