use crate::{compute_partial_crc8, Address, Command, OpCode};
use core::fmt::Debug;

/// Capability interface of the 1-Wire bus transport.
///
/// The electrical layer (reset and presence timing, bit banging, the
/// search algorithm) lives behind this trait; the driver only sequences
/// commands over it. Implementations exist for bit-banged GPIO lines,
/// bridge chips and simulated buses alike.
///
/// The transport owns the bus for the duration of one addressed command
/// sequence (reset, select, transfer); callers must serialize all bus
/// use, or the implementation itself must provide mutual exclusion
/// spanning that whole sequence.
pub trait Bus {
    type Error: Sized + Debug;

    /// Issues a bus reset. Returns whether a presence pulse was
    /// detected.
    fn reset(&mut self) -> Result<bool, Self::Error>;

    /// Transmits one byte, LSB first. With `hold_power` the line is
    /// actively driven high afterwards so parasitically powered devices
    /// can draw current; it stays held until the next bus operation or
    /// an explicit [`depower`](Bus::depower).
    fn write(&mut self, byte: u8, hold_power: bool) -> Result<(), Self::Error>;

    /// Receives one byte, LSB first.
    fn read(&mut self) -> Result<u8, Self::Error>;

    /// Generates a single read slot and samples the line.
    fn read_bit(&mut self) -> Result<bool, Self::Error>;

    /// Releases a line held high by a previous `hold_power` write.
    fn depower(&mut self) -> Result<(), Self::Error>;

    /// Restarts device enumeration from the beginning.
    fn reset_search(&mut self);

    /// Advances the enumeration, storing the next discovered address in
    /// `address`. Returns `false` once no further device responds.
    fn search(&mut self, address: &mut Address) -> Result<bool, Self::Error>;

    /// Addresses a single device with a Match ROM sequence.
    fn select(&mut self, address: &Address) -> Result<(), Self::Error> {
        self.write(Command::MatchRom.op_code(), false)?;
        self.write_bytes(address.as_ref())
    }

    /// Transmits a byte sequence without holding the line afterwards.
    fn write_bytes(&mut self, bytes: &[u8]) -> Result<(), Self::Error> {
        for byte in bytes {
            self.write(*byte, false)?;
        }
        Ok(())
    }

    /// Dallas/Maxim CRC-8 (polynomial 0x8C, reflected) over a byte
    /// sequence.
    fn crc8(data: &[u8]) -> u8 {
        compute_partial_crc8(0, data)
    }
}

/// Iterator over the addresses discovered by a bus enumeration.
///
/// Yields every device on the bus regardless of family; filter with
/// [`Ds18x20::is_compatible`](crate::Ds18x20::is_compatible) before
/// constructing sensors. Ends after the first transport error.
pub struct SearchIter<'a, B: Bus> {
    bus: &'a mut B,
    done: bool,
}

impl<'a, B: Bus> SearchIter<'a, B> {
    pub fn new(bus: &'a mut B) -> Self {
        bus.reset_search();
        SearchIter { bus, done: false }
    }
}

impl<B: Bus> Iterator for SearchIter<'_, B> {
    type Item = Result<Address, B::Error>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let mut address = Address::default();
        match self.bus.search(&mut address) {
            Ok(true) => Some(Ok(address)),
            Ok(false) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}
