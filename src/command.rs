pub trait OpCode {
    fn op_code(&self) -> u8;
}

/// ROM commands understood by every 1-Wire device
#[derive(Clone, Copy, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Command {
    MatchRom = 0x55,
    SearchRom = 0xF0,
    AlarmSearch = 0xEC,
    SkipRom = 0xCC,
    ReadRom = 0x33,
}

impl OpCode for Command {
    fn op_code(&self) -> u8 {
        *self as _
    }
}
