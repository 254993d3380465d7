use crate::{Bus, Error};
use core::fmt::Debug;
use embedded_hal::delay::DelayNs;

/// How a sensor draws its supply current.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PowerMode {
    /// Powered from the data line itself. The line must be held high
    /// during conversion and EEPROM copy, and completion cannot be
    /// polled; the driver waits out the worst-case conversion time.
    Parasitic,
    /// Separate supply pin. The device holds the line low while busy,
    /// so completion is polled instead of waited out.
    External,
}

/// Measurement resolution in bits.
///
/// Discriminants are the configuration-register byte values, so the
/// derived ordering follows bit depth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Resolution {
    Bits9 = 0b0001_1111,
    Bits10 = 0b0011_1111,
    Bits11 = 0b0101_1111,
    Bits12 = 0b0111_1111,
}

impl Resolution {
    pub fn from_bits(bits: u8) -> Option<Self> {
        match bits {
            9 => Some(Resolution::Bits9),
            10 => Some(Resolution::Bits10),
            11 => Some(Resolution::Bits11),
            12 => Some(Resolution::Bits12),
            _ => None,
        }
    }

    pub fn bits(&self) -> u8 {
        9 + self.code()
    }

    /// The byte written to the configuration register.
    pub fn config_byte(&self) -> u8 {
        *self as u8
    }

    /// Worst-case conversion time in milliseconds.
    pub fn conversion_time_ms(&self) -> u32 {
        match self {
            Resolution::Bits9 => 94,
            Resolution::Bits10 => 188,
            Resolution::Bits11 => 375,
            Resolution::Bits12 => 750,
        }
    }

    /// The 2-bit code held in scratchpad byte 4, bits 5-6.
    pub(crate) fn code(&self) -> u8 {
        (*self as u8) >> 5
    }

    pub(crate) fn from_code(code: u8) -> Self {
        match code & 3 {
            0 => Resolution::Bits9,
            1 => Resolution::Bits10,
            2 => Resolution::Bits11,
            _ => Resolution::Bits12,
        }
    }

    pub(crate) fn from_scratchpad(scratchpad: &[u8; 8]) -> Self {
        Self::from_code(scratchpad[4] >> 5)
    }

    /// Bits of the temperature LSB left undefined at this resolution.
    pub(crate) fn undefined_bits(&self) -> u8 {
        match self {
            Resolution::Bits9 => 0x07,
            Resolution::Bits10 => 0x03,
            Resolution::Bits11 => 0x01,
            Resolution::Bits12 => 0x00,
        }
    }
}

/// Power mode and resolution governing one conversion.
///
/// Shared by single sensors and sensor groups. Both fields start out
/// unknown and must be resolved, by probing, configuring or explicit
/// construction, before a conversion can be awaited.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ConversionPolicy {
    pub power_mode: Option<PowerMode>,
    pub resolution: Option<Resolution>,
}

impl ConversionPolicy {
    /// The fixed delay in milliseconds required for a conversion at the
    /// recorded resolution.
    pub fn conversion_delay_ms<E: Sized + Debug>(&self) -> Result<u32, Error<E>> {
        self.resolution
            .map(|resolution| resolution.conversion_time_ms())
            .ok_or(Error::UnknownResolution)
    }

    /// Waits until a running conversion has completed.
    ///
    /// Parasitically powered devices pull no current through the data
    /// line and cannot report progress on it, so the worst-case delay
    /// for the recorded resolution is waited out. Externally powered
    /// devices hold the line low while converting; the line is polled
    /// until released, which adapts to the actual resolution on its
    /// own. There is no poll timeout: a device that never releases the
    /// line blocks the caller.
    pub fn wait_for_conversion<B: Bus>(
        &self,
        bus: &mut B,
        delay: &mut impl DelayNs,
    ) -> Result<(), Error<B::Error>> {
        match self.power_mode {
            Some(PowerMode::Parasitic) => {
                let ms = self.conversion_delay_ms()?;
                delay.delay_ms(ms);
                Ok(())
            }
            Some(PowerMode::External) => {
                while !bus.read_bit()? {}
                Ok(())
            }
            None => Err(Error::UnknownPowerMode),
        }
    }
}
