use byteorder::{ByteOrder, LittleEndian};
use embedded_hal::delay::DelayNs;

use crate::{Address, Bus, ConversionPolicy, Error, OpCode, PowerMode, Resolution};

/// Function commands of the DS18B20 family
#[derive(Clone, Copy, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Command {
    Convert = 0x44,
    WriteScratchpad = 0x4E,
    ReadScratchpad = 0xBE,
    CopyScratchpad = 0x48,
    RecallE2 = 0xB8,
    ReadPowerSupply = 0xB4,
}

impl OpCode for Command {
    fn op_code(&self) -> u8 {
        *self as _
    }
}

/// Family codes this driver speaks to: DS18S20, DS1822, DS18B20
const FAMILY_CODES: [u8; 3] = [0x10, 0x22, 0x28];

/// Placeholder alarm thresholds written alongside the configuration
/// register; the threshold registers double as scratch storage here.
const THRESHOLD_HIGH: u8 = 75;
const THRESHOLD_LOW: u8 = 70;

/// Worst-case EEPROM copy time in milliseconds.
const COPY_SCRATCHPAD_MS: u32 = 10;

/// One temperature sensor, bound to its bus address.
///
/// Construct with [`new`](Ds18x20::new) from a discovered address, then
/// either [`probe`](Ds18x20::probe) the device or supply already-known
/// state through [`with_power_mode`](Ds18x20::with_power_mode) and
/// [`with_resolution`](Ds18x20::with_resolution) before converting.
/// The sensor holds no bus-exclusive resource; any number of instances
/// may refer to devices on the same bus.
#[derive(Clone, Copy, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Ds18x20 {
    address: Address,
    policy: ConversionPolicy,
}

impl From<Ds18x20> for Address {
    fn from(sensor: Ds18x20) -> Self {
        sensor.address
    }
}

impl Ds18x20 {
    /// Is a device with the given address one this driver can handle?
    pub fn is_compatible(address: &Address) -> bool {
        FAMILY_CODES.contains(&address.family_code())
    }

    /// Binds a sensor to `address`. Returns `None` for addresses of
    /// incompatible device families.
    pub fn new(address: Address) -> Option<Self> {
        Self::is_compatible(&address).then_some(Ds18x20 {
            address,
            policy: ConversionPolicy::default(),
        })
    }

    /// Records an already-known power mode, skipping the probe.
    pub fn with_power_mode(mut self, power_mode: PowerMode) -> Self {
        self.policy.power_mode = Some(power_mode);
        self
    }

    /// Records an already-known resolution, skipping the probe.
    pub fn with_resolution(mut self, resolution: Resolution) -> Self {
        self.policy.resolution = Some(resolution);
        self
    }

    pub fn address(&self) -> &Address {
        &self.address
    }

    pub fn power_mode(&self) -> Option<PowerMode> {
        self.policy.power_mode
    }

    pub fn resolution(&self) -> Option<Resolution> {
        self.policy.resolution
    }

    /// The sensor's recorded conversion settings, as fed into a
    /// [`SensorGroup`](crate::SensorGroup).
    pub fn policy(&self) -> ConversionPolicy {
        self.policy
    }

    /// Selects this device and sends `command`. With `needs_power` the
    /// line is held high afterwards if the device is parasitically
    /// powered; requesting that with an unresolved power mode fails
    /// before any bus traffic, since the driver cannot know whether to
    /// hold the line.
    pub fn send_addressed_command<B: Bus>(
        &self,
        bus: &mut B,
        command: Command,
        needs_power: bool,
    ) -> Result<(), Error<B::Error>> {
        if needs_power && self.policy.power_mode.is_none() {
            return Err(Error::UnknownPowerMode);
        }

        if !bus.reset()? {
            return Err(Error::NoPresence);
        }
        bus.select(&self.address)?;
        bus.write(
            command.op_code(),
            needs_power && self.policy.power_mode == Some(PowerMode::Parasitic),
        )?;

        Ok(())
    }

    /// Reads the scratchpad register file, validating its checksum.
    /// No byte is handed out before the checksum passed.
    pub fn read_scratchpad<B: Bus>(&self, bus: &mut B) -> Result<[u8; 8], Error<B::Error>> {
        self.send_addressed_command(bus, Command::ReadScratchpad, false)?;

        let mut scratchpad = [0u8; 8];
        for byte in scratchpad.iter_mut() {
            *byte = bus.read()?;
        }

        let received = bus.read()?;
        let computed = B::crc8(&scratchpad);
        if computed != received {
            return Err(Error::CrcMismatch(computed, received));
        }

        Ok(scratchpad)
    }

    /// Asks the device how it is powered and records the answer.
    pub fn probe_power_mode<B: Bus>(
        &mut self,
        bus: &mut B,
    ) -> Result<PowerMode, Error<B::Error>> {
        self.send_addressed_command(bus, Command::ReadPowerSupply, false)?;
        let power_mode = if bus.read_bit()? {
            PowerMode::External
        } else {
            PowerMode::Parasitic
        };
        self.policy.power_mode = Some(power_mode);
        Ok(power_mode)
    }

    /// Reads power mode and configured resolution off the device. Use
    /// when neither is known up front.
    pub fn probe<B: Bus>(&mut self, bus: &mut B) -> Result<(), Error<B::Error>> {
        self.probe_power_mode(bus)?;
        let scratchpad = self.read_scratchpad(bus)?;
        self.policy.resolution = Some(Resolution::from_scratchpad(&scratchpad));
        Ok(())
    }

    /// Sets the resolution and persists it to the device EEPROM.
    ///
    /// The written configuration is read back and verified; on
    /// [`VerificationFailed`](Error::VerificationFailed) the recorded
    /// resolution is left untouched. Requires a resolved power mode,
    /// because the EEPROM copy draws current.
    pub fn configure<B: Bus>(
        &mut self,
        bus: &mut B,
        delay: &mut impl DelayNs,
        resolution: Resolution,
    ) -> Result<(), Error<B::Error>> {
        let power_mode = self.policy.power_mode.ok_or(Error::UnknownPowerMode)?;

        let data = [THRESHOLD_HIGH, THRESHOLD_LOW, resolution.config_byte()];

        self.send_addressed_command(bus, Command::WriteScratchpad, false)?;
        bus.write_bytes(&data)?;

        self.send_addressed_command(bus, Command::CopyScratchpad, true)?;
        if power_mode == PowerMode::Parasitic {
            delay.delay_ms(COPY_SCRATCHPAD_MS);
            bus.depower()?;
        } else {
            while !bus.read_bit()? {}
        }

        let scratchpad = self.read_scratchpad(bus)?;
        if scratchpad[2..5] != data {
            return Err(Error::VerificationFailed);
        }

        self.policy.resolution = Some(resolution);

        Ok(())
    }

    /// Starts a temperature conversion, holding the line high for
    /// parasitically powered devices.
    pub fn start_conversion<B: Bus>(&self, bus: &mut B) -> Result<(), Error<B::Error>> {
        self.send_addressed_command(bus, Command::Convert, true)
    }

    /// Waits until a previously started conversion has completed.
    pub fn wait_for_conversion<B: Bus>(
        &self,
        bus: &mut B,
        delay: &mut impl DelayNs,
    ) -> Result<(), Error<B::Error>> {
        self.policy.wait_for_conversion(bus, delay)
    }

    /// Reads the latest conversion result in degrees Celsius.
    ///
    /// If a resolution is recorded it is cross-checked against the one
    /// the scratchpad reports, catching devices whose configuration
    /// changed behind the driver's back.
    pub fn read_temperature<B: Bus>(&self, bus: &mut B) -> Result<f32, Error<B::Error>> {
        let scratchpad = self.read_scratchpad(bus)?;

        let reported = Resolution::from_scratchpad(&scratchpad);
        if let Some(recorded) = self.policy.resolution {
            if reported != recorded {
                return Err(Error::UnexpectedResolution(recorded.bits(), reported.bits()));
            }
        }

        Ok(decode_temperature(&scratchpad, reported))
    }

    /// Starts a conversion, waits for it and reads the result. The
    /// steady-state operation of a sampling loop.
    pub fn convert_and_read_temperature<B: Bus>(
        &self,
        bus: &mut B,
        delay: &mut impl DelayNs,
    ) -> Result<f32, Error<B::Error>> {
        self.start_conversion(bus)?;
        self.wait_for_conversion(bus, delay)?;
        self.read_temperature(bus)
    }
}

/// Reconstructs the temperature from scratchpad bytes 0-1. Bits below
/// the configured resolution are undefined on the wire and masked off
/// before sign extension; one LSB is 0.0625 degrees Celsius.
fn decode_temperature(scratchpad: &[u8; 8], resolution: Resolution) -> f32 {
    let raw = LittleEndian::read_u16(&scratchpad[..2]) & !(resolution.undefined_bits() as u16);
    raw as i16 as f32 * 0.0625
}
