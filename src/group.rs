use embedded_hal::delay::DelayNs;

use crate::ds18x20;
use crate::{Bus, Command, ConversionPolicy, Ds18x20, Error, OpCode, PowerMode, Resolution};

/// Simultaneous conversion across every sensor sharing one bus.
///
/// The group carries the most conservative settings of the members it
/// was configured against: parasitic power wins over external, and the
/// highest resolution wins, so the broadcast wait always covers the
/// slowest member. Feeding members in is commutative and idempotent.
///
/// The broadcast addresses every device on the bus, configured or not;
/// only read members afterwards that were actually folded in.
#[derive(Clone, Copy, Debug, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SensorGroup {
    policy: ConversionPolicy,
}

impl SensorGroup {
    pub fn new() -> Self {
        SensorGroup::default()
    }

    /// Starts out compatible with devices of a known power mode,
    /// instead of widening to parasitic on the first member.
    pub fn with_power_mode(mut self, power_mode: PowerMode) -> Self {
        self.policy.power_mode = Some(power_mode);
        self
    }

    /// Starts out with a known minimum resolution.
    pub fn with_resolution(mut self, resolution: Resolution) -> Self {
        self.policy.resolution = Some(resolution);
        self
    }

    pub fn power_mode(&self) -> Option<PowerMode> {
        self.policy.power_mode
    }

    pub fn resolution(&self) -> Option<Resolution> {
        self.policy.resolution
    }

    /// Widens the group settings to cover a device with the given
    /// power mode and resolution.
    pub fn configure_for(
        &mut self,
        power_mode: Option<PowerMode>,
        resolution: Option<Resolution>,
    ) {
        if self.policy.power_mode.is_none() || power_mode == Some(PowerMode::Parasitic) {
            self.policy.power_mode = Some(PowerMode::Parasitic);
        }
        match (self.policy.resolution, resolution) {
            (None, incoming) => self.policy.resolution = incoming,
            (Some(current), Some(incoming)) if incoming >= current => {
                self.policy.resolution = Some(incoming)
            }
            _ => {}
        }
    }

    /// Widens the group settings to cover `sensor`. Call once per
    /// probed member; the order of calls does not matter.
    pub fn configure(&mut self, sensor: &Ds18x20) {
        let policy = sensor.policy();
        self.configure_for(policy.power_mode, policy.resolution);
    }

    /// Starts a conversion on every device on the bus at once, holding
    /// the line high if any member needs parasitic power.
    pub fn start_conversion<B: Bus>(&self, bus: &mut B) -> Result<(), Error<B::Error>> {
        if !bus.reset()? {
            return Err(Error::NoPresence);
        }

        bus.write(Command::SkipRom.op_code(), false)?;
        bus.write(
            ds18x20::Command::Convert.op_code(),
            self.policy.power_mode == Some(PowerMode::Parasitic),
        )?;

        Ok(())
    }

    /// Waits long enough for the slowest member to finish converting.
    pub fn wait_for_conversion<B: Bus>(
        &self,
        bus: &mut B,
        delay: &mut impl DelayNs,
    ) -> Result<(), Error<B::Error>> {
        self.policy.wait_for_conversion(bus, delay)
    }
}
