//! Simulated bus and device model backing the protocol tests.

use crate::{compute_partial_crc8, Address, Bus, Resolution};
use core::convert::Infallible;

/// One simulated DS18B20-family device hanging off a [`SimBus`].
pub struct SimDevice {
    pub address: Address,
    pub parasitic: bool,
    /// measured temperature in raw 1/16 degree steps
    pub raw_temperature: i16,
    pub scratchpad: [u8; 8],
    pub eeprom: [u8; 3],
}

impl SimDevice {
    pub fn new(address: Address, parasitic: bool, resolution: Resolution) -> Self {
        let config = [75, 70, resolution.config_byte()];
        // power-on state: +85 reset value, thresholds and configuration
        // recalled from EEPROM, reserved bytes as the datasheet shows
        let mut scratchpad = [0x50, 0x05, 0, 0, 0, 0xff, 0x0c, 0x10];
        scratchpad[2..5].copy_from_slice(&config);
        SimDevice {
            address,
            parasitic,
            raw_temperature: 0x0550,
            scratchpad,
            eeprom: config,
        }
    }

    fn convert(&mut self) {
        let resolution = Resolution::from_scratchpad(&self.scratchpad);
        // a real device leaves the undefined low bits carrying junk
        let raw = self.raw_temperature as u16 | resolution.undefined_bits() as u16;
        self.scratchpad[0] = raw as u8;
        self.scratchpad[1] = (raw >> 8) as u8;
    }
}

#[derive(Clone, Copy)]
enum Phase {
    Idle,
    RomCommand,
    MatchRom { received: usize, address: [u8; 8] },
    Function,
    WriteScratchpad { received: usize },
    Reading { buffer: [u8; 9], pos: usize },
    PowerSupply { external: bool },
}

/// Device-model bus simulation: the devices respond to the command
/// sequences the driver issues, while the bus records the traffic
/// shape the tests assert on.
pub struct SimBus<const N: usize> {
    pub devices: [SimDevice; N],
    selected: [bool; N],
    phase: Phase,
    search_index: usize,
    /// read slots left before the line reads as released
    pub busy_polls: u32,
    pub resets: usize,
    pub depowers: usize,
    /// hold_power flag seen with the last Convert command
    pub convert_held: Option<bool>,
    /// hold_power flag seen with the last Copy Scratchpad command
    pub copy_held: Option<bool>,
    /// corrupt the checksum of every scratchpad read
    pub corrupt_crc: bool,
    /// devices ignore Write Scratchpad payloads
    pub drop_scratchpad_writes: bool,
}

impl<const N: usize> SimBus<N> {
    pub fn new(devices: [SimDevice; N]) -> Self {
        SimBus {
            devices,
            selected: [false; N],
            phase: Phase::Idle,
            search_index: 0,
            busy_polls: 0,
            resets: 0,
            depowers: 0,
            convert_held: None,
            copy_held: None,
            corrupt_crc: false,
            drop_scratchpad_writes: false,
        }
    }

    fn selected_devices(&mut self) -> impl Iterator<Item = &mut SimDevice> + '_ {
        self.devices
            .iter_mut()
            .zip(self.selected.iter())
            .filter(|(_, selected)| **selected)
            .map(|(device, _)| device)
    }

    fn function_command(&mut self, command: u8, hold_power: bool) {
        match command {
            0xBE => {
                let corrupt = self.corrupt_crc;
                let mut buffer = [0xffu8; 9];
                if let Some(device) = self.selected_devices().next() {
                    buffer[..8].copy_from_slice(&device.scratchpad);
                    buffer[8] = compute_partial_crc8(0, &device.scratchpad);
                    if corrupt {
                        buffer[8] ^= 0x01;
                    }
                }
                self.phase = Phase::Reading { buffer, pos: 0 };
            }
            0x4E => {
                self.phase = Phase::WriteScratchpad { received: 0 };
            }
            0x48 => {
                self.copy_held = Some(hold_power);
                for device in self.selected_devices() {
                    device.eeprom = [
                        device.scratchpad[2],
                        device.scratchpad[3],
                        device.scratchpad[4],
                    ];
                }
                self.busy_polls = 2;
                self.phase = Phase::Function;
            }
            0x44 => {
                self.convert_held = Some(hold_power);
                for device in self.selected_devices() {
                    device.convert();
                }
                self.busy_polls = 3;
                self.phase = Phase::Function;
            }
            0xB4 => {
                let any_parasitic = self
                    .devices
                    .iter()
                    .zip(self.selected.iter())
                    .any(|(device, selected)| *selected && device.parasitic);
                self.phase = Phase::PowerSupply {
                    external: !any_parasitic,
                };
            }
            0xB8 => {
                for device in self.selected_devices() {
                    device.scratchpad[2..5].copy_from_slice(&device.eeprom);
                }
                self.phase = Phase::Function;
            }
            _ => self.phase = Phase::Idle,
        }
    }
}

impl<const N: usize> Bus for SimBus<N> {
    type Error = Infallible;

    fn reset(&mut self) -> Result<bool, Self::Error> {
        self.resets += 1;
        self.selected = [false; N];
        self.busy_polls = 0;
        self.phase = Phase::RomCommand;
        Ok(N > 0)
    }

    fn write(&mut self, byte: u8, hold_power: bool) -> Result<(), Self::Error> {
        match self.phase {
            Phase::RomCommand => match byte {
                0x55 => {
                    self.phase = Phase::MatchRom {
                        received: 0,
                        address: [0; 8],
                    }
                }
                0xCC => {
                    self.selected = [true; N];
                    self.phase = Phase::Function;
                }
                // search and Read ROM traffic is not modelled byte-wise
                _ => self.phase = Phase::Idle,
            },
            Phase::MatchRom {
                mut received,
                mut address,
            } => {
                address[received] = byte;
                received += 1;
                if received == address.len() {
                    for (i, device) in self.devices.iter().enumerate() {
                        self.selected[i] = *device.address == address;
                    }
                    self.phase = Phase::Function;
                } else {
                    self.phase = Phase::MatchRom { received, address };
                }
            }
            Phase::Function => self.function_command(byte, hold_power),
            Phase::WriteScratchpad { received } => {
                if !self.drop_scratchpad_writes {
                    for device in self.selected_devices() {
                        device.scratchpad[2 + received] = byte;
                    }
                }
                self.phase = if received + 1 < 3 {
                    Phase::WriteScratchpad {
                        received: received + 1,
                    }
                } else {
                    Phase::Function
                };
            }
            Phase::Idle | Phase::Reading { .. } | Phase::PowerSupply { .. } => {}
        }
        Ok(())
    }

    fn read(&mut self) -> Result<u8, Self::Error> {
        if let Phase::Reading { buffer, pos } = &mut self.phase {
            if *pos < buffer.len() {
                let byte = buffer[*pos];
                *pos += 1;
                return Ok(byte);
            }
        }
        Ok(0xff)
    }

    fn read_bit(&mut self) -> Result<bool, Self::Error> {
        if let Phase::PowerSupply { external } = self.phase {
            self.phase = Phase::Function;
            return Ok(external);
        }
        if self.busy_polls > 0 {
            self.busy_polls -= 1;
            return Ok(false);
        }
        Ok(true)
    }

    fn depower(&mut self) -> Result<(), Self::Error> {
        self.depowers += 1;
        Ok(())
    }

    fn reset_search(&mut self) {
        self.search_index = 0;
    }

    fn search(&mut self, address: &mut Address) -> Result<bool, Self::Error> {
        if self.search_index < N {
            *address = self.devices[self.search_index].address;
            self.search_index += 1;
            Ok(true)
        } else {
            Ok(false)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{SimBus, SimDevice};
    use crate::{Address, Ds18x20, Resolution, SearchIter};

    #[test]
    fn search_yields_every_device() {
        let first = Address::from([0x28, 1, 0, 0, 0, 0, 0, 0]);
        let second = Address::from([0x01, 2, 0, 0, 0, 0, 0, 0]);
        let mut bus = SimBus::new([
            SimDevice::new(first, false, Resolution::Bits12),
            SimDevice::new(second, false, Resolution::Bits12),
        ]);

        let mut found = SearchIter::new(&mut bus).map(Result::unwrap);
        assert_eq!(found.next(), Some(first));
        assert_eq!(found.next(), Some(second));
        assert_eq!(found.next(), None);
    }

    #[test]
    fn search_filters_to_compatible_sensors() {
        let sensor = Address::from([0x28, 1, 0, 0, 0, 0, 0, 0]);
        let other = Address::from([0x01, 2, 0, 0, 0, 0, 0, 0]);
        let mut bus = SimBus::new([
            SimDevice::new(other, false, Resolution::Bits12),
            SimDevice::new(sensor, false, Resolution::Bits12),
        ]);

        let found = SearchIter::new(&mut bus)
            .filter_map(Result::ok)
            .find(|address| Ds18x20::is_compatible(address));
        assert_eq!(found, Some(sensor));
    }
}
