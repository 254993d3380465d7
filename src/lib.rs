#![no_std]
#![doc = include_str!("../README.md")]

mod address;
mod bus;
mod command;
pub mod ds18x20;
mod group;
mod policy;
mod result;
#[cfg(test)]
mod sim;

pub use address::{Address, AddressError};
pub use bus::{Bus, SearchIter};
pub use command::{Command, OpCode};
pub use ds18x20::Ds18x20;
pub use group::SensorGroup;
pub use policy::{ConversionPolicy, PowerMode, Resolution};
pub use result::Error;

pub fn compute_partial_crc8(crc: u8, data: &[u8]) -> u8 {
    let mut crc = crc;
    for byte in data.iter() {
        let mut byte = *byte;
        for _ in 0..8 {
            let mix = (crc ^ byte) & 0x01;
            crc >>= 1;
            if mix != 0x00 {
                crc ^= 0x8C;
            }
            byte >>= 1;
        }
    }
    crc
}
