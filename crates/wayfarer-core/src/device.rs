//! Device identity.
//!
//! A 32-byte identifier split into a 28-byte machine-derived hash and a
//! 4-byte session salt. The last 4 bytes ("short" form) identify an agent
//! within a single controller; the full 32 bytes identify a (machine,
//! session) pair globally.

use std::fmt;

use serde::{Deserialize, Serialize};
use zerocopy::{AsBytes, FromBytes, FromZeroes, Unaligned};

pub const MACHINE_LEN: usize = 28;
pub const SALT_LEN: usize = 4;
pub const DEVICE_LEN: usize = MACHINE_LEN + SALT_LEN;

/// A 32-byte device identity, embedded verbatim in the packet envelope.
#[derive(Clone, Copy, PartialEq, Eq, Hash, AsBytes, FromBytes, FromZeroes, Unaligned)]
#[repr(transparent)]
pub struct Device([u8; DEVICE_LEN]);

impl Device {
    pub const ZERO: Device = Device([0u8; DEVICE_LEN]);

    pub fn from_bytes(bytes: [u8; DEVICE_LEN]) -> Self {
        Device(bytes)
    }

    pub fn new(machine: [u8; MACHINE_LEN], salt: [u8; SALT_LEN]) -> Self {
        let mut buf = [0u8; DEVICE_LEN];
        buf[..MACHINE_LEN].copy_from_slice(&machine);
        buf[MACHINE_LEN..].copy_from_slice(&salt);
        Device(buf)
    }

    pub fn as_array(&self) -> &[u8; DEVICE_LEN] {
        &self.0
    }

    pub fn machine_hash(&self) -> &[u8] {
        &self.0[..MACHINE_LEN]
    }

    pub fn session_salt(&self) -> [u8; SALT_LEN] {
        self.0[MACHINE_LEN..].try_into().unwrap()
    }

    /// The 4-byte "short" form used to identify an agent within a single
    /// controller.
    pub fn short(&self) -> [u8; SALT_LEN] {
        self.session_salt()
    }

    pub fn is_empty(&self) -> bool {
        self.0 == [0u8; DEVICE_LEN]
    }

    /// A 32-bit hash of the identifier, used to key routing maps.
    pub fn hash32(&self) -> u32 {
        let digest = blake3::hash(&self.0);
        let b = digest.as_bytes();
        u32::from_be_bytes([b[0], b[1], b[2], b[3]])
    }

    /// Derive a Device from a machine fingerprint and a freshly generated
    /// per-process salt. The fingerprint is hashed down to 28 bytes with
    /// BLAKE3.
    pub fn derive(machine_fingerprint: &[u8], salt: [u8; SALT_LEN]) -> Self {
        let digest = blake3::hash(machine_fingerprint);
        let mut machine = [0u8; MACHINE_LEN];
        machine.copy_from_slice(&digest.as_bytes()[..MACHINE_LEN]);
        Device::new(machine, salt)
    }
}

impl fmt::Debug for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Device({})", hex::encode(self.0))
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.short()))
    }
}

impl Serialize for Device {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&hex::encode(self.0))
    }
}

impl<'de> Deserialize<'de> for Device {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        let bytes = hex::decode(&s).map_err(serde::de::Error::custom)?;
        if bytes.len() != DEVICE_LEN {
            return Err(serde::de::Error::custom(format!(
                "device id must be {DEVICE_LEN} bytes, got {}",
                bytes.len()
            )));
        }
        let mut buf = [0u8; DEVICE_LEN];
        buf.copy_from_slice(&bytes);
        Ok(Device(buf))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_form_is_last_four_bytes() {
        let mut raw = [0u8; DEVICE_LEN];
        raw[MACHINE_LEN..].copy_from_slice(&[1, 2, 3, 4]);
        let d = Device::from_bytes(raw);
        assert_eq!(d.short(), [1, 2, 3, 4]);
    }

    #[test]
    fn derive_is_stable_for_same_inputs() {
        let a = Device::derive(b"host-fingerprint", [1, 2, 3, 4]);
        let b = Device::derive(b"host-fingerprint", [1, 2, 3, 4]);
        assert_eq!(a, b);
        let c = Device::derive(b"host-fingerprint", [1, 2, 3, 5]);
        assert_ne!(a, c);
    }

    #[test]
    fn hash32_is_deterministic() {
        let d = Device::derive(b"x", [0, 0, 0, 1]);
        assert_eq!(d.hash32(), d.hash32());
    }

    #[test]
    fn serde_roundtrip() {
        let d = Device::derive(b"x", [9, 9, 9, 9]);
        let s = serde_json::to_string(&d).unwrap();
        let back: Device = serde_json::from_str(&s).unwrap();
        assert_eq!(d, back);
    }
}
