//! Packet flag bitfield.
//!
//! The low 16 bits carry boolean flags; the high 48 bits carry fragment
//! position data (`group:u16 | len:u16 | position:u16`) when [`Flags::FRAG`]
//! is set. Plain `const` bit masks and accessor methods, no bitflags-style
//! crate.

use zerocopy::{AsBytes, FromBytes, FromZeroes, Unaligned};

/// A packet's flag bitfield, stored big-endian on the wire.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, AsBytes, FromBytes, FromZeroes, Unaligned)]
#[repr(transparent)]
pub struct Flags(u64);

impl Flags {
    pub const PROXY: u64 = 1 << 0;
    pub const FRAG: u64 = 1 << 1;
    pub const MULTI: u64 = 1 << 2;
    pub const ONESHOT: u64 = 1 << 3;
    pub const CHANNEL: u64 = 1 << 4;
    pub const CHANNEL_END: u64 = 1 << 5;
    pub const CRYPT: u64 = 1 << 6;
    pub const ERROR: u64 = 1 << 7;

    const GROUP_SHIFT: u32 = 16;
    const LEN_SHIFT: u32 = 32;
    const POSITION_SHIFT: u32 = 48;
    const FIELD_MASK: u64 = 0xFFFF;

    pub const fn empty() -> Self {
        Flags(0)
    }

    pub const fn bits(self) -> u64 {
        self.0
    }

    pub const fn from_bits(bits: u64) -> Self {
        Flags(bits)
    }

    pub fn set(&mut self, bit: u64) {
        self.0 |= bit;
    }

    pub fn unset(&mut self, bit: u64) {
        self.0 &= !bit;
    }

    pub fn with(mut self, bit: u64) -> Self {
        self.set(bit);
        self
    }

    pub fn has(self, bit: u64) -> bool {
        self.0 & bit != 0
    }

    pub fn proxy(self) -> bool {
        self.has(Self::PROXY)
    }
    pub fn frag(self) -> bool {
        self.has(Self::FRAG)
    }
    pub fn multi(self) -> bool {
        self.has(Self::MULTI)
    }
    pub fn oneshot(self) -> bool {
        self.has(Self::ONESHOT)
    }
    pub fn channel(self) -> bool {
        self.has(Self::CHANNEL)
    }
    pub fn channel_end(self) -> bool {
        self.has(Self::CHANNEL_END)
    }
    pub fn crypt(self) -> bool {
        self.has(Self::CRYPT)
    }
    pub fn error(self) -> bool {
        self.has(Self::ERROR)
    }

    pub fn group(self) -> u16 {
        ((self.0 >> Self::GROUP_SHIFT) & Self::FIELD_MASK) as u16
    }

    pub fn len_field(self) -> u16 {
        ((self.0 >> Self::LEN_SHIFT) & Self::FIELD_MASK) as u16
    }

    pub fn position(self) -> u16 {
        ((self.0 >> Self::POSITION_SHIFT) & Self::FIELD_MASK) as u16
    }

    pub fn set_group(&mut self, group: u16) {
        self.0 = (self.0 & !(Self::FIELD_MASK << Self::GROUP_SHIFT))
            | ((group as u64) << Self::GROUP_SHIFT);
    }

    pub fn set_len(&mut self, len: u16) {
        self.0 = (self.0 & !(Self::FIELD_MASK << Self::LEN_SHIFT))
            | ((len as u64) << Self::LEN_SHIFT);
    }

    pub fn set_position(&mut self, position: u16) {
        self.0 = (self.0 & !(Self::FIELD_MASK << Self::POSITION_SHIFT))
            | ((position as u64) << Self::POSITION_SHIFT);
    }

    /// A `FRAG` packet with `len <= 1` is treated as non-fragmented.
    pub fn is_single_fragment(self) -> bool {
        self.frag() && self.len_field() <= 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boolean_bits_roundtrip() {
        let f = Flags::empty().with(Flags::FRAG).with(Flags::CHANNEL);
        assert!(f.frag());
        assert!(f.channel());
        assert!(!f.multi());
    }

    #[test]
    fn fragment_fields_roundtrip() {
        let mut f = Flags::empty().with(Flags::FRAG);
        f.set_group(42);
        f.set_len(3);
        f.set_position(2);
        assert_eq!(f.group(), 42);
        assert_eq!(f.len_field(), 3);
        assert_eq!(f.position(), 2);
        assert!(f.frag());
    }

    #[test]
    fn fragment_fields_independent_of_bool_bits() {
        let mut f = Flags::empty().with(Flags::FRAG).with(Flags::PROXY);
        f.set_group(0xBEEF);
        assert!(f.proxy());
        assert!(f.frag());
        assert_eq!(f.group(), 0xBEEF);
    }

    #[test]
    fn single_fragment_detection() {
        let mut f = Flags::empty().with(Flags::FRAG);
        f.set_len(1);
        assert!(f.is_single_fragment());
        f.set_len(3);
        assert!(!f.is_single_fragment());
    }
}
