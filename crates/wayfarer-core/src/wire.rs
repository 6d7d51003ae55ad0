//! The packet envelope codec.
//!
//! The wire format is:
//!
//! ```text
//! u8   id
//! u16  job         (big-endian)
//! u64  flags       (big-endian)
//! 32B  device
//! u8   tag_count
//! u32  tags[tag_count]
//! body (typed fields, variable)
//! ```
//!
//! `encode`/`decode` operate on one already length-delimited frame — the
//! wrapper/framing layer is responsible for delimiting frames on the
//! underlying byte stream; this module never reads past the slice it is
//! given.

use static_assertions::assert_eq_size;
use zerocopy::{AsBytes, FromBytes, FromZeroes, Unaligned};

use crate::device::{Device, DEVICE_LEN};
use crate::error::CoreError;
use crate::flags::Flags;

pub const MAX_TAGS: usize = 255;
pub const ENVELOPE_PREFIX_LEN: usize = 1 + 2 + 8 + DEVICE_LEN + 1;

/// The envelope's fixed-size prefix, laid out exactly as it appears on the
/// wire. `job`/`flags` are stored pre-swapped to big-endian byte order so a
/// plain memory view (`as_bytes`/`read_from_prefix`) is correct regardless
/// of host endianness. Tags and body follow this prefix and are handled
/// separately since they're variable-length.
#[derive(Debug, Clone, Copy, AsBytes, FromBytes, FromZeroes, Unaligned)]
#[repr(C, packed)]
struct EnvelopePrefix {
    id: u8,
    job: [u8; 2],
    flags: [u8; 8],
    device: Device,
    tag_count: u8,
}

assert_eq_size!(EnvelopePrefix, [u8; ENVELOPE_PREFIX_LEN]);

/// A decoded (or to-be-encoded) packet.
#[derive(Clone, Debug, PartialEq)]
pub struct Packet {
    pub id: u8,
    pub job: u16,
    pub flags: Flags,
    pub device: Device,
    pub tags: Vec<u32>,
    pub body: Vec<u8>,
}

impl Packet {
    pub fn new(id: u8, device: Device) -> Self {
        Packet {
            id,
            job: 0,
            flags: Flags::empty(),
            device,
            tags: Vec::new(),
            body: Vec::new(),
        }
    }

    pub fn with_job(mut self, job: u16) -> Self {
        self.job = job;
        self
    }

    pub fn with_flags(mut self, flags: Flags) -> Self {
        self.flags = flags;
        self
    }

    pub fn with_body(mut self, body: Vec<u8>) -> Self {
        self.body = body;
        self
    }

    pub fn with_tags(mut self, tags: Vec<u32>) -> Self {
        self.tags = tags;
        self
    }

    /// True if this packet is a no-op ping with no meaningful payload.
    pub fn is_noop_ping(&self) -> bool {
        self.id == crate::ids::PING && self.body.is_empty() && self.tags.is_empty()
    }

    /// Encode this packet into `out`. Rejects `MULTI | FRAG` set together —
    /// the two framing modes are mutually exclusive.
    pub fn encode(&self, out: &mut Vec<u8>) -> Result<(), CoreError> {
        if self.flags.multi() && self.flags.frag() {
            return Err(CoreError::Malformed("MULTI and FRAG set together"));
        }
        if self.tags.len() > MAX_TAGS {
            return Err(CoreError::Limit("tag count exceeds 255"));
        }
        out.reserve(ENVELOPE_PREFIX_LEN + self.tags.len() * 4 + self.body.len());
        let prefix = EnvelopePrefix {
            id: self.id,
            job: self.job.to_be_bytes(),
            flags: self.flags.bits().to_be_bytes(),
            device: self.device,
            tag_count: self.tags.len() as u8,
        };
        out.extend_from_slice(prefix.as_bytes());
        for t in &self.tags {
            out.extend_from_slice(&t.to_be_bytes());
        }
        out.extend_from_slice(&self.body);
        Ok(())
    }

    pub fn encode_to_vec(&self) -> Result<Vec<u8>, CoreError> {
        let mut out = Vec::new();
        self.encode(&mut out)?;
        Ok(out)
    }

    /// Decode one frame's worth of bytes into a packet. `buf` must contain
    /// exactly one frame (no trailing garbage, no partial envelope).
    pub fn decode(buf: &[u8]) -> Result<Packet, CoreError> {
        let Some(prefix) = EnvelopePrefix::read_from_prefix(buf) else {
            return Err(CoreError::Malformed("envelope: truncated prefix"));
        };
        let id = prefix.id;
        let job = u16::from_be_bytes(prefix.job);
        let flags = Flags::from_bits(u64::from_be_bytes(prefix.flags));
        if flags.multi() && flags.frag() {
            return Err(CoreError::Malformed("MULTI and FRAG set together"));
        }
        let device = prefix.device;

        let mut pos = ENVELOPE_PREFIX_LEN;
        let tag_count = prefix.tag_count as usize;

        let tags_end = pos
            .checked_add(tag_count * 4)
            .ok_or(CoreError::Malformed("envelope: tag count overflow"))?;
        if buf.len() < tags_end {
            return Err(CoreError::Malformed("envelope: truncated tags"));
        }
        let mut tags = Vec::with_capacity(tag_count);
        for i in 0..tag_count {
            let off = pos + i * 4;
            tags.push(u32::from_be_bytes(buf[off..off + 4].try_into().unwrap()));
        }
        pos = tags_end;
        let body = buf[pos..].to_vec();

        Ok(Packet {
            id,
            job,
            flags,
            device,
            tags,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::body::BodyWriter;

    fn sample_device() -> Device {
        Device::derive(b"host", [1, 2, 3, 4])
    }

    #[test]
    fn roundtrip_identity() {
        let mut body = BodyWriter::new();
        body.write_string("payload");
        let p = Packet::new(crate::ids::HELLO, sample_device())
            .with_job(17)
            .with_tags(vec![1, 2, 3])
            .with_body(body.into_inner());
        let encoded = p.encode_to_vec().unwrap();
        let decoded = Packet::decode(&encoded).unwrap();
        assert_eq!(p, decoded);
    }

    #[test]
    fn rejects_multi_and_frag_together() {
        let mut p = Packet::new(crate::ids::MULTI, sample_device());
        p.flags = Flags::empty().with(Flags::MULTI).with(Flags::FRAG);
        assert!(matches!(p.encode_to_vec(), Err(CoreError::Malformed(_))));

        let mut raw = Vec::new();
        raw.push(1u8);
        raw.extend_from_slice(&0u16.to_be_bytes());
        raw.extend_from_slice(&(Flags::MULTI | Flags::FRAG).to_be_bytes());
        raw.extend_from_slice(&[0u8; DEVICE_LEN]);
        raw.push(0);
        assert!(matches!(Packet::decode(&raw), Err(CoreError::Malformed(_))));
    }

    #[test]
    fn envelope_prefix_is_exactly_the_declared_length() {
        let p = Packet::new(crate::ids::PING, sample_device());
        let encoded = p.encode_to_vec().unwrap();
        assert_eq!(encoded.len(), ENVELOPE_PREFIX_LEN);
    }

    #[test]
    fn truncated_prefix_is_malformed() {
        assert!(matches!(Packet::decode(&[1, 2, 3]), Err(CoreError::Malformed(_))));
    }

    #[test]
    fn fragment_fields_survive_roundtrip() {
        let mut flags = Flags::empty().with(Flags::FRAG);
        flags.set_group(7);
        flags.set_len(3);
        flags.set_position(1);
        let p = Packet::new(0xC0, sample_device()).with_flags(flags);
        let encoded = p.encode_to_vec().unwrap();
        let decoded = Packet::decode(&encoded).unwrap();
        assert_eq!(decoded.flags.group(), 7);
        assert_eq!(decoded.flags.len_field(), 3);
        assert_eq!(decoded.flags.position(), 1);
    }

    #[test]
    fn noop_ping_detection() {
        let p = Packet::new(crate::ids::PING, sample_device());
        assert!(p.is_noop_ping());
        let p2 = p.clone().with_body(vec![1]);
        assert!(!p2.is_noop_ping());
    }
}
