//! Fragment reassembly.
//!
//! A `Cluster` is the reassembly buffer for one fragmented logical packet,
//! keyed by `group`. Sessions own a `HashMap<u16, Cluster>` (their "frags
//! map") and insert arriving fragments into the cluster for their group,
//! completing and removing it once every position is filled.

use crate::error::CoreError;
use crate::wire::Packet;

/// The reassembly buffer for one fragment group.
#[derive(Debug)]
pub struct Cluster {
    len: u16,
    slots: Vec<Option<Packet>>,
    filled: usize,
}

impl Cluster {
    /// Create a cluster for a group with `len` expected fragments.
    pub fn new(len: u16) -> Self {
        Cluster {
            len,
            slots: (0..len).map(|_| None).collect(),
            filled: 0,
        }
    }

    pub fn expected_len(&self) -> u16 {
        self.len
    }

    /// Insert a fragment at `position`. Last-writer-wins on a duplicate
    /// position; a mismatched `len` against this cluster's expected length
    /// is a protocol error — every fragment in a group must agree on the
    /// same `(group, len)` tuple.
    ///
    /// Returns `true` if this insertion completed the cluster.
    pub fn insert(&mut self, position: u16, len: u16, packet: Packet) -> Result<bool, CoreError> {
        if len != self.len {
            return Err(CoreError::Malformed("fragment len mismatch within group"));
        }
        let idx = position as usize;
        if idx >= self.slots.len() {
            return Err(CoreError::Malformed("fragment position out of range"));
        }
        if self.slots[idx].is_none() {
            self.filled += 1;
        }
        self.slots[idx] = Some(packet);
        Ok(self.is_complete())
    }

    pub fn is_complete(&self) -> bool {
        self.filled == self.slots.len()
    }

    /// Consume this cluster, emitting the synthesized non-fragmented
    /// packet: body is the in-order concatenation of fragment bodies,
    /// `id`/`job`/`device` copied from position 0, tags unioned across all
    /// fragments, `FRAG` cleared.
    pub fn complete(mut self) -> Result<Packet, CoreError> {
        if !self.is_complete() {
            return Err(CoreError::Bug("cluster completed while incomplete"));
        }
        let mut body = Vec::new();
        let mut tags: Vec<u32> = Vec::new();
        let mut head: Option<Packet> = None;
        for slot in self.slots.drain(..) {
            let frag = slot.expect("complete cluster has no empty slots");
            body.extend_from_slice(&frag.body);
            for t in &frag.tags {
                if !tags.contains(t) {
                    tags.push(*t);
                }
            }
            if head.is_none() {
                head = Some(frag);
            }
        }
        let mut out = head.expect("complete cluster is non-empty");
        out.flags.unset(crate::flags::Flags::FRAG);
        out.flags.set_group(0);
        out.flags.set_len(0);
        out.flags.set_position(0);
        out.body = body;
        out.tags = tags;
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::Device;
    use crate::flags::Flags;

    fn frag(group: u16, len: u16, position: u16, body: &[u8], tags: Vec<u32>) -> Packet {
        let mut flags = Flags::empty().with(Flags::FRAG);
        flags.set_group(group);
        flags.set_len(len);
        flags.set_position(position);
        Packet::new(0xC0, Device::derive(b"d", [0, 0, 0, 1]))
            .with_job(9)
            .with_flags(flags)
            .with_body(body.to_vec())
            .with_tags(tags)
    }

    #[test]
    fn completes_in_order_regardless_of_arrival_order() {
        let mut c = Cluster::new(3);
        assert!(!c.insert(2, 3, frag(42, 3, 2, b"C", vec![3])).unwrap());
        assert!(!c.insert(0, 3, frag(42, 3, 0, b"A", vec![1])).unwrap());
        assert!(c.insert(1, 3, frag(42, 3, 1, b"B", vec![2])).unwrap());
        let out = c.complete().unwrap();
        assert_eq!(out.body, b"ABC");
        let mut tags = out.tags.clone();
        tags.sort();
        assert_eq!(tags, vec![1, 2, 3]);
        assert!(!out.flags.frag());
    }

    #[test]
    fn duplicate_position_last_writer_wins() {
        let mut c = Cluster::new(2);
        c.insert(0, 2, frag(1, 2, 0, b"old", vec![])).unwrap();
        c.insert(0, 2, frag(1, 2, 0, b"new", vec![])).unwrap();
        c.insert(1, 2, frag(1, 2, 1, b"tail", vec![])).unwrap();
        let out = c.complete().unwrap();
        assert_eq!(out.body, b"newtail");
    }

    #[test]
    fn len_mismatch_is_malformed() {
        let mut c = Cluster::new(3);
        assert!(matches!(
            c.insert(0, 2, frag(1, 2, 0, b"x", vec![])),
            Err(CoreError::Malformed(_))
        ));
    }
}
