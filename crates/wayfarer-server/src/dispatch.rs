//! The 256-slot task dispatch table. Task execution bodies (process spawn,
//! file I/O, screenshot, code injection) are out of scope — this table
//! exists so a real deployment can register handlers for ids at or above
//! [`wayfarer_core::ids::RESERVED_MAX`] without this workspace needing to
//! implement any of them.

use std::sync::Arc;

use wayfarer_core::Packet;

pub type TaskFn = Arc<dyn Fn(&Packet) -> Option<Packet> + Send + Sync>;

pub struct DispatchTable {
    slots: [Option<TaskFn>; 256],
}

impl Default for DispatchTable {
    fn default() -> Self {
        Self::new()
    }
}

impl DispatchTable {
    pub fn new() -> Self {
        DispatchTable {
            slots: [(); 256].map(|_| None),
        }
    }

    pub fn register(&mut self, id: u8, handler: TaskFn) {
        self.slots[id as usize] = Some(handler);
    }

    pub fn is_registered(&self, id: u8) -> bool {
        self.slots[id as usize].is_some()
    }

    /// Returns `None` if no handler is registered for `pkt.id`, not to be
    /// confused with a registered handler choosing not to reply.
    pub fn dispatch(&self, pkt: &Packet) -> Option<Packet> {
        self.slots[pkt.id as usize].as_ref().and_then(|f| f(pkt))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wayfarer_core::Device;

    #[test]
    fn unregistered_slot_dispatches_to_none() {
        let table = DispatchTable::new();
        let pkt = Packet::new(0xC0, Device::ZERO);
        assert!(!table.is_registered(0xC0));
        assert!(table.dispatch(&pkt).is_none());
    }

    #[test]
    fn registered_handler_is_invoked() {
        let mut table = DispatchTable::new();
        table.register(
            0xC0,
            Arc::new(|pkt: &Packet| Some(Packet::new(0x02, pkt.device))),
        );
        let pkt = Packet::new(0xC0, Device::ZERO);
        let reply = table.dispatch(&pkt).unwrap();
        assert_eq!(reply.id, 0x02);
    }
}
