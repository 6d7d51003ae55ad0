//! Built-in packet operation codes.
//!
//! IDs below [`RESERVED_MAX`] are reserved for the protocol's own control
//! messages; task/tasklet codes live above that boundary.

/// Client → server: initial handshake, carries marshaled device info.
pub const HELLO: u8 = 0x01;
/// Server → client: handshake acknowledged.
pub const COMPLETE: u8 = 0x02;
/// Server → unknown device: force a re-handshake.
pub const REGISTER: u8 = 0x03;
/// Either direction: no-op keepalive / poll probe.
pub const PING: u8 = 0x04;
/// Server → client: adjust sleep/jitter pacing without a full reconnect.
pub const SLEEP: u8 = 0x05;
/// Either direction: tear down the Session cleanly.
pub const SHUTDOWN: u8 = 0x06;
/// Operator → client (relayed): hand this Session off to another process.
pub const MIGRATE: u8 = 0x07;
/// Either direction: body is N concatenated sub-packets.
pub const MULTI: u8 = 0x08;

/// IDs at or above this value are task/tasklet codes, dispatched through
/// the 256-slot table.
pub const RESERVED_MAX: u8 = 22;

/// True if `id` names one of the protocol's own control messages.
pub fn is_builtin(id: u8) -> bool {
    id < RESERVED_MAX
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtins_below_boundary() {
        for id in [HELLO, COMPLETE, REGISTER, PING, SLEEP, SHUTDOWN, MIGRATE, MULTI] {
            assert!(is_builtin(id), "id {id:#x} should be a builtin");
        }
    }

    #[test]
    fn task_ids_above_boundary() {
        assert!(!is_builtin(22));
        assert!(!is_builtin(0xC0));
    }
}
