//! Frame flag bits.
//!
//! A message on the wire is a run of frames. Every frame except the last one
//! of a message carries [`MORE`]. Control frames ([`SUBSCRIBE`],
//! [`UNSUBSCRIBE`]) are always single-frame messages whose payload is a topic
//! prefix.

/// More parts of the same message follow.
pub const MORE: u16 = 0x0001;

/// Subscription request; payload is the topic prefix.
pub const SUBSCRIBE: u16 = 0x0002;

/// Subscription removal; payload is the topic prefix.
pub const UNSUBSCRIBE: u16 = 0x0004;

/// All bits this codec understands.
pub const KNOWN: u16 = MORE | SUBSCRIBE | UNSUBSCRIBE;

/// Returns true if only known bits are set and the combination is legal.
pub fn is_valid(flags: u16) -> bool {
    if flags & !KNOWN != 0 {
        return false;
    }
    let control = flags & (SUBSCRIBE | UNSUBSCRIBE);
    match control {
        0 => true,
        SUBSCRIBE | UNSUBSCRIBE => flags & MORE == 0,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn control_frames_cannot_continue() {
        assert!(is_valid(0));
        assert!(is_valid(MORE));
        assert!(is_valid(SUBSCRIBE));
        assert!(!is_valid(SUBSCRIBE | MORE));
        assert!(!is_valid(SUBSCRIBE | UNSUBSCRIBE));
        assert!(!is_valid(0x0100));
    }
}
