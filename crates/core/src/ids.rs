//! Time-ordered id generation.
//!
//! Ids use the UUIDv7 layout: a 48-bit unix-millisecond timestamp in the
//! high bits followed by random data, so ids sort by creation time. A
//! 12-bit counter disambiguates ids minted within the same millisecond,
//! keeping sort order strict under bursts.

use rand::RngCore;
use std::sync::{Mutex, PoisonError};
use std::time::{SystemTime, UNIX_EPOCH};

/// Current unix time in milliseconds.
pub fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[derive(Debug, Default)]
struct IdState {
    last_ms: u64,
    counter: u16,
}

/// Generator of time-sortable unique ids.
///
/// Holds its own last-timestamp/counter state behind a lock; share one
/// instance (via `Arc`) between the components that mint ids.
#[derive(Debug, Default)]
pub struct IdGenerator {
    state: Mutex<IdState>,
}

impl IdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Generate a new UUIDv7-format id.
    pub fn generate(&self) -> String {
        let now_ms = unix_millis();
        let counter = {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            if now_ms == state.last_ms {
                state.counter = (state.counter + 1) & 0x0FFF;
            } else {
                state.counter = 0;
                state.last_ms = now_ms;
            }
            state.counter
        };

        let mut random = [0u8; 8];
        rand::thread_rng().fill_bytes(&mut random);

        // 48-bit timestamp | version 7 | variant 10 | 12-bit counter | 50 random bits
        let mut value = ((now_ms as u128) & 0xFFFF_FFFF_FFFF) << 80;
        value |= 0x7000u128 << 64;
        value |= 0x8000_0000_0000_0000u128;
        value |= ((counter as u128) & 0x0FFF) << 50;
        value |= (u64::from_le_bytes(random) as u128) & 0x0003_FFFF_FFFF_FFFF;

        let hex = format!("{value:032x}");
        format!(
            "{}-{}-{}-{}-{}",
            &hex[0..8],
            &hex[8..12],
            &hex[12..16],
            &hex[16..20],
            &hex[20..32]
        )
    }
}
