//! Feed key generation.
//!
//! Keys are 20 characters: 8 encoding the creation time in milliseconds,
//! 12 of random payload. The alphabet is in ascending ASCII order, so
//! keys sort lexicographically by creation time, and the random tail is
//! incremented when two keys land in the same millisecond. This is what
//! lets the message order fall back on the key when timestamps tie.

use chrono::Utc;
use parking_lot::Mutex;
use rand::Rng;

const ALPHABET: &[u8; 64] = b"-0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ_abcdefghijklmnopqrstuvwxyz";
const TIMESTAMP_CHARS: usize = 8;
const RANDOM_CHARS: usize = 12;

/// Generates unique, time-ordered feed keys.
pub struct KeyGenerator {
    state: Mutex<State>,
}

struct State {
    last_ms: i64,
    last_random: [u8; RANDOM_CHARS],
}

impl KeyGenerator {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                last_ms: 0,
                last_random: [0; RANDOM_CHARS],
            }),
        }
    }

    /// A fresh key for the current wall-clock time.
    pub fn next(&self) -> String {
        self.next_at(Utc::now().timestamp_millis())
    }

    /// A fresh key for an explicit timestamp.
    pub fn next_at(&self, now_ms: i64) -> String {
        let mut state = self.state.lock();
        // Clamp backwards clock jumps so keys stay monotonic.
        let mut now_ms = now_ms.max(state.last_ms);

        if now_ms == state.last_ms {
            // Same millisecond: increment the previous random tail.
            let mut carried = true;
            for slot in state.last_random.iter_mut().rev() {
                if *slot < 63 {
                    *slot += 1;
                    carried = false;
                    break;
                }
                *slot = 0;
            }
            // A fully exhausted tail rolls into the next millisecond
            // instead of wrapping behind its predecessor.
            if carried {
                now_ms += 1;
                state.last_ms = now_ms;
            }
        } else {
            let mut rng = rand::rng();
            for slot in state.last_random.iter_mut() {
                *slot = rng.random_range(0..64);
            }
            state.last_ms = now_ms;
        }

        let mut key = encode_ms(now_ms);
        for idx in state.last_random {
            key.push(ALPHABET[idx as usize] as char);
        }
        key
    }
}

fn encode_ms(ms: i64) -> String {
    let mut ts = ms;
    let mut ts_part = [0u8; TIMESTAMP_CHARS];
    for slot in ts_part.iter_mut().rev() {
        *slot = (ts % 64) as u8;
        ts /= 64;
    }
    let mut out = String::with_capacity(TIMESTAMP_CHARS + RANDOM_CHARS);
    for idx in ts_part {
        out.push(ALPHABET[idx as usize] as char);
    }
    out
}

impl Default for KeyGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_are_unique_and_fixed_length() {
        let gen = KeyGenerator::new();
        let mut seen = std::collections::HashSet::new();
        for _ in 0..1000 {
            let key = gen.next();
            assert_eq!(key.len(), 20);
            assert!(seen.insert(key));
        }
    }

    #[test]
    fn keys_sort_by_timestamp() {
        let gen = KeyGenerator::new();
        let early = gen.next_at(1_000);
        let late = gen.next_at(2_000);
        assert!(early < late);
    }

    #[test]
    fn same_millisecond_keys_stay_ordered() {
        let gen = KeyGenerator::new();
        let a = gen.next_at(5_000);
        let b = gen.next_at(5_000);
        let c = gen.next_at(5_000);
        assert!(a < b && b < c);
    }

    #[test]
    fn clock_going_backwards_does_not_reorder() {
        let gen = KeyGenerator::new();
        let a = gen.next_at(9_000);
        let b = gen.next_at(4_000);
        assert!(a < b);
    }

    #[test]
    fn exhausted_random_tail_advances_the_timestamp() {
        let gen = KeyGenerator::new();
        {
            let mut state = gen.state.lock();
            state.last_ms = 7_000;
            state.last_random = [63; RANDOM_CHARS];
        }
        // No key within this millisecond can sort above this one.
        let ceiling = format!("{}{}", encode_ms(7_000), "z".repeat(RANDOM_CHARS));

        let next = gen.next_at(7_000);
        assert!(next > ceiling);
        assert_eq!(&next[..TIMESTAMP_CHARS], encode_ms(7_001));
    }
}
