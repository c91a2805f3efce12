//! Slot-machine outcome decoding and random draws.
//!
//! The chat platform reports a slot spin as a single value in `1..=64`.
//! Subtracting one yields three packed 2-bit reel indices:
//!
//! ```text
//! v - 1 = [right:2][center:2][left:2]
//! ```
//!
//! Each index maps to a [Symbol] (`BAR`, `CHERRY`, `LEMON`, `SEVEN`). A spin
//! wins when all three reels agree.

use commonware_cryptography::{sha256::Sha256, Hasher};
use rand::Rng;
use spinduel_types::{RoomId, Symbol, UnknownSymbol, SLOT_VALUE_MAX, SLOT_VALUE_MIN};
use std::future::Future;
use std::sync::Mutex;
use thiserror::Error;

/// Faces on the duel die.
pub const DIE_FACES: u64 = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum OutcomeError {
    #[error("slot value {0} outside 1..=64")]
    OutOfRange(u64),
    #[error(transparent)]
    UnknownSymbol(#[from] UnknownSymbol),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reels {
    pub left: Symbol,
    pub center: Symbol,
    pub right: Symbol,
}

/// Scoring of a decoded spin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpinResult {
    pub win: Option<Symbol>,
    pub payout: i64,
}

impl SpinResult {
    pub const LOSS: Self = Self {
        win: None,
        payout: 0,
    };
}

impl Reels {
    pub fn decode(value: u64) -> Result<Self, OutcomeError> {
        if !(SLOT_VALUE_MIN..=SLOT_VALUE_MAX).contains(&value) {
            return Err(OutcomeError::OutOfRange(value));
        }
        let packed = value - 1;
        Ok(Self {
            left: Symbol::try_from((packed & 3) as u8)?,
            center: Symbol::try_from(((packed >> 2) & 3) as u8)?,
            right: Symbol::try_from(((packed >> 4) & 3) as u8)?,
        })
    }

    pub fn evaluate(&self) -> SpinResult {
        if self.left == self.center && self.center == self.right {
            SpinResult {
                win: Some(self.left),
                payout: self.left.payout(),
            }
        } else {
            SpinResult::LOSS
        }
    }
}

/// Produces raw random values for duels.
pub trait OutcomeSource: Send + Sync {
    /// Draw a die face in `1..=DIE_FACES`.
    fn draw(&self, room: RoomId) -> impl Future<Output = anyhow::Result<u64>> + Send;
}

/// Die backed by the thread-local RNG.
#[derive(Clone, Copy, Debug, Default)]
pub struct ThreadRngDie;

impl OutcomeSource for ThreadRngDie {
    async fn draw(&self, _room: RoomId) -> anyhow::Result<u64> {
        Ok(rand::thread_rng().gen_range(1..=DIE_FACES))
    }
}

/// Reproducible die: face `n` is derived from `sha256(secret || room || n)`.
pub struct HashChainDie {
    secret: [u8; 32],
    counter: Mutex<u64>,
}

impl HashChainDie {
    pub fn new(seed: u64) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(&seed.to_be_bytes());
        hasher.update(b"duel_die_master");
        Self {
            secret: hasher.finalize().0,
            counter: Mutex::new(0),
        }
    }

    fn derive(&self, room: RoomId, index: u64) -> u64 {
        let mut round = 0u32;
        loop {
            let mut hasher = Sha256::new();
            hasher.update(&self.secret);
            hasher.update(&room.0.to_be_bytes());
            hasher.update(&index.to_be_bytes());
            hasher.update(&round.to_be_bytes());
            let digest = hasher.finalize().0;
            // Reject bytes in the biased tail so every face is equally likely.
            let limit = (256 / DIE_FACES * DIE_FACES) as u8;
            if let Some(byte) = digest.iter().copied().find(|byte| *byte < limit) {
                return u64::from(byte) % DIE_FACES + 1;
            }
            round = round.wrapping_add(1);
        }
    }
}

impl OutcomeSource for HashChainDie {
    async fn draw(&self, room: RoomId) -> anyhow::Result<u64> {
        let index = {
            let mut counter = self
                .counter
                .lock()
                .map_err(|_| anyhow::anyhow!("die counter poisoned"))?;
            let index = *counter;
            *counter = counter.wrapping_add(1);
            index
        };
        Ok(self.derive(room, index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_known_values() {
        // 1 => all BAR, 64 => all SEVEN
        let bars = Reels::decode(1).unwrap();
        assert_eq!(bars.evaluate(), SpinResult {
            win: Some(Symbol::Bar),
            payout: 50,
        });
        let sevens = Reels::decode(64).unwrap();
        assert_eq!(sevens.evaluate(), SpinResult {
            win: Some(Symbol::Seven),
            payout: 100,
        });

        // 2 => CHERRY, BAR, BAR
        let mixed = Reels::decode(2).unwrap();
        assert_eq!(mixed.left, Symbol::Cherry);
        assert_eq!(mixed.center, Symbol::Bar);
        assert_eq!(mixed.right, Symbol::Bar);
        assert_eq!(mixed.evaluate(), SpinResult::LOSS);
    }

    #[test]
    fn test_decode_is_total_and_deterministic() {
        let mut wins = Vec::new();
        for value in SLOT_VALUE_MIN..=SLOT_VALUE_MAX {
            let reels = Reels::decode(value).unwrap();
            assert_eq!(reels, Reels::decode(value).unwrap());
            if let Some(symbol) = reels.evaluate().win {
                wins.push((value, symbol));
            }
        }
        // Exactly one triple per symbol.
        assert_eq!(
            wins,
            vec![
                (1, Symbol::Bar),
                (22, Symbol::Cherry),
                (43, Symbol::Lemon),
                (64, Symbol::Seven),
            ]
        );
    }

    #[test]
    fn test_winning_payouts() {
        assert_eq!(Reels::decode(22).unwrap().evaluate().payout, 10);
        assert_eq!(Reels::decode(43).unwrap().evaluate().payout, 20);
    }

    #[test]
    fn test_decode_rejects_out_of_range() {
        assert_eq!(Reels::decode(0), Err(OutcomeError::OutOfRange(0)));
        assert_eq!(Reels::decode(65), Err(OutcomeError::OutOfRange(65)));
    }

    #[tokio::test]
    async fn test_hash_chain_die_is_reproducible() {
        let a = HashChainDie::new(7);
        let b = HashChainDie::new(7);
        let mut faces = Vec::new();
        for _ in 0..32 {
            let face = a.draw(RoomId(-1)).await.unwrap();
            assert_eq!(face, b.draw(RoomId(-1)).await.unwrap());
            assert!((1..=DIE_FACES).contains(&face));
            faces.push(face);
        }
        // Not a constant sequence.
        assert!(faces.iter().any(|face| *face != faces[0]));
    }

    #[tokio::test]
    async fn test_thread_rng_die_in_range() {
        for _ in 0..64 {
            let face = ThreadRngDie.draw(RoomId(1)).await.unwrap();
            assert!((1..=DIE_FACES).contains(&face));
        }
    }
}
