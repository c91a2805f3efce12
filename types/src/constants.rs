/// Maximum stored username length (bytes).
pub const MAX_NAME_LENGTH: usize = 64;

/// Lowest raw value produced by the slot-machine dice.
pub const SLOT_VALUE_MIN: u64 = 1;

/// Highest raw value produced by the slot-machine dice (4 symbols on 3 reels).
pub const SLOT_VALUE_MAX: u64 = 64;

// Points awarded for three of a kind.
pub const SEVEN_PAYOUT: i64 = 100;
pub const BAR_PAYOUT: i64 = 50;
pub const LEMON_PAYOUT: i64 = 20;
pub const CHERRY_PAYOUT: i64 = 10;

/// How long a challenge stays open before it lapses.
pub const DUEL_TTL_MS: u64 = 10 * 60 * 1_000;

/// Delay before a duel result is revealed, so the die animation can finish.
pub const DUEL_REVEAL_DELAY_MS: u64 = 5_000;

/// Delay before a losing spin's message is removed from the room.
pub const LOSING_SPIN_RETRACT_MS: u64 = 60_000;
