use bytes::{Buf, BufMut};
use commonware_codec::{EncodeSize, Error, Read, ReadExt, Write};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error as ThisError;

use crate::codec::{read_string, string_encode_size, write_string};
use crate::constants::{
    BAR_PAYOUT, CHERRY_PAYOUT, LEMON_PAYOUT, MAX_NAME_LENGTH, SEVEN_PAYOUT,
};

/// Chat platform user identifier.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct UserId(pub i64);

/// Chat room identifier (group chats are usually negative).
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct RoomId(pub i64);

/// Chat message identifier, unique within a room.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct MessageId(pub i64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

macro_rules! impl_id_codec {
    ($ty:ident) => {
        impl Write for $ty {
            fn write(&self, writer: &mut impl BufMut) {
                self.0.write(writer);
            }
        }

        impl Read for $ty {
            type Cfg = ();

            fn read_cfg(reader: &mut impl Buf, _: &Self::Cfg) -> Result<Self, Error> {
                Ok(Self(i64::read(reader)?))
            }
        }

        impl EncodeSize for $ty {
            fn encode_size(&self) -> usize {
                self.0.encode_size()
            }
        }
    };
}

impl_id_codec!(UserId);
impl_id_codec!(RoomId);

/// One face of a slot-machine reel.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum Symbol {
    Bar = 0,
    Cherry = 1,
    Lemon = 2,
    Seven = 3,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ThisError)]
#[error("unknown reel symbol: {0}")]
pub struct UnknownSymbol(pub u8);

impl TryFrom<u8> for Symbol {
    type Error = UnknownSymbol;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Symbol::Bar),
            1 => Ok(Symbol::Cherry),
            2 => Ok(Symbol::Lemon),
            3 => Ok(Symbol::Seven),
            other => Err(UnknownSymbol(other)),
        }
    }
}

impl Symbol {
    /// Points awarded when all three reels show this symbol.
    pub const fn payout(self) -> i64 {
        match self {
            Symbol::Seven => SEVEN_PAYOUT,
            Symbol::Bar => BAR_PAYOUT,
            Symbol::Lemon => LEMON_PAYOUT,
            Symbol::Cherry => CHERRY_PAYOUT,
        }
    }

    pub const fn emoji(self) -> &'static str {
        match self {
            Symbol::Bar => "🍫",
            Symbol::Cherry => "🍒",
            Symbol::Lemon => "🍋",
            Symbol::Seven => "7️⃣",
        }
    }
}

/// Per-player game counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Statistics {
    pub total_games: u64,
    pub bar_wins: u64,
    pub cherry_wins: u64,
    pub lemon_wins: u64,
    pub seven_wins: u64,
}

impl Statistics {
    /// Score is always derived from the win counters.
    pub fn score(&self) -> i64 {
        let points = self.seven_wins as i128 * SEVEN_PAYOUT as i128
            + self.bar_wins as i128 * BAR_PAYOUT as i128
            + self.lemon_wins as i128 * LEMON_PAYOUT as i128
            + self.cherry_wins as i128 * CHERRY_PAYOUT as i128;
        points.clamp(i64::MIN as i128, i64::MAX as i128) as i64
    }

    pub fn wins(&self, symbol: Symbol) -> u64 {
        match symbol {
            Symbol::Bar => self.bar_wins,
            Symbol::Cherry => self.cherry_wins,
            Symbol::Lemon => self.lemon_wins,
            Symbol::Seven => self.seven_wins,
        }
    }

    /// Add a delta, saturating each counter.
    pub fn apply(&mut self, delta: &StatsDelta) {
        self.total_games = self.total_games.saturating_add(delta.games);
        if let Some(symbol) = delta.win {
            let counter = match symbol {
                Symbol::Bar => &mut self.bar_wins,
                Symbol::Cherry => &mut self.cherry_wins,
                Symbol::Lemon => &mut self.lemon_wins,
                Symbol::Seven => &mut self.seven_wins,
            };
            *counter = counter.saturating_add(1);
        }
    }
}

impl Write for Statistics {
    fn write(&self, writer: &mut impl BufMut) {
        self.total_games.write(writer);
        self.bar_wins.write(writer);
        self.cherry_wins.write(writer);
        self.lemon_wins.write(writer);
        self.seven_wins.write(writer);
    }
}

impl Read for Statistics {
    type Cfg = ();

    fn read_cfg(reader: &mut impl Buf, _: &Self::Cfg) -> Result<Self, Error> {
        Ok(Self {
            total_games: u64::read(reader)?,
            bar_wins: u64::read(reader)?,
            cherry_wins: u64::read(reader)?,
            lemon_wins: u64::read(reader)?,
            seven_wins: u64::read(reader)?,
        })
    }
}

impl EncodeSize for Statistics {
    fn encode_size(&self) -> usize {
        self.total_games.encode_size()
            + self.bar_wins.encode_size()
            + self.cherry_wins.encode_size()
            + self.lemon_wins.encode_size()
            + self.seven_wins.encode_size()
    }
}

/// Increment applied to a player's statistics by a single spin.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StatsDelta {
    pub games: u64,
    pub win: Option<Symbol>,
}

impl StatsDelta {
    pub fn played() -> Self {
        Self {
            games: 1,
            win: None,
        }
    }

    pub fn won(symbol: Symbol) -> Self {
        Self {
            games: 1,
            win: Some(symbol),
        }
    }
}

/// Durable per-(user, room) statistics row.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerRecord {
    pub user: UserId,
    pub room: RoomId,
    pub username: String,
    pub statistics: Statistics,
    /// Unix milliseconds of the last spin, 0 if never played.
    pub last_played_at_ms: u64,
}

impl PlayerRecord {
    pub fn new(user: UserId, room: RoomId, username: impl Into<String>) -> Self {
        Self {
            user,
            room,
            username: username.into(),
            ..Default::default()
        }
    }

    pub fn score(&self) -> i64 {
        self.statistics.score()
    }

    /// Name to show in room messages.
    pub fn display_name(&self) -> String {
        if self.username.is_empty() {
            format!("User_{}", self.user)
        } else {
            self.username.clone()
        }
    }
}

impl Write for PlayerRecord {
    fn write(&self, writer: &mut impl BufMut) {
        self.user.write(writer);
        self.room.write(writer);
        write_string(&self.username, writer);
        self.statistics.write(writer);
        self.last_played_at_ms.write(writer);
    }
}

impl Read for PlayerRecord {
    type Cfg = ();

    fn read_cfg(reader: &mut impl Buf, _: &Self::Cfg) -> Result<Self, Error> {
        Ok(Self {
            user: UserId::read(reader)?,
            room: RoomId::read(reader)?,
            username: read_string(reader, MAX_NAME_LENGTH)?,
            statistics: Statistics::read(reader)?,
            last_played_at_ms: u64::read(reader)?,
        })
    }
}

impl EncodeSize for PlayerRecord {
    fn encode_size(&self) -> usize {
        self.user.encode_size()
            + self.room.encode_size()
            + string_encode_size(&self.username)
            + self.statistics.encode_size()
            + self.last_played_at_ms.encode_size()
    }
}

/// Durable per-(user, room) balance row. May go negative.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceRecord {
    pub user: UserId,
    pub room: RoomId,
    pub amount: i64,
}

impl BalanceRecord {
    pub fn new(user: UserId, room: RoomId) -> Self {
        Self {
            user,
            room,
            amount: 0,
        }
    }
}

impl Write for BalanceRecord {
    fn write(&self, writer: &mut impl BufMut) {
        self.user.write(writer);
        self.room.write(writer);
        self.amount.write(writer);
    }
}

impl Read for BalanceRecord {
    type Cfg = ();

    fn read_cfg(reader: &mut impl Buf, _: &Self::Cfg) -> Result<Self, Error> {
        Ok(Self {
            user: UserId::read(reader)?,
            room: RoomId::read(reader)?,
            amount: i64::read(reader)?,
        })
    }
}

impl EncodeSize for BalanceRecord {
    fn encode_size(&self) -> usize {
        self.user.encode_size() + self.room.encode_size() + self.amount.encode_size()
    }
}

/// An open challenge between two players of one room.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingDuel {
    pub room: RoomId,
    pub initiator: UserId,
    pub target: UserId,
    pub initiator_name: String,
    pub target_name: String,
    pub expires_at_ms: u64,
}

impl PendingDuel {
    pub fn is_live(&self, now_ms: u64) -> bool {
        now_ms < self.expires_at_ms
    }
}
