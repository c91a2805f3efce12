use bytes::{Buf, BufMut};
use commonware_codec::{EncodeSize, Error, Read, ReadExt, Write};

use crate::records::{BalanceRecord, PlayerRecord, RoomId, UserId};

/// Storage key for ledger rows.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Key {
    /// Statistics row (tag 0)
    Player { room: RoomId, user: UserId },
    /// Balance row (tag 1)
    Balance { room: RoomId, user: UserId },
}

impl Key {
    pub const PLAYER_TAG: u8 = 0;
    pub const BALANCE_TAG: u8 = 1;

    pub fn player(user: UserId, room: RoomId) -> Self {
        Self::Player { room, user }
    }

    pub fn balance(user: UserId, room: RoomId) -> Self {
        Self::Balance { room, user }
    }

    pub fn tag(&self) -> u8 {
        match self {
            Self::Player { .. } => Self::PLAYER_TAG,
            Self::Balance { .. } => Self::BALANCE_TAG,
        }
    }

    pub fn room(&self) -> RoomId {
        match self {
            Self::Player { room, .. } | Self::Balance { room, .. } => *room,
        }
    }

    pub fn user(&self) -> UserId {
        match self {
            Self::Player { user, .. } | Self::Balance { user, .. } => *user,
        }
    }

    /// Rebuild a key from its stored parts.
    pub fn from_parts(tag: u8, room: RoomId, user: UserId) -> Result<Self, Error> {
        match tag {
            Self::PLAYER_TAG => Ok(Self::Player { room, user }),
            Self::BALANCE_TAG => Ok(Self::Balance { room, user }),
            _ => Err(Error::InvalidEnum(tag)),
        }
    }
}

impl Write for Key {
    fn write(&self, writer: &mut impl BufMut) {
        self.tag().write(writer);
        self.room().write(writer);
        self.user().write(writer);
    }
}

impl Read for Key {
    type Cfg = ();

    fn read_cfg(reader: &mut impl Buf, _: &Self::Cfg) -> Result<Self, Error> {
        let tag = u8::read(reader)?;
        let room = RoomId::read(reader)?;
        let user = UserId::read(reader)?;
        Self::from_parts(tag, room, user)
    }
}

impl EncodeSize for Key {
    fn encode_size(&self) -> usize {
        1 + self.room().encode_size() + self.user().encode_size()
    }
}

/// Stored ledger row.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Value {
    Player(PlayerRecord),
    Balance(BalanceRecord),
}

impl Write for Value {
    fn write(&self, writer: &mut impl BufMut) {
        match self {
            Self::Player(record) => {
                Key::PLAYER_TAG.write(writer);
                record.write(writer);
            }
            Self::Balance(record) => {
                Key::BALANCE_TAG.write(writer);
                record.write(writer);
            }
        }
    }
}

impl Read for Value {
    type Cfg = ();

    fn read_cfg(reader: &mut impl Buf, _: &Self::Cfg) -> Result<Self, Error> {
        let kind = u8::read(reader)?;
        match kind {
            Key::PLAYER_TAG => Ok(Self::Player(PlayerRecord::read(reader)?)),
            Key::BALANCE_TAG => Ok(Self::Balance(BalanceRecord::read(reader)?)),
            _ => Err(Error::InvalidEnum(kind)),
        }
    }
}

impl EncodeSize for Value {
    fn encode_size(&self) -> usize {
        1 + match self {
            Self::Player(record) => record.encode_size(),
            Self::Balance(record) => record.encode_size(),
        }
    }
}
