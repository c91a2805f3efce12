//! Common types for spinduel.
//!
//! Identifiers, ledger rows, pending duels and the storage keys/values the
//! execution layer persists. Stored rows use `commonware-codec`; the
//! records also derive `serde` so the gateway can return them as JSON.

pub mod codec;
pub mod constants;
pub mod records;
pub mod storage;

#[cfg(test)]
mod tests;

pub use constants::*;
pub use records::{
    BalanceRecord, MessageId, PendingDuel, PlayerRecord, RoomId, Statistics, StatsDelta, Symbol,
    UnknownSymbol, UserId,
};
pub use storage::{Key, Value};
