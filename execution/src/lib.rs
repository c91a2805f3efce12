//! Spinduel execution layer.
//!
//! This crate scores slot-machine spins into a per-(user, room) ledger and
//! arbitrates duels, where one player's whole balance moves to the other on
//! a die roll.
//!
//! ## Consistency
//! - Ledger writes for one operation are staged in a [Layer] and committed
//!   with a single [State::apply]. A spin or a duel transfer is never half
//!   applied.
//! - The [DuelRegistry] holds at most one live duel per room. A duel is
//!   removed from the registry before it is resolved.
//! - Messages go out only after the ledger committed. Delivery failures are
//!   logged and never undo a commit.
//!
//! ## Minimal wiring (example)
//! ```rust,ignore
//! use std::sync::Arc;
//! use spinduel_execution::{Casino, CasinoConfig, Command, Memory, StateLedger, SystemClock, ThreadRngDie};
//!
//! let casino = Casino::new(
//!     Arc::new(StateLedger::new(Memory::default())),
//!     Arc::new(ThreadRngDie),
//!     notifier, // any `Notifier`
//!     Arc::new(SystemClock),
//!     CasinoConfig::default(),
//! );
//! let reply = casino.handle(&envelope, Command::Stats).await;
//! ```

pub mod casino;
pub mod clock;
pub mod command;
pub mod duel;
pub mod leaderboard;
pub mod ledger;
pub mod notifier;
pub mod outcome;
pub mod spin;

#[cfg(any(test, feature = "mocks"))]
pub mod mocks;

mod layer;

mod state;

pub use casino::{Casino, CasinoConfig, Envelope};
pub use clock::{Clock, SystemClock};
pub use command::{Command, SLOT_MACHINE_EMOJI};
pub use duel::{
    Challenge, DuelError, DuelRegistry, DuelResolver, Parity, Resolution, ResolveError, Settlement,
};
pub use layer::Layer;
pub use ledger::{Ledger, LedgerError, StateLedger};
pub use notifier::Notifier;
pub use outcome::{
    HashChainDie, OutcomeError, OutcomeSource, Reels, SpinResult, ThreadRngDie, DIE_FACES,
};
pub use spin::{Spin, SpinError, SpinProcessor, SpinReport};
pub use state::{State, Status};

#[cfg(any(test, feature = "mocks"))]
pub use state::Memory;
