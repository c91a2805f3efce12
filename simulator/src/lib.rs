//! Local chat gateway for spinduel.
//!
//! Wires the execution crate to SQLite storage, an in-process [Outbox] that
//! plays the chat platform, and an HTTP surface ([Api]) that accepts chat
//! updates.

use anyhow::Result;
use spinduel_execution::{
    Casino, HashChainDie, OutcomeSource, StateLedger, SystemClock, ThreadRngDie,
};
use spinduel_types::RoomId;
use std::sync::Arc;
use tracing::info;

mod api;
pub use api::{Api, ChatUpdate, Dice, Sender, UpdateResponse};
mod config;
pub use config::{Config, ConfigError, ValidatedConfig, DEFAULT_TRANSCRIPT_LIMIT};
mod outbox;
pub use outbox::{Author, Entry, Outbox};
mod sqlite;
pub use sqlite::SqliteState;

/// Die used to settle duels.
pub enum DuelDie {
    Random(ThreadRngDie),
    Seeded(HashChainDie),
}

impl DuelDie {
    pub fn from_seed(seed: Option<u64>) -> Self {
        match seed {
            Some(seed) => Self::Seeded(HashChainDie::new(seed)),
            None => Self::Random(ThreadRngDie),
        }
    }
}

impl OutcomeSource for DuelDie {
    async fn draw(&self, room: RoomId) -> Result<u64> {
        match self {
            Self::Random(die) => die.draw(room).await,
            Self::Seeded(die) => die.draw(room).await,
        }
    }
}

pub type SimulatorLedger = StateLedger<SqliteState>;
pub type SimulatorCasino = Casino<SimulatorLedger, DuelDie, Outbox, SystemClock>;

pub struct Simulator {
    config: ValidatedConfig,
    casino: SimulatorCasino,
    outbox: Arc<Outbox>,
}

impl Simulator {
    pub fn new(config: ValidatedConfig) -> Result<Self> {
        let state = match &config.database {
            Some(path) => SqliteState::open(path)?,
            None => {
                info!("no database configured, ledger is in-memory");
                SqliteState::in_memory()?
            }
        };
        let outbox = Arc::new(Outbox::new(config.transcript_limit));
        let casino = Casino::new(
            Arc::new(StateLedger::new(state)),
            Arc::new(DuelDie::from_seed(config.deterministic_seed)),
            outbox.clone(),
            Arc::new(SystemClock),
            config.casino,
        );
        Ok(Self {
            config,
            casino,
            outbox,
        })
    }

    pub fn config(&self) -> &ValidatedConfig {
        &self.config
    }

    pub fn casino(&self) -> &SimulatorCasino {
        &self.casino
    }

    pub fn outbox(&self) -> &Arc<Outbox> {
        &self.outbox
    }

    /// Abort pending scheduled deliveries.
    pub fn shutdown(&self) {
        self.outbox.shutdown();
    }
}
