use spinduel_types::{
    BalanceRecord, MessageId, PlayerRecord, RoomId, StatsDelta, UserId, LOSING_SPIN_RETRACT_MS,
};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, warn};

use crate::ledger::{Ledger, LedgerError};
use crate::notifier::Notifier;
use crate::outcome::{Reels, SpinResult};

#[derive(Debug, Error)]
pub enum SpinError {
    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),
}

/// A slot-machine roll posted by a player.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Spin {
    pub user: UserId,
    pub room: RoomId,
    pub username: String,
    /// The chat message carrying the roll.
    pub message: MessageId,
    pub value: u64,
    pub played_at_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpinReport {
    /// `None` when the value could not be decoded.
    pub reels: Option<Reels>,
    pub result: SpinResult,
    pub player: PlayerRecord,
    pub balance: BalanceRecord,
}

/// Scores spins into the ledger.
pub struct SpinProcessor<L, N> {
    ledger: Arc<L>,
    notifier: Arc<N>,
    retract_delay: Duration,
}

impl<L: Ledger, N: Notifier> SpinProcessor<L, N> {
    pub fn new(ledger: Arc<L>, notifier: Arc<N>) -> Self {
        Self {
            ledger,
            notifier,
            retract_delay: Duration::from_millis(LOSING_SPIN_RETRACT_MS),
        }
    }

    pub fn with_retract_delay(mut self, retract_delay: Duration) -> Self {
        self.retract_delay = retract_delay;
        self
    }

    /// Record one spin. Every spin counts as a game; winners also get a
    /// symbol win and its payout. The ledger write happens exactly once and
    /// before any message clean-up is scheduled.
    pub async fn process(&self, spin: Spin) -> Result<SpinReport, SpinError> {
        self.ledger
            .get_or_create_player(spin.user, spin.room, &spin.username)
            .await?;
        self.ledger
            .get_or_create_balance(spin.user, spin.room)
            .await?;

        let (reels, result) = match Reels::decode(spin.value) {
            Ok(reels) => (Some(reels), reels.evaluate()),
            Err(err) => {
                error!(?err, value = spin.value, room = %spin.room, "undecodable slot value");
                (None, SpinResult::LOSS)
            }
        };
        let delta = match result.win {
            Some(symbol) => StatsDelta::won(symbol),
            None => StatsDelta::played(),
        };

        let (player, balance) = self
            .ledger
            .apply_delta(spin.user, spin.room, delta, result.payout, spin.played_at_ms)
            .await?;
        debug!(
            user = %spin.user,
            room = %spin.room,
            payout = result.payout,
            balance = balance.amount,
            "spin recorded"
        );

        if result.win.is_none() {
            if let Err(err) = self
                .notifier
                .retract(spin.room, spin.message, self.retract_delay)
                .await
            {
                warn!(?err, room = %spin.room, "failed to schedule spin retraction");
            }
        }

        Ok(SpinReport {
            reels,
            result,
            player,
            balance,
        })
    }
}
