use spinduel_types::{PendingDuel, RoomId, UserId, DUEL_REVEAL_DELAY_MS};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::ledger::{Ledger, LedgerError};
use crate::notifier::Notifier;
use crate::outcome::OutcomeSource;

/// Announced when neither side has anything to lose.
pub const FORFEIT_TEXT: &str = "Both players have no balance to duel for!";

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("Error getting balances.")]
    Balances(#[source] LedgerError),
    #[error("Error sending dice roll.")]
    Draw(#[source] anyhow::Error),
    #[error("Error transferring balance.")]
    Transfer(#[source] LedgerError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Parity {
    Even,
    Odd,
}

impl Parity {
    pub fn of(value: u64) -> Self {
        if value % 2 == 0 {
            Parity::Even
        } else {
            Parity::Odd
        }
    }
}

impl fmt::Display for Parity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Parity::Even => write!(f, "even"),
            Parity::Odd => write!(f, "odd"),
        }
    }
}

/// Result of a settled duel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settlement {
    pub room: RoomId,
    pub roll: u64,
    pub parity: Parity,
    pub winner: UserId,
    pub winner_name: String,
    pub loser: UserId,
    pub loser_name: String,
    /// Amount moved from loser to winner; zero when the loser had nothing.
    pub amount: i64,
}

impl Settlement {
    pub fn announcement(&self) -> String {
        format!(
            "🎲 {} ({})!\n\n@{} wins {}$ from @{}!",
            self.roll, self.parity, self.winner_name, self.amount, self.loser_name
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Both balances were exhausted; nothing was drawn.
    Forfeit,
    Settled(Settlement),
}

/// Settles accepted duels: even roll pays the initiator, odd pays the target.
pub struct DuelResolver<L, O, N> {
    ledger: Arc<L>,
    outcomes: Arc<O>,
    notifier: Arc<N>,
    reveal_delay: Duration,
}

impl<L: Ledger, O: OutcomeSource, N: Notifier> DuelResolver<L, O, N> {
    pub fn new(ledger: Arc<L>, outcomes: Arc<O>, notifier: Arc<N>) -> Self {
        Self {
            ledger,
            outcomes,
            notifier,
            reveal_delay: Duration::from_millis(DUEL_REVEAL_DELAY_MS),
        }
    }

    pub fn with_reveal_delay(mut self, reveal_delay: Duration) -> Self {
        self.reveal_delay = reveal_delay;
        self
    }

    /// Resolve a duel already removed from the registry.
    ///
    /// The stake is the loser's balance after the draw, read and moved in
    /// one ledger operation. The announcement is handed to the notifier
    /// only after the transfer committed; on any error nothing is announced.
    pub async fn resolve(&self, duel: &PendingDuel) -> Result<Resolution, ResolveError> {
        let room = duel.room;
        let initiator = self
            .ledger
            .get_or_create_balance(duel.initiator, room)
            .await
            .map_err(ResolveError::Balances)?;
        let target = self
            .ledger
            .get_or_create_balance(duel.target, room)
            .await
            .map_err(ResolveError::Balances)?;

        if initiator.amount <= 0 && target.amount <= 0 {
            info!(%room, initiator = %duel.initiator, target = %duel.target, "duel forfeited");
            if let Err(err) = self.notifier.send(room, FORFEIT_TEXT.to_string()).await {
                warn!(?err, %room, "failed to announce forfeit");
            }
            return Ok(Resolution::Forfeit);
        }

        let roll = self.outcomes.draw(room).await.map_err(|err| {
            warn!(?err, %room, "duel draw failed");
            ResolveError::Draw(err)
        })?;
        let parity = Parity::of(roll);
        let (winner, winner_name, loser, loser_name) = match parity {
            Parity::Even => (
                duel.initiator,
                &duel.initiator_name,
                duel.target,
                &duel.target_name,
            ),
            Parity::Odd => (
                duel.target,
                &duel.target_name,
                duel.initiator,
                &duel.initiator_name,
            ),
        };
        let amount = self
            .ledger
            .transfer_all(loser, winner, room)
            .await
            .map_err(|err| {
                error!(?err, %room, "duel transfer failed");
                ResolveError::Transfer(err)
            })?;
        let settlement = Settlement {
            room,
            roll,
            parity,
            winner,
            winner_name: winner_name.clone(),
            loser,
            loser_name: loser_name.clone(),
            amount,
        };
        info!(
            %room,
            roll,
            winner = %settlement.winner,
            loser = %settlement.loser,
            amount = settlement.amount,
            "duel settled"
        );

        if let Err(err) = self
            .notifier
            .send_delayed(room, settlement.announcement(), self.reveal_delay)
            .await
        {
            warn!(?err, %room, "failed to announce duel result");
        }
        Ok(Resolution::Settled(settlement))
    }
}
