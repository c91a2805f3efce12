//! Routes room commands to the ledger, the duel machinery and the spin
//! processor, and turns their results into room messages.
//!
//! Nothing here aborts the process: every failure is logged and becomes a
//! reply. A spin that was recorded gets no reply, since the platform's
//! animation already answers it.

use spinduel_types::{
    MessageId, RoomId, UserId, DUEL_REVEAL_DELAY_MS, DUEL_TTL_MS, LOSING_SPIN_RETRACT_MS,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::clock::Clock;
use crate::command::Command;
use crate::duel::{Challenge, DuelError, DuelRegistry, DuelResolver};
use crate::leaderboard::{format_balances, format_stats};
use crate::ledger::Ledger;
use crate::notifier::Notifier;
use crate::outcome::OutcomeSource;
use crate::spin::{Spin, SpinProcessor};

pub const DUEL_USAGE_TEXT: &str = "Usage: /duel <username>";
pub const USERS_ERROR_TEXT: &str = "Error getting users.";
pub const STATS_ERROR_TEXT: &str = "Error getting stats.";
pub const BALANCES_ERROR_TEXT: &str = "Error getting balances.";
pub const SPIN_ERROR_TEXT: &str = "Error saving spin.";

/// Timing knobs for the coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CasinoConfig {
    pub duel_ttl_ms: u64,
    pub reveal_delay_ms: u64,
    pub retract_delay_ms: u64,
}

impl Default for CasinoConfig {
    fn default() -> Self {
        Self {
            duel_ttl_ms: DUEL_TTL_MS,
            reveal_delay_ms: DUEL_REVEAL_DELAY_MS,
            retract_delay_ms: LOSING_SPIN_RETRACT_MS,
        }
    }
}

/// Who said what, where.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    pub room: RoomId,
    pub user: UserId,
    pub username: String,
    pub message: MessageId,
    /// Platform timestamp of the message (unix ms).
    pub sent_at_ms: u64,
}

impl Envelope {
    fn display_name(&self) -> String {
        if self.username.is_empty() {
            format!("User_{}", self.user)
        } else {
            self.username.clone()
        }
    }
}

pub struct Casino<L, O, N, C> {
    ledger: Arc<L>,
    notifier: Arc<N>,
    clock: Arc<C>,
    registry: DuelRegistry,
    resolver: DuelResolver<L, O, N>,
    spins: SpinProcessor<L, N>,
}

impl<L, O, N, C> Casino<L, O, N, C>
where
    L: Ledger,
    O: OutcomeSource,
    N: Notifier,
    C: Clock,
{
    pub fn new(
        ledger: Arc<L>,
        outcomes: Arc<O>,
        notifier: Arc<N>,
        clock: Arc<C>,
        config: CasinoConfig,
    ) -> Self {
        let resolver = DuelResolver::new(ledger.clone(), outcomes, notifier.clone())
            .with_reveal_delay(Duration::from_millis(config.reveal_delay_ms));
        let spins = SpinProcessor::new(ledger.clone(), notifier.clone())
            .with_retract_delay(Duration::from_millis(config.retract_delay_ms));
        Self {
            ledger,
            notifier,
            clock,
            registry: DuelRegistry::new(config.duel_ttl_ms),
            resolver,
            spins,
        }
    }

    pub fn ledger(&self) -> &Arc<L> {
        &self.ledger
    }

    pub fn registry(&self) -> &DuelRegistry {
        &self.registry
    }

    /// Handle one command. Returns the reply posted to the room, if any.
    pub async fn handle(&self, envelope: &Envelope, command: Command) -> Option<String> {
        let reply = match command {
            Command::Spin { value } => self.spin(envelope, value).await,
            Command::Stats => Some(self.stats(envelope.room).await),
            Command::Balance => Some(self.balances(envelope.room).await),
            Command::Duel { target } => Some(self.challenge(envelope, target).await),
            Command::AcceptDuel => self.accept(envelope).await,
            Command::DeclineDuel => Some(self.decline(envelope).await),
            Command::CancelDuel => Some(self.cancel(envelope).await),
        }?;

        if let Err(err) = self.notifier.send(envelope.room, reply.clone()).await {
            warn!(?err, room = %envelope.room, "failed to deliver reply");
        }
        Some(reply)
    }

    async fn spin(&self, envelope: &Envelope, value: u64) -> Option<String> {
        let spin = Spin {
            user: envelope.user,
            room: envelope.room,
            username: envelope.username.clone(),
            message: envelope.message,
            value,
            played_at_ms: envelope.sent_at_ms,
        };
        match self.spins.process(spin).await {
            Ok(_) => None,
            Err(err) => {
                error!(?err, room = %envelope.room, user = %envelope.user, "failed to record spin");
                Some(SPIN_ERROR_TEXT.to_string())
            }
        }
    }

    async fn stats(&self, room: RoomId) -> String {
        match self.ledger.list_by_room(room).await {
            Ok(players) => format_stats(players),
            Err(err) => {
                error!(?err, %room, "failed to list stats");
                STATS_ERROR_TEXT.to_string()
            }
        }
    }

    async fn balances(&self, room: RoomId) -> String {
        let listed = futures::try_join!(
            self.ledger.list_balances_by_room(room),
            self.ledger.list_by_room(room)
        );
        match listed {
            Ok((balances, players)) => {
                let names: HashMap<UserId, String> = players
                    .into_iter()
                    .map(|player| (player.user, player.username))
                    .collect();
                format_balances(balances, &names)
            }
            Err(err) => {
                error!(?err, %room, "failed to list balances");
                BALANCES_ERROR_TEXT.to_string()
            }
        }
    }

    async fn challenge(&self, envelope: &Envelope, target: Option<String>) -> String {
        let room = envelope.room;
        let Some(target_name) = target else {
            return DUEL_USAGE_TEXT.to_string();
        };
        let target = match self.ledger.find_by_username(room, &target_name).await {
            Ok(Some(player)) => player,
            Ok(None) => return DuelError::TargetUnavailable.to_string(),
            Err(err) => {
                error!(?err, %room, "failed to look up duel target");
                return USERS_ERROR_TEXT.to_string();
            }
        };
        let balances = futures::try_join!(
            self.ledger.get_or_create_balance(target.user, room),
            self.ledger.get_or_create_balance(envelope.user, room)
        );
        let (target_balance, initiator_balance) = match balances {
            Ok(balances) => balances,
            Err(err) => {
                error!(?err, %room, "failed to read duel balances");
                return BALANCES_ERROR_TEXT.to_string();
            }
        };

        let challenge = Challenge {
            room,
            initiator: envelope.user,
            initiator_name: envelope.display_name(),
            target: target.user,
            target_name: target_name.clone(),
            target_balance: target_balance.amount,
        };
        match self.registry.challenge(challenge, self.clock.now_ms()).await {
            Ok(duel) => {
                info!(%room, initiator = %duel.initiator, target = %duel.target, "duel opened");
                format!(
                    "@{initiator} ({initiator_amount}$) has challenged @{target} ({target_amount}$) to a duel!\n\n\
                     Rules: 🎲 Even = @{initiator} wins, Odd = @{target} wins\n\n\
                     @{target}, type /acceptDuel to accept or /declineDuel to decline.",
                    initiator = duel.initiator_name,
                    initiator_amount = initiator_balance.amount,
                    target = duel.target_name,
                    target_amount = target_balance.amount,
                )
            }
            Err(err) => err.to_string(),
        }
    }

    async fn accept(&self, envelope: &Envelope) -> Option<String> {
        let duel = match self
            .registry
            .accept(envelope.room, envelope.user, self.clock.now_ms())
            .await
        {
            Ok(duel) => duel,
            Err(err) => return Some(err.to_string()),
        };
        match self.resolver.resolve(&duel).await {
            Ok(_) => None,
            Err(err) => Some(err.to_string()),
        }
    }

    async fn decline(&self, envelope: &Envelope) -> String {
        match self
            .registry
            .decline(envelope.room, envelope.user, self.clock.now_ms())
            .await
        {
            Ok(duel) => format!("@{} chickened out of the duel!", duel.target_name),
            Err(err) => err.to_string(),
        }
    }

    async fn cancel(&self, envelope: &Envelope) -> String {
        match self
            .registry
            .cancel(envelope.room, envelope.user, self.clock.now_ms())
            .await
        {
            Ok(duel) => format!("Duel against @{} has been cancelled.", duel.target_name),
            Err(err) => err.to_string(),
        }
    }
}
