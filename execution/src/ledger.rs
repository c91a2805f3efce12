//! Durable per-(user, room) statistics and balances.
//!
//! [StateLedger] serializes every operation behind one async mutex and
//! stages its writes in a [Layer]. The change set reaches the backing
//! [State] through a single `apply`, so a failed operation leaves both the
//! statistics and balance rows as they were.

use spinduel_types::{BalanceRecord, Key, PlayerRecord, RoomId, StatsDelta, UserId, Value};
use std::future::Future;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, error};

use crate::layer::Layer;
use crate::state::{State, Status};

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("no record for user {user} in room {room}")]
    NotFound { user: UserId, room: RoomId },
    #[error("invalid transfer: {0}")]
    InvalidTransfer(&'static str),
    #[error("balance overflow for user {user} in room {room}")]
    Overflow { user: UserId, room: RoomId },
    #[error("storage error: {0}")]
    Storage(#[from] anyhow::Error),
}

pub trait Ledger: Send + Sync {
    /// Fetch the statistics row, creating a zeroed one on first touch.
    ///
    /// An existing username is never replaced.
    fn get_or_create_player(
        &self,
        user: UserId,
        room: RoomId,
        username: &str,
    ) -> impl Future<Output = Result<PlayerRecord, LedgerError>> + Send;

    /// Fetch the balance row, creating it at zero on first touch.
    fn get_or_create_balance(
        &self,
        user: UserId,
        room: RoomId,
    ) -> impl Future<Output = Result<BalanceRecord, LedgerError>> + Send;

    fn get_player(
        &self,
        user: UserId,
        room: RoomId,
    ) -> impl Future<Output = Result<PlayerRecord, LedgerError>> + Send;

    fn get_balance(
        &self,
        user: UserId,
        room: RoomId,
    ) -> impl Future<Output = Result<BalanceRecord, LedgerError>> + Send;

    /// Apply a spin: statistics increment, timestamp and balance change
    /// commit together or not at all.
    fn apply_delta(
        &self,
        user: UserId,
        room: RoomId,
        delta: StatsDelta,
        amount: i64,
        played_at_ms: u64,
    ) -> impl Future<Output = Result<(PlayerRecord, BalanceRecord), LedgerError>> + Send;

    /// Move `amount` from one balance to another in the same room.
    fn transfer(
        &self,
        from: UserId,
        to: UserId,
        room: RoomId,
        amount: i64,
    ) -> impl Future<Output = Result<(), LedgerError>> + Send;

    /// Move the whole positive balance of `from` to `to`, reading and
    /// writing both rows in one critical section. Returns the amount moved,
    /// zero when `from` had nothing to lose.
    fn transfer_all(
        &self,
        from: UserId,
        to: UserId,
        room: RoomId,
    ) -> impl Future<Output = Result<i64, LedgerError>> + Send;

    fn list_by_room(
        &self,
        room: RoomId,
    ) -> impl Future<Output = Result<Vec<PlayerRecord>, LedgerError>> + Send;

    fn list_balances_by_room(
        &self,
        room: RoomId,
    ) -> impl Future<Output = Result<Vec<BalanceRecord>, LedgerError>> + Send;

    /// First player of `room` whose stored username equals `username`.
    fn find_by_username(
        &self,
        room: RoomId,
        username: &str,
    ) -> impl Future<Output = Result<Option<PlayerRecord>, LedgerError>> + Send;
}

pub struct StateLedger<S: State> {
    state: Mutex<S>,
}

impl<S: State> StateLedger<S> {
    pub fn new(state: S) -> Self {
        Self {
            state: Mutex::new(state),
        }
    }

    async fn room_rows(&self, room: RoomId) -> Result<Vec<Value>, LedgerError> {
        let state = self.state.lock().await;
        Ok(state
            .scan_room(room)
            .await?
            .into_iter()
            .map(|(_, value)| value)
            .collect())
    }
}

async fn commit<S: State>(state: &mut S, changes: Vec<(Key, Status)>) -> Result<(), LedgerError> {
    if changes.is_empty() {
        return Ok(());
    }
    state.apply(changes).await.map_err(|err| {
        error!(?err, "ledger commit failed");
        LedgerError::Storage(err)
    })
}

/// Stage a debit of `from` and a credit of `to`. Nothing is staged on error.
async fn stage_transfer<S: State>(
    layer: &mut Layer<'_, S>,
    from: UserId,
    to: UserId,
    room: RoomId,
    amount: i64,
) -> Result<(), LedgerError> {
    let mut source = layer
        .balance(from, room)
        .await?
        .ok_or(LedgerError::NotFound { user: from, room })?;
    let mut destination = layer
        .balance(to, room)
        .await?
        .ok_or(LedgerError::NotFound { user: to, room })?;

    source.amount = source
        .amount
        .checked_sub(amount)
        .ok_or(LedgerError::Overflow { user: from, room })?;
    destination.amount = destination
        .amount
        .checked_add(amount)
        .ok_or(LedgerError::Overflow { user: to, room })?;

    layer.put_balance(source);
    layer.put_balance(destination);
    Ok(())
}

impl<S: State> Ledger for StateLedger<S> {
    async fn get_or_create_player(
        &self,
        user: UserId,
        room: RoomId,
        username: &str,
    ) -> Result<PlayerRecord, LedgerError> {
        let mut state = self.state.lock().await;
        let (player, changes) = {
            let mut layer = Layer::new(&*state);
            let player = match layer.player(user, room).await? {
                Some(player) => player,
                None => {
                    let player = PlayerRecord::new(user, room, username);
                    debug!(%user, %room, "creating player record");
                    layer.put_player(player.clone());
                    player
                }
            };
            (player, layer.commit())
        };
        commit(&mut *state, changes).await?;
        Ok(player)
    }

    async fn get_or_create_balance(
        &self,
        user: UserId,
        room: RoomId,
    ) -> Result<BalanceRecord, LedgerError> {
        let mut state = self.state.lock().await;
        let (balance, changes) = {
            let mut layer = Layer::new(&*state);
            let balance = match layer.balance(user, room).await? {
                Some(balance) => balance,
                None => {
                    let balance = BalanceRecord::new(user, room);
                    debug!(%user, %room, "creating balance record");
                    layer.put_balance(balance);
                    balance
                }
            };
            (balance, layer.commit())
        };
        commit(&mut *state, changes).await?;
        Ok(balance)
    }

    async fn get_player(&self, user: UserId, room: RoomId) -> Result<PlayerRecord, LedgerError> {
        let state = self.state.lock().await;
        Layer::new(&*state)
            .player(user, room)
            .await?
            .ok_or(LedgerError::NotFound { user, room })
    }

    async fn get_balance(&self, user: UserId, room: RoomId) -> Result<BalanceRecord, LedgerError> {
        let state = self.state.lock().await;
        Layer::new(&*state)
            .balance(user, room)
            .await?
            .ok_or(LedgerError::NotFound { user, room })
    }

    async fn apply_delta(
        &self,
        user: UserId,
        room: RoomId,
        delta: StatsDelta,
        amount: i64,
        played_at_ms: u64,
    ) -> Result<(PlayerRecord, BalanceRecord), LedgerError> {
        let mut state = self.state.lock().await;
        let (player, balance, changes) = {
            let mut layer = Layer::new(&*state);
            let mut player = layer
                .player(user, room)
                .await?
                .ok_or(LedgerError::NotFound { user, room })?;
            let mut balance = layer
                .balance(user, room)
                .await?
                .ok_or(LedgerError::NotFound { user, room })?;

            player.statistics.apply(&delta);
            player.last_played_at_ms = played_at_ms;
            balance.amount = balance
                .amount
                .checked_add(amount)
                .ok_or(LedgerError::Overflow { user, room })?;

            layer.put_player(player.clone());
            layer.put_balance(balance);
            (player, balance, layer.commit())
        };
        commit(&mut *state, changes).await?;
        Ok((player, balance))
    }

    async fn transfer(
        &self,
        from: UserId,
        to: UserId,
        room: RoomId,
        amount: i64,
    ) -> Result<(), LedgerError> {
        if from == to {
            return Err(LedgerError::InvalidTransfer("source equals destination"));
        }
        if amount <= 0 {
            return Err(LedgerError::InvalidTransfer("amount must be positive"));
        }

        let mut state = self.state.lock().await;
        let changes = {
            let mut layer = Layer::new(&*state);
            stage_transfer(&mut layer, from, to, room, amount).await?;
            layer.commit()
        };
        commit(&mut *state, changes).await?;
        debug!(%from, %to, %room, amount, "transfer committed");
        Ok(())
    }

    async fn transfer_all(
        &self,
        from: UserId,
        to: UserId,
        room: RoomId,
    ) -> Result<i64, LedgerError> {
        if from == to {
            return Err(LedgerError::InvalidTransfer("source equals destination"));
        }

        let mut state = self.state.lock().await;
        let (amount, changes) = {
            let mut layer = Layer::new(&*state);
            let amount = layer
                .balance(from, room)
                .await?
                .ok_or(LedgerError::NotFound { user: from, room })?
                .amount;
            if amount <= 0 {
                return Ok(0);
            }
            stage_transfer(&mut layer, from, to, room, amount).await?;
            (amount, layer.commit())
        };
        commit(&mut *state, changes).await?;
        debug!(%from, %to, %room, amount, "balance swept");
        Ok(amount)
    }

    async fn list_by_room(&self, room: RoomId) -> Result<Vec<PlayerRecord>, LedgerError> {
        Ok(self
            .room_rows(room)
            .await?
            .into_iter()
            .filter_map(|value| match value {
                Value::Player(player) => Some(player),
                _ => None,
            })
            .collect())
    }

    async fn list_balances_by_room(&self, room: RoomId) -> Result<Vec<BalanceRecord>, LedgerError> {
        Ok(self
            .room_rows(room)
            .await?
            .into_iter()
            .filter_map(|value| match value {
                Value::Balance(balance) => Some(balance),
                _ => None,
            })
            .collect())
    }

    async fn find_by_username(
        &self,
        room: RoomId,
        username: &str,
    ) -> Result<Option<PlayerRecord>, LedgerError> {
        if username.is_empty() {
            return Ok(None);
        }
        Ok(self
            .list_by_room(room)
            .await?
            .into_iter()
            .find(|player| player.username == username))
    }
}
