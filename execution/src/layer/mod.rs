use anyhow::Result;
use spinduel_types::{BalanceRecord, Key, PlayerRecord, RoomId, UserId, Value};
use std::collections::BTreeMap;

use crate::state::{State, Status};

/// Copy-on-write overlay over a [State].
///
/// Reads fall through to the underlying state unless the key was staged.
/// Nothing reaches the state until the caller applies [Layer::commit].
pub struct Layer<'a, S: State> {
    state: &'a S,
    pending: BTreeMap<Key, Status>,
}

impl<'a, S: State> Layer<'a, S> {
    pub fn new(state: &'a S) -> Self {
        Self {
            state,
            pending: BTreeMap::new(),
        }
    }

    pub async fn player(&self, user: UserId, room: RoomId) -> Result<Option<PlayerRecord>> {
        Ok(match self.get(&Key::player(user, room)).await? {
            Some(Value::Player(player)) => Some(player),
            _ => None,
        })
    }

    pub async fn balance(&self, user: UserId, room: RoomId) -> Result<Option<BalanceRecord>> {
        Ok(match self.get(&Key::balance(user, room)).await? {
            Some(Value::Balance(balance)) => Some(balance),
            _ => None,
        })
    }

    pub fn put_player(&mut self, player: PlayerRecord) {
        self.pending.insert(
            Key::player(player.user, player.room),
            Status::Update(Value::Player(player)),
        );
    }

    pub fn put_balance(&mut self, balance: BalanceRecord) {
        self.pending.insert(
            Key::balance(balance.user, balance.room),
            Status::Update(Value::Balance(balance)),
        );
    }

    pub fn commit(self) -> Vec<(Key, Status)> {
        self.pending.into_iter().collect()
    }

    async fn get(&self, key: &Key) -> Result<Option<Value>> {
        Ok(match self.pending.get(key) {
            Some(Status::Update(value)) => Some(value.clone()),
            Some(Status::Delete) => None,
            None => self.state.get(key).await?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::Memory;

    #[tokio::test]
    async fn test_pending_shadows_state_until_commit() {
        let mut state = Memory::default();
        let user = UserId(1);
        let room = RoomId(-1);
        state
            .insert(
                Key::balance(user, room),
                Value::Balance(BalanceRecord {
                    user,
                    room,
                    amount: 10,
                }),
            )
            .await
            .unwrap();

        let changes = {
            let mut layer = Layer::new(&state);
            let mut balance = layer.balance(user, room).await.unwrap().unwrap();
            balance.amount += 5;
            layer.put_balance(balance);
            layer.put_player(PlayerRecord::new(user, room, "alice"));

            assert_eq!(layer.balance(user, room).await.unwrap().unwrap().amount, 15);
            assert!(layer.player(user, room).await.unwrap().is_some());
            layer.commit()
        };

        // Untouched until applied.
        assert_eq!(state.len(), 1);
        state.apply(changes).await.unwrap();
        assert_eq!(state.len(), 2);
        match state.get(&Key::balance(user, room)).await.unwrap() {
            Some(Value::Balance(balance)) => assert_eq!(balance.amount, 15),
            other => panic!("unexpected value: {other:?}"),
        }
    }
}
