//! Test doubles for the collaborators of the coordinator.

use anyhow::{anyhow, Result};
use spinduel_types::{Key, MessageId, RoomId, Value};
use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::clock::Clock;
use crate::notifier::Notifier;
use crate::outcome::OutcomeSource;
use crate::state::{State, Status};

fn poisoned<T>(_: T) -> anyhow::Error {
    anyhow!("mock lock poisoned")
}

/// In-memory state whose next `apply` can be forced to fail without
/// touching any row. Clones share storage.
#[derive(Clone, Default)]
pub struct FaultyState {
    rows: Arc<Mutex<BTreeMap<Key, Value>>>,
    fail_next: Arc<AtomicBool>,
}

impl FaultyState {
    pub fn fail_next_apply(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }
}

impl State for FaultyState {
    async fn get(&self, key: &Key) -> Result<Option<Value>> {
        Ok(self.rows.lock().map_err(poisoned)?.get(key).cloned())
    }

    async fn insert(&mut self, key: Key, value: Value) -> Result<()> {
        self.rows.lock().map_err(poisoned)?.insert(key, value);
        Ok(())
    }

    async fn delete(&mut self, key: &Key) -> Result<()> {
        self.rows.lock().map_err(poisoned)?.remove(key);
        Ok(())
    }

    async fn scan_room(&self, room: RoomId) -> Result<Vec<(Key, Value)>> {
        Ok(self
            .rows
            .lock()
            .map_err(poisoned)?
            .iter()
            .filter(|(key, _)| key.room() == room)
            .map(|(key, value)| (*key, value.clone()))
            .collect())
    }

    async fn apply(&mut self, changes: Vec<(Key, Status)>) -> Result<()> {
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(anyhow!("injected storage failure"));
        }
        let mut rows = self.rows.lock().map_err(poisoned)?;
        for (key, status) in changes {
            match status {
                Status::Update(value) => {
                    rows.insert(key, value);
                }
                Status::Delete => {
                    rows.remove(&key);
                }
            }
        }
        Ok(())
    }
}

/// Outcome source replaying a scripted sequence.
#[derive(Default)]
pub struct ScriptedOutcomes {
    values: Mutex<VecDeque<Result<u64, String>>>,
    drawn: AtomicU64,
}

impl ScriptedOutcomes {
    pub fn new(values: impl IntoIterator<Item = u64>) -> Self {
        Self {
            values: Mutex::new(values.into_iter().map(Ok).collect()),
            drawn: AtomicU64::new(0),
        }
    }

    pub fn push_failure(&self, reason: &str) {
        if let Ok(mut values) = self.values.lock() {
            values.push_back(Err(reason.to_string()));
        }
    }

    pub fn drawn(&self) -> u64 {
        self.drawn.load(Ordering::SeqCst)
    }
}

impl OutcomeSource for ScriptedOutcomes {
    async fn draw(&self, _room: RoomId) -> Result<u64> {
        self.drawn.fetch_add(1, Ordering::SeqCst);
        let next = self.values.lock().map_err(poisoned)?.pop_front();
        match next {
            Some(Ok(value)) => Ok(value),
            Some(Err(reason)) => Err(anyhow!(reason)),
            None => Err(anyhow!("no scripted outcome left")),
        }
    }
}

/// What a [RecordingNotifier] was asked to do.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Delivery {
    Sent {
        room: RoomId,
        id: MessageId,
        text: String,
    },
    Delayed {
        room: RoomId,
        text: String,
        after: Duration,
    },
    Retract {
        room: RoomId,
        message: MessageId,
        after: Duration,
    },
}

/// Notifier that records deliveries instead of performing them.
#[derive(Default)]
pub struct RecordingNotifier {
    deliveries: Mutex<Vec<Delivery>>,
    next_id: AtomicI64,
    failing: AtomicBool,
}

impl RecordingNotifier {
    /// Make every later call fail.
    pub fn fail_all(&self) {
        self.failing.store(true, Ordering::SeqCst);
    }

    pub fn deliveries(&self) -> Vec<Delivery> {
        self.deliveries
            .lock()
            .map(|deliveries| deliveries.clone())
            .unwrap_or_default()
    }

    /// Texts in delivery order, immediate and delayed alike.
    pub fn texts(&self) -> Vec<String> {
        self.deliveries()
            .into_iter()
            .filter_map(|delivery| match delivery {
                Delivery::Sent { text, .. } | Delivery::Delayed { text, .. } => Some(text),
                Delivery::Retract { .. } => None,
            })
            .collect()
    }

    pub fn retractions(&self) -> Vec<MessageId> {
        self.deliveries()
            .into_iter()
            .filter_map(|delivery| match delivery {
                Delivery::Retract { message, .. } => Some(message),
                _ => None,
            })
            .collect()
    }

    fn record(&self, delivery: Delivery) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(anyhow!("notifier unavailable"));
        }
        self.deliveries.lock().map_err(poisoned)?.push(delivery);
        Ok(())
    }
}

impl Notifier for RecordingNotifier {
    async fn send(&self, room: RoomId, text: String) -> Result<MessageId> {
        let id = MessageId(self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        self.record(Delivery::Sent { room, id, text })?;
        Ok(id)
    }

    async fn send_delayed(&self, room: RoomId, text: String, after: Duration) -> Result<()> {
        self.record(Delivery::Delayed { room, text, after })
    }

    async fn retract(&self, room: RoomId, message: MessageId, after: Duration) -> Result<()> {
        self.record(Delivery::Retract {
            room,
            message,
            after,
        })
    }
}

/// Clock advanced by hand.
#[derive(Default)]
pub struct ManualClock {
    now_ms: AtomicU64,
}

impl ManualClock {
    pub fn new(now_ms: u64) -> Self {
        Self {
            now_ms: AtomicU64::new(now_ms),
        }
    }

    pub fn advance(&self, by: Duration) {
        self.now_ms
            .fetch_add(by.as_millis() as u64, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now_ms.load(Ordering::SeqCst)
    }
}
