use serde::Serialize;
use spinduel_execution::{Clock, Notifier, SystemClock};
use spinduel_types::{MessageId, RoomId, UserId};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Author {
    User { id: UserId, username: String },
    Bot,
}

/// One message visible in a room.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Entry {
    pub id: MessageId,
    pub author: Author,
    pub text: String,
    pub at_ms: u64,
}

#[derive(Default)]
struct Transcript {
    next_id: i64,
    entries: VecDeque<Entry>,
}

impl Transcript {
    fn push(&mut self, entry: Entry, limit: usize) {
        self.next_id = self.next_id.max(entry.id.0.saturating_add(1));
        self.entries.push_back(entry);
        while self.entries.len() > limit {
            self.entries.pop_front();
        }
    }

    fn allocate(&mut self) -> MessageId {
        let id = MessageId(self.next_id.max(1));
        self.next_id = id.0.saturating_add(1);
        id
    }

    fn remove(&mut self, id: MessageId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|entry| entry.id != id);
        before != self.entries.len()
    }
}

type Rooms = Arc<Mutex<HashMap<RoomId, Transcript>>>;

/// In-process stand-in for the chat platform.
///
/// Keeps a bounded transcript per room. Delayed sends and retractions run on
/// detached tokio tasks that [Outbox::shutdown] aborts.
pub struct Outbox {
    limit: usize,
    rooms: Rooms,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

fn bot_message(
    rooms: &Rooms,
    room: RoomId,
    text: String,
    limit: usize,
) -> anyhow::Result<MessageId> {
    let mut rooms = rooms.lock().map_err(|_| anyhow::anyhow!("outbox poisoned"))?;
    let transcript = rooms.entry(room).or_default();
    let id = transcript.allocate();
    transcript.push(
        Entry {
            id,
            author: Author::Bot,
            text,
            at_ms: SystemClock.now_ms(),
        },
        limit,
    );
    Ok(id)
}

fn remove_message(rooms: &Rooms, room: RoomId, message: MessageId) -> anyhow::Result<()> {
    let mut rooms = rooms.lock().map_err(|_| anyhow::anyhow!("outbox poisoned"))?;
    let removed = rooms
        .get_mut(&room)
        .is_some_and(|transcript| transcript.remove(message));
    if !removed {
        debug!(%room, message = message.0, "retracted message already gone");
    }
    Ok(())
}

impl Outbox {
    pub fn new(limit: usize) -> Self {
        Self {
            limit: limit.max(1),
            rooms: Arc::new(Mutex::new(HashMap::new())),
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// Record a message a user posted, so it can later be retracted.
    pub fn record_inbound(
        &self,
        room: RoomId,
        message: MessageId,
        user: UserId,
        username: &str,
        text: String,
        at_ms: u64,
    ) -> anyhow::Result<()> {
        let mut rooms = self
            .rooms
            .lock()
            .map_err(|_| anyhow::anyhow!("outbox poisoned"))?;
        rooms.entry(room).or_default().push(
            Entry {
                id: message,
                author: Author::User {
                    id: user,
                    username: username.to_string(),
                },
                text,
                at_ms,
            },
            self.limit,
        );
        Ok(())
    }

    /// Messages currently visible in `room`, oldest first.
    pub fn messages(&self, room: RoomId) -> Vec<Entry> {
        match self.rooms.lock() {
            Ok(rooms) => rooms
                .get(&room)
                .map(|transcript| transcript.entries.iter().cloned().collect())
                .unwrap_or_default(),
            Err(_) => Vec::new(),
        }
    }

    /// Number of scheduled deliveries that have not run yet.
    pub fn pending_tasks(&self) -> usize {
        match self.tasks.lock() {
            Ok(mut tasks) => {
                tasks.retain(|task| !task.is_finished());
                tasks.len()
            }
            Err(_) => 0,
        }
    }

    /// Abort every scheduled delivery.
    pub fn shutdown(&self) {
        let Ok(mut tasks) = self.tasks.lock() else {
            return;
        };
        let pending = tasks.len();
        for task in tasks.drain(..) {
            task.abort();
        }
        if pending > 0 {
            warn!(pending, "dropped scheduled deliveries on shutdown");
        }
    }

    fn schedule(
        &self,
        after: Duration,
        job: impl FnOnce(&Rooms) -> anyhow::Result<()> + Send + 'static,
    ) -> anyhow::Result<()> {
        let rooms = self.rooms.clone();
        let task = tokio::spawn(async move {
            tokio::time::sleep(after).await;
            if let Err(err) = job(&rooms) {
                warn!(?err, "scheduled delivery failed");
            }
        });
        let mut tasks = self
            .tasks
            .lock()
            .map_err(|_| anyhow::anyhow!("outbox tasks poisoned"))?;
        tasks.retain(|task| !task.is_finished());
        tasks.push(task);
        Ok(())
    }
}

impl Notifier for Outbox {
    async fn send(&self, room: RoomId, text: String) -> anyhow::Result<MessageId> {
        bot_message(&self.rooms, room, text, self.limit)
    }

    async fn send_delayed(
        &self,
        room: RoomId,
        text: String,
        after: Duration,
    ) -> anyhow::Result<()> {
        if after.is_zero() {
            return bot_message(&self.rooms, room, text, self.limit).map(|_| ());
        }
        let limit = self.limit;
        self.schedule(after, move |rooms| {
            bot_message(rooms, room, text, limit).map(|_| ())
        })
    }

    async fn retract(
        &self,
        room: RoomId,
        message: MessageId,
        after: Duration,
    ) -> anyhow::Result<()> {
        if after.is_zero() {
            return remove_message(&self.rooms, room, message);
        }
        self.schedule(after, move |rooms| remove_message(rooms, room, message))
    }
}

impl Drop for Outbox {
    fn drop(&mut self) {
        if let Ok(tasks) = self.tasks.get_mut() {
            for task in tasks.drain(..) {
                task.abort();
            }
        }
    }
}
