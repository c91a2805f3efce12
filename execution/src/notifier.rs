use spinduel_types::{MessageId, RoomId};
use std::future::Future;
use std::time::Duration;

/// Delivers text to chat rooms.
///
/// Delivery is fire-and-forget from the ledger's point of view: callers log
/// failures and never roll back committed state because of them.
pub trait Notifier: Send + Sync {
    /// Post `text` to `room` now.
    fn send(
        &self,
        room: RoomId,
        text: String,
    ) -> impl Future<Output = anyhow::Result<MessageId>> + Send;

    /// Post `text` to `room` once `after` has elapsed.
    fn send_delayed(
        &self,
        room: RoomId,
        text: String,
        after: Duration,
    ) -> impl Future<Output = anyhow::Result<()>> + Send;

    /// Remove `message` from `room` once `after` has elapsed.
    fn retract(
        &self,
        room: RoomId,
        message: MessageId,
        after: Duration,
    ) -> impl Future<Output = anyhow::Result<()>> + Send;
}
