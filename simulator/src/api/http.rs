use axum::{
    extract::{Path, State as AxumState},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use spinduel_execution::{Clock, Command, Envelope, SystemClock};
use spinduel_types::{MessageId, PendingDuel, RoomId, UserId, MAX_NAME_LENGTH};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::Simulator;

#[derive(Serialize)]
struct HealthzResponse {
    ok: bool,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Sender {
    pub id: i64,
    #[serde(default)]
    pub username: Option<String>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Dice {
    pub emoji: String,
    pub value: u64,
}

/// A chat message as delivered by the platform.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ChatUpdate {
    pub room_id: i64,
    pub message_id: i64,
    /// Unix seconds.
    pub date: u64,
    pub from: Sender,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub dice: Option<Dice>,
}

impl ChatUpdate {
    fn username(&self) -> &str {
        self.from.username.as_deref().unwrap_or_default()
    }

    fn envelope(&self) -> Envelope {
        Envelope {
            room: RoomId(self.room_id),
            user: UserId(self.from.id),
            username: self.username().to_string(),
            message: MessageId(self.message_id),
            sent_at_ms: self.date.saturating_mul(1_000),
        }
    }

    /// Dice take precedence over text, as a dice message has no text.
    fn command(&self) -> Option<Command> {
        match (&self.dice, &self.text) {
            (Some(dice), _) => Command::from_dice(&dice.emoji, dice.value),
            (None, Some(text)) => Command::parse(text),
            (None, None) => None,
        }
    }

    fn transcript_text(&self) -> String {
        match (&self.dice, &self.text) {
            (Some(dice), _) => dice.emoji.clone(),
            (None, Some(text)) => text.clone(),
            (None, None) => String::new(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct UpdateResponse {
    pub handled: bool,
    pub reply: Option<String>,
}

#[derive(Serialize)]
struct DuelResponse {
    duel: Option<PendingDuel>,
}

pub(super) async fn healthz() -> Response {
    Json(HealthzResponse { ok: true }).into_response()
}

pub(super) async fn post_update(
    AxumState(simulator): AxumState<Arc<Simulator>>,
    Json(update): Json<ChatUpdate>,
) -> Response {
    if update.username().len() > MAX_NAME_LENGTH {
        return (StatusCode::UNPROCESSABLE_ENTITY, "username too long").into_response();
    }

    let envelope = update.envelope();
    if let Err(err) = simulator.outbox().record_inbound(
        envelope.room,
        envelope.message,
        envelope.user,
        &envelope.username,
        update.transcript_text(),
        envelope.sent_at_ms,
    ) {
        warn!(?err, room = %envelope.room, "failed to record inbound message");
    }

    let Some(command) = update.command() else {
        return Json(UpdateResponse {
            handled: false,
            reply: None,
        })
        .into_response();
    };
    debug!(room = %envelope.room, user = %envelope.user, ?command, "dispatching command");
    let reply = simulator.casino().handle(&envelope, command).await;
    Json(UpdateResponse {
        handled: true,
        reply,
    })
    .into_response()
}

pub(super) async fn room_messages(
    AxumState(simulator): AxumState<Arc<Simulator>>,
    Path(room): Path<i64>,
) -> Response {
    Json(simulator.outbox().messages(RoomId(room))).into_response()
}

pub(super) async fn room_duel(
    AxumState(simulator): AxumState<Arc<Simulator>>,
    Path(room): Path<i64>,
) -> Response {
    let duel = simulator
        .casino()
        .registry()
        .pending(RoomId(room), SystemClock.now_ms())
        .await;
    Json(DuelResponse { duel }).into_response()
}
