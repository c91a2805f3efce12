use axum::{
    http::{header, HeaderValue, Method},
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::Simulator;

mod http;

pub use http::{ChatUpdate, Dice, Sender, UpdateResponse};

pub struct Api {
    simulator: Arc<Simulator>,
}

impl Api {
    pub fn new(simulator: Arc<Simulator>) -> Self {
        Self { simulator }
    }

    pub fn router(&self) -> Router {
        let allowed_origins = &self.simulator.config().allowed_origins;
        let allow_any_origin = allowed_origins.iter().any(|origin| origin == "*");
        let cors_origins = allowed_origins
            .iter()
            .filter(|origin| *origin != "*")
            .filter_map(|origin| match HeaderValue::from_str(origin) {
                Ok(value) => Some(value),
                Err(_) => {
                    tracing::warn!("Invalid origin in allowed_origins: {}", origin);
                    None
                }
            })
            .collect::<Vec<_>>();

        let cors = if allow_any_origin {
            CorsLayer::new().allow_origin(AllowOrigin::any())
        } else {
            CorsLayer::new().allow_origin(AllowOrigin::list(cors_origins))
        }
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

        Router::new()
            .route("/healthz", get(http::healthz))
            .route("/updates", post(http::post_update))
            .route("/rooms/:room/messages", get(http::room_messages))
            .route("/rooms/:room/duel", get(http::room_duel))
            .layer(cors)
            .layer(TraceLayer::new_for_http())
            .with_state(self.simulator.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Config, Entry};
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use serde_json::{json, Value};
    use spinduel_execution::Ledger as _;
    use spinduel_types::RoomId;
    use tower::ServiceExt;

    const ROOM: i64 = -100;

    fn simulator() -> Arc<Simulator> {
        let config = Config {
            deterministic_seed: Some(7),
            reveal_delay_ms: 0,
            retract_delay_ms: 0,
            ..Default::default()
        }
        .validate()
        .unwrap();
        Arc::new(Simulator::new(config).unwrap())
    }

    async fn read_json(response: axum::response::Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn post_update(router: &Router, update: Value) -> UpdateResponse {
        let response = router
            .clone()
            .oneshot(
                Request::post("/updates")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(update.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        serde_json::from_value(read_json(response).await).unwrap()
    }

    fn text(message_id: i64, user: i64, username: &str, text: &str) -> Value {
        json!({
            "room_id": ROOM,
            "message_id": message_id,
            "date": 1_700_000_000u64,
            "from": {"id": user, "username": username},
            "text": text,
        })
    }

    fn spin(message_id: i64, user: i64, username: &str, value: u64) -> Value {
        json!({
            "room_id": ROOM,
            "message_id": message_id,
            "date": 1_700_000_000u64,
            "from": {"id": user, "username": username},
            "dice": {"emoji": "🎰", "value": value},
        })
    }

    #[tokio::test]
    async fn test_healthz() {
        let router = Api::new(simulator()).router();
        let response = router
            .oneshot(Request::get("/healthz").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(read_json(response).await, json!({"ok": true}));
    }

    #[tokio::test]
    async fn test_spins_and_balances() {
        let simulator = simulator();
        let router = Api::new(simulator.clone()).router();

        let response = post_update(&router, spin(1, 10, "alice", 64)).await;
        assert_eq!(
            response,
            UpdateResponse {
                handled: true,
                reply: None
            }
        );
        // A losing spin is retracted straight away with a zero delay.
        post_update(&router, spin(2, 10, "alice", 2)).await;

        let response = post_update(&router, text(3, 10, "alice", "/balance")).await;
        assert_eq!(response.reply.as_deref(), Some("1. alice - 100$"));

        let response = post_update(&router, text(10, 10, "alice", "good luck")).await;
        assert!(!response.handled);

        let messages = simulator.outbox().messages(RoomId(ROOM));
        let ids: Vec<i64> = messages.iter().map(|entry: &Entry| entry.id.0).collect();
        assert_eq!(ids, vec![1, 3, 4, 10]);
    }

    #[tokio::test]
    async fn test_duel_round_trip() {
        let simulator = simulator();
        let router = Api::new(simulator.clone()).router();

        post_update(&router, spin(1, 10, "alice", 64)).await;
        post_update(&router, spin(2, 20, "bob", 22)).await;

        let response = post_update(&router, text(3, 10, "alice", "/duel @bob")).await;
        let announcement = response.reply.unwrap();
        assert!(announcement.starts_with("@alice (100$) has challenged @bob (10$)"));

        let response = router
            .clone()
            .oneshot(
                Request::get(format!("/rooms/{ROOM}/duel"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let duel = read_json(response).await;
        assert_eq!(duel["duel"]["target_name"], "bob");

        let response = post_update(&router, text(4, 20, "bob", "/acceptDuel")).await;
        assert_eq!(response.reply, None);

        let balances = simulator
            .casino()
            .ledger()
            .list_balances_by_room(RoomId(ROOM))
            .await
            .unwrap();
        let total: i64 = balances.iter().map(|balance| balance.amount).sum();
        assert_eq!(total, 110);
        assert!(balances.iter().any(|balance| balance.amount == 0));

        let response = router
            .clone()
            .oneshot(
                Request::get(format!("/rooms/{ROOM}/messages"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let messages = read_json(response).await;
        let last = messages.as_array().unwrap().last().unwrap().clone();
        assert_eq!(last["author"]["kind"], "bot");
        assert!(last["text"].as_str().unwrap().starts_with("🎲 "));
    }

    #[tokio::test]
    async fn test_rejects_oversized_username() {
        let router = Api::new(simulator()).router();
        let response = router
            .oneshot(
                Request::post("/updates")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(
                        text(1, 1, &"x".repeat(100), "/stats").to_string(),
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }
}
