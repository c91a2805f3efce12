use spinduel_types::{PendingDuel, RoomId, UserId, DUEL_TTL_MS};
use std::collections::HashMap;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::debug;

/// Rejections from the registry. The display text is what the room sees.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DuelError {
    #[error("You cannot duel yourself!")]
    SelfDuel,
    #[error("The target is too poor to be challenged")]
    TargetUnavailable,
    #[error("There is already a pending duel in this group.")]
    AlreadyPending,
    #[error("No pending duel in this group.")]
    NoPendingDuel,
    #[error("This duel is not for you!")]
    NotTarget,
    #[error("You didn't initiate this duel!")]
    NotInitiator,
}

/// A request to open a duel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Challenge {
    pub room: RoomId,
    pub initiator: UserId,
    pub initiator_name: String,
    pub target: UserId,
    pub target_name: String,
    /// Target's balance when the challenge was issued.
    pub target_balance: i64,
}

/// At most one pending duel per room.
///
/// Every transition runs under one lock. Expired duels are only noticed
/// when a room is next touched; there is no timer.
pub struct DuelRegistry {
    ttl_ms: u64,
    duels: Mutex<HashMap<RoomId, PendingDuel>>,
}

impl Default for DuelRegistry {
    fn default() -> Self {
        Self::new(DUEL_TTL_MS)
    }
}

fn target_only(actor: UserId) -> impl FnOnce(&PendingDuel) -> Result<(), DuelError> {
    move |duel| {
        (duel.target == actor)
            .then_some(())
            .ok_or(DuelError::NotTarget)
    }
}

fn initiator_only(actor: UserId) -> impl FnOnce(&PendingDuel) -> Result<(), DuelError> {
    move |duel| {
        (duel.initiator == actor)
            .then_some(())
            .ok_or(DuelError::NotInitiator)
    }
}

/// Live duel for `room`, dropping it first if it has lapsed.
fn live(
    duels: &mut HashMap<RoomId, PendingDuel>,
    room: RoomId,
    now_ms: u64,
) -> Option<&PendingDuel> {
    if duels.get(&room).is_some_and(|duel| !duel.is_live(now_ms)) {
        debug!(%room, "purging expired duel");
        duels.remove(&room);
    }
    duels.get(&room)
}

impl DuelRegistry {
    pub fn new(ttl_ms: u64) -> Self {
        Self {
            ttl_ms,
            duels: Mutex::new(HashMap::new()),
        }
    }

    pub fn ttl_ms(&self) -> u64 {
        self.ttl_ms
    }

    pub async fn challenge(
        &self,
        challenge: Challenge,
        now_ms: u64,
    ) -> Result<PendingDuel, DuelError> {
        if challenge.initiator == challenge.target {
            return Err(DuelError::SelfDuel);
        }
        if challenge.target_balance <= 0 {
            return Err(DuelError::TargetUnavailable);
        }

        let mut duels = self.duels.lock().await;
        if live(&mut duels, challenge.room, now_ms).is_some() {
            return Err(DuelError::AlreadyPending);
        }
        let duel = PendingDuel {
            room: challenge.room,
            initiator: challenge.initiator,
            target: challenge.target,
            initiator_name: challenge.initiator_name,
            target_name: challenge.target_name,
            expires_at_ms: now_ms.saturating_add(self.ttl_ms),
        };
        duels.insert(duel.room, duel.clone());
        Ok(duel)
    }

    /// Claim the room's duel for resolution. The entry is gone once this
    /// returns, so a new challenge can be issued while the result is
    /// being settled.
    pub async fn accept(
        &self,
        room: RoomId,
        actor: UserId,
        now_ms: u64,
    ) -> Result<PendingDuel, DuelError> {
        self.remove_if(room, now_ms, target_only(actor)).await
    }

    pub async fn decline(
        &self,
        room: RoomId,
        actor: UserId,
        now_ms: u64,
    ) -> Result<PendingDuel, DuelError> {
        self.remove_if(room, now_ms, target_only(actor)).await
    }

    pub async fn cancel(
        &self,
        room: RoomId,
        actor: UserId,
        now_ms: u64,
    ) -> Result<PendingDuel, DuelError> {
        self.remove_if(room, now_ms, initiator_only(actor)).await
    }

    /// Snapshot of the room's live duel, if any.
    pub async fn pending(&self, room: RoomId, now_ms: u64) -> Option<PendingDuel> {
        let mut duels = self.duels.lock().await;
        live(&mut duels, room, now_ms).cloned()
    }

    async fn remove_if(
        &self,
        room: RoomId,
        now_ms: u64,
        check: impl FnOnce(&PendingDuel) -> Result<(), DuelError>,
    ) -> Result<PendingDuel, DuelError> {
        let mut duels = self.duels.lock().await;
        let duel = live(&mut duels, room, now_ms).ok_or(DuelError::NoPendingDuel)?;
        check(duel)?;
        duels.remove(&room).ok_or(DuelError::NoPendingDuel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    const ROOM: RoomId = RoomId(-42);
    const ALICE: UserId = UserId(1);
    const BOB: UserId = UserId(2);
    const CAROL: UserId = UserId(3);

    fn challenge(initiator: UserId, target: UserId, balance: i64) -> Challenge {
        Challenge {
            room: ROOM,
            initiator,
            initiator_name: format!("user{}", initiator.0),
            target,
            target_name: format!("user{}", target.0),
            target_balance: balance,
        }
    }

    #[tokio::test]
    async fn test_challenge_opens_duel_with_ttl() {
        let registry = DuelRegistry::default();
        let duel = registry.challenge(challenge(ALICE, BOB, 10), 1_000).await.unwrap();
        assert_eq!(duel.expires_at_ms, 1_000 + DUEL_TTL_MS);
        assert_eq!(registry.pending(ROOM, 1_001).await, Some(duel));
    }

    #[tokio::test]
    async fn test_challenge_validation() {
        let registry = DuelRegistry::default();
        assert_eq!(
            registry.challenge(challenge(ALICE, ALICE, 10), 0).await,
            Err(DuelError::SelfDuel)
        );
        assert_eq!(
            registry.challenge(challenge(ALICE, BOB, 0), 0).await,
            Err(DuelError::TargetUnavailable)
        );
        assert_eq!(
            registry.challenge(challenge(ALICE, BOB, -5), 0).await,
            Err(DuelError::TargetUnavailable)
        );
        assert_eq!(registry.pending(ROOM, 0).await, None);
    }

    #[tokio::test]
    async fn test_one_live_duel_per_room() {
        let registry = DuelRegistry::new(100);
        registry.challenge(challenge(ALICE, BOB, 10), 0).await.unwrap();
        assert_eq!(
            registry.challenge(challenge(CAROL, BOB, 10), 99).await,
            Err(DuelError::AlreadyPending)
        );

        // Other rooms are independent.
        let mut elsewhere = challenge(CAROL, BOB, 10);
        elsewhere.room = RoomId(7);
        assert!(registry.challenge(elsewhere, 99).await.is_ok());

        // Lapsed duels are replaced in the same call.
        let replaced = registry.challenge(challenge(CAROL, ALICE, 10), 100).await.unwrap();
        assert_eq!(replaced.initiator, CAROL);
    }

    #[tokio::test]
    async fn test_concurrent_challenges_admit_one() {
        let registry = Arc::new(DuelRegistry::default());
        let mut handles = Vec::new();
        for initiator in 10..20 {
            let registry = registry.clone();
            handles.push(tokio::spawn(async move {
                registry
                    .challenge(challenge(UserId(initiator), BOB, 10), 0)
                    .await
            }));
        }
        let mut admitted = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => admitted += 1,
                Err(err) => assert_eq!(err, DuelError::AlreadyPending),
            }
        }
        assert_eq!(admitted, 1);
    }

    #[tokio::test]
    async fn test_actor_checks() {
        let registry = DuelRegistry::default();
        registry.challenge(challenge(ALICE, BOB, 10), 0).await.unwrap();

        assert_eq!(registry.accept(ROOM, ALICE, 1).await, Err(DuelError::NotTarget));
        assert_eq!(registry.accept(ROOM, CAROL, 1).await, Err(DuelError::NotTarget));
        assert_eq!(registry.decline(ROOM, CAROL, 1).await, Err(DuelError::NotTarget));
        assert_eq!(registry.cancel(ROOM, BOB, 1).await, Err(DuelError::NotInitiator));
        assert!(registry.pending(ROOM, 1).await.is_some());

        let accepted = registry.accept(ROOM, BOB, 1).await.unwrap();
        assert_eq!(accepted.initiator, ALICE);
        assert_eq!(registry.pending(ROOM, 1).await, None);
        assert_eq!(registry.accept(ROOM, BOB, 1).await, Err(DuelError::NoPendingDuel));
    }

    #[tokio::test]
    async fn test_decline_and_cancel_clear_room() {
        let registry = DuelRegistry::default();
        registry.challenge(challenge(ALICE, BOB, 10), 0).await.unwrap();
        registry.decline(ROOM, BOB, 1).await.unwrap();
        assert_eq!(registry.pending(ROOM, 1).await, None);

        registry.challenge(challenge(ALICE, BOB, 10), 2).await.unwrap();
        registry.cancel(ROOM, ALICE, 3).await.unwrap();
        assert_eq!(registry.cancel(ROOM, ALICE, 3).await, Err(DuelError::NoPendingDuel));
    }

    #[tokio::test]
    async fn test_expired_duel_is_purged_on_access() {
        let registry = DuelRegistry::new(10);
        registry.challenge(challenge(ALICE, BOB, 10), 0).await.unwrap();
        assert_eq!(registry.accept(ROOM, BOB, 10).await, Err(DuelError::NoPendingDuel));
        assert_eq!(registry.pending(ROOM, 0).await, None);

        registry.challenge(challenge(ALICE, BOB, 10), 20).await.unwrap();
        assert_eq!(registry.decline(ROOM, BOB, 31).await, Err(DuelError::NoPendingDuel));
        registry.challenge(challenge(ALICE, BOB, 10), 40).await.unwrap();
        assert_eq!(registry.cancel(ROOM, ALICE, 50).await, Err(DuelError::NoPendingDuel));
    }

    #[tokio::test]
    async fn test_new_challenge_allowed_after_accept() {
        let registry = DuelRegistry::default();
        registry.challenge(challenge(ALICE, BOB, 10), 0).await.unwrap();
        let snapshot = registry.accept(ROOM, BOB, 1).await.unwrap();
        // Resolution of `snapshot` would be in flight here.
        registry.challenge(challenge(CAROL, ALICE, 10), 2).await.unwrap();
        assert_eq!(snapshot.target, BOB);
    }
}
