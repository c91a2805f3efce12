use super::*;
use commonware_codec::{Encode, ReadExt, Write};

fn sample_player() -> PlayerRecord {
    let mut player = PlayerRecord::new(UserId(7), RoomId(-100), "alice");
    player.statistics = Statistics {
        total_games: 12,
        bar_wins: 1,
        cherry_wins: 2,
        lemon_wins: 0,
        seven_wins: 1,
    };
    player.last_played_at_ms = 1_700_000_000_000;
    player
}

#[test]
fn test_score_derived_from_counters() {
    let player = sample_player();
    assert_eq!(player.score(), 100 + 50 + 2 * 10);
    assert_eq!(PlayerRecord::default().score(), 0);
}

#[test]
fn test_statistics_apply_counts_every_game() {
    let mut stats = Statistics::default();
    stats.apply(&StatsDelta::played());
    stats.apply(&StatsDelta::won(Symbol::Lemon));
    stats.apply(&StatsDelta::won(Symbol::Seven));
    assert_eq!(stats.total_games, 3);
    assert_eq!(stats.wins(Symbol::Lemon), 1);
    assert_eq!(stats.wins(Symbol::Seven), 1);
    assert_eq!(stats.wins(Symbol::Bar), 0);
    assert_eq!(stats.score(), 120);
}

#[test]
fn test_symbol_try_from() {
    assert_eq!(Symbol::try_from(0), Ok(Symbol::Bar));
    assert_eq!(Symbol::try_from(3), Ok(Symbol::Seven));
    assert_eq!(Symbol::try_from(4), Err(UnknownSymbol(4)));
    assert_eq!(Symbol::Seven.payout(), SEVEN_PAYOUT);
    assert_eq!(Symbol::Cherry.payout(), CHERRY_PAYOUT);
}

#[test]
fn test_display_name_fallback() {
    let player = PlayerRecord::new(UserId(42), RoomId(1), "");
    assert_eq!(player.display_name(), "User_42");
    assert_eq!(sample_player().display_name(), "alice");
}

#[test]
fn test_player_value_roundtrip() {
    let value = Value::Player(sample_player());
    let encoded = value.encode();
    assert_eq!(encoded.len(), commonware_codec::EncodeSize::encode_size(&value));
    let decoded = Value::read(&mut &encoded[..]).unwrap();
    assert_eq!(value, decoded);
}

#[test]
fn test_negative_balance_roundtrip() {
    let value = Value::Balance(BalanceRecord {
        user: UserId(1),
        room: RoomId(-5),
        amount: -250,
    });
    let encoded = value.encode();
    let decoded = Value::read(&mut &encoded[..]).unwrap();
    assert_eq!(value, decoded);
}

#[test]
fn test_key_rejects_unknown_tag() {
    let mut buf = Vec::new();
    9u8.write(&mut buf);
    RoomId(1).write(&mut buf);
    UserId(2).write(&mut buf);
    assert!(Key::read(&mut &buf[..]).is_err());

    let key = Key::balance(UserId(2), RoomId(1));
    let decoded = Key::read(&mut &key.encode()[..]).unwrap();
    assert_eq!(key, decoded);
    assert_eq!(decoded.room(), RoomId(1));
    assert_eq!(decoded.user(), UserId(2));
}

#[test]
fn test_player_rejects_long_name() {
    let player = PlayerRecord::new(UserId(1), RoomId(1), "x".repeat(MAX_NAME_LENGTH + 1));
    let encoded = player.encode();
    assert!(PlayerRecord::read(&mut &encoded[..]).is_err());
}

#[test]
fn test_pending_duel_liveness() {
    let duel = PendingDuel {
        room: RoomId(1),
        initiator: UserId(1),
        target: UserId(2),
        initiator_name: "a".into(),
        target_name: "b".into(),
        expires_at_ms: 1_000,
    };
    assert!(duel.is_live(999));
    assert!(!duel.is_live(1_000));
}

#[test]
fn test_ids_serialize_transparently() {
    let balance = BalanceRecord {
        user: UserId(3),
        room: RoomId(-9),
        amount: 15,
    };
    let json = serde_json::to_value(balance).unwrap();
    assert_eq!(json["user"], 3);
    assert_eq!(json["room"], -9);
}
