use anyhow::{anyhow, Context, Result};
use commonware_codec::{DecodeExt, Encode};
use rusqlite::{params, Connection, OptionalExtension};
use spinduel_execution::{State, Status};
use spinduel_types::{Key, RoomId, UserId, Value};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::info;

/// Ledger rows kept in SQLite. A change set is applied inside one SQL
/// transaction.
pub struct SqliteState {
    conn: Mutex<Connection>,
}

fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "PRAGMA journal_mode=WAL;
         PRAGMA synchronous=NORMAL;
         CREATE TABLE IF NOT EXISTS ledger_records (
             room_id INTEGER NOT NULL,
             kind INTEGER NOT NULL,
             user_id INTEGER NOT NULL,
             value BLOB NOT NULL,
             PRIMARY KEY (room_id, kind, user_id)
         );",
    )
    .context("init ledger schema")?;
    Ok(())
}

fn decode_value(bytes: Vec<u8>) -> Result<Value> {
    Value::decode(bytes.as_slice()).context("decode ledger value")
}

fn upsert(conn: &Connection, key: &Key, value: &Value) -> Result<()> {
    conn.execute(
        "INSERT INTO ledger_records (room_id, kind, user_id, value) VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT (room_id, kind, user_id) DO UPDATE SET value = excluded.value",
        params![key.room().0, key.tag(), key.user().0, value.encode().to_vec()],
    )
    .context("upsert ledger record")?;
    Ok(())
}

fn remove(conn: &Connection, key: &Key) -> Result<()> {
    conn.execute(
        "DELETE FROM ledger_records WHERE room_id = ?1 AND kind = ?2 AND user_id = ?3",
        params![key.room().0, key.tag(), key.user().0],
    )
    .context("delete ledger record")?;
    Ok(())
}

impl SqliteState {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path).context("open ledger db")?;
        init_schema(&conn)?;
        info!(path = %path.display(), "ledger database opened");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("open in-memory ledger db")?;
        init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow!("ledger connection poisoned"))
    }
}

impl State for SqliteState {
    async fn get(&self, key: &Key) -> Result<Option<Value>> {
        let bytes: Option<Vec<u8>> = self
            .conn()?
            .query_row(
                "SELECT value FROM ledger_records WHERE room_id = ?1 AND kind = ?2 AND user_id = ?3",
                params![key.room().0, key.tag(), key.user().0],
                |row| row.get(0),
            )
            .optional()
            .context("query ledger record")?;
        bytes.map(decode_value).transpose()
    }

    async fn insert(&mut self, key: Key, value: Value) -> Result<()> {
        let conn = self.conn()?;
        upsert(&conn, &key, &value)
    }

    async fn delete(&mut self, key: &Key) -> Result<()> {
        let conn = self.conn()?;
        remove(&conn, key)
    }

    async fn scan_room(&self, room: RoomId) -> Result<Vec<(Key, Value)>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT kind, user_id, value FROM ledger_records
                 WHERE room_id = ?1 ORDER BY kind, user_id",
            )
            .context("prepare room scan")?;
        let rows = stmt
            .query_map(params![room.0], |row| {
                Ok((
                    row.get::<_, u8>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, Vec<u8>>(2)?,
                ))
            })
            .context("scan room records")?;

        let mut out = Vec::new();
        for row in rows {
            let (kind, user, bytes) = row.context("read room record")?;
            let key = Key::from_parts(kind, room, UserId(user)).context("decode ledger key")?;
            out.push((key, decode_value(bytes)?));
        }
        Ok(out)
    }

    async fn apply(&mut self, changes: Vec<(Key, Status)>) -> Result<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().context("begin ledger transaction")?;
        for (key, status) in &changes {
            match status {
                Status::Update(value) => upsert(&tx, key, value)?,
                Status::Delete => remove(&tx, key)?,
            }
        }
        tx.commit().context("commit ledger transaction")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spinduel_execution::{Ledger, StateLedger};
    use spinduel_types::{BalanceRecord, PlayerRecord, StatsDelta, Symbol};

    const ROOM: RoomId = RoomId(-55);

    #[tokio::test]
    async fn test_rows_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.db");
        {
            let ledger = StateLedger::new(SqliteState::open(&path).unwrap());
            ledger.get_or_create_player(UserId(1), ROOM, "alice").await.unwrap();
            ledger.get_or_create_balance(UserId(1), ROOM).await.unwrap();
            ledger
                .apply_delta(UserId(1), ROOM, StatsDelta::won(Symbol::Lemon), 20, 77)
                .await
                .unwrap();
        }

        let ledger = StateLedger::new(SqliteState::open(&path).unwrap());
        let player = ledger.get_player(UserId(1), ROOM).await.unwrap();
        assert_eq!(player.username, "alice");
        assert_eq!(player.statistics.lemon_wins, 1);
        assert_eq!(player.last_played_at_ms, 77);
        assert_eq!(ledger.get_balance(UserId(1), ROOM).await.unwrap().amount, 20);
    }

    #[tokio::test]
    async fn test_scan_room_is_scoped() {
        let mut state = SqliteState::in_memory().unwrap();
        let mut changes = Vec::new();
        for (user, room) in [(1, ROOM), (2, ROOM), (3, RoomId(9))] {
            let user = UserId(user);
            changes.push((
                Key::player(user, room),
                Status::Update(Value::Player(PlayerRecord::new(user, room, ""))),
            ));
            changes.push((
                Key::balance(user, room),
                Status::Update(Value::Balance(BalanceRecord::new(user, room))),
            ));
        }
        state.apply(changes).await.unwrap();

        let rows = state.scan_room(ROOM).await.unwrap();
        assert_eq!(rows.len(), 4);
        assert!(rows.iter().all(|(key, _)| key.room() == ROOM));

        state.delete(&Key::player(UserId(1), ROOM)).await.unwrap();
        assert_eq!(state.get(&Key::player(UserId(1), ROOM)).await.unwrap(), None);
        assert_eq!(state.scan_room(ROOM).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_apply_rolls_back_on_error() {
        let mut state = SqliteState::in_memory().unwrap();
        let user = UserId(4);
        let key = Key::balance(user, ROOM);
        state
            .insert(
                key,
                Value::Balance(BalanceRecord {
                    user,
                    room: ROOM,
                    amount: 5,
                }),
            )
            .await
            .unwrap();

        // Updates to user 99 abort, so the second change fails after the first ran.
        state
            .conn()
            .unwrap()
            .execute_batch(
                "CREATE TRIGGER reject_user BEFORE UPDATE ON ledger_records
                 WHEN NEW.user_id = 99
                 BEGIN SELECT RAISE(ABORT, 'rejected'); END;",
            )
            .unwrap();
        let other = UserId(99);
        state
            .insert(
                Key::balance(other, ROOM),
                Value::Balance(BalanceRecord::new(other, ROOM)),
            )
            .await
            .unwrap();

        let result = state
            .apply(vec![
                (
                    key,
                    Status::Update(Value::Balance(BalanceRecord {
                        user,
                        room: ROOM,
                        amount: 500,
                    })),
                ),
                (
                    Key::balance(other, ROOM),
                    Status::Update(Value::Balance(BalanceRecord {
                        user: other,
                        room: ROOM,
                        amount: -500,
                    })),
                ),
            ])
            .await;
        assert!(result.is_err());
        match state.get(&key).await.unwrap() {
            Some(Value::Balance(balance)) => assert_eq!(balance.amount, 5),
            other => panic!("unexpected value: {other:?}"),
        }
    }
}
