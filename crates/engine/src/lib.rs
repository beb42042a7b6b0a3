use anyhow::Context;
use deepsk_protocol::{messages, Coupon, Task, TaskId, User};
use rusqlite::{Connection, OpenFlags, OptionalExtension};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis()
        .try_into()
        .unwrap_or(i64::MAX)
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{}", messages::MISSING_USERNAME)]
    MissingUsername,
    #[error("{}", messages::TASK_NOT_FOUND)]
    TaskNotFound,
    #[error("{}", messages::ALREADY_COMPLETED)]
    AlreadyCompleted,
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Clone)]
pub struct Engine {
    db_path: PathBuf,
}

impl Engine {
    pub fn new(db_path: impl Into<PathBuf>) -> Self {
        Self {
            db_path: db_path.into(),
        }
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    pub fn open(&self) -> anyhow::Result<Connection> {
        let path = self.db_path.clone();
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("create db dir: {}", dir.display()))?;
        }

        let conn = Connection::open_with_flags(
            &path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .with_context(|| format!("open sqlite db: {}", path.display()))?;

        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;

        migrate(&conn)?;
        Ok(conn)
    }

    /// Returns the user with this name, creating it on first sight.
    pub fn login(&self, username: &str) -> StoreResult<User> {
        let name = normalize_username(username)?;
        let mut conn = self.open()?;
        let tx = conn.transaction()?;
        let user = ensure_user_tx(&tx, name)?;
        tx.commit()?;
        Ok(user)
    }

    pub fn find_user(&self, username: &str) -> StoreResult<Option<User>> {
        let name = normalize_username(username)?;
        let conn = self.open()?;
        find_user(&conn, name)
    }

    pub fn list_tasks(&self) -> StoreResult<Vec<Task>> {
        let conn = self.open()?;
        let mut stmt =
            conn.prepare("SELECT id, name, title, reward, x, y FROM tasks ORDER BY id ASC")?;
        let rows = stmt.query_map([], task_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn get_task(&self, id: TaskId) -> StoreResult<Option<Task>> {
        let conn = self.open()?;
        find_task(&conn, id)
    }

    /// Inserts or replaces tasks by id. Coupons keep the task name they were
    /// issued under.
    pub fn upsert_tasks(&self, tasks: &[Task]) -> StoreResult<usize> {
        let mut conn = self.open()?;
        let tx = conn.transaction()?;
        let ts = now_ms();
        for t in tasks {
            tx.execute(
                "INSERT INTO tasks (id, name, title, reward, x, y, updated_at_ms)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                 ON CONFLICT(id) DO UPDATE SET
                   name = excluded.name,
                   title = excluded.title,
                   reward = excluded.reward,
                   x = excluded.x,
                   y = excluded.y,
                   updated_at_ms = excluded.updated_at_ms",
                (t.id, &t.name, &t.title, &t.reward, t.x, t.y, ts),
            )?;
            append_event_tx(
                &tx,
                "task.upserted",
                Some(&format!("task:{}", t.id)),
                serde_json::json!({ "id": t.id, "name": t.name, "x": t.x, "y": t.y }),
            )?;
        }
        tx.commit()?;
        Ok(tasks.len())
    }

    /// Issues the coupon for `task_id` to `username`. A user completes each
    /// task at most once; a name seen here for the first time is registered
    /// as if it had logged in.
    pub fn complete_task(&self, task_id: TaskId, username: &str) -> StoreResult<Coupon> {
        let name = normalize_username(username)?;
        let mut conn = self.open()?;
        let tx = conn.transaction()?;

        let task = find_task(&tx, task_id)?.ok_or(StoreError::TaskNotFound)?;
        let user = ensure_user_tx(&tx, name)?;

        let done: bool = tx.query_row(
            "SELECT EXISTS(SELECT 1 FROM coupons WHERE user_id = ?1 AND task_id = ?2)",
            (user.id, task.id),
            |row| row.get(0),
        )?;
        if done {
            return Err(StoreError::AlreadyCompleted);
        }

        let ts = now_ms();
        let reward = task.reward_text();
        let inserted = tx.execute(
            "INSERT INTO coupons (user_id, task_id, task_name, reward, issued_at_ms)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            (user.id, task.id, &task.name, &reward, ts),
        );
        match inserted {
            Ok(_) => {}
            Err(rusqlite::Error::SqliteFailure(e, _))
                if e.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                return Err(StoreError::AlreadyCompleted);
            }
            Err(e) => return Err(e.into()),
        }
        let id = tx.last_insert_rowid();
        append_event_tx(
            &tx,
            "coupon.issued",
            Some(&format!("coupon:{id}")),
            serde_json::json!({ "id": id, "user_id": user.id, "task_id": task.id }),
        )?;
        tx.commit()?;
        tracing::info!(coupon_id = id, task_id = task.id, username = name, "coupon issued");

        Ok(Coupon {
            id,
            task_id: task.id,
            task_name: task.name,
            reward,
            time: ts,
        })
    }

    /// Coupons for `username`, newest first. Unknown users simply have none.
    pub fn list_coupons(&self, username: &str) -> StoreResult<Vec<Coupon>> {
        let name = normalize_username(username)?;
        let conn = self.open()?;
        let Some(user) = find_user(&conn, name)? else {
            return Ok(Vec::new());
        };
        let mut stmt = conn.prepare(
            "SELECT id, task_id, task_name, reward, issued_at_ms FROM coupons
             WHERE user_id = ?1 ORDER BY issued_at_ms DESC, id DESC",
        )?;
        let rows = stmt.query_map([user.id], |row| {
            Ok(Coupon {
                id: row.get(0)?,
                task_id: row.get(1)?,
                task_name: row.get(2)?,
                reward: row.get(3)?,
                time: row.get(4)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn event_count(&self, kind: &str) -> StoreResult<i64> {
        let conn = self.open()?;
        Ok(conn.query_row(
            "SELECT COUNT(*) FROM event_log WHERE kind = ?1",
            [kind],
            |row| row.get(0),
        )?)
    }
}

fn normalize_username(username: &str) -> StoreResult<&str> {
    let name = username.trim();
    if name.is_empty() {
        return Err(StoreError::MissingUsername);
    }
    Ok(name)
}

fn ensure_user_tx(tx: &rusqlite::Transaction<'_>, name: &str) -> StoreResult<User> {
    if let Some(user) = find_user(tx, name)? {
        return Ok(user);
    }

    tx.execute(
        "INSERT INTO users (username, created_at_ms) VALUES (?1, ?2)",
        (name, now_ms()),
    )?;
    let id = tx.last_insert_rowid();
    append_event_tx(
        tx,
        "user.created",
        Some(&format!("user:{id}")),
        serde_json::json!({ "id": id, "username": name }),
    )?;
    tracing::info!(user_id = id, username = name, "user created");
    Ok(User {
        id,
        username: name.to_string(),
    })
}

fn find_user(conn: &Connection, username: &str) -> StoreResult<Option<User>> {
    Ok(conn
        .query_row(
            "SELECT id, username FROM users WHERE username = ?1",
            [username],
            |row| {
                Ok(User {
                    id: row.get(0)?,
                    username: row.get(1)?,
                })
            },
        )
        .optional()?)
}

fn find_task(conn: &Connection, id: TaskId) -> StoreResult<Option<Task>> {
    Ok(conn
        .query_row(
            "SELECT id, name, title, reward, x, y FROM tasks WHERE id = ?1",
            [id],
            task_from_row,
        )
        .optional()?)
}

fn task_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Task> {
    Ok(Task {
        id: row.get(0)?,
        name: row.get(1)?,
        title: row.get(2)?,
        reward: row.get(3)?,
        x: row.get(4)?,
        y: row.get(5)?,
    })
}

/// Task list installed on a fresh database.
pub fn default_tasks() -> Vec<Task> {
    let task = |id: TaskId, name: &str, title: &str, x: f64, y: f64| Task {
        id,
        name: name.to_string(),
        title: Some(title.to_string()),
        reward: None,
        x,
        y,
    };
    vec![
        task(1, "深坑老街", "Shenkeng Old Street", 12.0, 38.0),
        task(2, "豆腐博物館", "Tofu Museum", 48.0, 42.0),
        task(3, "阿婆豆腐店", "Grandma's Tofu Shop", 70.0, 60.0),
        task(4, "吊橋入口", "Suspension Bridge Gate", 30.0, 18.0),
        task(5, "深坑茶園步道", "Tea Garden Trail", 60.0, 25.0),
    ]
}

fn migrate(conn: &Connection) -> anyhow::Result<()> {
    let v: i64 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;

    if v < 1 {
        conn.execute_batch(
            r#"
CREATE TABLE IF NOT EXISTS event_log (
  seq INTEGER PRIMARY KEY AUTOINCREMENT,
  ts_ms INTEGER NOT NULL,
  kind TEXT NOT NULL,
  entity_id TEXT,
  payload_json TEXT NOT NULL DEFAULT '{}'
);

CREATE INDEX IF NOT EXISTS idx_event_log_ts ON event_log(ts_ms);
CREATE INDEX IF NOT EXISTS idx_event_log_kind ON event_log(kind);

CREATE TABLE IF NOT EXISTS users (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  username TEXT NOT NULL UNIQUE,
  created_at_ms INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS tasks (
  id INTEGER PRIMARY KEY,
  name TEXT NOT NULL,
  reward TEXT,
  x REAL NOT NULL,
  y REAL NOT NULL,
  updated_at_ms INTEGER NOT NULL
);

-- task_name is a snapshot so renamed tasks don't rewrite issued coupons.
CREATE TABLE IF NOT EXISTS coupons (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  user_id INTEGER NOT NULL REFERENCES users(id),
  task_id INTEGER NOT NULL REFERENCES tasks(id),
  task_name TEXT NOT NULL,
  reward TEXT NOT NULL,
  issued_at_ms INTEGER NOT NULL,
  UNIQUE (user_id, task_id)
);

CREATE INDEX IF NOT EXISTS idx_coupons_user ON coupons(user_id, issued_at_ms);
"#,
        )?;

        conn.pragma_update(None, "user_version", 1_i64)?;
    }

    // Narrative titles arrived after the first release.
    ensure_column(conn, "tasks", "title", "TEXT")?;

    if v < 2 {
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM tasks", [], |row| row.get(0))?;
        if count == 0 {
            let ts = now_ms();
            for t in default_tasks() {
                conn.execute(
                    "INSERT INTO tasks (id, name, title, reward, x, y, updated_at_ms)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                    (t.id, &t.name, &t.title, &t.reward, t.x, t.y, ts),
                )?;
            }
        }
        conn.pragma_update(None, "user_version", 2_i64)?;
    }

    Ok(())
}

fn ensure_column(conn: &Connection, table: &str, col: &str, decl: &str) -> anyhow::Result<()> {
    let sql = format!("ALTER TABLE {table} ADD COLUMN {col} {decl}");
    match conn.execute(&sql, []) {
        Ok(_) => Ok(()),
        Err(e) => {
            // Ignore "duplicate column name".
            if e.to_string().to_lowercase().contains("duplicate column") {
                return Ok(());
            }
            Err(e).with_context(|| format!("ensure column {table}.{col}"))
        }
    }
}

fn append_event_tx(
    tx: &rusqlite::Transaction<'_>,
    kind: &str,
    entity_id: Option<&str>,
    payload: serde_json::Value,
) -> anyhow::Result<i64> {
    let ts = now_ms();
    let payload_json = payload.to_string();
    tx.execute(
        "INSERT INTO event_log (ts_ms, kind, entity_id, payload_json) VALUES (?1, ?2, ?3, ?4)",
        (ts, kind, entity_id, payload_json),
    )?;
    Ok(tx.last_insert_rowid())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_engine() -> Engine {
        let p = std::env::temp_dir().join(format!(
            "deepsk-engine-test-{}.db",
            time::OffsetDateTime::now_utc().unix_timestamp_nanos()
        ));
        let engine = Engine::new(p);
        let _ = engine.open().expect("open db");
        engine
    }

    #[test]
    fn fresh_db_has_seed_tasks() {
        let engine = temp_engine();
        let tasks = engine.list_tasks().unwrap();
        assert_eq!(tasks.len(), 5);
        assert_eq!(tasks[2].id, 3);
        assert_eq!(tasks[2].x, 70.0);
        assert_eq!(tasks[0].title.as_deref(), Some("Shenkeng Old Street"));
    }

    #[test]
    fn reopen_does_not_reseed_or_lose_rows() {
        let engine = temp_engine();
        engine.login("alice").unwrap();
        let again = Engine::new(engine.db_path().to_path_buf());
        assert_eq!(again.list_tasks().unwrap().len(), 5);
        assert!(again.find_user("alice").unwrap().is_some());
    }

    #[test]
    fn login_is_idempotent_and_trims() {
        let engine = temp_engine();
        let a = engine.login("  alice ").unwrap();
        let b = engine.login("alice").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.username, "alice");
        assert_eq!(engine.event_count("user.created").unwrap(), 1);
    }

    #[test]
    fn blank_username_is_rejected() {
        let engine = temp_engine();
        assert!(matches!(
            engine.login("   "),
            Err(StoreError::MissingUsername)
        ));
    }

    #[test]
    fn second_completion_is_refused() {
        let engine = temp_engine();
        engine.login("alice").unwrap();

        let coupon = engine.complete_task(3, "alice").unwrap();
        assert_eq!(coupon.task_id, 3);
        assert_eq!(coupon.task_name, "阿婆豆腐店");
        assert_eq!(coupon.reward, "阿婆豆腐店 exclusive coupon");

        let err = engine.complete_task(3, "alice").unwrap_err();
        assert!(matches!(err, StoreError::AlreadyCompleted));
        assert_eq!(err.to_string(), "Task already completed");
        assert_eq!(engine.list_coupons("alice").unwrap().len(), 1);
    }

    #[test]
    fn same_task_for_two_users_is_fine() {
        let engine = temp_engine();
        engine.login("alice").unwrap();
        engine.login("bob").unwrap();
        engine.complete_task(1, "alice").unwrap();
        engine.complete_task(1, "bob").unwrap();
        assert_eq!(engine.event_count("coupon.issued").unwrap(), 2);
    }

    #[test]
    fn unknown_task_is_refused_without_creating_user() {
        let engine = temp_engine();
        assert!(matches!(
            engine.complete_task(99, "alice"),
            Err(StoreError::TaskNotFound)
        ));
        assert!(engine.find_user("alice").unwrap().is_none());
    }

    #[test]
    fn completion_registers_unseen_user() {
        let engine = temp_engine();
        let coupon = engine.complete_task(3, "mallory").unwrap();
        assert_eq!(coupon.task_id, 3);
        assert!(engine.find_user("mallory").unwrap().is_some());
        assert_eq!(engine.event_count("user.created").unwrap(), 1);
        assert!(matches!(
            engine.complete_task(3, " mallory "),
            Err(StoreError::AlreadyCompleted)
        ));

        // A later login finds the same row.
        let user = engine.login("mallory").unwrap();
        assert_eq!(engine.list_coupons(&user.username).unwrap().len(), 1);
        assert_eq!(engine.event_count("user.created").unwrap(), 1);
    }

    #[test]
    fn coupons_for_unknown_user_are_empty() {
        let engine = temp_engine();
        assert!(engine.list_coupons("bob").unwrap().is_empty());
    }

    #[test]
    fn coupons_are_newest_first() {
        let engine = temp_engine();
        engine.login("alice").unwrap();
        engine.complete_task(1, "alice").unwrap();
        engine.complete_task(2, "alice").unwrap();
        let ids: Vec<TaskId> = engine
            .list_coupons("alice")
            .unwrap()
            .into_iter()
            .map(|c| c.task_id)
            .collect();
        assert_eq!(ids, vec![2, 1]);
    }

    #[test]
    fn upsert_replaces_task_but_not_issued_coupon() {
        let engine = temp_engine();
        engine.login("alice").unwrap();
        engine.complete_task(2, "alice").unwrap();

        let mut t = engine.get_task(2).unwrap().unwrap();
        t.name = "Museum".to_string();
        t.reward = Some("free tofu pudding".to_string());
        engine.upsert_tasks(&[t]).unwrap();

        let stored = engine.get_task(2).unwrap().unwrap();
        assert_eq!(stored.name, "Museum");
        assert_eq!(stored.reward_text(), "free tofu pudding");
        assert_eq!(engine.list_coupons("alice").unwrap()[0].task_name, "豆腐博物館");
    }
}
