// Rust guideline compliant 2026-08-27

//! SQLite adapter for the `AlarmStore` port (demo).
//!
//! Persists alarms and trigger history to a SQLite file via `sqlx`. Proves
//! that the hexagonal `AlarmStore` port is truly swappable without touching
//! domain or engine crates.
//!
//! # Dependency note
//!
//! `sqlx` is a hard dependency (no feature flag). This is intentional for a
//! proof-of-concept binary where build-complexity trade-offs favour
//! simplicity over optional compilation.
//!
//! # Timestamp format
//!
//! Timestamps are stored as RFC 3339 TEXT. Rows written by other tools must
//! honour that format or `active_alarms` maps them to
//! `StoreError::Unavailable`.

use chrono::{DateTime, Utc};
use domain::{Alarm, AlarmStore, StoreError, TriggerEvent};
use sqlx::Row as _;
use uuid::Uuid;

/// `AlarmStore` adapter backed by a SQLite database file via `sqlx`.
///
/// Connects to (or creates) a SQLite file and ensures the `alarms` and
/// `trigger_history` tables exist. Alarm upserts use `INSERT OR REPLACE`
/// keyed by the alarm UUID.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: sqlx::SqlitePool,
}

/// Map any sqlx failure to the port error after logging the detail.
fn unavailable(context: &str, e: &sqlx::Error) -> StoreError {
    tracing::error!("sqlite_store.{context}: {e}");
    StoreError::Unavailable { reason: context.to_owned() }
}

impl SqliteStore {
    /// Open or create a SQLite database and initialize the schema.
    ///
    /// Passes `create_if_missing(true)` so the database file is created on
    /// first run without manual setup. Both tables are created via
    /// `CREATE TABLE IF NOT EXISTS`, making repeated calls safe.
    ///
    /// # Errors
    ///
    /// Returns `sqlx::Error` when the connection or schema creation fails.
    pub async fn new(db_url: &str) -> Result<Self, sqlx::Error> {
        // create_if_missing: sqlx 0.8 defaults to false for file databases;
        // enable explicitly so the demo works out of the box on first run.
        let opts = db_url
            .parse::<sqlx::sqlite::SqliteConnectOptions>()?
            .create_if_missing(true);
        let pool = sqlx::SqlitePool::connect_with(opts).await?;
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS alarms (
                id            TEXT    PRIMARY KEY,
                name          TEXT    NOT NULL,
                latitude      REAL    NOT NULL,
                longitude     REAL    NOT NULL,
                radius_m      REAL    NOT NULL,
                ringtone_id   TEXT    NOT NULL,
                volume        REAL    NOT NULL,
                active        INTEGER NOT NULL,
                created_at    TEXT    NOT NULL,
                updated_at    TEXT,            -- NULL until first modified
                trigger_count INTEGER NOT NULL DEFAULT 0
            )",
        )
        .execute(&pool)
        .await?;
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS trigger_history (
                id           INTEGER PRIMARY KEY AUTOINCREMENT,
                alarm_id     TEXT    NOT NULL,
                alarm_name   TEXT    NOT NULL,
                latitude     REAL    NOT NULL,
                longitude    REAL    NOT NULL,
                triggered_at TEXT    NOT NULL
            )",
        )
        .execute(&pool)
        .await?;
        Ok(Self { pool })
    }

    /// Insert or replace one alarm record, keyed by UUID.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] on any sqlx error.
    pub async fn upsert(&self, alarm: &Alarm) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT OR REPLACE INTO alarms
             (id, name, latitude, longitude, radius_m, ringtone_id, volume,
              active, created_at, updated_at, trigger_count)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(alarm.id.to_string())
        .bind(&alarm.name)
        .bind(alarm.latitude)
        .bind(alarm.longitude)
        .bind(alarm.radius_m)
        .bind(&alarm.ringtone_id)
        .bind(alarm.volume)
        .bind(i64::from(alarm.active))
        .bind(alarm.created_at.to_rfc3339())
        .bind(alarm.updated_at.map(|t| t.to_rfc3339()))
        .bind(i64::from(alarm.trigger_count))
        .execute(&self.pool)
        .await
        .map_err(|e| unavailable("upsert", &e))?;
        Ok(())
    }

    /// Number of rows in the trigger history.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] on any sqlx error.
    pub async fn history_len(&self) -> Result<i64, StoreError> {
        sqlx::query_scalar("SELECT COUNT(*) FROM trigger_history")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| unavailable("history_len", &e))
    }
}

/// Rebuild an [`Alarm`] from one `alarms` row.
///
/// Every column is decoded with `try_get` so a row written by another tool
/// with the wrong type maps to [`StoreError::Unavailable`] instead of
/// panicking the read path.
fn alarm_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Alarm, StoreError> {
    let parse_error = |field: &str| StoreError::Unavailable {
        reason: format!("corrupt {field} column"),
    };

    let id = row
        .try_get::<String, _>("id")
        .map_err(|_| parse_error("id"))?
        .parse::<Uuid>()
        .map_err(|_| parse_error("id"))?;
    let created_at = row
        .try_get::<String, _>("created_at")
        .map_err(|_| parse_error("created_at"))
        .and_then(|s| DateTime::parse_from_rfc3339(&s).map_err(|_| parse_error("created_at")))?
        .with_timezone(&Utc);
    let updated_at = row
        .try_get::<Option<String>, _>("updated_at")
        .map_err(|_| parse_error("updated_at"))?
        .map(|s| {
            DateTime::parse_from_rfc3339(&s)
                .map(|t| t.with_timezone(&Utc))
                .map_err(|_| parse_error("updated_at"))
        })
        .transpose()?;
    let trigger_count = row
        .try_get::<i64, _>("trigger_count")
        .map_err(|_| parse_error("trigger_count"))
        .and_then(|n| u32::try_from(n).map_err(|_| parse_error("trigger_count")))?;

    Ok(Alarm {
        id,
        name: row.try_get("name").map_err(|_| parse_error("name"))?,
        latitude: row.try_get("latitude").map_err(|_| parse_error("latitude"))?,
        longitude: row.try_get("longitude").map_err(|_| parse_error("longitude"))?,
        radius_m: row.try_get("radius_m").map_err(|_| parse_error("radius_m"))?,
        ringtone_id: row.try_get("ringtone_id").map_err(|_| parse_error("ringtone_id"))?,
        volume: row.try_get("volume").map_err(|_| parse_error("volume"))?,
        active: row.try_get::<i64, _>("active").map_err(|_| parse_error("active"))? != 0,
        created_at,
        updated_at,
        trigger_count,
    })
}

impl AlarmStore for SqliteStore {
    /// Fetch all alarms whose `active` flag is set.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] on any sqlx error or when a row
    /// cannot be rebuilt into an [`Alarm`].
    async fn active_alarms(&self) -> Result<Vec<Alarm>, StoreError> {
        let rows = sqlx::query("SELECT * FROM alarms WHERE active = 1")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| unavailable("active_alarms", &e))?;
        rows.iter().map(alarm_from_row).collect()
    }

    /// Append one trigger event to `trigger_history`.
    async fn record_trigger(&self, event: &TriggerEvent) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO trigger_history
             (alarm_id, alarm_name, latitude, longitude, triggered_at)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(event.alarm_id.to_string())
        .bind(&event.alarm_name)
        .bind(event.latitude)
        .bind(event.longitude)
        .bind(event.at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| unavailable("record_trigger", &e))?;
        Ok(())
    }

    /// Bump the alarm's counter and stamp `updated_at`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] on a sqlx error or when no row
    /// matches `alarm_id`.
    async fn increment_trigger_count(&self, alarm_id: Uuid) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE alarms
             SET trigger_count = trigger_count + 1, updated_at = ?
             WHERE id = ?",
        )
        .bind(Utc::now().to_rfc3339())
        .bind(alarm_id.to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| unavailable("increment_trigger_count", &e))?;
        if result.rows_affected() == 0 {
            return Err(StoreError::Unavailable {
                reason: format!("unknown alarm {alarm_id}"),
            });
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::SqliteStore;
    use chrono::Utc;
    use domain::{Alarm, AlarmStore as _, StoreError, TriggerEvent};
    use uuid::Uuid;

    // Each test opens a fresh SqlitePool backed by an in-memory SQLite
    // database, so tests are fully isolated with no on-disk side-effects.
    async fn make_store() -> SqliteStore {
        SqliteStore::new("sqlite::memory:")
            .await
            .expect("in-memory SQLite should open")
    }

    fn make_alarm(name: &str, active: bool) -> Alarm {
        let builder = Alarm::builder(name, 6.9271, 79.8612).radius_m(150.0).volume(0.8);
        let builder = if active { builder } else { builder.inactive() };
        builder.build().unwrap()
    }

    // SQ-T01: upsert + active_alarms round-trips every field.
    #[tokio::test]
    async fn alarm_round_trip() {
        let store = make_store().await;
        let alarm = make_alarm("Fort Station", true);
        store.upsert(&alarm).await.unwrap();

        let fetched = store.active_alarms().await.unwrap();
        assert_eq!(fetched.len(), 1);
        let got = &fetched[0];
        assert_eq!(got.id, alarm.id);
        assert_eq!(got.name, "Fort Station");
        assert!((got.latitude - alarm.latitude).abs() < 1e-12);
        assert!((got.longitude - alarm.longitude).abs() < 1e-12);
        assert!((got.radius_m - 150.0).abs() < f64::EPSILON);
        assert!((got.volume - 0.8).abs() < f64::EPSILON);
        assert!(got.active);
        assert_eq!(got.trigger_count, 0);
        assert!(got.updated_at.is_none());
    }

    // SQ-T02: inactive alarms are filtered by the query, not in Rust.
    #[tokio::test]
    async fn active_alarms_excludes_inactive() {
        let store = make_store().await;
        store.upsert(&make_alarm("On", true)).await.unwrap();
        store.upsert(&make_alarm("Off", false)).await.unwrap();

        let fetched = store.active_alarms().await.unwrap();
        assert_eq!(fetched.len(), 1);
        assert_eq!(fetched[0].name, "On");
    }

    // SQ-T03: upsert with the same UUID replaces the row.
    #[tokio::test]
    async fn duplicate_id_is_replaced() {
        let store = make_store().await;
        let alarm = make_alarm("Before", true);
        store.upsert(&alarm).await.unwrap();

        let mut renamed = alarm;
        renamed.name = "After".to_owned();
        store.upsert(&renamed).await.unwrap();

        let fetched = store.active_alarms().await.unwrap();
        assert_eq!(fetched.len(), 1, "REPLACE must not duplicate the row");
        assert_eq!(fetched[0].name, "After");
    }

    // SQ-T04: record_trigger appends history rows.
    #[tokio::test]
    async fn record_trigger_appends() {
        let store = make_store().await;
        let event = TriggerEvent {
            alarm_id: Uuid::new_v4(),
            alarm_name: "A".to_owned(),
            latitude: 6.9271,
            longitude: 79.8612,
            at: Utc::now(),
        };
        store.record_trigger(&event).await.unwrap();
        store.record_trigger(&event).await.unwrap();
        assert_eq!(store.history_len().await.unwrap(), 2);
    }

    // SQ-T05: increment_trigger_count persists the bump and updated_at.
    #[tokio::test]
    async fn increment_persists() {
        let store = make_store().await;
        let alarm = make_alarm("A", true);
        store.upsert(&alarm).await.unwrap();

        store.increment_trigger_count(alarm.id).await.unwrap();
        store.increment_trigger_count(alarm.id).await.unwrap();

        let got = &store.active_alarms().await.unwrap()[0];
        assert_eq!(got.trigger_count, 2);
        assert!(got.updated_at.is_some());
    }

    // SQ-T06: incrementing an unknown id fails with Unavailable.
    #[tokio::test]
    async fn increment_unknown_id_fails() {
        let store = make_store().await;
        let result = store.increment_trigger_count(Uuid::new_v4()).await;
        assert!(matches!(result, Err(StoreError::Unavailable { .. })));
    }

    // SQ-T07: a row written by another tool with a mistyped column maps to
    // Unavailable on read instead of panicking.
    #[tokio::test]
    async fn mistyped_column_maps_to_unavailable() {
        let store = make_store().await;
        sqlx::query(
            "INSERT INTO alarms
             (id, name, latitude, longitude, radius_m, ringtone_id, volume,
              active, created_at, updated_at, trigger_count)
             VALUES (?, 'Bad', 'not-a-number', 79.8612, 100.0, 'default', 1.0,
                     1, ?, NULL, 0)",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(Utc::now().to_rfc3339())
        .execute(&store.pool)
        .await
        .unwrap();

        let result = store.active_alarms().await;
        assert!(
            matches!(&result, Err(StoreError::Unavailable { reason }) if reason.contains("latitude")),
            "mistyped latitude must fail the read: {result:?}"
        );
    }
}
