//! SQLite-backed user profile.
//!
//! The database lives at `~/.arcplan/arcplan.db`. Two tables: a key-value
//! `settings` table (default calendar, timezone) and the learned
//! `domain_calendar_map`. Writes are small and rare, reads happen once per
//! scheduling session — a single WAL connection behind a mutex is plenty.

use std::path::PathBuf;

use chrono::Utc;
use log::warn;
use parking_lot::Mutex;
use rusqlite::{params, Connection};

use crate::error::ScheduleError;
use crate::ports::ProfileStore;
use crate::types::{Domain, UserProfile};

const SETTING_DEFAULT_CALENDAR: &str = "default_calendar_id";
const SETTING_TIMEZONE: &str = "timezone";

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS settings (
    key   TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS domain_calendar_map (
    domain      TEXT PRIMARY KEY,
    calendar_id TEXT NOT NULL,
    updated_at  TEXT NOT NULL
);
";

pub struct SqliteProfileStore {
    conn: Mutex<Connection>,
}

impl SqliteProfileStore {
    /// Open (or create) the profile database at `~/.arcplan/arcplan.db`.
    pub fn open() -> Result<Self, ScheduleError> {
        Self::open_at(Self::db_path()?)
    }

    /// Open a database at an explicit path. Useful for testing.
    pub fn open_at(path: PathBuf) -> Result<Self, ScheduleError> {
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| ScheduleError::Store(format!("create {parent:?}: {e}")))?;
            }
        }

        let conn = Connection::open(&path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.execute_batch(SCHEMA)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn db_path() -> Result<PathBuf, ScheduleError> {
        let home = dirs::home_dir()
            .ok_or_else(|| ScheduleError::Configuration("home directory not found".into()))?;
        Ok(home.join(".arcplan").join("arcplan.db"))
    }

    /// Persist the user's timezone as an IANA name.
    pub fn set_timezone(&self, tz: chrono_tz::Tz) -> Result<(), ScheduleError> {
        let conn = self.conn.lock();
        upsert_setting(&conn, SETTING_TIMEZONE, Some(tz.name()))?;
        Ok(())
    }

    fn read_setting(conn: &Connection, key: &str) -> Result<Option<String>, rusqlite::Error> {
        let mut stmt = conn.prepare("SELECT value FROM settings WHERE key = ?1")?;
        let mut rows = stmt.query(params![key])?;
        match rows.next()? {
            Some(row) => Ok(Some(row.get(0)?)),
            None => Ok(None),
        }
    }
}

fn upsert_setting(
    conn: &Connection,
    key: &str,
    value: Option<&str>,
) -> Result<(), rusqlite::Error> {
    match value {
        Some(value) => {
            conn.execute(
                "INSERT INTO settings (key, value) VALUES (?1, ?2)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                params![key, value],
            )?;
        }
        None => {
            conn.execute("DELETE FROM settings WHERE key = ?1", params![key])?;
        }
    }
    Ok(())
}

impl ProfileStore for SqliteProfileStore {
    fn load_profile(&self) -> Result<UserProfile, ScheduleError> {
        let conn = self.conn.lock();
        let mut profile = UserProfile::default();

        profile.default_calendar_id = Self::read_setting(&conn, SETTING_DEFAULT_CALENDAR)?;

        if let Some(tz_name) = Self::read_setting(&conn, SETTING_TIMEZONE)? {
            match tz_name.parse::<chrono_tz::Tz>() {
                Ok(tz) => profile.timezone = tz,
                // Stale or hand-edited value: fall back to UTC rather than fail the load.
                Err(_) => warn!("unrecognized timezone '{tz_name}' in profile, using UTC"),
            }
        }

        let mut stmt = conn.prepare("SELECT domain, calendar_id FROM domain_calendar_map")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;
        for row in rows {
            let (domain_str, calendar_id) = row?;
            match Domain::parse(&domain_str) {
                Some(domain) => {
                    profile.domain_calendar_map.insert(domain, calendar_id);
                }
                None => warn!("dropping mapping for unknown domain '{domain_str}'"),
            }
        }

        Ok(profile)
    }

    fn merge_domain_mapping(&self, pairs: &[(Domain, String)]) -> Result<(), ScheduleError> {
        if pairs.is_empty() {
            return Ok(());
        }
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let now = Utc::now().to_rfc3339();
        for (domain, calendar_id) in pairs {
            tx.execute(
                "INSERT INTO domain_calendar_map (domain, calendar_id, updated_at)
                 VALUES (?1, ?2, ?3)
                 ON CONFLICT(domain) DO UPDATE SET
                     calendar_id = excluded.calendar_id,
                     updated_at = excluded.updated_at",
                params![domain.as_str(), calendar_id, now],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    fn set_default_calendar(&self, calendar_id: Option<&str>) -> Result<(), ScheduleError> {
        let conn = self.conn.lock();
        upsert_setting(&conn, SETTING_DEFAULT_CALENDAR, calendar_id)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_temp() -> (tempfile::TempDir, SqliteProfileStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteProfileStore::open_at(dir.path().join("profile.db")).unwrap();
        (dir, store)
    }

    #[test]
    fn fresh_store_loads_default_profile() {
        let (_dir, store) = open_temp();
        let profile = store.load_profile().unwrap();

        assert!(profile.default_calendar_id.is_none());
        assert_eq!(profile.timezone, chrono_tz::UTC);
        assert!(profile.domain_calendar_map.is_empty());
    }

    #[test]
    fn default_calendar_roundtrips_and_clears() {
        let (_dir, store) = open_temp();

        store.set_default_calendar(Some("cal-work")).unwrap();
        assert_eq!(
            store.load_profile().unwrap().default_calendar_id.as_deref(),
            Some("cal-work")
        );

        store.set_default_calendar(Some("cal-home")).unwrap();
        assert_eq!(
            store.load_profile().unwrap().default_calendar_id.as_deref(),
            Some("cal-home")
        );

        store.set_default_calendar(None).unwrap();
        assert!(store.load_profile().unwrap().default_calendar_id.is_none());
    }

    #[test]
    fn timezone_roundtrips() {
        let (_dir, store) = open_temp();
        store.set_timezone(chrono_tz::America::New_York).unwrap();

        let profile = store.load_profile().unwrap();
        assert_eq!(profile.timezone, chrono_tz::America::New_York);
    }

    #[test]
    fn merge_upserts_without_clobbering_other_domains() {
        let (_dir, store) = open_temp();

        store
            .merge_domain_mapping(&[
                (Domain::Work, "cal-work".to_string()),
                (Domain::Health, "cal-fit".to_string()),
            ])
            .unwrap();
        store
            .merge_domain_mapping(&[(Domain::Work, "cal-work-2".to_string())])
            .unwrap();

        let map = store.load_profile().unwrap().domain_calendar_map;
        assert_eq!(map.len(), 2);
        assert_eq!(map.get(&Domain::Work).map(String::as_str), Some("cal-work-2"));
        assert_eq!(map.get(&Domain::Health).map(String::as_str), Some("cal-fit"));
    }

    #[test]
    fn unknown_domain_rows_are_skipped_on_load() {
        let (_dir, store) = open_temp();
        {
            let conn = store.conn.lock();
            conn.execute(
                "INSERT INTO domain_calendar_map (domain, calendar_id, updated_at)
                 VALUES ('hobbies', 'cal-x', '2026-01-01T00:00:00Z')",
                [],
            )
            .unwrap();
        }

        let profile = store.load_profile().unwrap();
        assert!(profile.domain_calendar_map.is_empty());
    }

    #[test]
    fn profile_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("profile.db");

        {
            let store = SqliteProfileStore::open_at(path.clone()).unwrap();
            store.set_default_calendar(Some("cal-a")).unwrap();
            store
                .merge_domain_mapping(&[(Domain::Social, "cal-fun".to_string())])
                .unwrap();
        }

        let store = SqliteProfileStore::open_at(path).unwrap();
        let profile = store.load_profile().unwrap();
        assert_eq!(profile.default_calendar_id.as_deref(), Some("cal-a"));
        assert_eq!(
            profile.calendar_for(Some(Domain::Social)),
            Some("cal-fun")
        );
    }
}
