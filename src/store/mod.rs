pub mod error;

use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use log::{debug, info};
use rusqlite::{Connection, Row, params};

use crate::link::{Link, LinkKind, LinkStatus, OverridePolicy};

pub use error::{LinkStoreError, Result};

const LINK_COLUMNS: &str = "id1, id2, kind, status, timestamp";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreTarget {
    File(PathBuf),
    Memory,
}

/// Where to open the link database and which pragmas to apply first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionSpec {
    pub target: StoreTarget,
    pub properties: BTreeMap<String, String>,
}

impl ConnectionSpec {
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self {
            target: StoreTarget::File(path.into()),
            properties: BTreeMap::new(),
        }
    }

    pub fn memory() -> Self {
        Self {
            target: StoreTarget::Memory,
            properties: BTreeMap::new(),
        }
    }

    pub fn property(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(name.into(), value.into());
        self
    }
}

pub trait Clock: Send {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssertOutcome {
    Inserted,
    Updated,
    /// The stored link won; nothing was written.
    Kept,
}

impl AssertOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            AssertOutcome::Inserted => "inserted",
            AssertOutcome::Updated => "updated",
            AssertOutcome::Kept => "kept",
        }
    }
}

/// Time window over the change log. `None` bounds are unset; a page size of
/// zero means unlimited.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChangeQuery {
    pub since: Option<DateTime<Utc>>,
    pub before: Option<DateTime<Utc>>,
    pub page_size: usize,
}

/// Persistent store of pairwise link decisions backed by SQLite.
///
/// The store never auto-commits: every operation runs inside a session
/// transaction that stays open until [`LinkStore::commit`]. Dropping the
/// store (or calling [`LinkStore::close`]) discards uncommitted work.
///
/// Reads share a deferred session. The first write of a session takes the
/// database write lock (`BEGIN IMMEDIATE`), so a writer's lookup and its
/// insert or update see the same committed state and no other connection
/// can slip a row in between.
///
/// A store owns one connection and is not `Sync`; share it between threads
/// only behind a lock.
pub struct LinkStore {
    conn: Connection,
    clock: Box<dyn Clock>,
    write_locked: bool,
}

impl LinkStore {
    pub fn open(spec: &ConnectionSpec) -> Result<Self> {
        Self::with_clock(spec, Box::new(SystemClock))
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::open(&ConnectionSpec::memory())
    }

    pub fn with_clock(spec: &ConnectionSpec, clock: Box<dyn Clock>) -> Result<Self> {
        let conn = match &spec.target {
            StoreTarget::File(path) => Connection::open(path)?,
            StoreTarget::Memory => Connection::open_in_memory()?,
        };
        for (name, value) in &spec.properties {
            validate_property_name(name)?;
            conn.pragma_update(None, name, value.as_str())?;
        }
        let store = Self {
            conn,
            clock,
            write_locked: false,
        };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<()> {
        if !self.table_exists("links")? {
            self.conn.execute_batch(
                "
                CREATE TABLE IF NOT EXISTS links (
                    id1 TEXT NOT NULL,
                    id2 TEXT NOT NULL,
                    kind INTEGER NOT NULL,
                    status INTEGER NOT NULL,
                    timestamp INTEGER NOT NULL,
                    PRIMARY KEY (id1, id2)
                );
                ",
            )?;
            info!("created links table");
        }
        self.conn.execute_batch(
            "
            CREATE INDEX IF NOT EXISTS idx_links_timestamp ON links(timestamp);
            CREATE INDEX IF NOT EXISTS idx_links_id2 ON links(id2);
            ",
        )?;
        Ok(())
    }

    fn table_exists(&self, name: &str) -> Result<bool> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
            params![name],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    fn ensure_session(&self) -> Result<()> {
        if self.conn.is_autocommit() {
            self.conn.execute_batch("BEGIN DEFERRED")?;
        }
        Ok(())
    }

    /// Opens a session holding the write lock. A session that has only read
    /// so far is rolled back first: its snapshot may predate a commit from
    /// another connection, and SQLite refuses to upgrade a stale snapshot.
    fn ensure_write_session(&mut self) -> Result<()> {
        if self.conn.is_autocommit() {
            self.write_locked = false;
        } else if self.write_locked {
            return Ok(());
        } else {
            self.conn.execute_batch("ROLLBACK")?;
        }
        self.conn.execute_batch("BEGIN IMMEDIATE")?;
        self.write_locked = true;
        Ok(())
    }

    pub fn all_links(&self) -> Result<Vec<Link>> {
        self.changes(&ChangeQuery::default())
    }

    pub fn changes_since(&self, since: DateTime<Utc>) -> Result<Vec<Link>> {
        self.changes(&ChangeQuery {
            since: Some(since),
            ..ChangeQuery::default()
        })
    }

    pub fn changes_between(
        &self,
        since: Option<DateTime<Utc>>,
        before: Option<DateTime<Utc>>,
    ) -> Result<Vec<Link>> {
        self.changes(&ChangeQuery {
            since,
            before,
            page_size: 0,
        })
    }

    pub fn changes_page(
        &self,
        since: Option<DateTime<Utc>>,
        before: Option<DateTime<Utc>>,
        page_size: usize,
    ) -> Result<Vec<Link>> {
        self.changes(&ChangeQuery {
            since,
            before,
            page_size,
        })
    }

    /// Links with `since < timestamp <= before`, newest first.
    pub fn changes(&self, query: &ChangeQuery) -> Result<Vec<Link>> {
        self.ensure_session()?;
        let limit = if query.page_size == 0 {
            -1
        } else {
            i64::try_from(query.page_size).unwrap_or(i64::MAX)
        };
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {LINK_COLUMNS}
             FROM links
             WHERE (?1 IS NULL OR timestamp > ?1)
               AND (?2 IS NULL OR timestamp <= ?2)
             ORDER BY timestamp DESC, id1 ASC, id2 ASC
             LIMIT ?3"
        ))?;

        let mut rows = stmt.query(params![
            query.since.map(|ts| ts.timestamp_millis()),
            query.before.map(|ts| ts.timestamp_millis()),
            limit
        ])?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            out.push(link_from_row(row)?);
        }
        Ok(out)
    }

    /// Every link that mentions `id` on either side.
    pub fn all_links_for(&self, id: &str) -> Result<Vec<Link>> {
        self.ensure_session()?;
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {LINK_COLUMNS}
             FROM links
             WHERE id1 = ?1 OR id2 = ?1
             ORDER BY timestamp DESC, id1 ASC, id2 ASC"
        ))?;

        let mut rows = stmt.query(params![id])?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            out.push(link_from_row(row)?);
        }
        Ok(out)
    }

    /// The stored link for exactly `(id1, id2)`; the reversed pair is not
    /// consulted.
    pub fn link_for(&self, id1: &str, id2: &str) -> Result<Option<Link>> {
        self.ensure_session()?;
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {LINK_COLUMNS} FROM links WHERE id1 = ?1 AND id2 = ?2"
        ))?;
        let mut rows = stmt.query(params![id1, id2])?;
        match rows.next()? {
            Some(row) => Ok(Some(link_from_row(row)?)),
            None => Ok(None),
        }
    }

    pub fn count(&self) -> Result<usize> {
        self.ensure_session()?;
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM links", [], |row| row.get(0))?;
        Ok(usize::try_from(count).unwrap_or(0))
    }

    /// Records `link` unless the stored link for the same ordered pair wins
    /// under `policy`. Written rows carry the store's clock time, not the
    /// submitted timestamp.
    pub fn assert_link<P>(&mut self, link: &Link, policy: &P) -> Result<AssertOutcome>
    where
        P: OverridePolicy + ?Sized,
    {
        self.ensure_write_session()?;
        if let Some(existing) = self.link_for(&link.id1, &link.id2)? {
            if !policy.overrides(link, &existing) {
                debug!("kept existing link {} -> {}", link.id1, link.id2);
                return Ok(AssertOutcome::Kept);
            }
            self.conn.execute(
                "UPDATE links SET kind = ?3, status = ?4, timestamp = ?5
                 WHERE id1 = ?1 AND id2 = ?2",
                params![
                    link.id1,
                    link.id2,
                    link.kind.id(),
                    link.status.id(),
                    self.now_millis()
                ],
            )?;
            debug!("updated link {} -> {}", link.id1, link.id2);
            return Ok(AssertOutcome::Updated);
        }

        self.conn.execute(
            &format!("INSERT INTO links ({LINK_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5)"),
            params![
                link.id1,
                link.id2,
                link.kind.id(),
                link.status.id(),
                self.now_millis()
            ],
        )?;
        debug!("inserted link {} -> {}", link.id1, link.id2);
        Ok(AssertOutcome::Inserted)
    }

    /// Deletes every stored link and returns how many were removed.
    pub fn clear(&mut self) -> Result<usize> {
        self.ensure_write_session()?;
        let removed = self.conn.execute("DELETE FROM links", [])?;
        debug!("cleared {removed} links");
        Ok(removed)
    }

    pub fn commit(&mut self) -> Result<()> {
        if !self.conn.is_autocommit() {
            self.conn.execute_batch("COMMIT")?;
            debug!("committed link session");
        }
        self.write_locked = false;
        Ok(())
    }

    /// Discards uncommitted work and releases the connection.
    pub fn close(self) -> Result<()> {
        if !self.conn.is_autocommit() {
            self.conn.execute_batch("ROLLBACK")?;
        }
        self.conn.close().map_err(|(_, err)| LinkStoreError::Storage(err))
    }

    fn now_millis(&self) -> i64 {
        self.clock.now().timestamp_millis()
    }
}

fn link_from_row(row: &Row<'_>) -> Result<Link> {
    let kind: i64 = row.get(2)?;
    let status: i64 = row.get(3)?;
    let millis: i64 = row.get(4)?;
    Ok(Link {
        id1: row.get(0)?,
        id2: row.get(1)?,
        kind: LinkKind::from_id(kind).ok_or(LinkStoreError::UnknownCode {
            column: "kind",
            value: kind,
        })?,
        status: LinkStatus::from_id(status).ok_or(LinkStoreError::UnknownCode {
            column: "status",
            value: status,
        })?,
        timestamp: DateTime::from_timestamp_millis(millis)
            .ok_or(LinkStoreError::InvalidTimestamp(millis))?,
    })
}

fn validate_property_name(name: &str) -> Result<()> {
    if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(LinkStoreError::InvalidProperty(name.to_string()));
    }
    Ok(())
}
