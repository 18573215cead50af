//! Persistence of the last successfully loaded schedule snapshot.
//!
//! A snapshot is only served back while it is both younger than the TTL
//! and from the current reference-zone day. Read failures of any kind are
//! a miss, never an error — but the miss reason is kept for logging.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{debug, warn};

use crate::clock;
use crate::schedule::ScheduleEntry;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheSnapshot {
    /// When this process fetched the data.
    #[serde(rename = "fetchedAt")]
    pub fetched_at: DateTime<Utc>,
    /// Reference-zone day the snapshot was fetched for.
    pub date: String,
    /// Upstream-reported generation time, when the source provides one.
    #[serde(rename = "updatedAt", default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    pub items: Vec<ScheduleEntry>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissReason {
    NotFound,
    Corrupt,
    Expired,
    WrongDay,
}

#[derive(Debug, Clone)]
pub enum CacheRead {
    Hit(CacheSnapshot),
    Miss(MissReason),
}

impl CacheRead {
    pub fn into_hit(self) -> Option<CacheSnapshot> {
        match self {
            CacheRead::Hit(snapshot) => Some(snapshot),
            CacheRead::Miss(_) => None,
        }
    }
}

pub struct SnapshotStore {
    path: PathBuf,
    ttl_minutes: i64,
}

impl SnapshotStore {
    pub fn new(path: PathBuf, ttl_minutes: i64) -> Self {
        Self { path, ttl_minutes }
    }

    pub fn load(&self) -> CacheRead {
        self.load_at(Utc::now())
    }

    pub fn load_at(&self, now: DateTime<Utc>) -> CacheRead {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(_) => {
                debug!("snapshot cache: no file at {:?}", self.path);
                return CacheRead::Miss(MissReason::NotFound);
            }
        };

        let snapshot: CacheSnapshot = match serde_json::from_str(&content) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!("snapshot cache: unreadable {:?}: {}", self.path, e);
                return CacheRead::Miss(MissReason::Corrupt);
            }
        };

        if now - snapshot.fetched_at > Duration::minutes(self.ttl_minutes) {
            debug!(
                "snapshot cache: expired (fetched {}, ttl {} min)",
                snapshot.fetched_at, self.ttl_minutes
            );
            return CacheRead::Miss(MissReason::Expired);
        }

        let today = clock::today_reference_at(now);
        if snapshot.date != today {
            debug!(
                "snapshot cache: from {} but today is {}",
                snapshot.date, today
            );
            return CacheRead::Miss(MissReason::WrongDay);
        }

        CacheRead::Hit(snapshot)
    }

    /// Build a snapshot stamped with the current fetch time and day.
    pub fn stamp(
        &self,
        items: Vec<ScheduleEntry>,
        updated_at: Option<DateTime<Utc>>,
    ) -> CacheSnapshot {
        self.stamp_at(items, updated_at, Utc::now())
    }

    pub fn stamp_at(
        &self,
        items: Vec<ScheduleEntry>,
        updated_at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> CacheSnapshot {
        CacheSnapshot {
            fetched_at: now,
            date: clock::today_reference_at(now),
            updated_at,
            items,
        }
    }

    /// Write a snapshot to disk, overwriting any prior one. The caller
    /// decides what a failure means; the fetch path logs it and keeps
    /// going with the in-memory copy.
    pub fn persist(&self, snapshot: &CacheSnapshot) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(snapshot)?;
        std::fs::write(&self.path, json)?;
        Ok(())
    }

    /// Stamp + persist in one step.
    pub fn save_at(
        &self,
        items: Vec<ScheduleEntry>,
        updated_at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> anyhow::Result<CacheSnapshot> {
        let snapshot = self.stamp_at(items, updated_at, now);
        self.persist(&snapshot)?;
        Ok(snapshot)
    }
}
