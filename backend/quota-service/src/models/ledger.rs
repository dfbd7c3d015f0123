//! Per-user quota ledger.
//!
//! The ledger is the only quota state written directly by events. Storage, usage and the
//! counters of the query view are projections of it, so replaying a ledger always yields
//! the same read-models and no consumer can drift from another.

use chrono::{DateTime, Utc};
use document_store::Document;
use serde::{Deserialize, Serialize};

/// What a ledger entry records.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum EntryKind {
    Provisioned {
        total_storage: u64,
        daily_limit: u64,
    },
    VideoAdded {
        video_id: String,
        size: u64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        gallery_event_id: Option<String>,
    },
    VideoRemoved {
        video_id: String,
        size: u64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        gallery_event_id: Option<String>,
    },
}

impl EntryKind {
    pub fn label(&self) -> &'static str {
        match self {
            EntryKind::Provisioned { .. } => "provisioned",
            EntryKind::VideoAdded { .. } => "videoAdded",
            EntryKind::VideoRemoved { .. } => "videoRemoved",
        }
    }

    /// Same fact recorded twice: one video can be added once and removed once. Entries
    /// without a video id cannot be told apart this way.
    fn same_fact(&self, other: &EntryKind) -> bool {
        match (self, other) {
            (EntryKind::Provisioned { .. }, EntryKind::Provisioned { .. }) => true,
            (
                EntryKind::VideoAdded { video_id: a, .. },
                EntryKind::VideoAdded { video_id: b, .. },
            )
            | (
                EntryKind::VideoRemoved { video_id: a, .. },
                EntryKind::VideoRemoved { video_id: b, .. },
            ) => !a.is_empty() && a == b,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LedgerEntry {
    /// 1-based position in the ledger
    pub sequence: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_id: Option<String>,
    #[serde(flatten)]
    pub kind: EntryKind,
    pub recorded_at: DateTime<Utc>,
}

/// Storage totals derived from a ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StorageTotals {
    pub total: u64,
    pub used: u64,
    pub free: u64,
}

/// Bandwidth totals derived from a ledger. Removals never give bandwidth back and there
/// is no daily reset, so `daily` equals `total`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UsageTotals {
    pub total: u64,
    pub daily: u64,
    pub limit: u64,
    pub free: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct QuotaLedger {
    pub user_id: String,
    pub entries: Vec<LedgerEntry>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Document for QuotaLedger {
    const COLLECTION: &'static str = "quota_ledgers";

    fn id(&self) -> &str {
        &self.user_id
    }
}

impl QuotaLedger {
    /// A new ledger opened with a `Provisioned` entry.
    pub fn provisioned(
        user_id: impl Into<String>,
        event_id: Option<String>,
        total_storage: u64,
        daily_limit: u64,
    ) -> Self {
        let now = Utc::now();
        let mut ledger = Self {
            user_id: user_id.into(),
            entries: Vec::new(),
            created_at: now,
            updated_at: now,
        };
        ledger.append(
            event_id,
            EntryKind::Provisioned {
                total_storage,
                daily_limit,
            },
        );
        ledger
    }

    /// Sequence of the newest entry; versions every projection of this ledger.
    pub fn head(&self) -> u64 {
        self.entries.last().map(|e| e.sequence).unwrap_or(0)
    }

    pub fn contains_event(&self, event_id: &str) -> bool {
        self.entries
            .iter()
            .any(|e| e.event_id.as_deref() == Some(event_id))
    }

    /// Append a fact unless it is already recorded, either under the same event id or as
    /// the same fact about the same video. Returns whether an entry was added.
    pub fn append(&mut self, event_id: Option<String>, kind: EntryKind) -> bool {
        if let Some(id) = event_id.as_deref() {
            if self.contains_event(id) {
                return false;
            }
        }
        if self.entries.iter().any(|e| e.kind.same_fact(&kind)) {
            return false;
        }

        let now = Utc::now();
        self.entries.push(LedgerEntry {
            sequence: self.head() + 1,
            event_id,
            kind,
            recorded_at: now,
        });
        self.updated_at = now;
        true
    }

    fn limits(&self) -> (u64, u64) {
        self.entries
            .iter()
            .rev()
            .find_map(|e| match e.kind {
                EntryKind::Provisioned {
                    total_storage,
                    daily_limit,
                } => Some((total_storage, daily_limit)),
                _ => None,
            })
            .unwrap_or((0, 0))
    }

    pub fn storage(&self) -> StorageTotals {
        let (total, _) = self.limits();
        let (added, removed) = self.entries.iter().fold((0u64, 0u64), |(a, r), e| match e.kind {
            EntryKind::VideoAdded { size, .. } => (a.saturating_add(size), r),
            EntryKind::VideoRemoved { size, .. } => (a, r.saturating_add(size)),
            EntryKind::Provisioned { .. } => (a, r),
        });
        let used = added.saturating_sub(removed);
        StorageTotals {
            total,
            used,
            free: total.saturating_sub(used),
        }
    }

    pub fn usage(&self) -> UsageTotals {
        let (_, limit) = self.limits();
        let total = self
            .entries
            .iter()
            .map(|e| match e.kind {
                EntryKind::VideoAdded { size, .. } => size,
                _ => 0,
            })
            .fold(0u64, u64::saturating_add);
        UsageTotals {
            total,
            daily: total,
            limit,
            free: limit.saturating_sub(total),
        }
    }
}
