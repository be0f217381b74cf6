//! In-memory stores and a scripted analyzer for engine and scheduler tests.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::Utc;

use toolscout_analysis::Analyzer;
use toolscout_shared::{
    EnrichedRecord, NewEnrichedRecord, RawRecord, RecordStatus, Result, StatusUpdate,
    ToolscoutError,
};
use toolscout_storage::{RecordStore, ResultStore};

use crate::limiter::RateLimiter;

pub(crate) fn raw_record(id: &str, fields: serde_json::Value) -> RawRecord {
    RawRecord {
        id: id.into(),
        fields: fields.as_object().cloned().expect("fields object"),
        status: RecordStatus::Pending,
        error_message: None,
        error_at: None,
        processed_at: None,
        created_at: Utc::now(),
    }
}

/// A reply that passes validation for `name`.
pub(crate) fn valid_reply(name: &str) -> String {
    serde_json::json!({
        "name": name,
        "website": format!("https://{}.example", name.to_lowercase()),
        "tagline": format!("{name} does things"),
        "description": format!("{name} is a tool."),
        "features": [{"name": "Core", "description": "The main thing"}],
        "pros_cons": {"pros": ["Useful"], "cons": []},
        "use_cases": ["Testing"]
    })
    .to_string()
}

// ---------------------------------------------------------------------------
// MemoryStore
// ---------------------------------------------------------------------------

/// Both store seams over in-memory vectors, with switchable write failures.
#[derive(Default)]
pub(crate) struct MemoryStore {
    raw: Mutex<Vec<RawRecord>>,
    enriched: Mutex<Vec<EnrichedRecord>>,
    next_id: AtomicUsize,
    pub fail_inserts: AtomicBool,
    pub fail_processed_updates: AtomicBool,
    pub fail_selection: AtomicBool,
    /// Next `slug_exists` answers false, as if another writer raced the check.
    pub stale_slug_check: AtomicBool,
}

impl MemoryStore {
    pub fn with_records(records: Vec<RawRecord>) -> Self {
        Self {
            raw: Mutex::new(records),
            ..Self::default()
        }
    }

    pub fn push(&self, record: RawRecord) {
        self.raw.lock().unwrap().push(record);
    }

    pub fn raw(&self, id: &str) -> RawRecord {
        self.raw
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.id == id)
            .cloned()
            .expect("raw record exists")
    }

    pub fn enriched(&self) -> Vec<EnrichedRecord> {
        self.enriched.lock().unwrap().clone()
    }

    pub fn enriched_for(&self, original_id: &str) -> Vec<EnrichedRecord> {
        self.enriched()
            .into_iter()
            .filter(|e| e.record.original_id == original_id)
            .collect()
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn list_by_status(&self, status: RecordStatus) -> Result<Vec<RawRecord>> {
        if self.fail_selection.load(Ordering::SeqCst) {
            return Err(ToolscoutError::Storage("store unreachable".into()));
        }
        Ok(self
            .raw
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.status == status)
            .cloned()
            .collect())
    }

    async fn find_by_id_and_status(
        &self,
        id: &str,
        status: RecordStatus,
    ) -> Result<Option<RawRecord>> {
        Ok(self
            .raw
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.id == id && r.status == status)
            .cloned())
    }

    async fn update_status(&self, id: &str, update: &StatusUpdate) -> Result<()> {
        if matches!(update, StatusUpdate::Processed { .. })
            && self.fail_processed_updates.load(Ordering::SeqCst)
        {
            return Err(ToolscoutError::Storage("status write timed out".into()));
        }

        let mut raw = self.raw.lock().unwrap();
        let record = raw
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| ToolscoutError::Storage(format!("no raw record with id {id}")))?;

        record.status = update.status();
        match update {
            StatusUpdate::Processed { at } => {
                record.processed_at = Some(*at);
                record.error_message = None;
                record.error_at = None;
            }
            StatusUpdate::Failed { message, at } => {
                record.processed_at = Some(*at);
                record.error_message = Some(message.clone());
                record.error_at = Some(*at);
            }
            StatusUpdate::Pending => {
                record.processed_at = None;
                record.error_message = None;
                record.error_at = None;
            }
        }
        Ok(())
    }

    async fn count_by_status(&self, status: RecordStatus) -> Result<u64> {
        Ok(self
            .raw
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.status == status)
            .count() as u64)
    }
}

#[async_trait]
impl ResultStore for MemoryStore {
    async fn insert_enriched(&self, record: &NewEnrichedRecord) -> Result<String> {
        if self.fail_inserts.load(Ordering::SeqCst) {
            return Err(ToolscoutError::Storage("disk full".into()));
        }
        let mut enriched = self.enriched.lock().unwrap();
        if enriched
            .iter()
            .any(|e| e.record.profile.slug == record.profile.slug)
        {
            return Err(ToolscoutError::Storage("UNIQUE constraint failed: slug".into()));
        }
        let id = format!("e{}", self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        enriched.push(EnrichedRecord {
            id: id.clone(),
            record: record.clone(),
        });
        Ok(id)
    }

    async fn list_enriched_page(&self, offset: u64, limit: u64) -> Result<Vec<EnrichedRecord>> {
        let mut all = self.enriched();
        all.reverse();
        all.sort_by(|a, b| b.record.processed_at.cmp(&a.record.processed_at));
        Ok(all
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect())
    }

    async fn count_enriched(&self) -> Result<u64> {
        Ok(self.enriched.lock().unwrap().len() as u64)
    }

    async fn slug_exists(&self, slug: &str) -> Result<bool> {
        if self.stale_slug_check.swap(false, Ordering::SeqCst) {
            return Ok(false);
        }
        Ok(self
            .enriched
            .lock()
            .unwrap()
            .iter()
            .any(|e| e.record.profile.slug == slug))
    }
}

// ---------------------------------------------------------------------------
// ScriptedAnalyzer
// ---------------------------------------------------------------------------

/// Replies from a per-name script; unscripted names get [`valid_reply`].
#[derive(Default)]
pub(crate) struct ScriptedAnalyzer {
    script: Mutex<HashMap<String, std::result::Result<String, String>>>,
    calls: Mutex<Vec<(String, String)>>,
}

impl ScriptedAnalyzer {
    pub fn reply(self, name: &str, text: impl Into<String>) -> Self {
        self.script
            .lock()
            .unwrap()
            .insert(name.into(), Ok(text.into()));
        self
    }

    pub fn fail(self, name: &str, error: &str) -> Self {
        self.script
            .lock()
            .unwrap()
            .insert(name.into(), Err(error.into()));
        self
    }

    /// `(name, url)` pairs in call order.
    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Analyzer for ScriptedAnalyzer {
    async fn analyze(&self, name: &str, url: &str) -> Result<String> {
        self.calls
            .lock()
            .unwrap()
            .push((name.to_string(), url.to_string()));
        match self.script.lock().unwrap().get(name) {
            Some(Ok(text)) => Ok(text.clone()),
            Some(Err(e)) => Err(ToolscoutError::Analysis(e.clone())),
            None => Ok(valid_reply(name)),
        }
    }
}

// ---------------------------------------------------------------------------
// CountingLimiter
// ---------------------------------------------------------------------------

/// Never waits; counts how often it was asked to.
#[derive(Default)]
pub(crate) struct CountingLimiter {
    pauses: AtomicUsize,
}

impl CountingLimiter {
    pub fn pauses(&self) -> usize {
        self.pauses.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RateLimiter for CountingLimiter {
    async fn pause(&self) {
        self.pauses.fetch_add(1, Ordering::SeqCst);
    }
}
