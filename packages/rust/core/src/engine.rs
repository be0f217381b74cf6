//! Enrichment engine: selects pending raw records, analyzes them one at a
//! time, persists the normalized result and records the terminal status.
//!
//! Per-record state machine:
//!
//! ```text
//! Pending ──analyze ok──▶ insert enriched ──▶ mark Processed
//!    │                         │ insert fails
//!    └──analyze fails──────────┴──────────────▶ mark Failed
//! ```
//!
//! If the enriched insert succeeds but the Processed write fails, the record
//! stays Pending and is picked up again by a later run (at-least-once).

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use toolscout_analysis::Analyzer;
use toolscout_shared::{
    EnrichedPage, NewEnrichedRecord, PipelineStatus, RawRecord, RecordStatus, Result,
    StatusUpdate, ToolProfile, ToolscoutError, slug,
};
use toolscout_storage::{RecordStore, ResultStore};

use crate::limiter::RateLimiter;
use crate::normalize::normalize;
use crate::resolve::{ResolvedTool, resolve};

/// Largest page size served by [`EnrichmentEngine::enriched_page`].
pub const MAX_PAGE_SIZE: u64 = 100;

/// Numeric suffixes tried before falling back to a random one.
const MAX_SLUG_SUFFIX: u32 = 50;

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

/// Result of one processing attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AttemptResult {
    /// An enriched record was stored and the raw record marked Processed.
    Enriched {
        enriched_id: String,
        slug: String,
        /// The reply failed validation and the fallback profile was stored.
        fallback: bool,
    },
    /// The attempt failed; see `error`.
    Failed { error: String },
}

/// Per-record report used for batch summaries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordOutcome {
    pub record_id: String,
    /// Resolved display name.
    pub name: String,
    #[serde(flatten)]
    pub result: AttemptResult,
}

impl RecordOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self.result, AttemptResult::Enriched { .. })
    }
}

/// Aggregate of a batch run. `processed + failed == total`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchSummary {
    pub total: usize,
    pub processed: usize,
    pub failed: usize,
    pub outcomes: Vec<RecordOutcome>,
}

impl BatchSummary {
    fn push(&mut self, outcome: RecordOutcome) {
        if outcome.is_success() {
            self.processed += 1;
        } else {
            self.failed += 1;
        }
        self.outcomes.push(outcome);
    }
}

// ---------------------------------------------------------------------------
// Progress trait
// ---------------------------------------------------------------------------

/// Progress callback for batch runs.
pub trait BatchProgress: Send + Sync {
    /// Called once the work set is known.
    fn batch_started(&self, total: usize);
    /// Called before each attempt (1-based `current`).
    fn record_started(&self, current: usize, total: usize, name: &str);
    /// Called after each attempt reaches its terminal write.
    fn record_finished(&self, outcome: &RecordOutcome);
}

/// No-op batch progress.
pub struct SilentProgress;

impl BatchProgress for SilentProgress {
    fn batch_started(&self, _total: usize) {}
    fn record_started(&self, _current: usize, _total: usize, _name: &str) {}
    fn record_finished(&self, _outcome: &RecordOutcome) {}
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Drives raw records through analysis into the result store.
pub struct EnrichmentEngine {
    records: Arc<dyn RecordStore>,
    results: Arc<dyn ResultStore>,
    analyzer: Arc<dyn Analyzer>,
    limiter: Arc<dyn RateLimiter>,
}

impl EnrichmentEngine {
    pub fn new(
        records: Arc<dyn RecordStore>,
        results: Arc<dyn ResultStore>,
        analyzer: Arc<dyn Analyzer>,
        limiter: Arc<dyn RateLimiter>,
    ) -> Self {
        Self {
            records,
            results,
            analyzer,
            limiter,
        }
    }

    /// Snapshot of all pending records in store order.
    pub async fn select_pending(&self) -> Result<Vec<RawRecord>> {
        self.records.list_by_status(RecordStatus::Pending).await
    }

    /// The record with `id` if it is still pending, otherwise [`ToolscoutError::NotPending`].
    pub async fn select_pending_by_id(&self, id: &str) -> Result<RawRecord> {
        self.records
            .find_by_id_and_status(id, RecordStatus::Pending)
            .await?
            .ok_or_else(|| ToolscoutError::not_pending(id))
    }

    /// Process every pending record, sequentially, pausing after each attempt.
    ///
    /// Only a failure to select the work set is returned as an error;
    /// per-record failures are reported in the summary.
    #[instrument(skip_all)]
    pub async fn run_all_pending(&self, progress: &dyn BatchProgress) -> Result<BatchSummary> {
        let records = self.select_pending().await?;
        Ok(self.run_batch(records, progress).await)
    }

    /// Process `records` in order. Never aborts early.
    pub async fn run_batch(
        &self,
        records: Vec<RawRecord>,
        progress: &dyn BatchProgress,
    ) -> BatchSummary {
        let total = records.len();
        info!(total, "starting enrichment batch");
        progress.batch_started(total);

        let mut summary = BatchSummary {
            total,
            ..Default::default()
        };

        for (i, record) in records.iter().enumerate() {
            let resolved = resolve(record);
            progress.record_started(i + 1, total, &resolved.name);

            let outcome = self.attempt(record, &resolved).await;
            progress.record_finished(&outcome);
            summary.push(outcome);

            self.limiter.pause().await;
        }

        info!(
            total = summary.total,
            processed = summary.processed,
            failed = summary.failed,
            "enrichment batch complete"
        );
        summary
    }

    /// Process one explicitly requested record, if it is still pending.
    #[instrument(skip(self))]
    pub async fn run_single(&self, id: &str) -> Result<RecordOutcome> {
        let record = self.select_pending_by_id(id).await?;
        Ok(self.process_record(&record).await)
    }

    /// Run one attempt for `record` through to its terminal status write.
    pub async fn process_record(&self, record: &RawRecord) -> RecordOutcome {
        let resolved = resolve(record);
        self.attempt(record, &resolved).await
    }

    async fn attempt(&self, record: &RawRecord, resolved: &ResolvedTool) -> RecordOutcome {
        let raw = match self.analyzer.analyze(&resolved.name, &resolved.url).await {
            Ok(raw) => raw,
            Err(e) => return self.mark_failed(record, resolved, e.to_string()).await,
        };

        let normalized = normalize(&raw, &resolved.name, &resolved.url);

        let (enriched_id, slug) = match self
            .store_result(record, resolved, normalized.profile)
            .await
        {
            Ok(stored) => stored,
            Err(e) => return self.mark_failed(record, resolved, e.to_string()).await,
        };

        let done = StatusUpdate::Processed { at: Utc::now() };
        if let Err(e) = self.records.update_status(&record.id, &done).await {
            error!(
                record_id = %record.id,
                %enriched_id,
                error = %e,
                "enriched record stored but status update failed; record stays pending"
            );
            return RecordOutcome {
                record_id: record.id.clone(),
                name: resolved.name.clone(),
                result: AttemptResult::Failed {
                    error: format!("status update failed after storing {enriched_id}: {e}"),
                },
            };
        }

        info!(
            record_id = %record.id,
            %enriched_id,
            %slug,
            fallback = normalized.fallback,
            "record enriched"
        );
        RecordOutcome {
            record_id: record.id.clone(),
            name: resolved.name.clone(),
            result: AttemptResult::Enriched {
                enriched_id,
                slug,
                fallback: normalized.fallback,
            },
        }
    }

    async fn store_result(
        &self,
        record: &RawRecord,
        resolved: &ResolvedTool,
        mut profile: ToolProfile,
    ) -> Result<(String, String)> {
        let base = profile.slug.clone();
        profile.slug = self.unique_slug(&base).await?;

        let mut new = NewEnrichedRecord {
            original_id: record.id.clone(),
            profile,
            logo: resolved.logo.clone(),
            processed_at: Utc::now(),
        };

        let id = match self.results.insert_enriched(&new).await {
            Ok(id) => id,
            // A concurrent batch took the slug between the check and the insert.
            Err(e) if self.slug_taken(&new.profile.slug).await => {
                warn!(
                    slug = %new.profile.slug,
                    error = %e,
                    "slug claimed concurrently, reassigning"
                );
                new.profile.slug = self.unique_slug(&base).await?;
                self.results.insert_enriched(&new).await?
            }
            Err(e) => return Err(e),
        };
        Ok((id, new.profile.slug))
    }

    async fn slug_taken(&self, slug: &str) -> bool {
        self.results.slug_exists(slug).await.unwrap_or(false)
    }

    /// `base`, or `base-2`, `base-3`, … whichever is not yet taken.
    async fn unique_slug(&self, base: &str) -> Result<String> {
        if !self.results.slug_exists(base).await? {
            return Ok(base.to_string());
        }
        for n in 2..=MAX_SLUG_SUFFIX {
            let candidate = slug::with_suffix(base, n);
            if !self.results.slug_exists(&candidate).await? {
                return Ok(candidate);
            }
        }
        Ok(format!("{base}-{}", Uuid::now_v7().simple()))
    }

    async fn mark_failed(
        &self,
        record: &RawRecord,
        resolved: &ResolvedTool,
        message: String,
    ) -> RecordOutcome {
        warn!(record_id = %record.id, tool = %resolved.name, error = %message, "enrichment failed");

        let update = StatusUpdate::Failed {
            message: message.clone(),
            at: Utc::now(),
        };
        if let Err(e) = self.records.update_status(&record.id, &update).await {
            error!(
                record_id = %record.id,
                error = %e,
                "could not record failure; record stays pending"
            );
        }

        RecordOutcome {
            record_id: record.id.clone(),
            name: resolved.name.clone(),
            result: AttemptResult::Failed { error: message },
        }
    }

    /// Counts of raw records per status plus the enriched total.
    pub async fn pipeline_status(&self) -> Result<PipelineStatus> {
        pipeline_status(self.records.as_ref(), self.results.as_ref()).await
    }

    /// One page (1-based) of enriched records, newest first.
    pub async fn enriched_page(&self, page: u64, page_size: u64) -> Result<EnrichedPage> {
        enriched_page(self.results.as_ref(), page, page_size).await
    }
}

// ---------------------------------------------------------------------------
// Read side
// ---------------------------------------------------------------------------

/// Counts of raw records per status plus the enriched total.
///
/// Usable without an engine, e.g. when no analysis credentials are configured.
pub async fn pipeline_status(
    records: &dyn RecordStore,
    results: &dyn ResultStore,
) -> Result<PipelineStatus> {
    Ok(PipelineStatus {
        pending: records.count_by_status(RecordStatus::Pending).await?,
        processed: records.count_by_status(RecordStatus::Processed).await?,
        failed: records.count_by_status(RecordStatus::Failed).await?,
        total_enriched: results.count_enriched().await?,
    })
}

/// One page of enriched records, newest first. `page` is 1-based (0 is
/// treated as 1) and `page_size` is clamped to `1..=MAX_PAGE_SIZE`.
pub async fn enriched_page(
    results: &dyn ResultStore,
    page: u64,
    page_size: u64,
) -> Result<EnrichedPage> {
    let page = page.max(1);
    let page_size = page_size.clamp(1, MAX_PAGE_SIZE);
    let total = results.count_enriched().await?;

    let items = match (page - 1).checked_mul(page_size) {
        Some(offset) if offset < total => results.list_enriched_page(offset, page_size).await?,
        _ => Vec::new(),
    };

    Ok(EnrichedPage {
        items,
        page,
        page_size,
        total,
        total_pages: total.div_ceil(page_size),
    })
}
