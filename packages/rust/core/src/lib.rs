//! Enrichment pipeline for toolscout.
//!
//! Ties the record and result stores to an [`Analyzer`](toolscout_analysis::Analyzer):
//! field resolution, reply normalization, batch orchestration with pacing,
//! and the automatic trigger.

pub mod engine;
pub mod limiter;
pub mod normalize;
pub mod resolve;
pub mod scheduler;

#[cfg(test)]
mod testing;

pub use engine::{
    AttemptResult, BatchProgress, BatchSummary, EnrichmentEngine, MAX_PAGE_SIZE, RecordOutcome,
    SilentProgress, enriched_page, pipeline_status,
};
pub use limiter::{FixedDelay, NoDelay, RateLimiter, limiter_for};
pub use normalize::{Normalized, normalize};
pub use resolve::{ResolvedTool, resolve};
pub use scheduler::{AutoTrigger, Scheduler, SchedulerHandle, TriggerSource};
