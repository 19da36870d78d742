//! Sequential sampling loop

use std::sync::Arc;
use std::time::Duration;

use qdigest_core::{Connection, DocumentStore, Iterations};
use qdigest_monitor::PlanSampler;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::record_writer::RecordWriter;

/// Source of sample timestamps, in epoch seconds
pub type Clock = fn() -> i64;

pub fn system_clock() -> i64 {
    chrono::Utc::now().timestamp()
}

/// The live sessions a run samples through, built once at startup
#[derive(Clone)]
pub struct PipelineContext {
    pub source_admin: Arc<dyn Connection>,
    pub source_app: Arc<dyn Connection>,
    pub destination: Arc<dyn DocumentStore>,
}

impl PipelineContext {
    pub fn new(
        source_admin: Arc<dyn Connection>,
        source_app: Arc<dyn Connection>,
        destination: Arc<dyn DocumentStore>,
    ) -> Self {
        Self {
            source_admin,
            source_app,
            destination,
        }
    }
}

/// Counts from one [`Orchestrator::run`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub attempted: u64,
    pub written: u64,
    pub sampling_failures: u64,
    pub write_failures: u64,
}

impl RunSummary {
    pub fn failures(&self) -> u64 {
        self.sampling_failures + self.write_failures
    }
}

/// Drives sampling iterations one after another
pub struct Orchestrator {
    sampler: PlanSampler,
    writer: RecordWriter,
    query: String,
    iterations: Iterations,
    interval: Duration,
    clock: Clock,
}

impl Orchestrator {
    pub fn new(
        sampler: PlanSampler,
        writer: RecordWriter,
        query: impl Into<String>,
        iterations: Iterations,
    ) -> Self {
        Self {
            sampler,
            writer,
            query: query.into(),
            iterations,
            interval: Duration::ZERO,
            clock: system_clock,
        }
    }

    /// Pause between iterations
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn writer(&self) -> &RecordWriter {
        &self.writer
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    /// Run until the iteration budget is spent or `cancel` fires
    ///
    /// Cancellation is observed between iterations and during the pause; an
    /// iteration already in flight finishes first.
    #[tracing::instrument(skip(self, ctx, cancel), fields(iterations = ?self.iterations))]
    pub async fn run(&self, ctx: &PipelineContext, cancel: &CancellationToken) -> RunSummary {
        let mut summary = RunSummary::default();
        let mut last_timestamp = i64::MIN;

        while self.iterations.allows(summary.attempted) && !cancel.is_cancelled() {
            summary.attempted += 1;
            let timestamp = (self.clock)().max(last_timestamp);
            last_timestamp = timestamp;

            match self
                .sampler
                .sample(
                    ctx.source_app.as_ref(),
                    ctx.source_admin.as_ref(),
                    &self.query,
                    timestamp,
                )
                .await
            {
                Ok(record) => match self.writer.write(ctx.destination.as_ref(), &record).await {
                    Ok(()) => summary.written += 1,
                    Err(e) => {
                        summary.write_failures += 1;
                        tracing::warn!(iteration = summary.attempted, error = %e, "write failed");
                    }
                },
                Err(e) => {
                    summary.sampling_failures += 1;
                    tracing::warn!(iteration = summary.attempted, error = %e, "sampling failed");
                }
            }

            if !self.iterations.allows(summary.attempted) || self.interval.is_zero() {
                continue;
            }
            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {}
                _ = cancel.cancelled() => break,
            }
        }

        if cancel.is_cancelled() {
            tracing::info!(attempted = summary.attempted, "run cancelled");
        }
        tracing::info!(
            attempted = summary.attempted,
            written = summary.written,
            sampling_failures = summary.sampling_failures,
            write_failures = summary.write_failures,
            "run finished"
        );
        summary
    }
}
