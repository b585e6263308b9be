use std::path::PathBuf;
use std::time::Duration;

use honey_core::{HourBucket, ObjectStore, QueryService};
use serde::Serialize;
use tracing::{error, info, warn};

use crate::aggregate::{AggregationPlan, StepOutcome};
use crate::clock::{Clock, Shutdown};
use crate::marker::{marker_path, read_marker};
use crate::pipeline::sync_ledger;
use crate::query::{PollPolicy, QueryRunner};
use crate::types::{SyncIssue, SyncStats};

pub const DEFAULT_SYNC_INTERVAL: Duration = Duration::from_secs(10 * 60);

#[derive(Debug, Clone)]
pub struct SyncSettings {
    pub data_path: PathBuf,
    /// Object store bucket receiving ledger files.
    pub bucket: String,
    pub prefix: String,
    pub interval: Duration,
    pub poll: PollPolicy,
    pub plan: AggregationPlan,
}

/// Aggregation runs when new data landed this tick, or on the first tick
/// after start so published results catch up with earlier uploads.
pub fn should_aggregate(files_published: usize, first_tick: bool) -> bool {
    files_published > 0 || first_tick
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct AggregationSummary {
    pub steps: Vec<StepOutcome>,
    pub error: Option<String>,
}

impl AggregationSummary {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TickReport {
    pub marker: Option<HourBucket>,
    pub first_tick: bool,
    pub stats: SyncStats,
    /// `None` when aggregation was not triggered.
    pub aggregation: Option<AggregationSummary>,
}

/// The long-running publisher: one tick every `interval`.
pub struct Uploader<S, Q, C> {
    settings: SyncSettings,
    store: S,
    queries: Q,
    clock: C,
    first_tick: bool,
}

impl<S, Q, C> Uploader<S, Q, C>
where
    S: ObjectStore,
    Q: QueryService,
    C: Clock,
{
    pub fn new(settings: SyncSettings, store: S, queries: Q, clock: C) -> Self {
        Self {
            settings,
            store,
            queries,
            clock,
            first_tick: true,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn is_first_tick(&self) -> bool {
        self.first_tick
    }

    pub fn tick(&mut self) -> TickReport {
        let marker = read_marker(&marker_path(&self.settings.data_path));
        let stats = match marker {
            None => {
                info!(data_path = %self.settings.data_path.display(), "skipping publication: no cursor marker");
                SyncStats::default()
            }
            Some(marker) => self.publish_ledger(marker),
        };

        let first_tick = std::mem::replace(&mut self.first_tick, false);
        let aggregation = should_aggregate(stats.files_published, first_tick)
            .then(|| self.aggregate());

        info!(
            marker = %marker.map(|value| value.to_string()).unwrap_or_default(),
            scanned = stats.files_scanned,
            skipped = stats.files_skipped,
            published = stats.files_published,
            failed = stats.files_failed,
            aggregated = aggregation.is_some(),
            "sync tick finished"
        );
        TickReport {
            marker,
            first_tick,
            stats,
            aggregation,
        }
    }

    /// Ticks until `shutdown` is triggered. Returns the number of ticks run.
    pub fn run(&mut self, shutdown: &Shutdown) -> usize {
        let mut ticks = 0;
        info!(interval_secs = self.settings.interval.as_secs(), "starting uploader");
        while !shutdown.is_triggered() {
            self.tick();
            ticks += 1;
            if shutdown.is_triggered() {
                break;
            }
            self.clock.sleep(self.settings.interval);
        }
        info!(ticks, "stopped uploader");
        ticks
    }

    fn publish_ledger(&self, marker: HourBucket) -> SyncStats {
        let settings = &self.settings;
        match sync_ledger(
            &self.store,
            &settings.data_path,
            marker,
            &settings.bucket,
            &settings.prefix,
        ) {
            Ok(stats) => stats,
            Err(err) => {
                error!(data_path = %settings.data_path.display(), error = %err, "ledger scan failed");
                SyncStats {
                    issues: vec![SyncIssue::new(
                        settings.data_path.display().to_string(),
                        format!("ledger scan failed: {err}"),
                    )],
                    ..SyncStats::default()
                }
            }
        }
    }

    fn aggregate(&self) -> AggregationSummary {
        let runner = QueryRunner::new(&self.queries, &self.clock, self.settings.poll);
        match self.settings.plan.run(&runner, &self.store) {
            Ok(report) => AggregationSummary {
                steps: report.steps,
                error: None,
            },
            Err(err) => {
                warn!(error = %err, "aggregation aborted for this tick");
                AggregationSummary {
                    steps: Vec::new(),
                    error: Some(err.to_string()),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aggregation_trigger_policy() {
        assert!(!should_aggregate(0, false));
        assert!(should_aggregate(0, true));
        assert!(should_aggregate(1, false));
        assert!(should_aggregate(3, true));
    }
}
