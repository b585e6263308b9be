mod aggregate;
mod clock;
mod collector;
mod ledger;
mod marker;
mod paths;
mod pipeline;
mod publish;
mod query;
mod repair;
mod results;
mod store;
mod types;
mod uploader;

pub use aggregate::{
    AggregateStep, AggregationPlan, AggregationReport, AggregationSettings, StepOutcome,
    PARTITION_REPAIR_STEP,
};
pub use clock::{Clock, ManualClock, Shutdown, SystemClock};
pub use collector::{PulseCounter, SaveOutcome, save_tick};
pub use ledger::{LedgerFile, append_record, ledger_path, list_ledger_files, split_eligible};
pub use marker::{MARKER_FILE_NAME, marker_path, read_marker, write_marker};
pub use paths::{default_data_path, expand_home};
pub use pipeline::sync_ledger;
pub use publish::{PublishOutcome, publish_file};
pub use query::{
    DEFAULT_MAX_ATTEMPTS, DEFAULT_POLL_INTERVAL, PollPolicy, QueryError, QueryRunner, RunnerState,
};
pub use repair::{RepairOutcome, repair_file};
pub use results::publish_result;
pub use store::{FsObjectStore, MemoryObjectStore};
pub use types::{AggregationError, Result, SyncError, SyncIssue, SyncStats};
pub use uploader::{
    AggregationSummary, DEFAULT_SYNC_INTERVAL, SyncSettings, TickReport, Uploader,
    should_aggregate,
};
