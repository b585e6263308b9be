use honey_core::{ObjectLocation, ObjectStore, QueryService};
use serde::Serialize;
use tracing::{info, warn};

use crate::clock::Clock;
use crate::query::QueryRunner;
use crate::results::publish_result;
use crate::types::AggregationError;

pub const PARTITION_REPAIR_STEP: &str = "repair-partitions";

const REPAIR_PARTITIONS_SQL: &str = "MSCK REPAIR TABLE {table}";

const TOTAL_ROTATIONS_SQL: &str =
    "SELECT COALESCE(SUM(count), 0) AS total_rotations FROM {table}";

const PRIOR_7_DAY_WINDOW_SQL: &str = "\
SELECT strftime('%Y-%m-%dT%H:00:00Z', ts) AS hour_start, SUM(count) AS rotations \
FROM {table} \
WHERE datetime(ts) >= datetime('now', '-14 days') AND datetime(ts) < datetime('now', '-7 days') \
GROUP BY hour_start ORDER BY hour_start";

const SEVEN_DAY_WINDOW_SQL: &str = "\
SELECT strftime('%Y-%m-%dT%H:00:00Z', ts) AS hour_start, SUM(count) AS rotations \
FROM {table} \
WHERE datetime(ts) >= datetime('now', '-7 days') \
GROUP BY hour_start ORDER BY hour_start";

const ONE_YEAR_WINDOW_SQL: &str = "\
SELECT date(ts) AS day_start, SUM(count) AS rotations \
FROM {table} \
WHERE datetime(ts) >= datetime('now', '-365 days') \
GROUP BY day_start ORDER BY day_start";

/// Where aggregation queries run and where their results go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregationSettings {
    pub database: String,
    pub workgroup: String,
    pub table: String,
    pub results_location: ObjectLocation,
    pub public_location: ObjectLocation,
}

/// One named query. Steps with `publish_as` copy their result to the public
/// location; the others only have to succeed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregateStep {
    pub name: String,
    pub query: String,
    pub publish_as: Option<String>,
}

impl AggregateStep {
    pub fn new(name: &str, template: &str, table: &str) -> Self {
        Self {
            name: name.to_string(),
            query: template.replace("{table}", table),
            publish_as: None,
        }
    }

    pub fn published(mut self) -> Self {
        self.publish_as = Some(format!("{}.csv", self.name));
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepOutcome {
    pub step: String,
    pub execution_id: String,
    pub published: Option<ObjectLocation>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AggregationReport {
    pub steps: Vec<StepOutcome>,
}

/// Ordered, dependent query steps. Runs strictly in sequence and stops at the
/// first error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregationPlan {
    settings: AggregationSettings,
    steps: Vec<AggregateStep>,
}

impl AggregationPlan {
    pub fn new(settings: AggregationSettings, steps: Vec<AggregateStep>) -> Self {
        Self { settings, steps }
    }

    /// Partition repair followed by the four published rotation rollups.
    pub fn rotations(settings: AggregationSettings) -> Self {
        let table = settings.table.clone();
        let steps = vec![
            AggregateStep::new(PARTITION_REPAIR_STEP, REPAIR_PARTITIONS_SQL, &table),
            AggregateStep::new("total-rotations", TOTAL_ROTATIONS_SQL, &table).published(),
            AggregateStep::new("prior-7-day-window", PRIOR_7_DAY_WINDOW_SQL, &table).published(),
            AggregateStep::new("7-day-window", SEVEN_DAY_WINDOW_SQL, &table).published(),
            AggregateStep::new("1-year-window", ONE_YEAR_WINDOW_SQL, &table).published(),
        ];
        Self::new(settings, steps)
    }

    pub fn steps(&self) -> &[AggregateStep] {
        &self.steps
    }

    pub fn run<Q, C, S>(
        &self,
        runner: &QueryRunner<'_, Q, C>,
        store: &S,
    ) -> Result<AggregationReport, AggregationError>
    where
        Q: QueryService,
        C: Clock,
        S: ObjectStore,
    {
        let mut report = AggregationReport::default();
        for step in &self.steps {
            let execution_id = runner
                .run(&step.query, &self.settings.database, &self.settings.workgroup)
                .map_err(|source| {
                    warn!(step = %step.name, error = %source, "aggregation step failed");
                    AggregationError::Query {
                        step: step.name.clone(),
                        source,
                    }
                })?;
            let published = match &step.publish_as {
                Some(name) => {
                    let destination = self.settings.public_location.join(name);
                    publish_result(store, &self.settings.results_location, &execution_id, &destination)
                        .map_err(|source| AggregationError::Publish {
                            step: step.name.clone(),
                            execution_id: execution_id.clone(),
                            source,
                        })?;
                    Some(destination)
                }
                None => None,
            };
            info!(step = %step.name, %execution_id, "aggregation step finished");
            report.steps.push(StepOutcome {
                step: step.name.clone(),
                execution_id,
                published,
            });
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> AggregationSettings {
        AggregationSettings {
            database: "honey".to_string(),
            workgroup: "primary".to_string(),
            table: "rotations".to_string(),
            results_location: ObjectLocation::new("honey-data", "query-results"),
            public_location: ObjectLocation::new("honey-public", ""),
        }
    }

    #[test]
    fn rotations_plan_starts_with_partition_repair() {
        let plan = AggregationPlan::rotations(settings());
        let names: Vec<&str> = plan.steps().iter().map(|step| step.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                PARTITION_REPAIR_STEP,
                "total-rotations",
                "prior-7-day-window",
                "7-day-window",
                "1-year-window"
            ]
        );
        assert_eq!(plan.steps()[0].query, "MSCK REPAIR TABLE rotations");
        assert_eq!(plan.steps()[0].publish_as, None);
        assert_eq!(
            plan.steps()[2].publish_as.as_deref(),
            Some("prior-7-day-window.csv")
        );
        assert!(
            plan.steps()
                .iter()
                .all(|step| !step.query.contains("{table}"))
        );
    }
}
