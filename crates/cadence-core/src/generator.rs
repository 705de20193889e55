use chrono::{Duration, NaiveDate, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::CoreError;
use crate::models::{GeneratorConfig, NewInstanceData, Task};
use crate::recurrence::{self, OccurrenceCalculator, RecurrenceRule};
use crate::repository::SeriesStore;

/// Which boards a generation run covers. The permission layer resolves
/// the boards a caller may see; the generator trusts that set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationScope {
    Board(Uuid),
    Boards(Vec<Uuid>),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreatedInstance {
    pub series_id: Uuid,
    pub instance_id: Uuid,
    pub occurrence_date: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedSeries {
    pub series_id: Uuid,
    pub error: String,
}

/// Result of one generation run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GenerationReport {
    pub created: Vec<CreatedInstance>,
    pub skipped: Vec<Uuid>,
    pub failed: Vec<FailedSeries>,
}

impl GenerationReport {
    fn record(mut self, outcome: SeriesOutcome) -> Self {
        match outcome {
            SeriesOutcome::Created(created) => self.created.push(created),
            SeriesOutcome::Skipped { series_id, .. } => self.skipped.push(series_id),
            SeriesOutcome::Failed(failed) => self.failed.push(failed),
        }
        self
    }
}

/// Why a series produced no instance in a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Rule missing, undecodable or unable to reach today
    MalformedRule,
    /// `endCount` instances already exist
    CountReached,
    /// Today or the next occurrence is past `endDate`
    Ended,
    /// Next occurrence is outside the lookahead window
    BeyondLookahead,
    /// An instance for the next occurrence already exists
    AlreadyMaterialized,
}

/// Outcome of evaluating a single series.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SeriesOutcome {
    Created(CreatedInstance),
    Skipped { series_id: Uuid, reason: SkipReason },
    Failed(FailedSeries),
}

/// Notified synchronously for every instance a run creates.
///
/// The notification fires as soon as the instance is stored, before the
/// series marker is advanced, so an instance is announced even when its
/// series is later reported as failed.
pub trait InstanceListener: Send + Sync {
    fn instance_created(&self, created: &CreatedInstance);
}

impl InstanceListener for tokio::sync::mpsc::UnboundedSender<CreatedInstance> {
    fn instance_created(&self, created: &CreatedInstance) {
        if self.send(created.clone()).is_err() {
            debug!(series_id = %created.series_id, "instance listener channel closed");
        }
    }
}

/// Materializes due occurrences of recurring series.
///
/// Safe to run repeatedly and concurrently: an occurrence already backed by
/// an instance is skipped, and the store's uniqueness guarantee turns a lost
/// race into a skip as well. Each series is evaluated on its own; a failing
/// series is reported and the scan moves on.
pub struct InstanceGenerator<S> {
    store: S,
    config: GeneratorConfig,
    calculator: OccurrenceCalculator,
    listener: Option<Arc<dyn InstanceListener>>,
}

impl<S: SeriesStore> InstanceGenerator<S> {
    pub fn new(store: S, config: GeneratorConfig) -> Self {
        let calculator = OccurrenceCalculator::from_config(&config);
        Self {
            store,
            config,
            calculator,
            listener: None,
        }
    }

    pub fn with_listener(mut self, listener: Arc<dyn InstanceListener>) -> Self {
        self.listener = Some(listener);
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    /// Runs generation for `scope` as of the current UTC date.
    pub async fn generate(&self, scope: &GenerationScope) -> Result<GenerationReport, CoreError> {
        self.generate_on(scope, Utc::now().date_naive()).await
    }

    /// Runs generation for `scope` as of `today`.
    ///
    /// Only loading the series can fail the whole run; everything after
    /// that is reported per series.
    pub async fn generate_on(
        &self,
        scope: &GenerationScope,
        today: NaiveDate,
    ) -> Result<GenerationReport, CoreError> {
        let series = self.store.find_series(scope).await?;

        let mut outcomes = Vec::with_capacity(series.len());
        for task in series.iter().filter(|t| t.is_series()) {
            outcomes.push(self.evaluate_series(task, today).await);
        }

        let report = outcomes
            .into_iter()
            .fold(GenerationReport::default(), GenerationReport::record);

        info!(
            %today,
            created = report.created.len(),
            skipped = report.skipped.len(),
            failed = report.failed.len(),
            "recurring instance generation finished"
        );
        Ok(report)
    }

    /// Evaluates one series and materializes its next occurrence if due.
    pub async fn evaluate_series(&self, series: &Task, today: NaiveDate) -> SeriesOutcome {
        let rule = match series.recurrence_rule.as_deref().map(recurrence::try_decode) {
            Some(Ok(rule)) => rule,
            Some(Err(e)) => {
                warn!(series_id = %series.id, error = %e, "skipping series with malformed recurrence rule");
                return skipped(series, SkipReason::MalformedRule);
            }
            None => {
                warn!(series_id = %series.id, "skipping series without a recurrence rule");
                return skipped(series, SkipReason::MalformedRule);
            }
        };

        match self.materialize_next(series, &rule, today).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(series_id = %series.id, error = %e, "recurring series failed");
                SeriesOutcome::Failed(FailedSeries {
                    series_id: series.id,
                    error: e.to_string(),
                })
            }
        }
    }

    async fn materialize_next(
        &self,
        series: &Task,
        rule: &RecurrenceRule,
        today: NaiveDate,
    ) -> Result<SeriesOutcome, CoreError> {
        if let Some(limit) = rule.end_count() {
            let count = self.store.count_instances(series.id).await?;
            if count >= limit as i64 {
                debug!(series_id = %series.id, count, limit, "series reached its instance limit");
                return Ok(skipped(series, SkipReason::CountReached));
            }
        }

        if let Some(end) = rule.end_date() {
            if today > end {
                debug!(series_id = %series.id, %end, "series ended");
                return Ok(skipped(series, SkipReason::Ended));
            }
        }

        let occurrence = match self.calculator.next_occurrence(
            rule,
            series.due_date,
            series.last_recurrence,
            today,
        ) {
            Ok(Some(date)) => date,
            Ok(None) => {
                debug!(series_id = %series.id, "series has no further occurrences");
                return Ok(skipped(series, SkipReason::Ended));
            }
            Err(CoreError::MalformedRule(reason)) => {
                warn!(series_id = %series.id, %reason, "skipping series whose rule cannot advance");
                return Ok(skipped(series, SkipReason::MalformedRule));
            }
            Err(e) => return Err(e),
        };

        let horizon = Duration::try_days(self.config.lookahead_days.max(0))
            .and_then(|lookahead| today.checked_add_signed(lookahead))
            .unwrap_or(NaiveDate::MAX);
        if occurrence > horizon {
            debug!(series_id = %series.id, %occurrence, %horizon, "next occurrence beyond lookahead");
            return Ok(skipped(series, SkipReason::BeyondLookahead));
        }

        if self.store.instance_exists(series.id, occurrence).await? {
            self.catch_up_marker(series, occurrence).await?;
            return Ok(skipped(series, SkipReason::AlreadyMaterialized));
        }

        let instance = match self
            .store
            .create_instance(NewInstanceData::snapshot(series, occurrence))
            .await
        {
            Ok(instance) => instance,
            Err(CoreError::DuplicateOccurrence { .. }) => {
                debug!(series_id = %series.id, %occurrence, "occurrence created by a concurrent run");
                self.catch_up_marker(series, occurrence).await?;
                return Ok(skipped(series, SkipReason::AlreadyMaterialized));
            }
            Err(e) => return Err(e),
        };

        let created = CreatedInstance {
            series_id: series.id,
            instance_id: instance.id,
            occurrence_date: occurrence,
        };
        if let Some(listener) = &self.listener {
            listener.instance_created(&created);
        }

        self.store.update_last_recurrence(series.id, occurrence).await?;

        if let Err(e) = self
            .store
            .shift_column_positions(instance.column_id, instance.id)
            .await
        {
            warn!(instance_id = %instance.id, error = %e, "failed to move new instance to the top of its column");
        }

        info!(series_id = %series.id, instance_id = %instance.id, %occurrence, "created recurring instance");
        Ok(SeriesOutcome::Created(created))
    }

    /// Brings `last_recurrence` up to an occurrence that is already backed
    /// by an instance, e.g. after a run stopped between create and update.
    async fn catch_up_marker(&self, series: &Task, occurrence: NaiveDate) -> Result<(), CoreError> {
        if series.last_recurrence.map_or(true, |last| last < occurrence) {
            self.store.update_last_recurrence(series.id, occurrence).await?;
            debug!(series_id = %series.id, %occurrence, "advanced last recurrence to existing instance");
        }
        Ok(())
    }
}

fn skipped(series: &Task, reason: SkipReason) -> SeriesOutcome {
    SeriesOutcome::Skipped {
        series_id: series.id,
        reason,
    }
}
