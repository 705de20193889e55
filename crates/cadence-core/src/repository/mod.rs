use crate::db::DbPool;
use crate::error::CoreError;
use crate::generator::GenerationScope;
use crate::models::{NewInstanceData, NewTaskData, Task};
use async_trait::async_trait;
use chrono::NaiveDate;
use uuid::Uuid;

// Re-export domain modules
pub mod series;
pub mod tasks;

/// Domain-specific trait for plain task operations
#[async_trait]
pub trait TaskRepository {
    async fn add_task(&self, data: NewTaskData) -> Result<Task, CoreError>;
    async fn find_task_by_id(&self, id: Uuid) -> Result<Option<Task>, CoreError>;
    async fn find_tasks_in_column(&self, column_id: Uuid) -> Result<Vec<Task>, CoreError>;
    async fn find_instances_for_series(&self, series_id: Uuid) -> Result<Vec<Task>, CoreError>;
}

/// Storage operations the instance generator depends on.
///
/// Implementations must reject a second instance for the same
/// `(series, due_date)` pair with [`CoreError::DuplicateOccurrence`]; the
/// generator relies on that to stay idempotent under concurrent runs.
#[async_trait]
pub trait SeriesStore: Send + Sync {
    /// Series templates visible within `scope`, labels included.
    async fn find_series(&self, scope: &GenerationScope) -> Result<Vec<Task>, CoreError>;
    async fn count_instances(&self, series_id: Uuid) -> Result<i64, CoreError>;
    async fn instance_exists(&self, series_id: Uuid, due_date: NaiveDate) -> Result<bool, CoreError>;
    async fn create_instance(&self, data: NewInstanceData) -> Result<Task, CoreError>;
    /// Moves the series' `last_recurrence` forward to `date`. Never moves it
    /// backwards; returns whether the marker changed.
    async fn update_last_recurrence(&self, series_id: Uuid, date: NaiveDate) -> Result<bool, CoreError>;
    /// Pushes every task in the column except `except_task_id` one position
    /// down. Returns the number of tasks moved.
    async fn shift_column_positions(&self, column_id: Uuid, except_task_id: Uuid) -> Result<u64, CoreError>;
}

/// SQLite implementation of the repository pattern
#[derive(Clone)]
pub struct SqliteRepository {
    pool: DbPool,
}

impl SqliteRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Get a reference to the database pool for internal use across modules
    pub(crate) fn pool(&self) -> &DbPool {
        &self.pool
    }

    /// Fills `label_ids` for each task.
    pub(crate) async fn attach_labels(&self, tasks: &mut [Task]) -> Result<(), CoreError> {
        for task in tasks.iter_mut() {
            task.label_ids = sqlx::query_scalar(
                "SELECT label_id FROM task_labels WHERE task_id = $1 ORDER BY label_id",
            )
            .bind(task.id)
            .fetch_all(self.pool())
            .await?;
        }
        Ok(())
    }
}
