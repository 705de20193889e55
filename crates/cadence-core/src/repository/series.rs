use crate::error::CoreError;
use crate::generator::GenerationScope;
use crate::models::{NewInstanceData, Task};
use crate::repository::SqliteRepository;
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use sqlx::{QueryBuilder, Sqlite};
use tracing::debug;
use uuid::Uuid;

#[async_trait]
impl super::SeriesStore for SqliteRepository {
    async fn find_series(&self, scope: &GenerationScope) -> Result<Vec<Task>, CoreError> {
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
            "SELECT * FROM tasks WHERE is_recurring = 1 AND parent_recurring_id IS NULL AND board_id ",
        );
        match scope {
            GenerationScope::Board(board_id) => {
                qb.push("= ");
                qb.push_bind(*board_id);
            }
            GenerationScope::Boards(board_ids) => {
                if board_ids.is_empty() {
                    return Ok(Vec::new());
                }
                qb.push("IN (");
                let mut separated = qb.separated(", ");
                for board_id in board_ids {
                    separated.push_bind(*board_id);
                }
                separated.push_unseparated(")");
            }
        }
        qb.push(" ORDER BY created_at");

        let mut series: Vec<Task> = qb.build_query_as().fetch_all(self.pool()).await?;
        self.attach_labels(&mut series).await?;
        debug!(count = series.len(), "loaded recurring series");
        Ok(series)
    }

    async fn count_instances(&self, series_id: Uuid) -> Result<i64, CoreError> {
        let count = sqlx::query_scalar("SELECT COUNT(*) FROM tasks WHERE parent_recurring_id = $1")
            .bind(series_id)
            .fetch_one(self.pool())
            .await?;
        Ok(count)
    }

    async fn instance_exists(&self, series_id: Uuid, due_date: NaiveDate) -> Result<bool, CoreError> {
        let found: Option<i32> = sqlx::query_scalar(
            "SELECT 1 FROM tasks WHERE parent_recurring_id = $1 AND due_date = $2 LIMIT 1",
        )
        .bind(series_id)
        .bind(due_date)
        .fetch_optional(self.pool())
        .await?;
        Ok(found.is_some())
    }

    async fn create_instance(&self, data: NewInstanceData) -> Result<Task, CoreError> {
        let series_id = data.parent_recurring_id;
        let due_date = data.due_date;

        let task = Task {
            id: Uuid::now_v7(),
            board_id: data.board_id,
            column_id: data.column_id,
            title: data.title,
            description: data.description,
            priority: data.priority,
            assignee_id: data.assignee_id,
            position: 0,
            due_date: Some(due_date),
            is_recurring: false,
            parent_recurring_id: Some(series_id),
            last_recurrence: None,
            recurrence_rule: None,
            completed: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            label_ids: data.label_ids,
        };

        let mut tx = self.pool().begin().await?;
        Self::insert_task_in_transaction(&mut tx, &task)
            .await
            .map_err(|e| CoreError::from_insert(e, series_id, due_date))?;
        tx.commit().await?;

        Ok(task)
    }

    async fn update_last_recurrence(&self, series_id: Uuid, date: NaiveDate) -> Result<bool, CoreError> {
        let result = sqlx::query(
            r#"UPDATE tasks SET last_recurrence = $1, updated_at = $2
            WHERE id = $3 AND (last_recurrence IS NULL OR last_recurrence < $1)"#,
        )
        .bind(date)
        .bind(Utc::now())
        .bind(series_id)
        .execute(self.pool())
        .await?;

        if result.rows_affected() > 0 {
            return Ok(true);
        }

        let exists: Option<i32> = sqlx::query_scalar("SELECT 1 FROM tasks WHERE id = $1")
            .bind(series_id)
            .fetch_optional(self.pool())
            .await?;
        match exists {
            Some(_) => Ok(false),
            None => Err(CoreError::NotFound(format!("Series with id {} not found", series_id))),
        }
    }

    async fn shift_column_positions(&self, column_id: Uuid, except_task_id: Uuid) -> Result<u64, CoreError> {
        let result = sqlx::query(
            "UPDATE tasks SET position = position + 1 WHERE column_id = $1 AND id != $2",
        )
        .bind(column_id)
        .bind(except_task_id)
        .execute(self.pool())
        .await?;
        Ok(result.rows_affected())
    }
}
