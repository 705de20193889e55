use crate::error::CoreError;
use crate::models::{NewTaskData, Task, TaskPriority};
use crate::recurrence;
use crate::repository::SqliteRepository;
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{QueryBuilder, Sqlite, Transaction};
use std::collections::BTreeSet;
use uuid::Uuid;

#[async_trait]
impl super::TaskRepository for SqliteRepository {
    async fn add_task(&self, data: NewTaskData) -> Result<Task, CoreError> {
        if data.title.trim().is_empty() {
            return Err(CoreError::InvalidInput("Task title cannot be empty".to_string()));
        }
        // Reject rules the generator could never evaluate
        if let Some(raw) = &data.recurrence_rule {
            recurrence::try_decode(raw)?;
        }

        let mut tx = self.pool().begin().await?;

        let position: i64 = sqlx::query_scalar(
            "SELECT COALESCE(MAX(position) + 1, 0) FROM tasks WHERE column_id = $1",
        )
        .bind(data.column_id)
        .fetch_one(&mut *tx)
        .await?;

        let task = Task {
            id: Uuid::now_v7(),
            board_id: data.board_id,
            column_id: data.column_id,
            title: data.title,
            description: data.description,
            priority: data.priority.unwrap_or(TaskPriority::None),
            assignee_id: data.assignee_id,
            position,
            due_date: data.due_date,
            is_recurring: data.recurrence_rule.is_some(),
            parent_recurring_id: None,
            last_recurrence: data.last_recurrence,
            recurrence_rule: data.recurrence_rule,
            completed: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            label_ids: data.label_ids,
        };

        Self::insert_task_in_transaction(&mut tx, &task).await?;

        tx.commit().await?;
        Ok(task)
    }

    async fn find_task_by_id(&self, id: Uuid) -> Result<Option<Task>, CoreError> {
        let task: Option<Task> = sqlx::query_as("SELECT * FROM tasks WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool())
            .await?;

        match task {
            Some(mut task) => {
                self.attach_labels(std::slice::from_mut(&mut task)).await?;
                Ok(Some(task))
            }
            None => Ok(None),
        }
    }

    async fn find_tasks_in_column(&self, column_id: Uuid) -> Result<Vec<Task>, CoreError> {
        let mut tasks: Vec<Task> =
            sqlx::query_as("SELECT * FROM tasks WHERE column_id = $1 ORDER BY position, created_at")
                .bind(column_id)
                .fetch_all(self.pool())
                .await?;
        self.attach_labels(&mut tasks).await?;
        Ok(tasks)
    }

    async fn find_instances_for_series(&self, series_id: Uuid) -> Result<Vec<Task>, CoreError> {
        let mut tasks: Vec<Task> = sqlx::query_as(
            "SELECT * FROM tasks WHERE parent_recurring_id = $1 ORDER BY due_date",
        )
        .bind(series_id)
        .fetch_all(self.pool())
        .await?;
        self.attach_labels(&mut tasks).await?;
        Ok(tasks)
    }
}

impl SqliteRepository {
    /// Inserts a task row and its label links.
    pub(crate) async fn insert_task_in_transaction<'a>(
        tx: &mut Transaction<'a, Sqlite>,
        task: &Task,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"INSERT INTO tasks (id, board_id, column_id, title, description, priority, assignee_id, position, due_date, is_recurring, parent_recurring_id, last_recurrence, recurrence_rule, completed, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)"#,
        )
        .bind(task.id)
        .bind(task.board_id)
        .bind(task.column_id)
        .bind(&task.title)
        .bind(&task.description)
        .bind(&task.priority)
        .bind(task.assignee_id)
        .bind(task.position)
        .bind(task.due_date)
        .bind(task.is_recurring)
        .bind(task.parent_recurring_id)
        .bind(task.last_recurrence)
        .bind(&task.recurrence_rule)
        .bind(task.completed)
        .bind(task.created_at)
        .bind(task.updated_at)
        .execute(&mut **tx)
        .await?;

        let labels: BTreeSet<Uuid> = task.label_ids.iter().copied().collect();
        if !labels.is_empty() {
            let mut query_builder: QueryBuilder<Sqlite> =
                QueryBuilder::new("INSERT INTO task_labels (task_id, label_id) ");
            query_builder.push_values(labels.iter(), |mut b, label_id| {
                b.push_bind(task.id).push_bind(*label_id);
            });
            query_builder.build().execute(&mut **tx).await?;
        }

        Ok(())
    }
}
