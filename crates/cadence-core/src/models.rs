use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "TEXT", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TaskPriority {
    None,
    Low,
    Medium,
    High,
}

#[derive(Error, Debug, PartialEq)]
#[error("Invalid task priority: {0}")]
pub struct ParseTaskPriorityError(String);

impl FromStr for TaskPriority {
    type Err = ParseTaskPriorityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "none" => Ok(TaskPriority::None),
            "low" => Ok(TaskPriority::Low),
            "medium" => Ok(TaskPriority::Medium),
            "high" => Ok(TaskPriority::High),
            _ => Err(ParseTaskPriorityError(s.to_string())),
        }
    }
}

/// A task on a board column.
///
/// The same record shape covers three roles:
/// - Series (template): `is_recurring = true`, `parent_recurring_id = None`,
///   carries `recurrence_rule` and `last_recurrence`
/// - Instance: `parent_recurring_id` points at its series, `due_date` is the
///   occurrence it was materialized for
/// - Regular task: neither of the above
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Task {
    pub id: Uuid,
    pub board_id: Uuid,
    pub column_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub priority: TaskPriority,
    pub assignee_id: Option<Uuid>,
    /// Ordering within the column, 0 is the top
    pub position: i64,
    pub due_date: Option<NaiveDate>,
    pub is_recurring: bool,
    pub parent_recurring_id: Option<Uuid>,
    /// Occurrence date of the most recently materialized instance
    pub last_recurrence: Option<NaiveDate>,
    /// Serialized [`RecurrenceRule`](crate::recurrence::RecurrenceRule)
    pub recurrence_rule: Option<String>,
    pub completed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[sqlx(skip)]
    #[serde(default)]
    pub label_ids: Vec<Uuid>,
}

impl Task {
    /// Returns true for recurring templates that generate instances.
    pub fn is_series(&self) -> bool {
        self.is_recurring && self.parent_recurring_id.is_none()
    }
}

impl Default for Task {
    fn default() -> Self {
        Self {
            id: Uuid::now_v7(),
            board_id: Uuid::nil(),
            column_id: Uuid::nil(),
            title: "".to_string(),
            description: None,
            priority: TaskPriority::None,
            assignee_id: None,
            position: 0,
            due_date: None,
            is_recurring: false,
            parent_recurring_id: None,
            last_recurrence: None,
            recurrence_rule: None,
            completed: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            label_ids: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct NewTaskData {
    pub board_id: Uuid,
    pub column_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub priority: Option<TaskPriority>,
    pub assignee_id: Option<Uuid>,
    pub label_ids: Vec<Uuid>,
    pub due_date: Option<NaiveDate>,
    /// When present the task becomes a series template
    pub recurrence_rule: Option<String>,
    pub last_recurrence: Option<NaiveDate>,
}

/// Data for materializing one occurrence of a series.
///
/// Everything except `parent_recurring_id` and `due_date` is copied from the
/// series when the instance is created; later edits to the series do not
/// reach existing instances.
#[derive(Debug, Clone, PartialEq)]
pub struct NewInstanceData {
    pub parent_recurring_id: Uuid,
    pub board_id: Uuid,
    pub column_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub priority: TaskPriority,
    pub assignee_id: Option<Uuid>,
    pub label_ids: Vec<Uuid>,
    pub due_date: NaiveDate,
}

impl NewInstanceData {
    pub fn snapshot(series: &Task, due_date: NaiveDate) -> Self {
        Self {
            parent_recurring_id: series.id,
            board_id: series.board_id,
            column_id: series.column_id,
            title: series.title.clone(),
            description: series.description.clone(),
            priority: series.priority.clone(),
            assignee_id: series.assignee_id,
            label_ids: series.label_ids.clone(),
            due_date,
        }
    }
}

/// Configuration for instance generation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    /// Occurrences further than this many days from today are left for a
    /// later run
    pub lookahead_days: i64,
    /// Upper bound on advance steps when catching a dormant series up to today
    pub max_advance_steps: u32,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            lookahead_days: 7,
            max_advance_steps: 10_000,
        }
    }
}
