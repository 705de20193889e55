//! # Cadence Core Library
//!
//! Recurring task scheduling for kanban boards. A recurring task is a
//! *series*: a template row that is never worked on directly. Concrete
//! *instances* are materialized from it a few days ahead of their due date,
//! each one a snapshot of the template at creation time.
//!
//! ## Core Modules
//!
//! - [`recurrence`]: rule codec, next-occurrence computation and descriptions
//! - [`generator`]: idempotent instance generation with per-series isolation
//! - [`repository`]: storage seam and its SQLite implementation
//! - [`db`]: connection setup and migrations
//! - [`models`]: tasks, transfer objects and generator settings
//! - [`error`]: the crate error type
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use cadence_core::{
//!     db,
//!     generator::{GenerationScope, InstanceGenerator},
//!     models::{GeneratorConfig, NewTaskData},
//!     recurrence::{encode, Frequency, RecurrenceRule},
//!     repository::{SqliteRepository, TaskRepository},
//! };
//! use chrono::Weekday;
//! use uuid::Uuid;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let pool = db::establish_connection("cadence.db").await?;
//!     let repo = SqliteRepository::new(pool);
//!     let board_id = Uuid::now_v7();
//!
//!     let rule = RecurrenceRule::new(Frequency::Weekly).on_days(&[Weekday::Fri]);
//!     repo.add_task(NewTaskData {
//!         board_id,
//!         title: "Weekly report".to_string(),
//!         recurrence_rule: Some(encode(&rule)),
//!         ..Default::default()
//!     })
//!     .await?;
//!
//!     let generator = InstanceGenerator::new(repo, GeneratorConfig::default());
//!     let report = generator.generate(&GenerationScope::Board(board_id)).await?;
//!     println!("created {} instance(s)", report.created.len());
//!
//!     Ok(())
//! }
//! ```

pub mod db;
pub mod error;
pub mod generator;
pub mod models;
pub mod recurrence;
pub mod repository;
