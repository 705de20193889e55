use cadence_core::db::{establish_connection, DbPool};
use cadence_core::error::CoreError;
use cadence_core::generator::{GenerationScope, InstanceGenerator};
use cadence_core::models::*;
use cadence_core::recurrence::*;
use cadence_core::repository::{SeriesStore, SqliteRepository, TaskRepository};
use chrono::{NaiveDate, Weekday};
use tempfile::TempDir;
use uuid::Uuid;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// Helper function to create a test database
async fn setup_test_db() -> (SqliteRepository, DbPool, TempDir) {
    let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");
    let db_path = temp_dir.path().join("test.db");

    let pool = establish_connection(&db_path.to_string_lossy())
        .await
        .expect("Failed to establish test database connection");

    (SqliteRepository::new(pool.clone()), pool, temp_dir)
}

/// Helper function to create a recurring series
async fn create_series(
    repo: &SqliteRepository,
    board_id: Uuid,
    rule: &RecurrenceRule,
    due_date: NaiveDate,
) -> Task {
    repo.add_task(NewTaskData {
        board_id,
        column_id: Uuid::now_v7(),
        title: "Recurring task".to_string(),
        priority: Some(TaskPriority::Medium),
        due_date: Some(due_date),
        recurrence_rule: Some(encode(rule)),
        ..Default::default()
    })
    .await
    .expect("Failed to create test series")
}

fn generator(repo: &SqliteRepository) -> InstanceGenerator<SqliteRepository> {
    InstanceGenerator::new(repo.clone(), GeneratorConfig::default())
}

#[tokio::test]
async fn test_weekly_series_generates_next_friday_once() {
    let (repo, _pool, _temp_dir) = setup_test_db().await;
    let board = Uuid::now_v7();
    let rule = RecurrenceRule::new(Frequency::Weekly).on_days(&[Weekday::Fri]);
    let series = create_series(&repo, board, &rule, date(2024, 3, 1)).await;
    let generator = generator(&repo);
    let scope = GenerationScope::Board(board);

    let first = generator.generate_on(&scope, date(2024, 3, 1)).await.unwrap();
    assert_eq!(first.created.len(), 1);
    assert_eq!(first.created[0].occurrence_date, date(2024, 3, 8));
    assert!(first.failed.is_empty());

    let stored = repo.find_task_by_id(series.id).await.unwrap().unwrap();
    assert_eq!(stored.last_recurrence, Some(date(2024, 3, 8)));

    let second = generator.generate_on(&scope, date(2024, 3, 1)).await.unwrap();
    assert!(second.created.is_empty());
    assert_eq!(second.skipped, vec![series.id]);

    let instances = repo.find_instances_for_series(series.id).await.unwrap();
    assert_eq!(instances.len(), 1);
    assert_eq!(instances[0].due_date, Some(date(2024, 3, 8)));
    assert!(!instances[0].is_recurring);
    assert_eq!(instances[0].recurrence_rule, None);
}

#[tokio::test]
async fn test_daily_series_walks_forward_day_by_day() {
    let (repo, _pool, _temp_dir) = setup_test_db().await;
    let board = Uuid::now_v7();
    let series = create_series(&repo, board, &RecurrenceRule::new(Frequency::Daily), date(2024, 3, 1)).await;
    let generator = generator(&repo);
    let scope = GenerationScope::Board(board);

    for day in 1..=3 {
        let report = generator.generate_on(&scope, date(2024, 3, day)).await.unwrap();
        assert_eq!(report.created.len(), 1);
        assert_eq!(report.created[0].occurrence_date, date(2024, 3, day + 1));
    }

    let due: Vec<_> = repo
        .find_instances_for_series(series.id)
        .await
        .unwrap()
        .into_iter()
        .map(|t| t.due_date)
        .collect();
    assert_eq!(due, vec![Some(date(2024, 3, 2)), Some(date(2024, 3, 3)), Some(date(2024, 3, 4))]);
}

#[tokio::test]
async fn test_series_stops_after_end_count() {
    let (repo, _pool, _temp_dir) = setup_test_db().await;
    let board = Uuid::now_v7();
    let rule = RecurrenceRule::new(Frequency::Daily).times(2);
    let series = create_series(&repo, board, &rule, date(2024, 3, 1)).await;
    let generator = generator(&repo);
    let scope = GenerationScope::Board(board);

    for day in 1..=5 {
        generator.generate_on(&scope, date(2024, 3, day)).await.unwrap();
    }

    assert_eq!(repo.count_instances(series.id).await.unwrap(), 2);
    let last = generator.generate_on(&scope, date(2024, 3, 6)).await.unwrap();
    assert!(last.created.is_empty());
    assert_eq!(last.skipped, vec![series.id]);
}

#[tokio::test]
async fn test_series_stops_at_end_date() {
    let (repo, _pool, _temp_dir) = setup_test_db().await;
    let board = Uuid::now_v7();
    let rule = RecurrenceRule::new(Frequency::Daily).until(date(2024, 3, 3));
    let series = create_series(&repo, board, &rule, date(2024, 3, 1)).await;
    let generator = generator(&repo);
    let scope = GenerationScope::Board(board);

    for day in 1..=5 {
        generator.generate_on(&scope, date(2024, 3, day)).await.unwrap();
    }

    let instances = repo.find_instances_for_series(series.id).await.unwrap();
    assert_eq!(instances.len(), 2);
    assert!(instances.iter().all(|t| t.due_date <= Some(date(2024, 3, 3))));
}

#[tokio::test]
async fn test_dormant_series_resumes_from_today() {
    let (repo, _pool, _temp_dir) = setup_test_db().await;
    let board = Uuid::now_v7();
    let rule = RecurrenceRule::new(Frequency::Weekly).on_days(&[Weekday::Mon]);
    let series = create_series(&repo, board, &rule, date(2024, 1, 1)).await;

    let report = generator(&repo)
        .generate_on(&GenerationScope::Board(board), date(2024, 3, 6))
        .await
        .unwrap();

    assert_eq!(report.created.len(), 1);
    assert_eq!(report.created[0].occurrence_date, date(2024, 3, 11));
    assert_eq!(repo.count_instances(series.id).await.unwrap(), 1);
}

#[tokio::test]
async fn test_instance_snapshots_series_and_lands_on_top() {
    let (repo, _pool, _temp_dir) = setup_test_db().await;
    let board = Uuid::now_v7();
    let column = Uuid::now_v7();
    let labels = vec![Uuid::now_v7(), Uuid::now_v7()];

    let existing = repo
        .add_task(NewTaskData {
            board_id: board,
            column_id: column,
            title: "Already here".to_string(),
            ..Default::default()
        })
        .await
        .unwrap();
    let series = repo
        .add_task(NewTaskData {
            board_id: board,
            column_id: column,
            title: "Water the plants".to_string(),
            description: Some("Both balconies".to_string()),
            priority: Some(TaskPriority::High),
            assignee_id: Some(Uuid::now_v7()),
            label_ids: labels.clone(),
            due_date: Some(date(2024, 3, 1)),
            recurrence_rule: Some(encode(&RecurrenceRule::new(Frequency::Daily))),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!((existing.position, series.position), (0, 1));

    let report = generator(&repo)
        .generate_on(&GenerationScope::Board(board), date(2024, 3, 1))
        .await
        .unwrap();

    let instance = repo
        .find_task_by_id(report.created[0].instance_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(instance.title, series.title);
    assert_eq!(instance.description, series.description);
    assert_eq!(instance.priority, TaskPriority::High);
    assert_eq!(instance.assignee_id, series.assignee_id);
    assert_eq!(instance.parent_recurring_id, Some(series.id));
    let mut expected_labels = labels.clone();
    expected_labels.sort();
    assert_eq!(instance.label_ids, expected_labels);

    let column_order: Vec<Uuid> = repo
        .find_tasks_in_column(column)
        .await
        .unwrap()
        .into_iter()
        .map(|t| t.id)
        .collect();
    assert_eq!(column_order, vec![instance.id, existing.id, series.id]);
}

#[tokio::test]
async fn test_concurrent_generation_creates_one_instance() {
    let (repo, _pool, _temp_dir) = setup_test_db().await;
    let board = Uuid::now_v7();
    let rule = RecurrenceRule::new(Frequency::Weekly).on_days(&[Weekday::Fri]);
    let series = create_series(&repo, board, &rule, date(2024, 3, 1)).await;
    let first = generator(&repo);
    let second = generator(&repo);
    let scope = GenerationScope::Board(board);

    let (a, b) = tokio::join!(
        first.generate_on(&scope, date(2024, 3, 1)),
        second.generate_on(&scope, date(2024, 3, 1)),
    );
    let (a, b) = (a.unwrap(), b.unwrap());

    assert_eq!(a.created.len() + b.created.len(), 1);
    assert!(a.failed.is_empty() && b.failed.is_empty());
    assert_eq!(repo.count_instances(series.id).await.unwrap(), 1);
}

#[tokio::test]
async fn test_malformed_rule_does_not_stop_other_series() {
    let (repo, pool, _temp_dir) = setup_test_db().await;
    let board = Uuid::now_v7();
    let broken = create_series(&repo, board, &RecurrenceRule::new(Frequency::Daily), date(2024, 3, 1)).await;
    let healthy = create_series(&repo, board, &RecurrenceRule::new(Frequency::Daily), date(2024, 3, 1)).await;
    sqlx::query("UPDATE tasks SET recurrence_rule = 'not json' WHERE id = $1")
        .bind(broken.id)
        .execute(&pool)
        .await
        .unwrap();

    let report = generator(&repo)
        .generate_on(&GenerationScope::Board(board), date(2024, 3, 1))
        .await
        .unwrap();

    assert_eq!(report.created.len(), 1);
    assert_eq!(report.created[0].series_id, healthy.id);
    assert_eq!(report.skipped, vec![broken.id]);
    assert!(report.failed.is_empty());
}

#[tokio::test]
async fn test_scope_limits_boards() {
    let (repo, _pool, _temp_dir) = setup_test_db().await;
    let (board_a, board_b, board_c) = (Uuid::now_v7(), Uuid::now_v7(), Uuid::now_v7());
    let rule = RecurrenceRule::new(Frequency::Daily);
    let a = create_series(&repo, board_a, &rule, date(2024, 3, 1)).await;
    let b = create_series(&repo, board_b, &rule, date(2024, 3, 1)).await;
    let c = create_series(&repo, board_c, &rule, date(2024, 3, 1)).await;

    let report = generator(&repo)
        .generate_on(&GenerationScope::Boards(vec![board_a, board_b]), date(2024, 3, 1))
        .await
        .unwrap();

    let mut created: Vec<Uuid> = report.created.iter().map(|c| c.series_id).collect();
    created.sort();
    let mut expected = vec![a.id, b.id];
    expected.sort();
    assert_eq!(created, expected);
    assert_eq!(repo.count_instances(c.id).await.unwrap(), 0);

    let empty = generator(&repo)
        .generate_on(&GenerationScope::Boards(Vec::new()), date(2024, 3, 1))
        .await
        .unwrap();
    assert_eq!(empty, Default::default());
}

#[tokio::test]
async fn test_store_rejects_duplicate_occurrence() {
    let (repo, _pool, _temp_dir) = setup_test_db().await;
    let series = create_series(&repo, Uuid::now_v7(), &RecurrenceRule::new(Frequency::Daily), date(2024, 3, 1)).await;

    repo.create_instance(NewInstanceData::snapshot(&series, date(2024, 3, 2)))
        .await
        .unwrap();
    let duplicate = repo
        .create_instance(NewInstanceData::snapshot(&series, date(2024, 3, 2)))
        .await;

    assert!(matches!(
        duplicate,
        Err(CoreError::DuplicateOccurrence { series_id, date: d }) if series_id == series.id && d == date(2024, 3, 2)
    ));
    assert!(repo.instance_exists(series.id, date(2024, 3, 2)).await.unwrap());
    assert!(!repo.instance_exists(series.id, date(2024, 3, 3)).await.unwrap());
}

#[tokio::test]
async fn test_last_recurrence_never_moves_backwards() {
    let (repo, _pool, _temp_dir) = setup_test_db().await;
    let series = create_series(&repo, Uuid::now_v7(), &RecurrenceRule::new(Frequency::Daily), date(2024, 3, 1)).await;

    assert!(repo.update_last_recurrence(series.id, date(2024, 3, 5)).await.unwrap());
    assert!(!repo.update_last_recurrence(series.id, date(2024, 3, 4)).await.unwrap());
    assert!(!repo.update_last_recurrence(series.id, date(2024, 3, 5)).await.unwrap());

    let stored = repo.find_task_by_id(series.id).await.unwrap().unwrap();
    assert_eq!(stored.last_recurrence, Some(date(2024, 3, 5)));

    let missing = repo.update_last_recurrence(Uuid::now_v7(), date(2024, 3, 5)).await;
    assert!(matches!(missing, Err(CoreError::NotFound(_))));
}

#[tokio::test]
async fn test_add_task_rejects_invalid_rule() {
    let (repo, _pool, _temp_dir) = setup_test_db().await;

    let result = repo
        .add_task(NewTaskData {
            title: "Broken".to_string(),
            recurrence_rule: Some(r#"{"frequency":"weekly","interval":0}"#.to_string()),
            ..Default::default()
        })
        .await;

    assert!(matches!(result, Err(CoreError::MalformedRule(_))));
}

#[tokio::test]
async fn test_out_of_range_yearly_interval_is_skipped_beside_healthy_series() {
    let (repo, _pool, _temp_dir) = setup_test_db().await;
    let board = Uuid::now_v7();
    let huge = create_series(
        &repo,
        board,
        &RecurrenceRule::new(Frequency::Yearly).with_interval(400_000_000),
        date(2024, 3, 1),
    )
    .await;
    let healthy = create_series(&repo, board, &RecurrenceRule::new(Frequency::Daily), date(2024, 3, 1)).await;

    let report = generator(&repo)
        .generate_on(&GenerationScope::Board(board), date(2024, 3, 1))
        .await
        .unwrap();

    assert_eq!(report.created.len(), 1);
    assert_eq!(report.created[0].series_id, healthy.id);
    assert_eq!(report.skipped, vec![huge.id]);
    assert!(report.failed.is_empty());
    assert_eq!(repo.count_instances(huge.id).await.unwrap(), 0);
}

#[tokio::test]
async fn test_instance_left_by_interrupted_run_advances_marker() {
    let (repo, _pool, _temp_dir) = setup_test_db().await;
    let board = Uuid::now_v7();
    let series = create_series(&repo, board, &RecurrenceRule::new(Frequency::Daily), date(2024, 3, 1)).await;
    // Instance stored, marker never advanced
    repo.create_instance(NewInstanceData::snapshot(&series, date(2024, 3, 2)))
        .await
        .unwrap();

    let report = generator(&repo)
        .generate_on(&GenerationScope::Board(board), date(2024, 3, 1))
        .await
        .unwrap();

    assert!(report.created.is_empty());
    assert!(report.failed.is_empty());
    assert_eq!(report.skipped, vec![series.id]);
    assert_eq!(repo.count_instances(series.id).await.unwrap(), 1);
    let stored = repo.find_task_by_id(series.id).await.unwrap().unwrap();
    assert_eq!(stored.last_recurrence, Some(date(2024, 3, 2)));
}
