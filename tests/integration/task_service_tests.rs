use todo_assistant_lib::db::DbPool;
use todo_assistant_lib::error::AppError;
use todo_assistant_lib::models::task::{TaskCreateInput, TaskPriority, TaskStatus, TaskUpdateInput};
use todo_assistant_lib::models::user::{SignupInput, UserProfile};
use todo_assistant_lib::services::task_service::TaskService;
use todo_assistant_lib::services::user_service::UserService;
use todo_assistant_lib::utils::crypto::PasswordHasher;
use tempfile::{tempdir, TempDir};

fn setup() -> (TempDir, DbPool, TaskService, UserService) {
    let dir = tempdir().expect("temp dir");
    let pool = DbPool::new(dir.path().join("tasks.sqlite")).expect("db pool");
    let tasks = TaskService::new(pool.clone());
    let users = UserService::new(pool.clone(), PasswordHasher::new(1_000));
    (dir, pool, tasks, users)
}

fn register(users: &UserService, email: &str) -> UserProfile {
    users
        .create_user(SignupInput {
            name: "Test User".into(),
            email: email.into(),
            password: "secret123".into(),
        })
        .expect("create user")
        .profile()
}

#[test]
fn task_crud_flow() {
    let (_dir, _pool, service, users) = setup();
    let owner = register(&users, "owner@example.com");

    let created = service
        .create_task(
            &owner,
            TaskCreateInput {
                title: "  Integration Task  ".into(),
                priority: Some("high".into()),
                deadline: Some("2026-11-01".into()),
                ..Default::default()
            },
        )
        .expect("create task");

    assert!(!created.id.is_empty());
    assert_eq!(created.title, "Integration Task");
    assert_eq!(created.priority, TaskPriority::High);
    assert_eq!(created.status, TaskStatus::Incomplete);
    assert!(created.deadline.is_some());
    assert!(created.ai_suggestion.is_none());

    let tasks = service.list_tasks(&owner).expect("list tasks");
    assert_eq!(tasks.len(), 1);

    let updated = service
        .update_task(
            &owner,
            &created.id,
            TaskUpdateInput {
                status: Some("Complete".into()),
                deadline: Some(None),
                ..Default::default()
            },
        )
        .expect("update task");
    assert_eq!(updated.status, TaskStatus::Complete);
    assert!(updated.deadline.is_none());
    assert_eq!(updated.title, "Integration Task");

    assert!(service.list_incomplete_tasks(&owner).expect("incomplete").is_empty());

    service.delete_task(&owner, &created.id).expect("delete task");
    assert!(matches!(
        service.get_task(&owner, &created.id),
        Err(AppError::NotFound)
    ));
}

#[test]
fn json_null_clears_optional_fields() {
    let (_dir, _pool, service, users) = setup();
    let owner = register(&users, "nulls@example.com");

    let created = service
        .create_task(
            &owner,
            TaskCreateInput {
                title: "Dentist".into(),
                description: Some("Bring the forms".into()),
                deadline: Some("2026-11-01".into()),
                ..Default::default()
            },
        )
        .expect("create task");
    assert!(created.deadline.is_some());

    let rename: TaskUpdateInput =
        serde_json::from_str(r#"{"title": "Dentist visit"}"#).expect("parse rename");
    let renamed = service
        .update_task(&owner, &created.id, rename)
        .expect("rename task");
    assert_eq!(renamed.description.as_deref(), Some("Bring the forms"));
    assert!(renamed.deadline.is_some());

    let clear: TaskUpdateInput =
        serde_json::from_str(r#"{"description": null, "deadline": null}"#).expect("parse clear");
    let cleared = service
        .update_task(&owner, &created.id, clear)
        .expect("clear fields");
    assert!(cleared.description.is_none());
    assert!(cleared.deadline.is_none());
    assert_eq!(cleared.title, "Dentist visit");
}

#[test]
fn tasks_are_scoped_to_their_owner() {
    let (_dir, _pool, service, users) = setup();
    let alice = register(&users, "alice@example.com");
    let bob = register(&users, "bob@example.com");

    let task = service
        .create_task(
            &alice,
            TaskCreateInput {
                title: "Alice only".into(),
                ..Default::default()
            },
        )
        .expect("create task");

    assert!(service.list_tasks(&bob).expect("list").is_empty());
    assert!(matches!(service.get_task(&bob, &task.id), Err(AppError::NotFound)));
    assert!(matches!(
        service.update_task(
            &bob,
            &task.id,
            TaskUpdateInput {
                title: Some("Hijacked".into()),
                ..Default::default()
            }
        ),
        Err(AppError::NotFound)
    ));
    assert!(matches!(service.delete_task(&bob, &task.id), Err(AppError::NotFound)));

    let still_there = service.get_task(&alice, &task.id).expect("owner can read");
    assert_eq!(still_there.title, "Alice only");
}

#[test]
fn invalid_input_is_rejected() {
    let (_dir, _pool, service, users) = setup();
    let owner = register(&users, "owner@example.com");

    let cases = vec![
        TaskCreateInput {
            title: "   ".into(),
            ..Default::default()
        },
        TaskCreateInput {
            title: "x".repeat(201),
            ..Default::default()
        },
        TaskCreateInput {
            title: "Bad priority".into(),
            priority: Some("urgent".into()),
            ..Default::default()
        },
        TaskCreateInput {
            title: "Bad status".into(),
            status: Some("done".into()),
            ..Default::default()
        },
        TaskCreateInput {
            title: "Bad deadline".into(),
            deadline: Some("next tuesday".into()),
            ..Default::default()
        },
    ];

    for input in cases {
        let result = service.create_task(&owner, input);
        assert!(
            matches!(result, Err(AppError::Validation { .. })),
            "expected validation error, got {result:?}"
        );
    }
    assert!(service.list_tasks(&owner).expect("list").is_empty());
}

#[test]
fn store_enforces_free_quota_on_its_own() {
    let (_dir, _pool, service, users) = setup();
    let owner = register(&users, "quota@example.com");

    for index in 0..5 {
        let task = service
            .create_task(
                &owner,
                TaskCreateInput {
                    title: format!("Task {index}"),
                    ..Default::default()
                },
            )
            .expect("create");
        service
            .store_suggestion(&owner, &task.id, "Start small.")
            .expect("within quota");
    }

    let extra = service
        .create_task(
            &owner,
            TaskCreateInput {
                title: "One too many".into(),
                ..Default::default()
            },
        )
        .expect("create");
    let result = service.store_suggestion(&owner, &extra.id, "Nope.");
    assert!(matches!(result, Err(AppError::QuotaExceeded { .. })));
    assert_eq!(service.count_suggestions(&owner).expect("count"), 5);
}

#[test]
fn suggestion_is_written_once() {
    let (_dir, _pool, service, users) = setup();
    let owner = register(&users, "owner@example.com");
    let task = service
        .create_task(
            &owner,
            TaskCreateInput {
                title: "Plan trip".into(),
                ..Default::default()
            },
        )
        .expect("create");

    let stored = service
        .store_suggestion(&owner, &task.id, "Book flights first.")
        .expect("first write");
    assert_eq!(stored.ai_suggestion.as_deref(), Some("Book flights first."));
    assert_eq!(service.count_suggestions(&owner).expect("count"), 1);

    let second = service.store_suggestion(&owner, &task.id, "Something else.");
    assert!(matches!(second, Err(AppError::Conflict { .. })));

    let unchanged = service.get_task(&owner, &task.id).expect("reload");
    assert_eq!(unchanged.ai_suggestion.as_deref(), Some("Book flights first."));
}

#[test]
fn deleting_a_user_removes_their_tasks() {
    let (_dir, pool, service, users) = setup();
    let owner = register(&users, "owner@example.com");
    service
        .create_task(
            &owner,
            TaskCreateInput {
                title: "Orphan candidate".into(),
                ..Default::default()
            },
        )
        .expect("create");

    users.delete_user(&owner.id).expect("delete user");

    let remaining: i64 = pool
        .with_connection(|conn| {
            Ok(conn.query_row("SELECT COUNT(*) FROM tasks", [], |row| row.get(0))?)
        })
        .expect("count");
    assert_eq!(remaining, 0);
}
