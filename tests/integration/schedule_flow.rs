use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tempfile::{tempdir, TempDir};
use todo_assistant_lib::db::DbPool;
use todo_assistant_lib::error::{AiErrorCode, AppError, AppResult};
use todo_assistant_lib::models::schedule::ScheduleSource;
use todo_assistant_lib::models::task::{TaskCreateInput, TaskPriority};
use todo_assistant_lib::models::user::{SignupInput, UserProfile};
use todo_assistant_lib::services::ai_service::{AiService, CompletionRequest, TextGenerator};
use todo_assistant_lib::services::schedule_service::ScheduleService;
use todo_assistant_lib::services::task_service::TaskService;
use todo_assistant_lib::services::user_service::UserService;
use todo_assistant_lib::utils::crypto::PasswordHasher;

enum Reply {
    Text(&'static str),
    Fail(AiErrorCode),
    Hang,
}

struct ScriptedGenerator {
    reply: Reply,
    calls: AtomicUsize,
}

impl ScriptedGenerator {
    fn new(reply: Reply) -> Arc<Self> {
        Arc::new(Self {
            reply,
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    fn provider_id(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, _request: &CompletionRequest) -> AppResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.reply {
            Reply::Text(text) => Ok(text.to_string()),
            Reply::Fail(code) => Err(AppError::ai(*code, "scripted failure")),
            Reply::Hang => {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok("[]".into())
            }
        }
    }
}

struct Harness {
    _dir: TempDir,
    tasks: Arc<TaskService>,
    users: UserService,
}

impl Harness {
    fn new() -> Self {
        let dir = tempdir().expect("temp dir");
        let pool = DbPool::new(dir.path().join("schedule.sqlite")).expect("db pool");
        Self {
            tasks: Arc::new(TaskService::new(pool.clone())),
            users: UserService::new(pool, PasswordHasher::new(1_000)),
            _dir: dir,
        }
    }

    fn user(&self, premium: bool) -> UserProfile {
        let user = self
            .users
            .create_user(SignupInput {
                name: "Planner".into(),
                email: format!("planner-{}@example.com", uuid::Uuid::new_v4()),
                password: "secret123".into(),
            })
            .expect("create user");
        if premium {
            self.users.set_premium(&user.id, true).expect("premium").profile()
        } else {
            user.profile()
        }
    }

    fn add_task(&self, owner: &UserProfile, title: &str, priority: &str, deadline: Option<&str>) {
        self.tasks
            .create_task(
                owner,
                TaskCreateInput {
                    title: title.into(),
                    priority: Some(priority.into()),
                    deadline: deadline.map(str::to_string),
                    ..Default::default()
                },
            )
            .expect("create task");
    }

    fn service(&self, ai: AiService) -> ScheduleService {
        ScheduleService::new(Arc::clone(&self.tasks), Arc::new(ai))
    }
}

fn with(generator: Arc<ScriptedGenerator>) -> AiService {
    AiService::with_generator(generator, Duration::from_millis(200))
}

#[tokio::test]
async fn empty_task_list_is_rejected_before_calling_ai() {
    let harness = Harness::new();
    let owner = harness.user(false);
    let generator = ScriptedGenerator::new(Reply::Text("[]"));
    let service = harness.service(with(Arc::clone(&generator)));

    let result = service.generate(&owner).await;

    assert!(matches!(result, Err(AppError::NothingToSchedule)));
    assert_eq!(generator.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn completed_tasks_do_not_count() {
    let harness = Harness::new();
    let owner = harness.user(false);
    let task = harness
        .tasks
        .create_task(
            &owner,
            TaskCreateInput {
                title: "Done already".into(),
                status: Some("Complete".into()),
                ..Default::default()
            },
        )
        .expect("create");
    assert!(!task.is_incomplete());

    let service = harness.service(AiService::disabled());
    assert!(matches!(
        service.generate(&owner).await,
        Err(AppError::NothingToSchedule)
    ));
}

#[tokio::test]
async fn sixth_incomplete_task_exceeds_free_quota() {
    let harness = Harness::new();
    let owner = harness.user(false);
    for index in 0..5 {
        harness.add_task(&owner, &format!("Task {index}"), "Medium", None);
    }
    let generator = ScriptedGenerator::new(Reply::Fail(AiErrorCode::ServiceUnavailable));
    let service = harness.service(with(Arc::clone(&generator)));

    let five = service.generate(&owner).await.expect("five tasks allowed");
    assert_eq!(five.total_tasks, 5);

    harness.add_task(&owner, "Task 5", "Medium", None);
    let calls_before = generator.calls.load(Ordering::SeqCst);
    let result = service.generate(&owner).await;

    assert!(matches!(result, Err(AppError::QuotaExceeded { .. })));
    assert_eq!(generator.calls.load(Ordering::SeqCst), calls_before);
}

#[tokio::test]
async fn premium_users_are_not_capped() {
    let harness = Harness::new();
    let owner = harness.user(true);
    for index in 0..8 {
        harness.add_task(&owner, &format!("Task {index}"), "Low", None);
    }
    let service = harness.service(AiService::disabled());

    let response = service.generate(&owner).await.expect("schedule");

    assert_eq!(response.total_tasks, 8);
    assert_eq!(response.schedule.len(), 8);
    assert_eq!(response.schedule[7].suggested_time_slot, "23:00 - 25:00");
}

#[tokio::test]
async fn missing_api_key_falls_back_to_local_ordering() {
    let harness = Harness::new();
    let owner = harness.user(false);
    harness.add_task(&owner, "A", "Low", Some("2026-11-10"));
    harness.add_task(&owner, "B", "High", Some("2026-11-12"));
    harness.add_task(&owner, "C", "High", Some("2026-11-11"));
    let service = harness.service(AiService::disabled());

    let response = service.generate(&owner).await.expect("schedule");

    assert_eq!(response.source, ScheduleSource::Fallback);
    let titles: Vec<_> = response.schedule.iter().map(|entry| entry.title.as_str()).collect();
    assert_eq!(titles, vec!["C", "B", "A"]);
    assert_eq!(response.schedule[0].suggested_time_slot, "9:00 - 11:00");
    assert_eq!(response.schedule[1].suggested_time_slot, "11:00 - 13:00");
    assert_eq!(response.schedule[2].suggested_time_slot, "13:00 - 15:00");
    assert!(response
        .schedule
        .iter()
        .all(|entry| entry.estimated_duration == "2 hours"));
    assert_eq!(
        response.schedule[0].reasoning,
        "High priority task scheduled based on deadline and importance."
    );
}

#[tokio::test]
async fn unusable_ai_output_falls_back() {
    let replies = vec![
        Reply::Text("Sorry, I can't help with that."),
        Reply::Text("[]"),
        Reply::Text("   "),
        Reply::Fail(AiErrorCode::RateLimited),
        Reply::Hang,
    ];

    for reply in replies {
        let harness = Harness::new();
        let owner = harness.user(false);
        harness.add_task(&owner, "Only task", "Medium", None);
        let service = harness.service(with(ScriptedGenerator::new(reply)));

        let response = service.generate(&owner).await.expect("fallback schedule");

        assert_eq!(response.source, ScheduleSource::Fallback);
        assert_eq!(response.schedule.len(), 1);
        assert_eq!(response.schedule[0].title, "Only task");
    }
}

#[tokio::test]
async fn ai_output_is_reconciled_with_stored_tasks() {
    let harness = Harness::new();
    let owner = harness.user(false);
    harness.add_task(&owner, "Write quarterly report", "High", Some("2026-11-02"));
    harness.add_task(&owner, "Call plumber", "Low", None);

    let raw = r#"```json
[
  {"taskTitle": "call plumber", "priority": "Low", "suggestedTimeSlot": "8:00 - 8:30", "estimatedDuration": "30 minutes", "reasoning": "Quick win"},
  {"taskTitle": "Write quarterly report", "priority": "High", "suggestedTimeSlot": "9:00 - 12:00"},
  {"taskTitle": "Stretch break"}
]
```"#;
    let generator = ScriptedGenerator::new(Reply::Text(raw));
    let service = harness.service(with(Arc::clone(&generator)));
    let stored = harness.tasks.list_tasks(&owner).expect("list");

    let response = service.generate(&owner).await.expect("schedule");

    assert_eq!(generator.calls.load(Ordering::SeqCst), 1);
    assert_eq!(response.source, ScheduleSource::Ai);
    assert_eq!(response.total_tasks, 2);
    assert_eq!(response.schedule.len(), 3);

    let plumber = &response.schedule[0];
    assert_eq!(plumber.task_id, stored[1].id);
    assert_eq!(plumber.title, "Call plumber");
    assert_eq!(plumber.estimated_duration, "30 minutes");

    let report = &response.schedule[1];
    assert_eq!(report.task_id, stored[0].id);
    assert_eq!(report.priority, TaskPriority::High);
    assert_eq!(report.deadline, stored[0].deadline);
    assert_eq!(report.estimated_duration, "2 hours");
    assert_eq!(
        report.reasoning,
        "High priority task scheduled for optimal productivity"
    );

    let extra = &response.schedule[2];
    assert_eq!(extra.task_id, "ai-3");
    assert_eq!(extra.title, "Stretch break");
    assert_eq!(extra.priority, TaskPriority::Medium);
    assert_eq!(extra.suggested_time_slot, "13:00 - 15:00");
}
