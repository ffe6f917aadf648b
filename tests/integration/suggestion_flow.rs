use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tempfile::{tempdir, TempDir};
use todo_assistant_lib::db::DbPool;
use todo_assistant_lib::error::{AiErrorCode, AppError, AppResult};
use todo_assistant_lib::models::schedule::SuggestionRequest;
use todo_assistant_lib::models::task::{TaskCreateInput, TaskRecord};
use todo_assistant_lib::models::user::{SignupInput, UserProfile};
use todo_assistant_lib::services::ai_service::{
    AiService, CompletionRequest, GenerationKind, TextGenerator,
};
use todo_assistant_lib::services::suggestion_service::SuggestionService;
use todo_assistant_lib::services::task_service::TaskService;
use todo_assistant_lib::services::user_service::UserService;
use todo_assistant_lib::utils::crypto::PasswordHasher;

struct CountingGenerator {
    reply: Option<&'static str>,
    delay: Duration,
    calls: AtomicUsize,
}

#[async_trait]
impl TextGenerator for CountingGenerator {
    fn provider_id(&self) -> &str {
        "counting"
    }

    async fn complete(&self, request: &CompletionRequest) -> AppResult<String> {
        assert_eq!(request.kind, GenerationKind::Suggestion);
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        match self.reply {
            Some(text) => Ok(text.to_string()),
            None => Err(AppError::ai(AiErrorCode::ServiceUnavailable, "upstream down")),
        }
    }
}

struct Harness {
    _dir: TempDir,
    tasks: Arc<TaskService>,
    users: UserService,
    generator: Arc<CountingGenerator>,
    service: SuggestionService,
}

impl Harness {
    fn new(reply: Option<&'static str>) -> Self {
        Self::with_delay(reply, Duration::ZERO)
    }

    /// Holds every generation open so concurrent requests all pass the gate
    /// before any of them writes.
    fn with_delay(reply: Option<&'static str>, delay: Duration) -> Self {
        let dir = tempdir().expect("temp dir");
        let pool = DbPool::new(dir.path().join("suggestions.sqlite")).expect("db pool");
        let tasks = Arc::new(TaskService::new(pool.clone()));
        let generator = Arc::new(CountingGenerator {
            reply,
            delay,
            calls: AtomicUsize::new(0),
        });
        let ai = AiService::with_generator(
            Arc::clone(&generator) as Arc<dyn TextGenerator>,
            Duration::from_secs(2),
        );
        let service = SuggestionService::new(Arc::clone(&tasks), Arc::new(ai));
        Self {
            _dir: dir,
            tasks,
            users: UserService::new(pool, PasswordHasher::new(1_000)),
            generator,
            service,
        }
    }

    fn user(&self, email: &str, premium: bool) -> UserProfile {
        let user = self
            .users
            .create_user(SignupInput {
                name: "Suggestee".into(),
                email: email.into(),
                password: "secret123".into(),
            })
            .expect("create user");
        if premium {
            self.users.set_premium(&user.id, true).expect("premium").profile()
        } else {
            user.profile()
        }
    }

    fn task(&self, owner: &UserProfile, title: &str) -> TaskRecord {
        self.tasks
            .create_task(
                owner,
                TaskCreateInput {
                    title: title.into(),
                    ..Default::default()
                },
            )
            .expect("create task")
    }

    fn calls(&self) -> usize {
        self.generator.calls.load(Ordering::SeqCst)
    }
}

fn request(task_id: &str) -> SuggestionRequest {
    SuggestionRequest {
        task_id: task_id.into(),
    }
}

#[tokio::test]
async fn suggestion_is_stored_on_the_task() {
    let harness = Harness::new(Some("  Start with the outline.  "));
    let owner = harness.user("owner@example.com", false);
    let task = harness.task(&owner, "Write essay");

    let updated = harness
        .service
        .generate(&owner, request(&task.id))
        .await
        .expect("suggestion");

    assert_eq!(updated.id, task.id);
    assert_eq!(updated.ai_suggestion.as_deref(), Some("Start with the outline."));
    assert_eq!(harness.calls(), 1);
}

#[tokio::test]
async fn second_request_conflicts_and_leaves_task_untouched() {
    let harness = Harness::new(Some("Break it into steps."));
    let owner = harness.user("owner@example.com", false);
    let task = harness.task(&owner, "Clean garage");

    harness
        .service
        .generate(&owner, request(&task.id))
        .await
        .expect("first suggestion");
    let before = harness.tasks.get_task(&owner, &task.id).expect("reload");

    let second = harness.service.generate(&owner, request(&task.id)).await;

    assert!(matches!(second, Err(AppError::Conflict { .. })));
    assert_eq!(harness.calls(), 1);
    let after = harness.tasks.get_task(&owner, &task.id).expect("reload");
    assert_eq!(before, after);
}

#[tokio::test]
async fn free_quota_counts_tasks_with_suggestions() {
    let harness = Harness::new(Some("Do it now."));
    let owner = harness.user("owner@example.com", false);

    for index in 0..5 {
        let task = harness.task(&owner, &format!("Task {index}"));
        harness
            .service
            .generate(&owner, request(&task.id))
            .await
            .expect("within quota");
    }
    assert_eq!(harness.tasks.count_suggestions(&owner).expect("count"), 5);

    let sixth = harness.task(&owner, "Task 5");
    let result = harness.service.generate(&owner, request(&sixth.id)).await;

    assert!(matches!(result, Err(AppError::QuotaExceeded { .. })));
    assert_eq!(harness.calls(), 5);
    let untouched = harness.tasks.get_task(&owner, &sixth.id).expect("reload");
    assert!(untouched.ai_suggestion.is_none());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn concurrent_requests_cannot_exceed_free_quota() {
    let harness = Harness::with_delay(Some("Chip away."), Duration::from_millis(300));
    let owner = harness.user("racer@example.com", false);

    for index in 0..4 {
        let task = harness.task(&owner, &format!("Task {index}"));
        harness
            .service
            .generate(&owner, request(&task.id))
            .await
            .expect("within quota");
    }

    let fifth = harness.task(&owner, "Fifth");
    let sixth = harness.task(&owner, "Sixth");
    let (first, second) = tokio::join!(
        harness.service.generate(&owner, request(&fifth.id)),
        harness.service.generate(&owner, request(&sixth.id)),
    );

    assert_eq!(harness.calls(), 6, "both requests pass the gate");
    let outcomes = [first, second];
    assert_eq!(outcomes.iter().filter(|result| result.is_ok()).count(), 1);
    assert!(outcomes
        .iter()
        .any(|result| matches!(result, Err(AppError::QuotaExceeded { .. }))));
    assert_eq!(harness.tasks.count_suggestions(&owner).expect("count"), 5);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn concurrent_requests_for_one_task_store_once() {
    let harness = Harness::with_delay(Some("Only once."), Duration::from_millis(300));
    let owner = harness.user("premium-racer@example.com", true);
    let task = harness.task(&owner, "Shared");

    let (first, second) = tokio::join!(
        harness.service.generate(&owner, request(&task.id)),
        harness.service.generate(&owner, request(&task.id)),
    );

    let outcomes = [first, second];
    assert_eq!(outcomes.iter().filter(|result| result.is_ok()).count(), 1);
    assert!(outcomes
        .iter()
        .any(|result| matches!(result, Err(AppError::Conflict { .. }))));
    assert_eq!(harness.tasks.count_suggestions(&owner).expect("count"), 1);
}

#[tokio::test]
async fn deleting_a_suggested_task_frees_quota() {
    let harness = Harness::new(Some("Go."));
    let owner = harness.user("owner@example.com", false);

    let mut first = None;
    for index in 0..5 {
        let task = harness.task(&owner, &format!("Task {index}"));
        harness
            .service
            .generate(&owner, request(&task.id))
            .await
            .expect("within quota");
        first.get_or_insert(task.id);
    }
    harness
        .tasks
        .delete_task(&owner, first.as_deref().expect("first id"))
        .expect("delete");

    let fresh = harness.task(&owner, "Fresh");
    harness
        .service
        .generate(&owner, request(&fresh.id))
        .await
        .expect("quota freed");
}

#[tokio::test]
async fn premium_users_have_no_suggestion_cap() {
    let harness = Harness::new(Some("Keep going."));
    let owner = harness.user("premium@example.com", true);

    for index in 0..7 {
        let task = harness.task(&owner, &format!("Task {index}"));
        harness
            .service
            .generate(&owner, request(&task.id))
            .await
            .expect("premium suggestion");
    }
    assert_eq!(harness.tasks.count_suggestions(&owner).expect("count"), 7);
}

#[tokio::test]
async fn ai_failure_surfaces_and_stores_nothing() {
    let harness = Harness::new(None);
    let owner = harness.user("owner@example.com", false);
    let task = harness.task(&owner, "Fix bike");

    let result = harness.service.generate(&owner, request(&task.id)).await;

    let error = result.expect_err("ai failure must surface");
    assert_eq!(error.ai_code(), Some(AiErrorCode::ServiceUnavailable));
    let reloaded = harness.tasks.get_task(&owner, &task.id).expect("reload");
    assert!(reloaded.ai_suggestion.is_none());
}

#[tokio::test]
async fn missing_or_foreign_task_is_rejected_before_ai_call() {
    let harness = Harness::new(Some("Unused."));
    let alice = harness.user("alice@example.com", false);
    let bob = harness.user("bob@example.com", false);
    let task = harness.task(&alice, "Alice's task");

    let blank = harness.service.generate(&alice, request("   ")).await;
    assert!(matches!(blank, Err(AppError::Validation { .. })));

    let unknown = harness.service.generate(&alice, request("no-such-task")).await;
    assert!(matches!(unknown, Err(AppError::NotFound)));

    let foreign = harness.service.generate(&bob, request(&task.id)).await;
    assert!(matches!(foreign, Err(AppError::NotFound)));

    assert_eq!(harness.calls(), 0);
}
