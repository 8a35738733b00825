//! Integration tests for the chat engine.
//!
//! Exercises the full pipeline (store, guard, bridge, router) against an
//! in-memory or temp-file SQLite store and deterministic strategy stubs.
//! Each test builds an independent engine.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::Notify;

use cradle_core::config::CradleConfig;
use cradle_core::error::CradleError;
use cradle_core::types::{Message, PendingFollowUp, Role, StrategyResult, UserContext};
use cradle_storage::{Database, TranscriptRepository};

use cradle_chat::error::AgentError;
use cradle_chat::{ChatEngine, ChatError, LocalModel, ProfileSource, RemoteAgent, RetrievalService};

// =============================================================================
// Strategy stubs
// =============================================================================

struct FixedModel(&'static str);

#[async_trait]
impl LocalModel for FixedModel {
    async fn generate(&self, _history: &[Message]) -> Result<String, CradleError> {
        Ok(self.0.to_string())
    }
}

struct FailingModel;

#[async_trait]
impl LocalModel for FailingModel {
    async fn generate(&self, _history: &[Message]) -> Result<String, CradleError> {
        Err(CradleError::Model("model offline".to_string()))
    }
}

/// Model that parks inside `generate` until the test releases it.
struct GatedModel {
    started: Notify,
    proceed: Notify,
}

impl GatedModel {
    fn new() -> Self {
        Self {
            started: Notify::new(),
            proceed: Notify::new(),
        }
    }
}

#[async_trait]
impl LocalModel for GatedModel {
    async fn generate(&self, _history: &[Message]) -> Result<String, CradleError> {
        self.started.notify_one();
        self.proceed.notified().await;
        Ok("late reply".to_string())
    }
}

/// Model that parks only its first call; later calls reply immediately.
struct FirstCallGatedModel {
    calls: std::sync::atomic::AtomicUsize,
    started: Notify,
    proceed: Notify,
}

impl FirstCallGatedModel {
    fn new() -> Self {
        Self {
            calls: std::sync::atomic::AtomicUsize::new(0),
            started: Notify::new(),
            proceed: Notify::new(),
        }
    }
}

#[async_trait]
impl LocalModel for FirstCallGatedModel {
    async fn generate(&self, _history: &[Message]) -> Result<String, CradleError> {
        if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
            self.started.notify_one();
            self.proceed.notified().await;
            Ok("late reply".to_string())
        } else {
            Ok("prompt reply".to_string())
        }
    }
}

/// Model that records what the persisted transcript held when it ran.
struct PersistenceCheckingModel {
    repo: Arc<TranscriptRepository>,
    seen: Mutex<Option<Vec<Message>>>,
}

#[async_trait]
impl LocalModel for PersistenceCheckingModel {
    async fn generate(&self, _history: &[Message]) -> Result<String, CradleError> {
        let persisted = self.repo.load()?.unwrap_or_default();
        *self.seen.lock().unwrap() = Some(persisted);
        Ok("Hello!".to_string())
    }
}

struct StubRetrieval {
    query_result: Option<StrategyResult>,
    follow_up_result: Option<StrategyResult>,
    queries: Mutex<Vec<(String, UserContext)>>,
    follow_ups: Mutex<Vec<(String, PendingFollowUp)>>,
}

impl StubRetrieval {
    fn failing() -> Self {
        Self {
            query_result: None,
            follow_up_result: None,
            queries: Mutex::new(Vec::new()),
            follow_ups: Mutex::new(Vec::new()),
        }
    }

    fn returning(result: StrategyResult) -> Self {
        Self {
            query_result: Some(result),
            follow_up_result: None,
            queries: Mutex::new(Vec::new()),
            follow_ups: Mutex::new(Vec::new()),
        }
    }

    fn with_follow_up_result(mut self, result: StrategyResult) -> Self {
        self.follow_up_result = Some(result);
        self
    }
}

#[async_trait]
impl RetrievalService for StubRetrieval {
    async fn process_query(
        &self,
        query: &str,
        ctx: &UserContext,
    ) -> Result<StrategyResult, CradleError> {
        self.queries
            .lock()
            .unwrap()
            .push((query.to_string(), ctx.clone()));
        self.query_result
            .clone()
            .ok_or_else(|| CradleError::Retrieval("index offline".to_string()))
    }

    async fn process_follow_up(
        &self,
        answer: &str,
        pending: &PendingFollowUp,
    ) -> Result<StrategyResult, CradleError> {
        self.follow_ups
            .lock()
            .unwrap()
            .push((answer.to_string(), pending.clone()));
        self.follow_up_result
            .clone()
            .ok_or_else(|| CradleError::Retrieval("index offline".to_string()))
    }
}

struct FailingAgent;

#[async_trait]
impl RemoteAgent for FailingAgent {
    async fn ask(&self, _query: &str, _user_id: &str) -> Result<String, AgentError> {
        Err(AgentError::Status(502))
    }
}

struct StubProfile {
    initialized: AtomicBool,
    fail_init: bool,
    ctx: UserContext,
}

impl StubProfile {
    fn ready() -> Self {
        Self {
            initialized: AtomicBool::new(true),
            fail_init: false,
            ctx: UserContext::default(),
        }
    }

    fn with_context(ctx: UserContext) -> Self {
        Self {
            initialized: AtomicBool::new(true),
            fail_init: false,
            ctx,
        }
    }

    fn failing_init() -> Self {
        Self {
            initialized: AtomicBool::new(false),
            fail_init: true,
            ctx: UserContext::default(),
        }
    }
}

#[async_trait]
impl ProfileSource for StubProfile {
    fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }

    async fn initialize(&self) -> Result<(), CradleError> {
        if self.fail_init {
            return Err(CradleError::Config("profile backend offline".to_string()));
        }
        self.initialized.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn current(&self) -> UserContext {
        self.ctx.clone()
    }
}

// =============================================================================
// Helpers
// =============================================================================

fn follow_up_result() -> StrategyResult {
    StrategyResult {
        message: "What is your weight today?".to_string(),
        intent: "log_weight".to_string(),
        action: None,
        requires_follow_up: true,
        partial_data: Some(HashMap::new()),
        missing_fields: Some(vec!["weight".to_string()]),
    }
}

fn in_memory_repo() -> Arc<TranscriptRepository> {
    Arc::new(TranscriptRepository::new(Arc::new(
        Database::in_memory().unwrap(),
    )))
}

fn make_engine(
    repo: Arc<TranscriptRepository>,
    local: Arc<dyn LocalModel>,
    retrieval: Arc<dyn RetrievalService>,
    profile: Arc<dyn ProfileSource>,
) -> ChatEngine {
    ChatEngine::new(
        &CradleConfig::default(),
        repo,
        local,
        retrieval,
        Arc::new(FailingAgent),
        profile,
    )
}

fn local_engine(repo: Arc<TranscriptRepository>, reply: &'static str) -> ChatEngine {
    make_engine(
        repo,
        Arc::new(FixedModel(reply)),
        Arc::new(StubRetrieval::failing()),
        Arc::new(StubProfile::ready()),
    )
}

// =============================================================================
// Tests
// =============================================================================

#[tokio::test]
async fn test_send_appends_user_then_assistant() {
    let repo = in_memory_repo();
    let engine = local_engine(Arc::clone(&repo), "Hello!");

    let result = engine.send_message("hi", false).await.unwrap().unwrap();
    assert_eq!(result.message, "Hello!");

    let conversation = engine.conversation();
    assert_eq!(conversation.len(), 2);
    assert_eq!(conversation[0].role, Role::User);
    assert_eq!(conversation[0].content, "hi");
    assert_eq!(conversation[1].role, Role::Assistant);
    assert_eq!(conversation[1].content, "Hello!");

    let persisted = repo.load().unwrap().unwrap();
    assert_eq!(persisted, *conversation);
}

#[tokio::test]
async fn test_trivial_input_is_rejected_without_state_change() {
    let repo = in_memory_repo();
    let engine = local_engine(Arc::clone(&repo), "Hello!");

    assert!(engine.send_message("", false).await.unwrap().is_none());
    assert!(engine.send_message("   ", false).await.unwrap().is_none());

    assert!(engine.conversation().is_empty());
    // Nothing was ever persisted.
    assert!(repo.load().unwrap().is_none());
}

#[tokio::test]
async fn test_input_is_trimmed_before_appending() {
    let repo = in_memory_repo();
    let engine = local_engine(repo, "Hello!");

    engine.send_message("  hi there  ", false).await.unwrap();
    assert_eq!(engine.conversation()[0].content, "hi there");
}

#[tokio::test]
async fn test_user_message_persisted_before_strategy_runs() {
    let repo = in_memory_repo();
    let model = Arc::new(PersistenceCheckingModel {
        repo: Arc::clone(&repo),
        seen: Mutex::new(None),
    });
    let engine = make_engine(
        repo,
        Arc::clone(&model) as Arc<dyn LocalModel>,
        Arc::new(StubRetrieval::failing()),
        Arc::new(StubProfile::ready()),
    );

    engine.send_message("hi", false).await.unwrap();

    let seen = model.seen.lock().unwrap().clone().unwrap();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].content, "hi");
    assert_eq!(seen[0].role, Role::User);
}

#[tokio::test]
async fn test_clear_mid_flight_discards_reply() {
    let repo = in_memory_repo();
    let model = Arc::new(GatedModel::new());
    let engine = Arc::new(make_engine(
        Arc::clone(&repo),
        Arc::clone(&model) as Arc<dyn LocalModel>,
        Arc::new(StubRetrieval::failing()),
        Arc::new(StubProfile::ready()),
    ));

    let engine_task = Arc::clone(&engine);
    let handle = tokio::spawn(async move { engine_task.send_message("hi", false).await });

    // Wait until the strategy is in flight, then clear underneath it.
    model.started.notified().await;
    engine.clear_conversation();
    model.proceed.notify_one();

    let outcome = handle.await.unwrap().unwrap();
    assert!(outcome.is_none());

    // The transcript equals the empty sequence persisted by the clear.
    assert!(engine.conversation().is_empty());
    assert_eq!(repo.load().unwrap().unwrap(), Vec::<Message>::new());
}

#[tokio::test]
async fn test_clear_invalidates_only_sends_started_before_it() {
    let repo = in_memory_repo();
    let model = Arc::new(FirstCallGatedModel::new());
    let engine = Arc::new(make_engine(
        Arc::clone(&repo),
        Arc::clone(&model) as Arc<dyn LocalModel>,
        Arc::new(StubRetrieval::failing()),
        Arc::new(StubProfile::ready()),
    ));

    // First send parks inside the model; the clear lands while it is in
    // flight; the second send starts after the clear and must apply.
    let engine_task = Arc::clone(&engine);
    let first = tokio::spawn(async move { engine_task.send_message("first", false).await });

    model.started.notified().await;
    engine.clear_conversation();

    let second = engine.send_message("second", false).await.unwrap();
    assert_eq!(second.unwrap().message, "prompt reply");

    model.proceed.notify_one();
    let first_outcome = first.await.unwrap().unwrap();
    assert!(first_outcome.is_none());

    let conversation = engine.conversation();
    assert_eq!(conversation.len(), 2);
    assert_eq!(conversation[0].content, "second");
    assert_eq!(conversation[1].content, "prompt reply");
    assert_eq!(repo.load().unwrap().unwrap(), *conversation);
}

#[tokio::test]
async fn test_busy_flag_tracks_generation() {
    let model = Arc::new(GatedModel::new());
    let engine = Arc::new(make_engine(
        in_memory_repo(),
        Arc::clone(&model) as Arc<dyn LocalModel>,
        Arc::new(StubRetrieval::failing()),
        Arc::new(StubProfile::ready()),
    ));
    assert!(!engine.is_generating());

    let engine_task = Arc::clone(&engine);
    let handle = tokio::spawn(async move { engine_task.send_message("hi", false).await });

    model.started.notified().await;
    assert!(engine.is_generating());

    model.proceed.notify_one();
    handle.await.unwrap().unwrap();
    assert!(!engine.is_generating());
}

#[tokio::test]
async fn test_busy_flag_reset_on_total_failure() {
    let engine = make_engine(
        in_memory_repo(),
        Arc::new(FailingModel),
        Arc::new(StubRetrieval::failing()),
        Arc::new(StubProfile::ready()),
    );

    let err = engine.send_message("hi", true).await.unwrap_err();
    assert!(matches!(err, ChatError::Exhausted(_)));
    assert!(!engine.is_generating());
}

#[tokio::test]
async fn test_total_failure_keeps_user_message() {
    let repo = in_memory_repo();
    let engine = make_engine(
        Arc::clone(&repo),
        Arc::new(FailingModel),
        Arc::new(StubRetrieval::failing()),
        Arc::new(StubProfile::ready()),
    );

    engine.send_message("hi", true).await.unwrap_err();

    let conversation = engine.conversation();
    assert_eq!(conversation.len(), 1);
    assert_eq!(conversation[0].role, Role::User);
    assert_eq!(repo.load().unwrap().unwrap(), *conversation);
}

#[tokio::test]
async fn test_reload_restores_conversation() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("cradle.db");

    let saved = {
        let repo = Arc::new(TranscriptRepository::new(Arc::new(
            Database::new(&db_path).unwrap(),
        )));
        let engine = local_engine(repo, "Hello!");
        engine.send_message("hi", false).await.unwrap();
        engine.send_message("how are you", false).await.unwrap();
        engine.conversation()
    };

    let repo = Arc::new(TranscriptRepository::new(Arc::new(
        Database::new(&db_path).unwrap(),
    )));
    let engine = local_engine(repo, "Hello!");
    engine.load();

    assert_eq!(*engine.conversation(), *saved);
    assert_eq!(saved.len(), 4);
}

#[tokio::test]
async fn test_follow_up_redirects_next_turn() {
    let retrieval = Arc::new(
        StubRetrieval::returning(follow_up_result())
            .with_follow_up_result(StrategyResult::chat("Weight of 72kg logged")),
    );
    let engine = make_engine(
        in_memory_repo(),
        Arc::new(FixedModel("unused")),
        Arc::clone(&retrieval) as Arc<dyn RetrievalService>,
        Arc::new(StubProfile::ready()),
    );

    let first = engine
        .send_message("Record my weight", true)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(first.message, "What is your weight today?");

    let second = engine.send_message("72kg", true).await.unwrap().unwrap();
    assert_eq!(second.message, "Weight of 72kg logged");

    // One fresh query, then one follow-up resolution.
    assert_eq!(retrieval.queries.lock().unwrap().len(), 1);
    let follow_ups = retrieval.follow_ups.lock().unwrap();
    assert_eq!(follow_ups.len(), 1);
    assert_eq!(follow_ups[0].0, "72kg");
    assert_eq!(follow_ups[0].1.intent, "log_weight");

    assert_eq!(engine.conversation().len(), 4);
}

#[tokio::test]
async fn test_profile_context_reaches_retrieval() {
    let retrieval = Arc::new(StubRetrieval::returning(StrategyResult::chat("answer")));
    let ctx = UserContext(serde_json::json!({"current_week": 24}));
    let engine = make_engine(
        in_memory_repo(),
        Arc::new(FixedModel("unused")),
        Arc::clone(&retrieval) as Arc<dyn RetrievalService>,
        Arc::new(StubProfile::with_context(ctx.clone())),
    );

    engine
        .send_message("how far along am I", true)
        .await
        .unwrap();

    let queries = retrieval.queries.lock().unwrap();
    assert_eq!(queries[0].1, ctx);
}

#[tokio::test]
async fn test_profile_init_failure_is_nonfatal() {
    let engine = make_engine(
        in_memory_repo(),
        Arc::new(FixedModel("Hello!")),
        Arc::new(StubRetrieval::failing()),
        Arc::new(StubProfile::failing_init()),
    );

    let result = engine.send_message("hi", false).await.unwrap().unwrap();
    assert_eq!(result.message, "Hello!");
}

#[tokio::test]
async fn test_clear_then_send_starts_fresh() {
    let repo = in_memory_repo();
    let engine = local_engine(Arc::clone(&repo), "Hello!");

    engine.send_message("hi", false).await.unwrap();
    engine.clear_conversation();
    assert!(engine.conversation().is_empty());
    assert_eq!(repo.load().unwrap().unwrap(), Vec::<Message>::new());

    engine.send_message("hello again", false).await.unwrap();
    let conversation = engine.conversation();
    assert_eq!(conversation.len(), 2);
    assert_eq!(conversation[0].content, "hello again");
}
