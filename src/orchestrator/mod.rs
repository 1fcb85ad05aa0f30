//! Cycle orchestrator: the session state machine.
//!
//! One invocation of [`CycleOrchestrator::tick`] processes at most one
//! queue item: fetch the snapshot, run the classification's pipeline
//! steps through the model gateway and guardrail, conditionally commit,
//! record the outcome, advance the cursor. The periodic timer re-invokes
//! `tick` while the live flag is set; a tick that arrives mid-operation
//! is a no-op, which is the whole concurrency model — exactly one file
//! is ever in flight.
//!
//! Per-file failures are counted and the cursor still advances; only an
//! invalid repository reference, missing credentials, or every
//! configured model cooling down at once halts the session.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::cancel::CancelToken;
use crate::classify::SpecialRole;
use crate::config::{Config, Credentials};
use crate::constants::{APP_NAME, GUARDRAIL_RETRIES, MAX_CONTEXT_CHARS, MAX_FILE_BYTES};
use crate::gateway::{GatewayError, ModelGateway, compose_prompt};
use crate::guardrail::{self, Verdict};
use crate::health::ModelHealth;
use crate::host::{HostError, RepoHost};
use crate::journal::{Journal, LogCategory, LogEntry};
use crate::models::{Metrics, Outcome, QueueItem, RepoRef, SessionState};
use crate::pipeline::{PipelineStep, PipelineTable};
use crate::queue::WorkQueue;
use crate::store::{self, StateStore};

/// Errors from [`CycleOrchestrator::discover`]. These are precondition
/// failures surfaced immediately; none of them is retried.
#[derive(Error, Debug)]
pub enum DiscoverError {
    #[error("invalid repository identifier: {0:?}")]
    InvalidRepo(String),

    #[error("missing credentials: set {} and {}",
        crate::constants::ENV_REPO_TOKEN,
        crate::constants::ENV_MODEL_KEY)]
    MissingCredentials,

    #[error(transparent)]
    Host(#[from] HostError),
}

/// A condition that ends the live loop for the whole session, as
/// opposed to a single-file failure.
#[derive(Debug, Clone, PartialEq, Eq)]
struct SessionHalt(String);

/// Why a pipeline step could not produce adoptable output.
enum StepFailure {
    Cancelled,
    AllModelsRateLimited,
    Failed(String),
}

/// What one pipeline step produced.
enum StepResult {
    /// Guardrail-accepted output that differs from the input.
    Adopted(String),
    /// Identical or oversize output; prior content stands.
    NotAdopted,
    /// Guardrail rejections exhausted the retry budget.
    RejectedExhausted,
}

/// The session state machine. Single-writer: only this struct mutates
/// the queue, cursor, metrics, and the two context strings.
pub struct CycleOrchestrator {
    host: Arc<dyn RepoHost>,
    gateway: Arc<dyn ModelGateway>,
    store: StateStore,
    pipelines: PipelineTable,
    config: Config,
    credentials: Credentials,

    health: ModelHealth,
    journal: Journal,
    queue: WorkQueue,
    metrics: Metrics,
    state: SessionState,
    /// Governs whether timer ticks may invoke processing.
    live: bool,
    /// Mutual-exclusion flag checked at the top of every tick.
    processing: bool,
    /// A queue exists and the cursor is valid.
    indexed: bool,

    repo: Option<RepoRef>,
    branch: Option<String>,
    /// Read-only excerpt from the project-context file, bounded.
    project_context: Option<String>,
    /// Accumulated custom instructions; rewritable only via the roadmap
    /// sub-flow.
    custom_instructions: Option<String>,
    instructions_path: Option<String>,

    cancel: CancelToken,
}

impl CycleOrchestrator {
    pub fn new(
        host: Arc<dyn RepoHost>,
        gateway: Arc<dyn ModelGateway>,
        store: StateStore,
        pipelines: PipelineTable,
        config: Config,
        credentials: Credentials,
    ) -> Self {
        Self {
            host,
            gateway,
            store,
            pipelines,
            config,
            credentials,
            health: ModelHealth::new(),
            journal: Journal::new(),
            queue: WorkQueue::default(),
            metrics: Metrics::default(),
            state: SessionState::Idle,
            live: false,
            processing: false,
            indexed: false,
            repo: None,
            branch: None,
            project_context: None,
            custom_instructions: None,
            instructions_path: None,
            cancel: CancelToken::new(),
        }
    }

    // ── Observers ───────────────────────────────────────────────────

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn metrics(&self) -> Metrics {
        self.metrics
    }

    /// Most-recent journal entries, oldest first.
    pub fn recent_log(&self) -> Vec<LogEntry> {
        self.journal.recent().cloned().collect()
    }

    /// Path currently in flight, if any.
    pub fn active_path(&self) -> Option<&str> {
        match &self.state {
            SessionState::Processing(path) => Some(path),
            _ => None,
        }
    }

    pub fn is_live(&self) -> bool {
        self.live
    }

    pub fn is_finished(&self) -> bool {
        self.state == SessionState::Finished
    }

    /// Custom instructions absorbed so far (observer for the host UI).
    pub fn custom_instructions(&self) -> Option<&str> {
        self.custom_instructions.as_deref()
    }

    /// A handle external callers (signal handlers) use to request a halt.
    pub fn cancel_handle(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Tick interval from config, clamped to at least one second;
    /// `tokio::time::interval` panics on a zero period.
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.config.cycle.interval_secs.max(1))
    }

    // ── Lifecycle ───────────────────────────────────────────────────

    /// Build a fresh work queue for `identifier`.
    ///
    /// On success the session is indexed and armed: cursor at zero,
    /// metrics reset, state back to `Idle` awaiting an explicit
    /// [`start`](Self::start). On failure the session returns to `Idle`
    /// unindexed.
    pub async fn discover(&mut self, identifier: &str) -> Result<usize, DiscoverError> {
        if !self.credentials.is_complete() {
            return Err(self.discovery_failed(DiscoverError::MissingCredentials));
        }
        let Some(repo) = RepoRef::parse(identifier) else {
            return Err(self.discovery_failed(DiscoverError::InvalidRepo(identifier.to_string())));
        };

        self.state = SessionState::Indexing;
        match self.index(&repo).await {
            Ok(size) => {
                self.state = SessionState::Idle;
                self.indexed = true;
                self.journal.push(
                    LogCategory::Info,
                    format!("indexed {repo}: {size} file(s) queued"),
                );
                info!(%repo, queue = size, "discovery complete");
                Ok(size)
            }
            Err(e) => {
                self.indexed = false;
                Err(self.discovery_failed(e))
            }
        }
    }

    /// Record a failed discovery: one journal entry, back to unarmed idle.
    fn discovery_failed(&mut self, error: DiscoverError) -> DiscoverError {
        self.state = SessionState::Idle;
        self.journal
            .push(LogCategory::Error, format!("discovery failed: {error}"));
        warn!(%error, "discovery failed");
        error
    }

    async fn index(&mut self, repo: &RepoRef) -> Result<usize, DiscoverError> {
        let branch = match &self.config.repo.branch {
            Some(branch) => branch.clone(),
            None => self.host.default_branch(repo).await?,
        };
        let tree = self.host.list_tree(repo, &branch).await?;

        self.queue = WorkQueue::build(&tree);
        self.metrics = Metrics::default();
        self.project_context = None;
        self.custom_instructions = None;
        self.instructions_path = None;
        self.repo = Some(repo.clone());
        self.branch = Some(branch);

        // A persisted cursor for the same repository survives
        // re-discovery so [`restore_cursor`](Self::restore_cursor) can
        // pick it up; a different repository invalidates it.
        let repo_id = repo.to_string();
        if self.store.get(store::KEY_REPO).as_deref() != Some(repo_id.as_str()) {
            self.store.set(store::KEY_CURSOR, "0");
        }
        self.store.set(store::KEY_REPO, &repo_id);
        if let Some(model) = self.config.models.preferred.first() {
            self.store.set(store::KEY_MODEL, model);
        }

        Ok(self.queue.len())
    }

    /// Restore a persisted cursor from a previous session against the
    /// same repository. Call after [`discover`](Self::discover); a
    /// mismatched repo or absent cursor leaves the fresh cursor at zero.
    pub fn restore_cursor(&mut self) {
        let same_repo = match (&self.repo, self.store.get(store::KEY_REPO)) {
            (Some(repo), Some(stored)) => repo.to_string() == stored,
            _ => false,
        };
        if !same_repo {
            return;
        }
        if let Some(cursor) = self.store.get_cursor() {
            self.queue.set_cursor(cursor);
            self.metrics.set_progress(self.queue.cursor(), self.queue.len());
            info!(cursor, "resumed persisted cursor");
        }
    }

    /// Arm the live loop. No-op unless indexed and not already live.
    pub fn start(&mut self) {
        if !self.indexed || self.live {
            return;
        }
        self.cancel.reset();
        self.live = true;
        self.state = SessionState::Standby;
        self.journal.push(LogCategory::Info, "session started");
    }

    /// Halt the session. Cancels any in-flight gateway call; cursor and
    /// queue are preserved so a later [`start`](Self::start) resumes.
    pub fn stop(&mut self) {
        self.cancel.cancel();
        self.live = false;
        if !self.processing {
            self.state = SessionState::Idle;
        }
    }

    /// Manual session reset: full teardown, unlike [`stop`](Self::stop).
    /// Drops the queue, contexts, persisted selections, and the
    /// credentials held in memory; a new session needs a fresh
    /// [`discover`](Self::discover) with credentials re-supplied.
    pub fn reset(&mut self) {
        self.cancel.cancel();
        self.live = false;
        self.indexed = false;
        self.queue = WorkQueue::default();
        self.metrics = Metrics::default();
        self.repo = None;
        self.branch = None;
        self.project_context = None;
        self.custom_instructions = None;
        self.instructions_path = None;
        self.credentials.clear();
        self.store.remove(store::KEY_CURSOR);
        self.store.remove(store::KEY_REPO);
        self.store.remove(store::KEY_MODEL);
        self.state = SessionState::Idle;
        self.journal.push(LogCategory::Info, "session reset");
    }

    /// One timer tick. A no-op while not live or mid-operation.
    pub async fn tick(&mut self) {
        if !self.live || self.processing {
            return;
        }
        // An external halt request (signal handler) lands here.
        if self.cancel.is_cancelled() {
            self.live = false;
            self.state = SessionState::Idle;
            return;
        }
        if self.queue.is_exhausted() {
            self.finish();
            return;
        }

        let Some(item) = self.queue.current().cloned() else {
            self.finish();
            return;
        };

        self.processing = true;
        self.state = SessionState::Processing(item.path.clone());
        let result = self.process_item(&item).await;
        self.processing = false;

        match result {
            Ok(Outcome::Cancelled) => {
                // Not a failure: no counters, cursor stays for resume.
                self.journal
                    .push(LogCategory::Cancelled, format!("{}: halted", item.path));
                self.live = false;
                self.state = SessionState::Idle;
            }
            Ok(_) => {
                self.queue.advance();
                self.store
                    .set(store::KEY_CURSOR, &self.queue.cursor().to_string());
                self.metrics.set_progress(self.queue.cursor(), self.queue.len());
                if self.queue.is_exhausted() {
                    self.finish();
                } else {
                    self.state = SessionState::Standby;
                }
            }
            Err(SessionHalt(reason)) => {
                self.journal
                    .push(LogCategory::Error, format!("session halted: {reason}"));
                warn!(%reason, "session halted");
                self.live = false;
                self.state = SessionState::Idle;
            }
        }
    }

    /// Drive ticks on the configured interval until the live flag clears.
    pub async fn run(&mut self) {
        let mut interval = tokio::time::interval(self.interval());
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        while self.live {
            interval.tick().await;
            self.tick().await;
        }
    }

    /// Natural queue exhaustion; distinct from a user-initiated stop.
    fn finish(&mut self) {
        self.live = false;
        self.state = SessionState::Finished;
        self.journal.push(
            LogCategory::Info,
            format!(
                "queue exhausted: {} mutated, {} error(s)",
                self.metrics.mutations, self.metrics.errors
            ),
        );
        info!(
            mutations = self.metrics.mutations,
            errors = self.metrics.errors,
            "session finished"
        );
    }

    // ── Per-item processing ─────────────────────────────────────────

    async fn process_item(&mut self, item: &QueueItem) -> Result<Outcome, SessionHalt> {
        let repo = self
            .repo
            .clone()
            .ok_or_else(|| SessionHalt("no repository indexed".to_string()))?;

        let snapshot = match self.host.read_file(&repo, &item.path).await {
            Ok(snapshot) => snapshot,
            Err(HostError::Auth(e)) => return Err(SessionHalt(e)),
            Err(e) => return Ok(self.record_error(&item.path, &e.to_string())),
        };

        match item.special {
            SpecialRole::Instructions => {
                self.custom_instructions = Some(snapshot.content);
                self.instructions_path = Some(item.path.clone());
                self.journal.push(
                    LogCategory::Skipped,
                    format!("{}: absorbed custom instructions", item.path),
                );
                return Ok(Outcome::Skipped);
            }
            SpecialRole::Context => {
                self.project_context = Some(truncate(&snapshot.content, MAX_CONTEXT_CHARS));
                self.journal.push(
                    LogCategory::Skipped,
                    format!("{}: absorbed project context", item.path),
                );
                return Ok(Outcome::Skipped);
            }
            SpecialRole::None => {}
        }

        let mut working = snapshot.content.clone();
        let steps = self.pipelines.steps_for(item.kind).to_vec();
        let mut last_step_id = "";
        let mut rejected_steps = 0u32;
        for step in &steps {
            match self.run_step(item, step, &working).await {
                Ok(StepResult::Adopted(output)) => {
                    working = output;
                    last_step_id = step.id;
                }
                Ok(StepResult::NotAdopted) => {}
                // Keep going with the remaining steps, but remember the
                // rejection so a file nothing salvaged counts as an error.
                Ok(StepResult::RejectedExhausted) => rejected_steps += 1,
                Err(StepFailure::Cancelled) => return Ok(Outcome::Cancelled),
                Err(StepFailure::AllModelsRateLimited) => {
                    return Err(SessionHalt(
                        "all configured models are rate limited".to_string(),
                    ));
                }
                Err(StepFailure::Failed(reason)) => {
                    return Ok(self.record_error(&item.path, &reason));
                }
            }
        }

        if working == snapshot.content {
            if rejected_steps > 0 {
                return Ok(self.record_error(
                    &item.path,
                    "model output rejected by guardrail, nothing adopted",
                ));
            }
            self.journal
                .push(LogCategory::Skipped, format!("{}: no change", item.path));
            return Ok(Outcome::Skipped);
        }

        let message = format!("{APP_NAME}: {} ({})", item.path, last_step_id);
        match self
            .host
            .write_file(&repo, &item.path, &working, &snapshot.version_token, &message)
            .await
        {
            Ok(_) => {
                self.metrics.mutations += 1;
                self.journal
                    .push(LogCategory::Mutated, format!("{}: committed", item.path));
                self.update_roadmap(&repo, &item.path).await;
                Ok(Outcome::Mutated)
            }
            Err(HostError::Auth(e)) => Err(SessionHalt(e)),
            Err(e) => Ok(self.record_error(&item.path, &e.to_string())),
        }
    }

    /// Run one pipeline step over `input`: inference, guardrail, and
    /// the bounded stricter-prompt retry on rejection.
    async fn run_step(
        &mut self,
        item: &QueueItem,
        step: &PipelineStep,
        input: &str,
    ) -> Result<StepResult, StepFailure> {
        let mut strict = false;
        for attempt in 0..=GUARDRAIL_RETRIES {
            let prompt = compose_prompt(
                self.project_context.as_deref(),
                self.custom_instructions.as_deref(),
                &step.persona,
                input,
                strict,
            );
            let output = self.complete_with_failover(&prompt).await?;
            self.metrics.steps += 1;

            match guardrail::validate(&output, item.kind) {
                Verdict::Accepted => {
                    if output.len() as u64 > MAX_FILE_BYTES {
                        debug!(path = %item.path, step = step.id, "output over size cap, not adopted");
                        return Ok(StepResult::NotAdopted);
                    }
                    if output == input {
                        return Ok(StepResult::NotAdopted);
                    }
                    return Ok(StepResult::Adopted(output));
                }
                Verdict::Rejected(reason) => {
                    debug!(path = %item.path, step = step.id, attempt, reason, "spillover rejected");
                    strict = true;
                }
            }
        }
        warn!(path = %item.path, step = step.id, "guardrail retries exhausted, step output discarded");
        Ok(StepResult::RejectedExhausted)
    }

    /// One inference call with model failover.
    ///
    /// A rate-limited model is put on cooldown and the next available
    /// one is tried; when every configured model is cooling down the
    /// session halts.
    async fn complete_with_failover(&mut self, prompt: &str) -> Result<String, StepFailure> {
        loop {
            let models = &self.config.models.preferred;
            let Some(model) = self.health.first_available(models, Utc::now()) else {
                return Err(StepFailure::AllModelsRateLimited);
            };
            let model = model.to_string();

            match self.gateway.complete(prompt, &model, &self.cancel).await {
                Ok(text) => {
                    self.store.set(store::KEY_MODEL, &model);
                    return Ok(text);
                }
                Err(GatewayError::RateLimited) => {
                    self.health.mark_rate_limited(&model, Utc::now());
                    self.journal.push(
                        LogCategory::Info,
                        format!("{model}: rate limited, cooling down"),
                    );
                    warn!(%model, "rate limited, failing over");
                }
                Err(GatewayError::Cancelled) => return Err(StepFailure::Cancelled),
                Err(e) => return Err(StepFailure::Failed(e.to_string())),
            }
        }
    }

    /// Roadmap sub-flow: after a successful mutation, re-prompt the
    /// model to update the instructions file with the completed work.
    /// This is the one path allowed to rewrite the instructions file.
    /// Failure here is logged and swallowed; it never becomes the main
    /// operation's failure.
    async fn update_roadmap(&mut self, repo: &RepoRef, completed_path: &str) {
        let Some(instructions_path) = self.instructions_path.clone() else {
            return;
        };

        let snapshot = match self.host.read_file(repo, &instructions_path).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(path = %instructions_path, error = %e, "roadmap read failed, skipping update");
                return;
            }
        };

        let persona = format!(
            "{}\n\nJust completed: {completed_path}",
            self.pipelines.roadmap_persona()
        );
        let prompt = compose_prompt(
            self.project_context.as_deref(),
            None,
            &persona,
            &snapshot.content,
            false,
        );

        let updated = match self.complete_with_failover(&prompt).await {
            Ok(text) => text,
            Err(StepFailure::Cancelled) => return,
            Err(StepFailure::AllModelsRateLimited) => {
                warn!("roadmap update skipped: all models rate limited");
                return;
            }
            Err(StepFailure::Failed(reason)) => {
                warn!(%reason, "roadmap inference failed, skipping update");
                return;
            }
        };

        if updated == snapshot.content || updated.len() as u64 > MAX_FILE_BYTES {
            return;
        }

        let message = format!("{APP_NAME}: roadmap update after {completed_path}");
        match self
            .host
            .write_file(
                repo,
                &instructions_path,
                &updated,
                &snapshot.version_token,
                &message,
            )
            .await
        {
            Ok(_) => {
                // Keep the in-memory copy in step with what was written
                // so the next cycle prompts with the fresh roadmap.
                self.custom_instructions = Some(updated);
                self.journal.push(
                    LogCategory::Info,
                    format!("{instructions_path}: roadmap updated"),
                );
            }
            Err(e) => {
                warn!(path = %instructions_path, error = %e, "roadmap write failed, swallowed");
            }
        }
    }

    fn record_error(&mut self, path: &str, reason: &str) -> Outcome {
        self.metrics.errors += 1;
        self.journal
            .push(LogCategory::Error, format!("{path}: {reason}"));
        warn!(%path, %reason, "file-level failure, cursor advances");
        Outcome::Error
    }
}

/// Truncate on a char boundary to at most `max` characters.
fn truncate(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}
