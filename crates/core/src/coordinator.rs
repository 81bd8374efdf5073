//! Action Coordinator
//!
//! Accepts model output, speaks the display text immediately and plays the
//! parsed action in the background. Actions run strictly one at a time in
//! submission order; within one action the head, face and LEDs are driven
//! concurrently.

use crate::action::ActionCommand;
use crate::bridge::HardwareBridge;
use crate::catalog::{Expression, LightEffectId, LightSetting, Motion, MotionSpeed};
use crate::parser::ActionParser;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

pub const DEFAULT_QUEUE_CAPACITY: usize = 32;

/// What to do when an action arrives and the queue is full.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DropPolicy {
    /// Evict the oldest pending action.
    #[default]
    Oldest,
    /// Evict the most recently queued action.
    Newest,
    /// Reject the incoming action.
    None,
}

impl FromStr for DropPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "oldest" => Ok(DropPolicy::Oldest),
            "newest" => Ok(DropPolicy::Newest),
            "none" => Ok(DropPolicy::None),
            other => Err(format!("unknown drop policy '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueConfig {
    pub capacity: usize,
    pub drop_policy: DropPolicy,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_QUEUE_CAPACITY,
            drop_policy: DropPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueOutcome {
    Enqueued,
    DroppedOldest,
    DroppedNewest,
    DroppedIncoming,
}

/// Bounded FIFO of pending actions with a wake-up for the worker.
struct ActionQueue {
    config: QueueConfig,
    pending: Mutex<VecDeque<ActionCommand>>,
    notify: Notify,
}

impl ActionQueue {
    fn new(config: QueueConfig) -> Self {
        Self {
            config,
            pending: Mutex::new(VecDeque::new()),
            notify: Notify::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<ActionCommand>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn push(&self, action: ActionCommand) -> EnqueueOutcome {
        let outcome = {
            let mut pending = self.lock();
            if self.config.capacity == 0 {
                EnqueueOutcome::DroppedIncoming
            } else if pending.len() < self.config.capacity {
                pending.push_back(action);
                EnqueueOutcome::Enqueued
            } else {
                match self.config.drop_policy {
                    DropPolicy::Oldest => {
                        pending.pop_front();
                        pending.push_back(action);
                        EnqueueOutcome::DroppedOldest
                    }
                    DropPolicy::Newest => {
                        pending.pop_back();
                        pending.push_back(action);
                        EnqueueOutcome::DroppedNewest
                    }
                    DropPolicy::None => EnqueueOutcome::DroppedIncoming,
                }
            }
        };
        if outcome != EnqueueOutcome::DroppedIncoming {
            self.notify.notify_one();
        }
        outcome
    }

    /// Next action, or `None` once `cancel` fires. Checked under the queue
    /// lock, so nothing pushed after [`Self::cancel_and_clear`] is taken.
    async fn pop(&self, cancel: &CancellationToken) -> Option<ActionCommand> {
        loop {
            {
                let mut pending = self.lock();
                if cancel.is_cancelled() {
                    return None;
                }
                if let Some(action) = pending.pop_front() {
                    return Some(action);
                }
            }
            tokio::select! {
                _ = cancel.cancelled() => return None,
                _ = self.notify.notified() => {}
            }
        }
    }

    fn len(&self) -> usize {
        self.lock().len()
    }

    /// Cancels the worker and empties the queue in one step.
    fn cancel_and_clear(&self, cancel: &CancellationToken) -> usize {
        let mut pending = self.lock();
        cancel.cancel();
        let cleared = pending.len();
        pending.clear();
        cleared
    }
}

/// Observation points around action handling. All default to no-ops.
#[async_trait]
pub trait ActionHooks: Send + Sync {
    /// Display text is ready to be spoken.
    async fn on_text_ready(&self, _text: &str) {}

    async fn before_execute(&self, _action: &ActionCommand) {}

    async fn after_execute(&self, _action: &ActionCommand) {}
}

pub struct NoopHooks;

impl ActionHooks for NoopHooks {}

struct Inner {
    bridge: Arc<HardwareBridge>,
    queue: ActionQueue,
    hooks: Arc<dyn ActionHooks>,
}

impl Inner {
    async fn execute(&self, action: &ActionCommand) {
        self.hooks.before_execute(action).await;
        info!(
            motion = %action.motion,
            expression = %action.expression,
            light = %action.light,
            "executing action"
        );
        tokio::join!(
            self.bridge.send_motion(action.motion, MotionSpeed::Normal),
            self.bridge.set_expression(action.expression),
            self.bridge.set_light(action.light),
        );
        self.hooks.after_execute(action).await;
    }

    async fn run(&self, cancel: CancellationToken) {
        info!("action worker started");
        while let Some(action) = self.queue.pop(&cancel).await {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    warn!(motion = %action.motion, "action interrupted by shutdown");
                    break;
                }
                _ = self.execute(&action) => {}
            }
        }
        info!("action worker stopped");
    }
}

struct Worker {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

pub struct ActionCoordinator {
    inner: Arc<Inner>,
    worker: tokio::sync::Mutex<Option<Worker>>,
}

impl ActionCoordinator {
    pub fn new(bridge: Arc<HardwareBridge>, config: QueueConfig) -> Self {
        Self::with_hooks(bridge, config, Arc::new(NoopHooks))
    }

    pub fn with_hooks(
        bridge: Arc<HardwareBridge>,
        config: QueueConfig,
        hooks: Arc<dyn ActionHooks>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                bridge,
                queue: ActionQueue::new(config),
                hooks,
            }),
            worker: tokio::sync::Mutex::new(None),
        }
    }

    pub fn bridge(&self) -> &Arc<HardwareBridge> {
        &self.inner.bridge
    }

    /// Number of actions waiting for the worker.
    pub fn pending(&self) -> usize {
        self.inner.queue.len()
    }

    /// Starts the background worker. No-op if it is already running.
    pub async fn start(&self) {
        let mut worker = self.worker.lock().await;
        if worker.as_ref().is_some_and(|w| !w.handle.is_finished()) {
            debug!("action worker already running");
            return;
        }
        let cancel = CancellationToken::new();
        let inner = Arc::clone(&self.inner);
        let token = cancel.clone();
        let handle = tokio::spawn(async move { inner.run(token).await });
        *worker = Some(Worker { cancel, handle });
    }

    /// Stops the worker and discards pending actions. The in-flight action,
    /// if any, is abandoned. No-op if the worker is not running.
    ///
    /// Actions submitted once `stop` has begun stay queued until the next
    /// `start`.
    pub async fn stop(&self) {
        let Some(worker) = self.worker.lock().await.take() else {
            return;
        };
        let dropped = self.inner.queue.cancel_and_clear(&worker.cancel);
        if dropped > 0 {
            info!(dropped, "discarded pending actions");
        }
        if let Err(e) = worker.handle.await {
            error!(error = %e, "action worker terminated abnormally");
        }
    }

    pub async fn is_running(&self) -> bool {
        self.worker
            .lock()
            .await
            .as_ref()
            .is_some_and(|w| !w.handle.is_finished())
    }

    /// Parses `raw`, queues any action found and returns the display text
    /// without waiting for the action to play. The text-ready hook sees the
    /// display text, which is `raw` itself when nothing was parsed.
    pub async fn submit(&self, raw: &str) -> String {
        let (action, display) = ActionParser::parse(raw);
        if let Some(action) = action {
            match self.inner.queue.push(action) {
                EnqueueOutcome::Enqueued => debug!(pending = self.pending(), "action queued"),
                EnqueueOutcome::DroppedOldest => warn!("action queue full, dropped oldest action"),
                EnqueueOutcome::DroppedNewest => warn!("action queue full, dropped newest action"),
                EnqueueOutcome::DroppedIncoming => warn!("action queue full, action rejected"),
            }
        }
        self.inner.hooks.on_text_ready(&display).await;
        display
    }

    /// Plays an action immediately, bypassing the queue.
    pub async fn execute_now(&self, action: ActionCommand) {
        self.inner.execute(&action).await;
    }

    pub async fn execute_motion(&self, motion: Motion, speed: MotionSpeed) {
        self.inner.bridge.send_motion(motion, speed).await;
    }

    pub async fn set_expression(&self, expression: Expression) {
        self.inner.bridge.set_expression(expression).await;
    }

    pub async fn set_light(&self, light: impl Into<LightSetting>) {
        self.inner.bridge.set_light(light.into()).await;
    }

    // --- Conversation states ---

    pub async fn idle(&self) {
        self.inner.bridge.reset_to_idle().await;
    }

    pub async fn listening(&self) {
        let bridge = &self.inner.bridge;
        tokio::join!(
            bridge.set_expression(Expression::Neutral),
            bridge.set_light(LightEffectId::PulseBlue.into()),
        );
    }

    pub async fn thinking(&self) {
        let bridge = &self.inner.bridge;
        tokio::join!(
            bridge.send_motion(Motion::TiltRight, MotionSpeed::Normal),
            bridge.set_expression(Expression::Thinking),
            bridge.set_light(LightEffectId::SpinPurple.into()),
        );
    }

    pub async fn speaking(&self) {
        self.inner
            .bridge
            .set_light(LightEffectId::BreathingCyan.into())
            .await;
    }

    pub async fn greeting(&self) {
        self.execute_now(ActionCommand::greeting()).await;
    }
}
