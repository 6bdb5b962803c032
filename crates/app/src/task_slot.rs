//! Single-flight admission control for the asynchronous tasks of one channel.
//!
//! Any number of named tasks can be registered on a [`TaskSlot`], but at most
//! one of them is Active at a time. [`TaskSlot::invoke`] decides synchronously:
//! either the slot is free and the task starts right away, or the returned
//! [`Invocation`] resolves to [`TaskError::Busy`] and the work never runs.
//! Nothing is queued.
//!
//! A started task receives a [`Settler`]. Resolving or rejecting it consumes
//! it, so a task settles exactly once; dropping it unsettled rejects the
//! invocation with [`TaskError::Abandoned`]. Either way the slot is freed.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use serde_json::Value;
use tokio::sync::oneshot;

use hwctl_domain::event::{Timestamp, now};
use hwctl_domain::id::ChannelId;

use crate::sync::lock;

/// Work run when a task is invoked. It must eventually settle the [`Settler`].
pub type TaskWork = Arc<dyn Fn(Settler, Value) + Send + Sync>;

/// Observer notified when a task is admitted, before its work runs.
pub type StartHook = Box<dyn Fn(&str) + Send + Sync>;

/// Observer notified after every settlement, with the task name and outcome.
pub type SettleHook = Box<dyn Fn(&str, &TaskOutcome) + Send + Sync>;

/// Lifecycle observers of a [`TaskSlot`].
#[derive(Default)]
pub struct SlotHooks {
    pub on_start: Option<StartHook>,
    pub on_settle: Option<SettleHook>,
}

/// Final result of an invocation.
pub type TaskOutcome = Result<Value, TaskError>;

/// Why an invocation did not produce a value.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TaskError {
    /// Another task of this channel is Active.
    #[error("task already running")]
    Busy { running: String },

    /// No task is registered under this name.
    #[error("task {0} is not registered")]
    NotRegistered(String),

    /// The work rejected its settler.
    #[error("task {task} failed: {reason}")]
    Failed { task: String, reason: String },

    /// The settler was dropped without being resolved or rejected.
    #[error("task {0} ended without settling")]
    Abandoned(String),
}

/// The currently Active task of a slot.
#[derive(Debug, Clone, PartialEq)]
pub struct ActiveTask {
    pub name: String,
    pub started_at: Timestamp,
}

struct SlotState {
    channel: ChannelId,
    busy: AtomicBool,
    active: Mutex<Option<ActiveTask>>,
    hooks: SlotHooks,
}

impl SlotState {
    fn release(&self, task: &str, outcome: &TaskOutcome) {
        {
            // busy and active change together under the active lock
            let mut active = lock(&self.active);
            *active = None;
            self.busy.store(false, Ordering::Release);
        }
        tracing::debug!(channel = %self.channel, task, ok = outcome.is_ok(), "task settled");
        if let Some(hook) = &self.hooks.on_settle {
            hook(task, outcome);
        }
    }
}

/// Per-channel task registry with a single execution slot.
pub struct TaskSlot {
    tasks: Mutex<HashMap<String, TaskWork>>,
    state: Arc<SlotState>,
}

impl TaskSlot {
    #[must_use]
    pub fn new(channel: ChannelId) -> Self {
        Self::with_hooks(channel, SlotHooks::default())
    }

    /// Create a slot that reports task admissions and settlements to `hooks`.
    #[must_use]
    pub fn with_hooks(channel: ChannelId, hooks: SlotHooks) -> Self {
        Self {
            tasks: Mutex::new(HashMap::new()),
            state: Arc::new(SlotState {
                channel,
                busy: AtomicBool::new(false),
                active: Mutex::new(None),
                hooks,
            }),
        }
    }

    /// Store `work` under `name`, replacing any previous registration.
    ///
    /// An Active task keeps running with the work it was started with.
    pub fn register(&self, name: impl Into<String>, work: impl Fn(Settler, Value) + Send + Sync + 'static) {
        lock(&self.tasks).insert(name.into(), Arc::new(work));
    }

    /// Delete the registration for `name`, returning whether it existed.
    ///
    /// Does not cancel the task if it is currently Active.
    pub fn remove(&self, name: &str) -> bool {
        lock(&self.tasks).remove(name).is_some()
    }

    /// Names of all registered tasks, sorted.
    #[must_use]
    pub fn registered(&self) -> Vec<String> {
        let mut names: Vec<String> = lock(&self.tasks).keys().cloned().collect();
        names.sort();
        names
    }

    #[must_use]
    pub fn active_task(&self) -> Option<ActiveTask> {
        lock(&self.state.active).clone()
    }

    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.state.busy.load(Ordering::Acquire)
    }

    /// Start task `name` with `args` if no other task is Active.
    ///
    /// The accept/reject decision is made before this returns. When rejected,
    /// the work is never called and the returned future resolves to
    /// [`TaskError::Busy`] (or [`TaskError::NotRegistered`]).
    pub fn invoke(&self, name: &str, args: Value) -> Invocation {
        let Some(work) = lock(&self.tasks).get(name).cloned() else {
            tracing::debug!(channel = %self.state.channel, task = name, "task not registered");
            return Invocation::rejected(name, TaskError::NotRegistered(name.to_string()));
        };

        {
            let mut active = lock(&self.state.active);
            if self
                .state
                .busy
                .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                .is_err()
            {
                let running = active.as_ref().map(|task| task.name.clone()).unwrap_or_default();
                drop(active);
                tracing::warn!(channel = %self.state.channel, task = name, %running, "task rejected, slot busy");
                return Invocation::rejected(name, TaskError::Busy { running });
            }
            *active = Some(ActiveTask {
                name: name.to_string(),
                started_at: now(),
            });
        }
        tracing::debug!(channel = %self.state.channel, task = name, "task started");
        if let Some(hook) = &self.state.hooks.on_start {
            hook(name);
        }

        let (tx, rx) = oneshot::channel();
        let settler = Settler {
            task: name.to_string(),
            state: Arc::clone(&self.state),
            tx: Some(tx),
        };
        work(settler, args);

        Invocation {
            task: name.to_string(),
            accepted: true,
            rx,
        }
    }
}

impl fmt::Debug for TaskSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskSlot")
            .field("channel", &self.state.channel)
            .field("registered", &self.registered())
            .field("active", &self.active_task())
            .finish()
    }
}

/// Settlement handle given to a running task.
pub struct Settler {
    task: String,
    state: Arc<SlotState>,
    tx: Option<oneshot::Sender<TaskOutcome>>,
}

impl Settler {
    /// Name the task was invoked under.
    #[must_use]
    pub fn task(&self) -> &str {
        &self.task
    }

    /// Settle the invocation successfully with `value`.
    pub fn resolve(mut self, value: Value) {
        self.settle(Ok(value));
    }

    /// Settle the invocation as failed.
    pub fn reject(mut self, reason: impl Into<String>) {
        let err = TaskError::Failed {
            task: self.task.clone(),
            reason: reason.into(),
        };
        self.settle(Err(err));
    }

    fn settle(&mut self, outcome: TaskOutcome) {
        let Some(tx) = self.tx.take() else {
            return;
        };
        self.state.release(&self.task, &outcome);
        // the caller may have dropped its invocation
        let _ = tx.send(outcome);
    }
}

impl Drop for Settler {
    fn drop(&mut self) {
        if self.tx.is_some() {
            let task = self.task.clone();
            self.settle(Err(TaskError::Abandoned(task)));
        }
    }
}

impl fmt::Debug for Settler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settler")
            .field("task", &self.task)
            .field("settled", &self.tx.is_none())
            .finish_non_exhaustive()
    }
}

/// Pending result of [`TaskSlot::invoke`].
#[derive(Debug)]
#[must_use = "an invocation does nothing unless awaited or inspected"]
pub struct Invocation {
    task: String,
    accepted: bool,
    rx: oneshot::Receiver<TaskOutcome>,
}

impl Invocation {
    fn rejected(task: &str, err: TaskError) -> Self {
        let (tx, rx) = oneshot::channel();
        let _ = tx.send(Err(err));
        Self {
            task: task.to_string(),
            accepted: false,
            rx,
        }
    }

    /// Whether the slot admitted the task.
    #[must_use]
    pub fn accepted(&self) -> bool {
        self.accepted
    }

    #[must_use]
    pub fn task(&self) -> &str {
        &self.task
    }
}

impl Future for Invocation {
    type Output = TaskOutcome;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.rx).poll(cx) {
            Poll::Ready(Ok(outcome)) => Poll::Ready(outcome),
            Poll::Ready(Err(_)) => Poll::Ready(Err(TaskError::Abandoned(self.task.clone()))),
            Poll::Pending => Poll::Pending,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    type Parked = Arc<Mutex<Vec<Settler>>>;

    fn slot() -> TaskSlot {
        TaskSlot::new(ChannelId::new("test", 0))
    }

    /// Register `name` so that invoking it parks the settler for the test.
    fn register_parked(slot: &TaskSlot, name: &str, parked: &Parked, runs: &Arc<AtomicUsize>) {
        let parked = Arc::clone(parked);
        let runs = Arc::clone(runs);
        slot.register(name, move |settler, _args| {
            runs.fetch_add(1, Ordering::SeqCst);
            parked.lock().unwrap().push(settler);
        });
    }

    #[tokio::test]
    async fn should_resolve_with_value_from_work() {
        let slot = slot();
        slot.register("double", |settler, args| {
            let n = args.as_i64().unwrap_or_default();
            settler.resolve(serde_json::json!(n * 2));
        });

        let result = slot.invoke("double", serde_json::json!(21)).await;
        assert_eq!(result, Ok(serde_json::json!(42)));
        assert!(!slot.is_busy());
    }

    #[tokio::test]
    async fn should_reject_second_task_while_first_is_active() {
        let slot = slot();
        let parked = Parked::default();
        let runs_a = Arc::new(AtomicUsize::new(0));
        let runs_b = Arc::new(AtomicUsize::new(0));
        register_parked(&slot, "a", &parked, &runs_a);
        register_parked(&slot, "b", &parked, &runs_b);

        let first = slot.invoke("a", Value::Null);
        assert!(first.accepted());

        let second = slot.invoke("b", Value::Null);
        assert!(!second.accepted());
        assert_eq!(
            second.await,
            Err(TaskError::Busy {
                running: "a".to_string()
            })
        );
        assert_eq!(runs_b.load(Ordering::SeqCst), 0);
        assert_eq!(slot.active_task().unwrap().name, "a");

        let settler = parked.lock().unwrap().pop().unwrap();
        settler.resolve(serde_json::json!("done"));
        assert_eq!(first.await, Ok(serde_json::json!("done")));

        let third = slot.invoke("b", Value::Null);
        assert!(third.accepted());
        assert_eq!(runs_b.load(Ordering::SeqCst), 1);
        parked.lock().unwrap().pop().unwrap().resolve(Value::Null);
        assert_eq!(third.await, Ok(Value::Null));
    }

    #[tokio::test]
    async fn should_reject_same_task_while_active() {
        let slot = slot();
        let parked = Parked::default();
        let runs = Arc::new(AtomicUsize::new(0));
        register_parked(&slot, "a", &parked, &runs);

        let _first = slot.invoke("a", Value::Null);
        let again = slot.invoke("a", Value::Null).await;
        assert!(matches!(again, Err(TaskError::Busy { .. })));
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn should_hand_task_name_to_settler() {
        let slot = slot();
        slot.register("whoami", |settler, _| {
            let name = settler.task().to_string();
            settler.resolve(serde_json::json!(name));
        });

        assert_eq!(
            slot.invoke("whoami", Value::Null).await,
            Ok(serde_json::json!("whoami"))
        );
    }

    #[tokio::test]
    async fn should_propagate_rejection_reason() {
        let slot = slot();
        slot.register("fail", |settler, _| settler.reject("bus timeout"));

        let result = slot.invoke("fail", Value::Null).await;
        assert_eq!(
            result,
            Err(TaskError::Failed {
                task: "fail".to_string(),
                reason: "bus timeout".to_string()
            })
        );
        assert!(slot.active_task().is_none());
    }

    #[tokio::test]
    async fn should_free_slot_when_settler_is_dropped() {
        let slot = slot();
        slot.register("forgetful", |settler, _| drop(settler));

        let result = slot.invoke("forgetful", Value::Null).await;
        assert_eq!(result, Err(TaskError::Abandoned("forgetful".to_string())));
        assert!(!slot.is_busy());
    }

    #[tokio::test]
    async fn should_reject_unknown_task_without_taking_the_slot() {
        let slot = slot();
        let result = slot.invoke("missing", Value::Null).await;
        assert_eq!(result, Err(TaskError::NotRegistered("missing".to_string())));
        assert!(!slot.is_busy());
    }

    #[tokio::test]
    async fn should_keep_active_task_running_after_removal() {
        let slot = slot();
        let parked = Parked::default();
        let runs = Arc::new(AtomicUsize::new(0));
        register_parked(&slot, "a", &parked, &runs);

        let invocation = slot.invoke("a", Value::Null);
        assert!(slot.remove("a"));
        assert!(!slot.remove("a"));
        assert_eq!(slot.active_task().unwrap().name, "a");

        parked.lock().unwrap().pop().unwrap().resolve(serde_json::json!(1));
        assert_eq!(invocation.await, Ok(serde_json::json!(1)));
        assert!(matches!(
            slot.invoke("a", Value::Null).await,
            Err(TaskError::NotRegistered(_))
        ));
    }

    #[tokio::test]
    async fn should_overwrite_registration_with_same_name() {
        let slot = slot();
        slot.register("t", |settler, _| settler.resolve(serde_json::json!("old")));
        slot.register("t", |settler, _| settler.resolve(serde_json::json!("new")));

        assert_eq!(slot.registered(), vec!["t".to_string()]);
        assert_eq!(
            slot.invoke("t", Value::Null).await,
            Ok(serde_json::json!("new"))
        );
    }

    #[tokio::test]
    async fn should_settle_asynchronous_work() {
        let slot = slot();
        slot.register("wait", |settler, args| {
            let ms = args.as_u64().unwrap_or(1);
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(ms)).await;
                settler.resolve(serde_json::json!(ms));
            });
        });

        let first = slot.invoke("wait", serde_json::json!(20));
        let second = slot.invoke("wait", serde_json::json!(1));
        assert!(matches!(second.await, Err(TaskError::Busy { .. })));
        assert_eq!(first.await, Ok(serde_json::json!(20)));
        assert!(slot.invoke("wait", serde_json::json!(1)).await.is_ok());
    }

    #[tokio::test]
    async fn should_notify_hooks_around_each_settlement() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let started = Arc::clone(&seen);
        let settled = Arc::clone(&seen);
        let slot = TaskSlot::with_hooks(
            ChannelId::new("test", 1),
            SlotHooks {
                on_start: Some(Box::new(move |task| {
                    started.lock().unwrap().push(format!("start {task}"));
                })),
                on_settle: Some(Box::new(move |task, outcome| {
                    settled.lock().unwrap().push(format!("settle {task} {}", outcome.is_ok()));
                })),
            },
        );
        slot.register("ok", |settler, _| settler.resolve(Value::Null));
        slot.register("ko", |settler, _| settler.reject("nope"));

        let _ = slot.invoke("ok", Value::Null).await;
        let _ = slot.invoke("ko", Value::Null).await;
        let _ = slot.invoke("missing", Value::Null).await;

        assert_eq!(
            *seen.lock().unwrap(),
            vec!["start ok", "settle ok true", "start ko", "settle ko false"]
        );
    }

    #[tokio::test]
    async fn should_admit_exactly_one_of_concurrent_invocations() {
        let slot = slot();
        let parked = Parked::default();
        let runs = Arc::new(AtomicUsize::new(0));
        register_parked(&slot, "hold", &parked, &runs);
        let barrier = std::sync::Barrier::new(8);

        let invocations: Vec<Invocation> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|_| {
                    scope.spawn(|| {
                        barrier.wait();
                        slot.invoke("hold", Value::Null)
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        let (accepted, rejected): (Vec<_>, Vec<_>) =
            invocations.into_iter().partition(Invocation::accepted);
        assert_eq!(accepted.len(), 1);
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        for invocation in rejected {
            assert_eq!(
                invocation.await,
                Err(TaskError::Busy {
                    running: "hold".to_string()
                })
            );
        }

        parked.lock().unwrap().pop().unwrap().resolve(Value::Null);
        for invocation in accepted {
            assert_eq!(invocation.await, Ok(Value::Null));
        }
        assert!(!slot.is_busy());
    }

    #[test]
    fn should_display_busy_reason() {
        let err = TaskError::Busy {
            running: "a".to_string(),
        };
        assert_eq!(err.to_string(), "task already running");
    }
}
