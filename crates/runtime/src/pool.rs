//! Worker pool
//!
//! A fixed number of execution contexts driven by one coordinator task. The
//! coordinator owns the pending registry, the slot table and every timer;
//! callers only talk to it through channels, so there are no locks around
//! scheduling state.
//!
//! Lifecycle:
//!
//! ```text
//! Stopped ── start() ──► Running ── shutdown() ──► ShuttingDown ──► Stopped
//!    ▲                                                                 │
//!    └─────────────────────────── start() ◄────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```ignore
//! let pool = WorkerPool::new(PoolConfig::default().with_worker_count(4));
//! pool.start().await?;
//! let sum: f64 = pool.submit_as(TaskPayload::probe(Probe::Sum { values })).await?;
//! pool.shutdown().await;
//! ```

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use motionpool_core::{ConfigError, PoolConfig};
use parking_lot::{Mutex, RwLock};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::protocol::{TaskFailure, TaskPayload};
use crate::worker::{spawn_worker, Envelope, WorkerEvent, WorkerHandle};

// ============================================================================
// Errors
// ============================================================================

/// Worker pool errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PoolError {
    /// The pool has not been started or has been shut down
    #[error("worker pool is not running")]
    NotRunning,

    /// The pool is shutting down; pending and new tasks are rejected
    #[error("worker pool is shutting down")]
    ShuttingDown,

    /// The pending registry is at capacity
    #[error("task queue is full (capacity {capacity})")]
    QueueFull { capacity: usize },

    /// Every execution context is down
    #[error("no live workers available")]
    NoLiveWorkers,

    /// The task did not finish before its deadline
    #[error("task {task_id} timed out after {timeout:?}")]
    Timeout { task_id: u64, timeout: Duration },

    /// The execution context running the task crashed
    #[error("worker {slot} crashed while running task {task_id}")]
    WorkerCrashed { slot: usize, task_id: u64 },

    /// The task itself failed
    #[error("task failed: {0}")]
    Task(#[from] TaskFailure),

    /// The task result did not have the expected shape
    #[error("unexpected task result: {0}")]
    Decode(String),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl PoolError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

type Reply = oneshot::Sender<Result<Value, PoolError>>;

// ============================================================================
// Status, info and metrics
// ============================================================================

/// Worker pool status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PoolStatus {
    Stopped,
    Running,
    ShuttingDown,
}

/// Point-in-time view of the pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PoolInfo {
    pub status: PoolStatus,
    /// Execution contexts that can accept tasks
    pub live_worker_count: usize,
    /// Pending (unresolved) tasks
    pub queue_size: usize,
    /// True when callers should compute locally instead of submitting
    pub fallback_mode: bool,
}

/// Counter snapshot
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PoolMetrics {
    pub submitted: u64,
    pub completed: u64,
    pub failed: u64,
    pub timed_out: u64,
    pub crashed: u64,
    pub rejected: u64,
    pub respawns: u64,
}

#[derive(Debug, Default)]
struct Counters {
    submitted: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
    timed_out: AtomicU64,
    crashed: AtomicU64,
    rejected: AtomicU64,
    respawns: AtomicU64,
}

impl Counters {
    fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn incr_by(counter: &AtomicU64, n: u64) {
        counter.fetch_add(n, Ordering::Relaxed);
    }

    fn snapshot(&self) -> PoolMetrics {
        PoolMetrics {
            submitted: self.submitted.load(Ordering::Relaxed),
            completed: self.completed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            timed_out: self.timed_out.load(Ordering::Relaxed),
            crashed: self.crashed.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            respawns: self.respawns.load(Ordering::Relaxed),
        }
    }
}

/// State shared between the pool handle and its coordinator
#[derive(Debug, Default)]
struct Shared {
    /// Next task id; survives restarts so ids are never reused
    next_task_id: AtomicU64,
    live_workers: AtomicUsize,
    pending: AtomicUsize,
    counters: Counters,
}

// ============================================================================
// WorkerPool
// ============================================================================

enum Command {
    Submit { payload: TaskPayload, reply: Reply },
    Shutdown { ack: oneshot::Sender<Vec<std::thread::JoinHandle<()>>> },
}

struct CoordinatorHandle {
    commands: mpsc::UnboundedSender<Command>,
    task: JoinHandle<()>,
}

/// Pool of execution contexts with timeout, crash recovery and shutdown
pub struct WorkerPool {
    config: PoolConfig,
    shared: Arc<Shared>,
    status: RwLock<PoolStatus>,
    coordinator: Mutex<Option<CoordinatorHandle>>,
    /// Serializes start and shutdown
    lifecycle: tokio::sync::Mutex<()>,
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("config", &self.config)
            .field("info", &self.info())
            .finish()
    }
}

impl WorkerPool {
    /// Create a stopped pool
    pub fn new(config: PoolConfig) -> Self {
        Self {
            config,
            shared: Arc::new(Shared {
                next_task_id: AtomicU64::new(1),
                ..Default::default()
            }),
            status: RwLock::new(PoolStatus::Stopped),
            coordinator: Mutex::new(None),
            lifecycle: tokio::sync::Mutex::new(()),
        }
    }

    /// Create and start a pool
    pub async fn start_with(config: PoolConfig) -> Result<Self, PoolError> {
        let pool = Self::new(config);
        pool.start().await?;
        Ok(pool)
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Start the execution contexts
    ///
    /// Resolves once every context has reported ready or failed to start.
    /// A context that fails to start is logged and retried after the respawn
    /// backoff; it does not abort the others. Starting a running pool is a
    /// no-op; starting after `shutdown()` brings up fresh contexts.
    pub async fn start(&self) -> Result<(), PoolError> {
        let _lifecycle = self.lifecycle.lock().await;
        if *self.status.read() == PoolStatus::Running {
            return Ok(());
        }
        self.config.validate()?;

        let worker_count = self.config.resolved_worker_count();
        info!(
            worker_count,
            max_queue_size = self.config.max_queue_size,
            task_timeout_ms = self.config.task_timeout.as_millis() as u64,
            "Starting worker pool"
        );

        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (ready_tx, ready_rx) = oneshot::channel();
        let (coordinator, inboxes) = Coordinator::new(self.config.clone(), Arc::clone(&self.shared));
        let task = tokio::spawn(coordinator.run(worker_count, commands_rx, inboxes, ready_tx));

        let _ = ready_rx.await;
        *self.coordinator.lock() = Some(CoordinatorHandle {
            commands: commands_tx,
            task,
        });
        *self.status.write() = PoolStatus::Running;

        info!(
            live_workers = self.shared.live_workers.load(Ordering::SeqCst),
            "Worker pool started"
        );
        Ok(())
    }

    /// Stop the pool
    ///
    /// Rejects every pending task with [`PoolError::ShuttingDown`], cancels
    /// their timers, terminates every context and waits for each to exit.
    /// Calling it again (or on a stopped pool) is a no-op.
    pub async fn shutdown(&self) {
        let _lifecycle = self.lifecycle.lock().await;
        // Status flips under the same lock that submit() reads it with, so no
        // submitter sees Running without a coordinator
        let handle = {
            let mut status = self.status.write();
            let handle = self.coordinator.lock().take();
            *status = if handle.is_some() {
                PoolStatus::ShuttingDown
            } else {
                PoolStatus::Stopped
            };
            handle
        };
        let Some(handle) = handle else {
            return;
        };

        info!("Shutting down worker pool");

        let (ack_tx, ack_rx) = oneshot::channel();
        if handle.commands.send(Command::Shutdown { ack: ack_tx }).is_ok() {
            if let Ok(threads) = ack_rx.await {
                let joined = tokio::task::spawn_blocking(move || {
                    threads
                        .into_iter()
                        .filter_map(|thread| thread.join().err())
                        .count()
                })
                .await;
                match joined {
                    Ok(0) => debug!("All execution contexts exited"),
                    Ok(panicked) => warn!(panicked, "Some execution contexts exited by panic"),
                    Err(e) => error!(error = %e, "Failed to wait for execution contexts"),
                }
            }
        }
        if let Err(e) = handle.task.await {
            error!(error = %e, "Coordinator task failed");
        }

        *self.status.write() = PoolStatus::Stopped;
        info!("Worker pool stopped");
    }

    pub fn status(&self) -> PoolStatus {
        *self.status.read()
    }

    pub fn is_running(&self) -> bool {
        self.status() == PoolStatus::Running
    }

    /// Submit a task and wait for its result
    pub async fn submit(&self, payload: TaskPayload) -> Result<Value, PoolError> {
        let commands = {
            let status = self.status.read();
            match *status {
                PoolStatus::Running => self
                    .coordinator
                    .lock()
                    .as_ref()
                    .map(|handle| handle.commands.clone())
                    .ok_or(PoolError::ShuttingDown),
                PoolStatus::ShuttingDown => Err(PoolError::ShuttingDown),
                PoolStatus::Stopped => Err(PoolError::NotRunning),
            }
        };
        let commands = match commands {
            Ok(commands) => commands,
            Err(e) => {
                Counters::incr(&self.shared.counters.rejected);
                return Err(e);
            }
        };

        let (reply_tx, reply_rx) = oneshot::channel();
        if commands
            .send(Command::Submit {
                payload,
                reply: reply_tx,
            })
            .is_err()
        {
            Counters::incr(&self.shared.counters.rejected);
            return Err(PoolError::ShuttingDown);
        }

        // A dropped reply means the coordinator went away mid-flight
        reply_rx.await.unwrap_or(Err(PoolError::ShuttingDown))
    }

    /// Submit a task and decode its result
    pub async fn submit_as<T: DeserializeOwned>(&self, payload: TaskPayload) -> Result<T, PoolError> {
        let value = self.submit(payload).await?;
        serde_json::from_value(value).map_err(|e| PoolError::Decode(e.to_string()))
    }

    pub fn info(&self) -> PoolInfo {
        let status = self.status();
        let live_worker_count = if status == PoolStatus::Running {
            self.shared.live_workers.load(Ordering::SeqCst)
        } else {
            0
        };
        PoolInfo {
            status,
            live_worker_count,
            queue_size: self.shared.pending.load(Ordering::SeqCst),
            fallback_mode: status != PoolStatus::Running || live_worker_count == 0,
        }
    }

    pub fn metrics(&self) -> PoolMetrics {
        self.shared.counters.snapshot()
    }

    /// Id the next accepted task will get
    pub fn next_task_id(&self) -> u64 {
        self.shared.next_task_id.load(Ordering::SeqCst)
    }
}

// ============================================================================
// Coordinator
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SlotState {
    Starting,
    Ready,
    Terminated,
}

struct Slot {
    state: SlotState,
    generation: u64,
    worker: Option<WorkerHandle>,
    in_flight: HashSet<u64>,
    respawn: Option<JoinHandle<()>>,
}

struct PendingTask {
    reply: Reply,
    timer: JoinHandle<()>,
    slot: usize,
}

enum Timer {
    Deadline(u64),
    Respawn(usize),
}

struct Coordinator {
    config: PoolConfig,
    shared: Arc<Shared>,
    slots: Vec<Slot>,
    pending: HashMap<u64, PendingTask>,
    events_tx: mpsc::UnboundedSender<WorkerEvent>,
    timers_tx: mpsc::UnboundedSender<Timer>,
    ready_waiter: Option<oneshot::Sender<()>>,
}

/// Receivers the coordinator selects on besides its command channel
struct Inboxes {
    events: mpsc::UnboundedReceiver<WorkerEvent>,
    timers: mpsc::UnboundedReceiver<Timer>,
}

impl Coordinator {
    fn new(config: PoolConfig, shared: Arc<Shared>) -> (Self, Inboxes) {
        let (events_tx, events) = mpsc::unbounded_channel();
        let (timers_tx, timers) = mpsc::unbounded_channel();
        let coordinator = Self {
            config,
            shared,
            slots: Vec::new(),
            pending: HashMap::new(),
            events_tx,
            timers_tx,
            ready_waiter: None,
        };
        (coordinator, Inboxes { events, timers })
    }

    async fn run(
        mut self,
        worker_count: usize,
        mut commands: mpsc::UnboundedReceiver<Command>,
        mut inboxes: Inboxes,
        ready: oneshot::Sender<()>,
    ) {
        self.ready_waiter = Some(ready);
        for slot in 0..worker_count {
            self.slots.push(Slot {
                state: SlotState::Terminated,
                generation: 0,
                worker: None,
                in_flight: HashSet::new(),
                respawn: None,
            });
            self.spawn_slot(slot);
        }
        self.check_ready();

        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(Command::Submit { payload, reply }) => self.submit(payload, reply),
                    Some(Command::Shutdown { ack }) => {
                        let threads = self.stop(&mut commands);
                        let _ = ack.send(threads);
                        break;
                    }
                    None => {
                        // Pool handle dropped without shutdown
                        let threads = self.stop(&mut commands);
                        drop(threads);
                        break;
                    }
                },
                Some(event) = inboxes.events.recv() => self.on_worker_event(event),
                Some(timer) = inboxes.timers.recv() => match timer {
                    Timer::Deadline(task_id) => self.on_deadline(task_id),
                    Timer::Respawn(slot) => self.on_respawn(slot),
                },
            }
        }

        debug!("Coordinator stopped");
    }

    fn publish_live(&self) {
        let live = self
            .slots
            .iter()
            .filter(|s| s.state == SlotState::Ready)
            .count();
        self.shared.live_workers.store(live, Ordering::SeqCst);
    }

    fn publish_pending(&self) {
        self.shared.pending.store(self.pending.len(), Ordering::SeqCst);
    }

    /// Resolve the start() waiter once no slot is still starting
    fn check_ready(&mut self) {
        if self.slots.iter().any(|s| s.state == SlotState::Starting) {
            return;
        }
        if let Some(waiter) = self.ready_waiter.take() {
            let _ = waiter.send(());
        }
    }

    fn spawn_slot(&mut self, slot: usize) {
        let entry = &mut self.slots[slot];
        entry.generation += 1;
        entry.respawn = None;
        match spawn_worker(slot, entry.generation, self.events_tx.clone()) {
            Ok(worker) => {
                entry.worker = Some(worker);
                entry.state = SlotState::Starting;
            }
            Err(e) => {
                error!(slot, error = %e, "Failed to start execution context");
                entry.worker = None;
                entry.state = SlotState::Terminated;
                self.schedule_respawn(slot);
            }
        }
    }

    fn schedule_respawn(&mut self, slot: usize) {
        let backoff = self.config.respawn_backoff;
        let timers = self.timers_tx.clone();
        self.slots[slot].respawn = Some(tokio::spawn(async move {
            tokio::time::sleep(backoff).await;
            let _ = timers.send(Timer::Respawn(slot));
        }));
    }

    fn submit(&mut self, payload: TaskPayload, reply: Reply) {
        let counters = &self.shared.counters;

        if self.pending.len() >= self.config.max_queue_size {
            Counters::incr(&counters.rejected);
            let _ = reply.send(Err(PoolError::QueueFull {
                capacity: self.config.max_queue_size,
            }));
            return;
        }

        // Starting contexts buffer their channel, so they can take work too
        let live: Vec<usize> = self
            .slots
            .iter()
            .enumerate()
            .filter(|(_, s)| s.state != SlotState::Terminated && s.worker.is_some())
            .map(|(i, _)| i)
            .collect();
        if live.is_empty() {
            Counters::incr(&counters.rejected);
            let _ = reply.send(Err(PoolError::NoLiveWorkers));
            return;
        }

        let task_id = self.shared.next_task_id.fetch_add(1, Ordering::SeqCst);
        let slot = live[(task_id % live.len() as u64) as usize];
        let kind = payload.kind();

        let dispatched = self.slots[slot]
            .worker
            .as_ref()
            .map(|w| w.dispatch(Envelope { task_id, payload }))
            .unwrap_or(false);
        if !dispatched {
            // The context exited; its exit event will respawn the slot
            Counters::incr(&counters.rejected);
            let _ = reply.send(Err(PoolError::WorkerCrashed { slot, task_id }));
            return;
        }

        let timeout = self.config.task_timeout;
        let timers = self.timers_tx.clone();
        let timer = tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            let _ = timers.send(Timer::Deadline(task_id));
        });

        Counters::incr(&counters.submitted);
        self.slots[slot].in_flight.insert(task_id);
        self.pending.insert(task_id, PendingTask { reply, timer, slot });
        self.publish_pending();
        debug!(task_id, slot, kind, "Task dispatched");
    }

    /// Remove a pending task and cancel its timer
    fn take_pending(&mut self, task_id: u64) -> Option<PendingTask> {
        let task = self.pending.remove(&task_id)?;
        task.timer.abort();
        if let Some(slot) = self.slots.get_mut(task.slot) {
            slot.in_flight.remove(&task_id);
        }
        self.publish_pending();
        Some(task)
    }

    fn on_worker_event(&mut self, event: WorkerEvent) {
        match event {
            WorkerEvent::Ready { slot, generation } => {
                if let Some(entry) = self.slots.get_mut(slot) {
                    if entry.generation == generation && entry.state == SlotState::Starting {
                        entry.state = SlotState::Ready;
                        debug!(slot, generation, "Execution context ready");
                    }
                }
                self.publish_live();
                self.check_ready();
            }
            WorkerEvent::Completed {
                slot,
                task_id,
                outcome,
            } => {
                let Some(task) = self.take_pending(task_id) else {
                    debug!(task_id, slot, "Dropping result for unknown or expired task");
                    return;
                };
                let counters = &self.shared.counters;
                let result = match outcome {
                    Ok(value) => {
                        Counters::incr(&counters.completed);
                        Ok(value)
                    }
                    Err(failure) => {
                        Counters::incr(&counters.failed);
                        debug!(task_id, slot, error = %failure, "Task failed");
                        Err(PoolError::Task(failure))
                    }
                };
                let _ = task.reply.send(result);
            }
            WorkerEvent::Exited {
                slot,
                generation,
                panicked,
            } => self.on_worker_exit(slot, generation, panicked),
        }
    }

    fn on_worker_exit(&mut self, slot: usize, generation: u64, panicked: bool) {
        let Some(entry) = self.slots.get_mut(slot) else {
            return;
        };
        if entry.generation != generation || entry.state == SlotState::Terminated {
            return;
        }

        error!(slot, generation, panicked, "Execution context died, respawning");
        entry.state = SlotState::Terminated;
        // Detach; the thread has already finished
        entry.worker = None;
        let orphaned: Vec<u64> = entry.in_flight.drain().collect();

        for task_id in orphaned {
            if let Some(task) = self.take_pending(task_id) {
                Counters::incr(&self.shared.counters.crashed);
                let _ = task
                    .reply
                    .send(Err(PoolError::WorkerCrashed { slot, task_id }));
            }
        }

        self.publish_live();
        self.check_ready();
        self.schedule_respawn(slot);
    }

    fn on_respawn(&mut self, slot: usize) {
        if self.slots.get(slot).map(|s| s.state) != Some(SlotState::Terminated) {
            return;
        }
        Counters::incr(&self.shared.counters.respawns);
        info!(slot, "Respawning execution context");
        self.spawn_slot(slot);
    }

    fn on_deadline(&mut self, task_id: u64) {
        if let Some(task) = self.take_pending(task_id) {
            Counters::incr(&self.shared.counters.timed_out);
            warn!(task_id, slot = task.slot, "Task timed out");
            let _ = task.reply.send(Err(PoolError::Timeout {
                task_id,
                timeout: self.config.task_timeout,
            }));
        }
    }

    /// Reject everything, terminate every context and hand back their threads
    fn stop(
        &mut self,
        commands: &mut mpsc::UnboundedReceiver<Command>,
    ) -> Vec<std::thread::JoinHandle<()>> {
        let rejected = self.pending.len();
        for (_, task) in self.pending.drain() {
            task.timer.abort();
            let _ = task.reply.send(Err(PoolError::ShuttingDown));
        }
        self.publish_pending();

        // Submissions that raced with shutdown
        commands.close();
        while let Ok(command) = commands.try_recv() {
            match command {
                Command::Submit { reply, .. } => {
                    let _ = reply.send(Err(PoolError::ShuttingDown));
                }
                Command::Shutdown { ack } => {
                    let _ = ack.send(Vec::new());
                }
            }
        }

        let mut threads = Vec::with_capacity(self.slots.len());
        for entry in &mut self.slots {
            if let Some(respawn) = entry.respawn.take() {
                respawn.abort();
            }
            if let Some(mut worker) = entry.worker.take() {
                if let Some(thread) = worker.terminate() {
                    threads.push(thread);
                }
            }
            entry.in_flight.clear();
            entry.state = SlotState::Terminated;
        }
        self.publish_live();

        Counters::incr_by(&self.shared.counters.rejected, rejected as u64);
        debug!(rejected, contexts = threads.len(), "Coordinator stopping");
        threads
    }
}
