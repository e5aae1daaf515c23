//! Execution contexts
//!
//! Each context is a dedicated OS thread named `motionpool-worker-{slot}`. It
//! pulls envelopes from its own channel, runs them with
//! [`execute_payload`](crate::protocol::execute_payload) and reports back to
//! the coordinator. A panic unwinds the thread; the exit guard still reports
//! the exit so the coordinator can reject in-flight work and respawn the slot.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use serde_json::Value;
use tokio::sync::mpsc;

use crate::protocol::{execute_payload, TaskFailure, TaskPayload};

/// A task routed to one execution context
#[derive(Debug)]
pub(crate) struct Envelope {
    pub task_id: u64,
    pub payload: TaskPayload,
}

/// Messages from execution contexts to the coordinator
#[derive(Debug)]
pub(crate) enum WorkerEvent {
    Ready {
        slot: usize,
        generation: u64,
    },
    Completed {
        slot: usize,
        task_id: u64,
        outcome: Result<Value, TaskFailure>,
    },
    Exited {
        slot: usize,
        generation: u64,
        panicked: bool,
    },
}

/// Coordinator-side handle to a live execution context
#[derive(Debug)]
pub(crate) struct WorkerHandle {
    sender: Option<mpsc::UnboundedSender<Envelope>>,
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl WorkerHandle {
    /// Route a task to this context; false when the context is gone
    pub fn dispatch(&self, envelope: Envelope) -> bool {
        match &self.sender {
            Some(sender) => sender.send(envelope).is_ok(),
            None => false,
        }
    }

    /// Ask the context to exit without running queued tasks
    ///
    /// Returns the thread handle so the caller can wait for the exit.
    pub fn terminate(&mut self) -> Option<JoinHandle<()>> {
        self.stop.store(true, Ordering::SeqCst);
        self.sender.take();
        self.thread.take()
    }
}

/// Reports the exit of a context, including exits by panic
struct ExitGuard {
    slot: usize,
    generation: u64,
    events: mpsc::UnboundedSender<WorkerEvent>,
}

impl Drop for ExitGuard {
    fn drop(&mut self) {
        let _ = self.events.send(WorkerEvent::Exited {
            slot: self.slot,
            generation: self.generation,
            panicked: std::thread::panicking(),
        });
    }
}

/// Start an execution context for `slot`
pub(crate) fn spawn_worker(
    slot: usize,
    generation: u64,
    events: mpsc::UnboundedSender<WorkerEvent>,
) -> std::io::Result<WorkerHandle> {
    let (sender, mut receiver) = mpsc::unbounded_channel::<Envelope>();
    let stop = Arc::new(AtomicBool::new(false));
    let thread_stop = Arc::clone(&stop);

    let thread = std::thread::Builder::new()
        .name(format!("motionpool-worker-{}", slot))
        .spawn(move || {
            let _guard = ExitGuard {
                slot,
                generation,
                events: events.clone(),
            };
            let _ = events.send(WorkerEvent::Ready { slot, generation });
            tracing::debug!(slot, generation, "Execution context started");

            while let Some(envelope) = receiver.blocking_recv() {
                if thread_stop.load(Ordering::SeqCst) {
                    break;
                }
                tracing::trace!(
                    slot,
                    task_id = envelope.task_id,
                    kind = envelope.payload.kind(),
                    "Executing task"
                );
                let outcome = execute_payload(&envelope.payload);
                let _ = events.send(WorkerEvent::Completed {
                    slot,
                    task_id: envelope.task_id,
                    outcome,
                });
            }

            tracing::debug!(slot, generation, "Execution context stopped");
        })?;

    Ok(WorkerHandle {
        sender: Some(sender),
        stop,
        thread: Some(thread),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::Probe;
    use serde_json::json;

    #[tokio::test]
    async fn test_worker_reports_ready_result_and_exit() {
        let (events_tx, mut events) = mpsc::unbounded_channel();
        let mut handle = spawn_worker(3, 1, events_tx).unwrap();

        assert!(matches!(
            events.recv().await,
            Some(WorkerEvent::Ready { slot: 3, generation: 1 })
        ));

        assert!(handle.dispatch(Envelope {
            task_id: 42,
            payload: TaskPayload::probe(Probe::Echo { value: json!("hi") }),
        }));
        match events.recv().await {
            Some(WorkerEvent::Completed {
                slot,
                task_id,
                outcome,
            }) => {
                assert_eq!(slot, 3);
                assert_eq!(task_id, 42);
                assert_eq!(outcome.unwrap(), json!("hi"));
            }
            other => panic!("unexpected event: {:?}", other),
        }

        let thread = handle.terminate().unwrap();
        tokio::task::spawn_blocking(move || thread.join()).await.unwrap().unwrap();
        assert!(matches!(
            events.recv().await,
            Some(WorkerEvent::Exited {
                slot: 3,
                panicked: false,
                ..
            })
        ));
        assert!(!handle.dispatch(Envelope {
            task_id: 43,
            payload: TaskPayload::probe(Probe::Sum { values: vec![] }),
        }));
    }

    #[tokio::test]
    async fn test_panicking_task_reports_crash() {
        let (events_tx, mut events) = mpsc::unbounded_channel();
        let handle = spawn_worker(0, 7, events_tx).unwrap();
        handle.dispatch(Envelope {
            task_id: 1,
            payload: TaskPayload::probe(Probe::Crash),
        });

        loop {
            match events.recv().await {
                Some(WorkerEvent::Ready { .. }) => continue,
                Some(WorkerEvent::Exited {
                    generation,
                    panicked,
                    ..
                }) => {
                    assert_eq!(generation, 7);
                    assert!(panicked);
                    break;
                }
                other => panic!("unexpected event: {:?}", other),
            }
        }
    }
}
