//! Background Batch Execution
//!
//! Accepted batches are pushed onto a bounded queue and drained by a fixed
//! pool of Tokio worker tasks. Each submission returns a [`BatchTicket`] that
//! can be awaited for the final [`DispatchReport`]; HTTP callers simply drop
//! it. A [`JobTracker`] keeps the status of recent jobs for polling.

use relay_core::{
    command::CommandBatch,
    dispatcher::{DispatchReport, Dispatcher},
};
use serde::Serialize;
use std::{
    collections::{HashMap, VecDeque},
    sync::{Arc, Mutex, PoisonError, RwLock},
};
use tokio::{
    sync::{Mutex as AsyncMutex, mpsc, oneshot},
    task::JoinHandle,
};
use tracing::{Instrument, debug, error, info, info_span, warn};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExecutorError {
    #[error("the command queue is full")]
    QueueFull,
    #[error("the command executor has shut down")]
    Closed,
    #[error("the batch was abandoned before it completed")]
    Abandoned,
}

/// Lifecycle of a submitted batch.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum JobState {
    Queued,
    Running,
    Completed { report: DispatchReport },
    Failed { error: String },
}

impl JobState {
    pub fn is_finished(&self) -> bool {
        matches!(self, JobState::Completed { .. } | JobState::Failed { .. })
    }
}

#[derive(Default)]
struct TrackerInner {
    jobs: HashMap<Uuid, JobState>,
    finished: VecDeque<Uuid>,
}

/// Status of queued, running and recently finished jobs.
///
/// Only the newest `retained` finished jobs are kept; older ones are evicted
/// first-in, first-out. Pending jobs are never evicted.
pub struct JobTracker {
    inner: Mutex<TrackerInner>,
    retained: usize,
}

impl JobTracker {
    pub fn new(retained: usize) -> Self {
        Self {
            inner: Mutex::new(TrackerInner::default()),
            retained,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, TrackerInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn get(&self, id: &Uuid) -> Option<JobState> {
        self.lock().jobs.get(id).cloned()
    }

    fn set(&self, id: Uuid, state: JobState) {
        let finished = state.is_finished();
        let mut inner = self.lock();
        inner.jobs.insert(id, state);

        if finished {
            inner.finished.push_back(id);
            while inner.finished.len() > self.retained {
                if let Some(evicted) = inner.finished.pop_front() {
                    inner.jobs.remove(&evicted);
                }
            }
        }
    }

    fn forget(&self, id: &Uuid) {
        self.lock().jobs.remove(id);
    }
}

struct Job {
    id: Uuid,
    batch: CommandBatch,
    completion: oneshot::Sender<DispatchReport>,
}

/// A handle on one submitted batch.
#[derive(Debug)]
pub struct BatchTicket {
    pub id: Uuid,
    completion: oneshot::Receiver<DispatchReport>,
}

impl BatchTicket {
    /// Waits for the batch to finish and returns its report.
    pub async fn wait(self) -> Result<DispatchReport, ExecutorError> {
        self.completion.await.map_err(|_| ExecutorError::Abandoned)
    }
}

/// A bounded queue plus the worker tasks draining it.
pub struct BatchExecutor {
    sender: RwLock<Option<mpsc::Sender<Job>>>,
    workers: AsyncMutex<Vec<JoinHandle<()>>>,
    tracker: Arc<JobTracker>,
}

impl BatchExecutor {
    /// Spawns `workers` tasks on the current Tokio runtime.
    pub fn start(
        dispatcher: Arc<Dispatcher>,
        workers: usize,
        queue_capacity: usize,
        retained_jobs: usize,
    ) -> Self {
        let (tx, rx) = mpsc::channel(queue_capacity.max(1));
        let rx = Arc::new(AsyncMutex::new(rx));
        let tracker = Arc::new(JobTracker::new(retained_jobs));

        let handles = (0..workers.max(1))
            .map(|worker| {
                let rx = rx.clone();
                let dispatcher = dispatcher.clone();
                let tracker = tracker.clone();
                tokio::spawn(
                    run_worker(rx, dispatcher, tracker).instrument(info_span!("worker", worker)),
                )
            })
            .collect();

        info!(workers, queue_capacity, "Batch executor started");

        Self {
            sender: RwLock::new(Some(tx)),
            workers: AsyncMutex::new(handles),
            tracker,
        }
    }

    pub fn tracker(&self) -> &JobTracker {
        &self.tracker
    }

    /// Queues `batch` without waiting for room in the queue.
    pub fn submit(&self, batch: CommandBatch) -> Result<BatchTicket, ExecutorError> {
        let sender = self
            .sender
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or(ExecutorError::Closed)?;

        let id = Uuid::new_v4();
        let (completion_tx, completion_rx) = oneshot::channel();

        // Registered before sending so a fast worker cannot overtake it.
        self.tracker.set(id, JobState::Queued);

        let job = Job {
            id,
            batch,
            completion: completion_tx,
        };
        match sender.try_send(job) {
            Ok(()) => {
                debug!(job_id = %id, "Batch queued");
                Ok(BatchTicket {
                    id,
                    completion: completion_rx,
                })
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                self.tracker.forget(&id);
                warn!("Command queue is full, refusing batch");
                Err(ExecutorError::QueueFull)
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                self.tracker.forget(&id);
                Err(ExecutorError::Closed)
            }
        }
    }

    /// Stops accepting batches, lets the workers drain the queue, and waits for them.
    pub async fn shutdown(&self) {
        self.sender
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        let handles: Vec<_> = self.workers.lock().await.drain(..).collect();
        for handle in handles {
            if let Err(e) = handle.await {
                error!(error = %e, "Executor worker terminated abnormally");
            }
        }
        info!("Batch executor stopped");
    }
}

async fn run_worker(
    rx: Arc<AsyncMutex<mpsc::Receiver<Job>>>,
    dispatcher: Arc<Dispatcher>,
    tracker: Arc<JobTracker>,
) {
    loop {
        let next = rx.lock().await.recv().await;
        let Some(job) = next else {
            break;
        };

        let Job {
            id,
            batch,
            completion,
        } = job;
        tracker.set(id, JobState::Running);
        debug!(job_id = %id, "Running batch");

        // A panicking handler takes down this task only, not the worker.
        let dispatcher = dispatcher.clone();
        let result = tokio::spawn(async move { dispatcher.dispatch(&batch).await }).await;

        match result {
            Ok(report) => {
                tracker.set(
                    id,
                    JobState::Completed {
                        report: report.clone(),
                    },
                );
                // The caller may have dropped its ticket.
                let _ = completion.send(report);
            }
            Err(e) => {
                error!(job_id = %id, error = %e, "Batch processing aborted");
                tracker.set(
                    id,
                    JobState::Failed {
                        error: e.to_string(),
                    },
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use relay_core::{
        actuator::{ActuatorAccessor, mock::RecordingConnector},
        command::CommandKind,
        dispatcher::CommandStatus,
        handlers::{CommandError, CommandHandler, HandlerOutcome, HandlerRegistry},
    };
    use serde_json::{Value, json};

    fn dispatcher() -> (Arc<Dispatcher>, Arc<RecordingConnector>) {
        let connector = Arc::new(RecordingConnector::new());
        let dispatcher = Dispatcher::new(
            HandlerRegistry::standard("ALTextToSpeech"),
            Arc::new(ActuatorAccessor::online(connector.clone())),
        );
        (Arc::new(dispatcher), connector)
    }

    fn say(text: &str) -> CommandBatch {
        CommandBatch::from_value(json!({
            "commands": [{ "type": "say_something", "args": [text] }]
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn test_ticket_resolves_with_report() {
        let (dispatcher, connector) = dispatcher();
        let executor = BatchExecutor::start(dispatcher, 1, 4, 16);

        let ticket = executor.submit(say("Hello")).unwrap();
        let id = ticket.id;
        let report = ticket.wait().await.unwrap();

        assert_eq!(report.performed(), 1);
        assert_eq!(connector.actuator().spoken(), vec!["Hello"]);
        assert!(matches!(
            executor.tracker().get(&id),
            Some(JobState::Completed { .. })
        ));

        executor.shutdown().await;
    }

    #[tokio::test]
    async fn test_single_worker_preserves_submission_order() {
        let (dispatcher, connector) = dispatcher();
        let executor = BatchExecutor::start(dispatcher, 1, 8, 16);

        let tickets: Vec<_> = ["one", "two", "three"]
            .into_iter()
            .map(|text| executor.submit(say(text)).unwrap())
            .collect();
        for ticket in tickets {
            ticket.wait().await.unwrap();
        }

        assert_eq!(connector.actuator().spoken(), vec!["one", "two", "three"]);
        executor.shutdown().await;
    }

    #[tokio::test]
    async fn test_full_queue_is_refused() {
        let (dispatcher, _connector) = dispatcher();
        // Workers only run when this test task yields, so the queue fills up.
        let executor = BatchExecutor::start(dispatcher, 1, 1, 16);

        let first = executor.submit(say("first"));
        let second = executor.submit(say("second"));

        assert!(first.is_ok());
        assert_eq!(second.unwrap_err(), ExecutorError::QueueFull);
        executor.shutdown().await;
    }

    #[tokio::test]
    async fn test_shutdown_drains_queue_then_refuses() {
        let (dispatcher, connector) = dispatcher();
        let executor = BatchExecutor::start(dispatcher, 2, 8, 16);

        let ticket = executor.submit(say("before shutdown")).unwrap();
        executor.shutdown().await;

        assert!(ticket.wait().await.is_ok());
        assert_eq!(connector.actuator().spoken(), vec!["before shutdown"]);
        assert_eq!(
            executor.submit(say("too late")).unwrap_err(),
            ExecutorError::Closed
        );
    }

    struct ExplodingHandler;

    #[async_trait]
    impl CommandHandler for ExplodingHandler {
        async fn handle(
            &self,
            _actuators: &ActuatorAccessor,
            _args: &[Value],
        ) -> Result<HandlerOutcome, CommandError> {
            panic!("handler exploded");
        }
    }

    #[tokio::test]
    async fn test_panicking_handler_fails_command_not_worker() {
        let mut registry = HandlerRegistry::new();
        registry.register(CommandKind::SaySomething, Arc::new(ExplodingHandler));
        let dispatcher = Arc::new(Dispatcher::new(
            registry,
            Arc::new(ActuatorAccessor::offline()),
        ));
        let executor = BatchExecutor::start(dispatcher, 1, 4, 16);

        let first = executor.submit(say("one")).unwrap();
        let first_id = first.id;
        let report = first.wait().await.unwrap();
        assert_eq!(report.failed(), 1);
        assert!(matches!(
            &report.commands[0].status,
            CommandStatus::Failed { error } if error.contains("handler exploded")
        ));
        assert!(matches!(
            executor.tracker().get(&first_id),
            Some(JobState::Completed { .. })
        ));

        // The worker survived and keeps serving batches.
        let second = executor.submit(say("two")).unwrap();
        assert_eq!(second.wait().await.unwrap().failed(), 1);

        executor.shutdown().await;
    }

    #[tokio::test]
    async fn test_ticket_without_worker_is_abandoned() {
        let (completion_tx, completion_rx) = oneshot::channel();
        let ticket = BatchTicket {
            id: Uuid::new_v4(),
            completion: completion_rx,
        };
        drop(completion_tx);

        assert_eq!(ticket.wait().await.unwrap_err(), ExecutorError::Abandoned);
    }

    #[test]
    fn test_failed_jobs_are_tracked_and_retained() {
        let tracker = JobTracker::new(1);
        let failed = Uuid::new_v4();

        tracker.set(failed, JobState::Running);
        tracker.set(
            failed,
            JobState::Failed {
                error: "task cancelled".to_string(),
            },
        );
        assert_eq!(
            tracker.get(&failed),
            Some(JobState::Failed {
                error: "task cancelled".to_string()
            })
        );

        tracker.set(Uuid::new_v4(), JobState::Completed { report: DispatchReport::default() });
        assert!(tracker.get(&failed).is_none());
    }

    #[test]
    fn test_tracker_evicts_oldest_finished_jobs() {
        let tracker = JobTracker::new(2);
        let ids: Vec<Uuid> = (0..3).map(|_| Uuid::new_v4()).collect();
        let pending = Uuid::new_v4();

        tracker.set(pending, JobState::Queued);
        for id in &ids {
            tracker.set(*id, JobState::Running);
            tracker.set(
                *id,
                JobState::Completed {
                    report: DispatchReport::default(),
                },
            );
        }

        assert!(tracker.get(&ids[0]).is_none());
        assert!(tracker.get(&ids[1]).is_some());
        assert!(tracker.get(&ids[2]).is_some());
        assert_eq!(tracker.get(&pending), Some(JobState::Queued));
    }

    #[test]
    fn test_job_state_serialization() {
        assert_eq!(
            serde_json::to_value(JobState::Queued).unwrap(),
            json!({ "state": "queued" })
        );
        assert_eq!(
            serde_json::to_value(JobState::Failed {
                error: "boom".to_string()
            })
            .unwrap(),
            json!({ "state": "failed", "error": "boom" })
        );
    }
}
