//! Job Manager (§4.D): accepts run-requests, schedules test executions on a
//! bounded worker pool, and publishes every state transition.
//!
//! Grounded in `examples/ohitslaurence-maestro/crates/loom-server-jobs` for
//! shape (single owner of job state, worker pool pulling from a task queue),
//! adapted to §4.D's simpler model: no retry/backoff, a single dispatcher
//! *task* (not just a mutex) owning `HashMap<JobId, Job>`, so workers never
//! touch `Job` directly — they report outcomes back over a channel and the
//! dispatcher is the only writer, mirroring `serve::connection`'s
//! single-owner-per-connection pattern.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{mpsc, oneshot, Mutex};

use crate::collaborators::{Agent, Validator};
use crate::discovery::Discovery;
use crate::domain::{Job, JobStatus, TestDescriptor, TestResult, TestStatus};
use crate::error::DispatcherError;
use crate::event_bus::{EventBus, EventBusSubscription};
use crate::history::HistoryStore;
use crate::pipeline::run_pipeline;

/// One test task enqueued for a worker.
struct TestTask {
    job_id: String,
    qualified_name: String,
    module: String,
    name: String,
}

enum DispatcherMsg {
    CreateJob {
        tests: Option<Vec<String>>,
        reply: oneshot::Sender<Job>,
    },
    ListJobs {
        reply: oneshot::Sender<Vec<Job>>,
    },
    GetJob {
        id: String,
        reply: oneshot::Sender<Option<Job>>,
    },
    Subscribe {
        reply: oneshot::Sender<EventBusSubscription>,
    },
    TestStarted {
        job_id: String,
        qualified_name: String,
    },
    TestFinished {
        job_id: String,
        qualified_name: String,
        result: Box<TestResult>,
    },
}

/// Handle to the running dispatcher actor and worker pool. Cloning is cheap
/// (an `mpsc::Sender`); every clone talks to the same single-writer actor.
#[derive(Clone)]
pub struct Dispatcher {
    cmd_tx: mpsc::Sender<DispatcherMsg>,
}

impl Dispatcher {
    /// Spawns the dispatcher actor plus `worker_count` worker tasks, all
    /// reading from one shared FIFO queue (§5 "MPMC over MPSC" idiom).
    pub fn spawn(
        discovery: Arc<dyn Discovery>,
        agent: Arc<dyn Agent>,
        validator: Arc<dyn Validator>,
        history: Arc<dyn HistoryStore>,
        event_bus: Arc<EventBus>,
        worker_count: usize,
        task_queue_capacity: usize,
    ) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel(1024);
        let (task_tx, task_rx) = mpsc::channel::<TestTask>(task_queue_capacity.max(1));
        let task_rx = Arc::new(Mutex::new(task_rx));

        tokio::spawn(run_actor(cmd_rx, discovery.clone(), event_bus, task_tx.clone()));

        for _ in 0..worker_count.max(1) {
            tokio::spawn(run_worker(
                task_rx.clone(),
                agent.clone(),
                validator.clone(),
                history.clone(),
                discovery.clone(),
                cmd_tx.clone(),
            ));
        }

        Self { cmd_tx }
    }

    pub async fn create_job(&self, tests: Option<Vec<String>>) -> Job {
        let (reply, rx) = oneshot::channel();
        self.cmd_tx
            .send(DispatcherMsg::CreateJob { tests, reply })
            .await
            .expect("dispatcher actor is alive");
        rx.await.expect("dispatcher actor replies")
    }

    pub async fn list_jobs(&self) -> Vec<Job> {
        let (reply, rx) = oneshot::channel();
        self.cmd_tx
            .send(DispatcherMsg::ListJobs { reply })
            .await
            .expect("dispatcher actor is alive");
        rx.await.expect("dispatcher actor replies")
    }

    pub async fn get_job(&self, id: &str) -> Result<Job, DispatcherError> {
        let (reply, rx) = oneshot::channel();
        self.cmd_tx
            .send(DispatcherMsg::GetJob {
                id: id.to_string(),
                reply,
            })
            .await
            .expect("dispatcher actor is alive");
        rx.await
            .expect("dispatcher actor replies")
            .ok_or_else(|| DispatcherError::JobNotFound(id.to_string()))
    }

    /// Subscribes to job events. The snapshot is taken atomically by the
    /// dispatcher actor, so it can never race a delta being published for a
    /// job created between `list_jobs` and `subscribe` (§4.E "Guarantees").
    pub async fn subscribe(&self) -> EventBusSubscription {
        let (reply, rx) = oneshot::channel();
        self.cmd_tx
            .send(DispatcherMsg::Subscribe { reply })
            .await
            .expect("dispatcher actor is alive");
        rx.await.expect("dispatcher actor replies")
    }
}

async fn run_actor(
    mut cmd_rx: mpsc::Receiver<DispatcherMsg>,
    discovery: Arc<dyn Discovery>,
    event_bus: Arc<EventBus>,
    task_tx: mpsc::Sender<TestTask>,
) {
    let mut jobs: Vec<Job> = Vec::new();

    while let Some(msg) = cmd_rx.recv().await {
        match msg {
            DispatcherMsg::CreateJob { tests, reply } => {
                let job = create_job(&discovery, &task_tx, tests).await;
                tracing::info!(job_id = %job.id, status = ?job.status, tests = job.tests.len(), "job created");
                event_bus.publish_delta(job.clone());
                jobs.push(job.clone());
                let _ = reply.send(job);
            }
            DispatcherMsg::ListJobs { reply } => {
                let mut out = jobs.clone();
                out.reverse();
                let _ = reply.send(out);
            }
            DispatcherMsg::GetJob { id, reply } => {
                let found = jobs.iter().find(|j| j.id == id).cloned();
                let _ = reply.send(found);
            }
            DispatcherMsg::Subscribe { reply } => {
                let sub = event_bus.subscribe(jobs.clone());
                let _ = reply.send(sub);
            }
            DispatcherMsg::TestStarted {
                job_id,
                qualified_name,
            } => {
                if let Some(job) = jobs.iter_mut().find(|j| j.id == job_id) {
                    tracing::debug!(job_id = %job_id, %qualified_name, "test started");
                    job.test_statuses.insert(qualified_name, TestStatus::Running);
                    job.recompute_status();
                    job.updated_at = Utc::now().to_rfc3339();
                    event_bus.publish_delta(job.clone());
                } else {
                    tracing::warn!(job_id = %job_id, %qualified_name, "test started for unknown job");
                }
            }
            DispatcherMsg::TestFinished {
                job_id,
                qualified_name,
                result,
            } => {
                if let Some(job) = jobs.iter_mut().find(|j| j.id == job_id) {
                    let status = if result.passed {
                        TestStatus::Passed
                    } else {
                        TestStatus::Failed
                    };
                    tracing::info!(
                        job_id = %job_id,
                        %qualified_name,
                        passed = result.passed,
                        error_type = ?result.error_type,
                        duration_seconds = result.duration_seconds,
                        "test finished"
                    );
                    job.test_statuses.insert(qualified_name, status);
                    job.results.push(*result);
                    job.recompute_status();
                    job.updated_at = Utc::now().to_rfc3339();
                    if job.status == JobStatus::Succeeded || job.status == JobStatus::Failed {
                        tracing::info!(job_id = %job.id, status = ?job.status, "job reached terminal status");
                    }
                    event_bus.publish_delta(job.clone());
                } else {
                    tracing::warn!(job_id = %job_id, %qualified_name, "test finished for unknown job");
                }
            }
        }
    }
}

async fn create_job(
    discovery: &Arc<dyn Discovery>,
    task_tx: &mpsc::Sender<TestTask>,
    tests: Option<Vec<String>>,
) -> Job {
    let now = Utc::now().to_rfc3339();
    let id = uuid::Uuid::new_v4().to_string();

    let discovered = discovery.list_tests().await;

    let selected = match tests {
        None => discovered.tests.clone(),
        Some(names) if names.is_empty() => discovered.tests.clone(),
        Some(names) => {
            let mut unknown = Vec::new();
            let mut chosen = Vec::new();
            for name in &names {
                match discovered.tests.iter().find(|t| &t.qualified_name == name) {
                    Some(descriptor) => chosen.push(descriptor.clone()),
                    None => unknown.push(name.clone()),
                }
            }
            if !unknown.is_empty() {
                tracing::warn!(job_id = %id, ?unknown, "create_job rejected unknown test names");
                return Job {
                    id,
                    status: JobStatus::Failed,
                    tests: names,
                    created_at: now.clone(),
                    updated_at: now,
                    error_text: Some(DispatcherError::UnknownTests(unknown).to_string()),
                    results: Vec::new(),
                    test_statuses: std::collections::HashMap::new(),
                };
            }
            chosen
        }
    };

    // Hot reload (§4.D): before the first task of the job is enqueued.
    discovery.reload().await;
    tracing::debug!(job_id = %id, selected = selected.len(), "discovery reloaded before dispatch");

    let mut test_statuses = std::collections::HashMap::new();
    let mut names = Vec::with_capacity(selected.len());
    for descriptor in &selected {
        test_statuses.insert(descriptor.qualified_name.clone(), TestStatus::Queued);
        names.push(descriptor.qualified_name.clone());
    }

    for descriptor in &selected {
        let _ = task_tx
            .send(TestTask {
                job_id: id.clone(),
                qualified_name: descriptor.qualified_name.clone(),
                module: descriptor.module.clone(),
                name: descriptor.name.clone(),
            })
            .await;
    }

    Job {
        id,
        status: JobStatus::Queued,
        tests: names,
        created_at: now.clone(),
        updated_at: now,
        error_text: None,
        results: Vec::new(),
        test_statuses,
    }
}

/// One of `worker_count` workers sharing the task queue (§5 "worker pool").
/// Each iteration pulls one [`TestTask`], runs the pipeline, persists the
/// result to history, then reports the outcome back to the dispatcher actor
/// so `Job.status` is only ever mutated by its single owner.
async fn run_worker(
    task_rx: Arc<Mutex<mpsc::Receiver<TestTask>>>,
    agent: Arc<dyn Agent>,
    validator: Arc<dyn Validator>,
    history: Arc<dyn HistoryStore>,
    discovery: Arc<dyn Discovery>,
    cmd_tx: mpsc::Sender<DispatcherMsg>,
) {
    loop {
        let task = {
            let mut rx = task_rx.lock().await;
            rx.recv().await
        };
        let Some(task) = task else { break };

        let _ = cmd_tx
            .send(DispatcherMsg::TestStarted {
                job_id: task.job_id.clone(),
                qualified_name: task.qualified_name.clone(),
            })
            .await;

        let descriptor = TestDescriptor {
            qualified_name: task.qualified_name.clone(),
            module: task.module,
            name: task.name,
            docstring: None,
        };

        let result = run_pipeline(&descriptor, discovery.as_ref(), agent.as_ref(), validator.as_ref()).await;
        if let Err(e) = history.append(result.clone()).await {
            tracing::warn!(qualified_name = %result.qualified_name, "history append failed: {}", e);
        }

        let _ = cmd_tx
            .send(DispatcherMsg::TestFinished {
                job_id: task.job_id,
                qualified_name: task.qualified_name,
                result: Box::new(result),
            })
            .await;
    }
}
