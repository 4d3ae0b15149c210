use flume::{bounded, Receiver, Sender, TrySendError};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use super::commands::{self, ChatPolicy};
use super::generation::GenerationClient;
use crate::config::{DispatcherConfig, OverflowPolicy};
use crate::models::chat::ConversationId;
use crate::utils::error::GenerationError;

pub type JobResult = Result<String, GenerationError>;

/// One inbound chat message waiting for a worker
#[derive(Debug)]
pub struct Job {
    pub id: Uuid,
    pub conversation_id: ConversationId,
    pub author_id: i64,
    pub text: String,
    reply: oneshot::Sender<JobResult>,
}

#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("job queue is full")]
    QueueFull,

    #[error("dispatcher is shut down")]
    Closed,

    #[error("worker dropped the job")]
    Dropped,
}

/// Bounded worker pool: a fixed number of workers draining a bounded queue,
/// one job per inbound message
pub struct Dispatcher {
    sender: Sender<Job>,
    overflow: OverflowPolicy,
    workers: Vec<JoinHandle<()>>,
}

impl Dispatcher {
    /// Spawn workers on the current tokio runtime
    pub fn start(
        client: Arc<GenerationClient>,
        config: &DispatcherConfig,
        policy: ChatPolicy,
    ) -> Self {
        let (sender, receiver) = bounded(config.queue_capacity.max(1));

        info!(
            "Initializing dispatcher: workers={}, queue={}, overflow={:?}",
            config.worker_count, config.queue_capacity, config.overflow
        );

        let policy = Arc::new(policy);
        let workers = (0..config.worker_count.max(1))
            .map(|worker_id| {
                let client = client.clone();
                let receiver = receiver.clone();
                let policy = policy.clone();

                tokio::spawn(async move {
                    Self::worker_loop(worker_id, client, receiver, policy).await;
                })
            })
            .collect();

        Self {
            sender,
            overflow: config.overflow,
            workers,
        }
    }

    /// Queue a message; the receiver resolves with the reply text
    pub async fn submit(
        &self,
        conversation_id: ConversationId,
        author_id: i64,
        text: String,
    ) -> Result<oneshot::Receiver<JobResult>, DispatchError> {
        let (reply, receiver) = oneshot::channel();
        let job = Job {
            id: Uuid::new_v4(),
            conversation_id,
            author_id,
            text,
            reply,
        };

        match self.overflow {
            OverflowPolicy::Block => self
                .sender
                .send_async(job)
                .await
                .map_err(|_| DispatchError::Closed)?,
            OverflowPolicy::Reject => self.sender.try_send(job).map_err(|e| match e {
                TrySendError::Full(job) => {
                    warn!(job_id = %job.id, "Dispatcher queue full, rejecting job");
                    DispatchError::QueueFull
                }
                TrySendError::Disconnected(_) => DispatchError::Closed,
            })?,
        }

        Ok(receiver)
    }

    /// Submit and wait for the reply
    pub async fn dispatch(
        &self,
        conversation_id: ConversationId,
        author_id: i64,
        text: String,
    ) -> Result<JobResult, DispatchError> {
        let receiver = self.submit(conversation_id, author_id, text).await?;
        receiver.await.map_err(|_| DispatchError::Dropped)
    }

    /// Number of jobs waiting for a worker
    pub fn queued(&self) -> usize {
        self.sender.len()
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    async fn worker_loop(
        worker_id: usize,
        client: Arc<GenerationClient>,
        receiver: Receiver<Job>,
        policy: Arc<ChatPolicy>,
    ) {
        debug!("Dispatcher worker {} started", worker_id);

        while let Ok(job) = receiver.recv_async().await {
            let span = info_span!(
                "job",
                job_id = %job.id,
                conversation_id = %job.conversation_id,
                author_id = job.author_id,
                worker_id
            );

            let result = commands::execute(
                &client,
                &policy,
                &job.conversation_id,
                job.author_id,
                &job.text,
            )
            .instrument(span)
            .await;

            if let Err(e) = &result {
                warn!(job_id = %job.id, "Job failed: {}", e);
            }
            if job.reply.send(result).is_err() {
                debug!(job_id = %job.id, "Caller went away before the reply");
            }
        }

        debug!("Dispatcher worker {} shutting down (channel closed)", worker_id);
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        for worker in &self.workers {
            worker.abort();
        }
    }
}
