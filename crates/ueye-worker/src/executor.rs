//! Job executor.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, Semaphore};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use ueye_queue::{Delivery, JobQueue, QueueJob};

use crate::config::WorkerConfig;
use crate::error::{WorkerError, WorkerResult};
use crate::metrics;
use crate::processor::{process_video, OutcomeStatus, ProcessingContext, ProcessingOutcome};
use crate::retry::ErrorLogGate;

/// What to do with a queue message once its run has ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Ack,
    /// Leave unacked; the claim loop redelivers it after the idle window
    Retry,
    DeadLetter,
}

/// Decide the message fate from the run outcome and its attempt count.
pub fn disposition(status: OutcomeStatus, attempts: u32, max_retries: u32) -> Disposition {
    if status.is_settled() {
        Disposition::Ack
    } else if attempts >= max_retries {
        Disposition::DeadLetter
    } else {
        Disposition::Retry
    }
}

/// Job executor that processes jobs from the queue.
pub struct JobExecutor {
    config: WorkerConfig,
    queue: Arc<JobQueue>,
    ctx: Arc<ProcessingContext>,
    job_semaphore: Arc<Semaphore>,
    shutdown: watch::Sender<bool>,
    consumer_name: String,
}

impl JobExecutor {
    pub fn new(config: WorkerConfig, queue: JobQueue, ctx: ProcessingContext) -> Self {
        let job_semaphore = Arc::new(Semaphore::new(config.max_concurrent_jobs));
        let (shutdown, _) = watch::channel(false);
        let consumer_name = format!("worker-{}", Uuid::new_v4());

        Self {
            config,
            queue: Arc::new(queue),
            ctx: Arc::new(ctx),
            job_semaphore,
            shutdown,
            consumer_name,
        }
    }

    pub fn consumer_name(&self) -> &str {
        &self.consumer_name
    }

    /// Consume until [`shutdown`](Self::shutdown) is called, then drain.
    pub async fn run(&self) -> WorkerResult<()> {
        info!(
            consumer = %self.consumer_name,
            max_jobs = self.config.max_concurrent_jobs,
            "Starting job executor"
        );

        self.queue.init().await?;

        let claim_task = tokio::spawn(Self::claim_loop(
            Arc::clone(&self.queue),
            Arc::clone(&self.ctx),
            Arc::clone(&self.job_semaphore),
            self.shutdown.subscribe(),
            self.consumer_name.clone(),
            self.config.clone(),
        ));

        let mut shutdown_rx = self.shutdown.subscribe();
        let mut consume_errors = ErrorLogGate::new(3);

        loop {
            tokio::select! {
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        info!("Shutdown signal received, stopping executor");
                        break;
                    }
                }
                result = self.consume_jobs() => match result {
                    Ok(()) => consume_errors.reset(),
                    Err(e) => {
                        if consume_errors.should_log() {
                            error!(error = %e, "Error consuming jobs");
                        }
                        tokio::time::sleep(Duration::from_secs(5)).await;
                    }
                },
            }
        }

        claim_task.abort();

        info!("Waiting for in-flight jobs to complete");
        let permits = self.config.max_concurrent_jobs as u32;
        match tokio::time::timeout(
            self.config.shutdown_timeout,
            self.job_semaphore.acquire_many(permits),
        )
        .await
        {
            Ok(_) => info!("All in-flight jobs finished"),
            Err(_) => warn!(
                timeout = ?self.config.shutdown_timeout,
                "In-flight jobs still running at shutdown, they will be redelivered"
            ),
        }

        info!("Job executor stopped");
        Ok(())
    }

    /// Signal shutdown.
    pub fn shutdown(&self) {
        let _ = self.shutdown.send(true);
    }

    async fn consume_jobs(&self) -> WorkerResult<()> {
        let available = self.job_semaphore.available_permits();
        if available == 0 {
            tokio::time::sleep(Duration::from_millis(100)).await;
            return Ok(());
        }

        let deliveries = self
            .queue
            .consume(&self.consumer_name, 1000, available.min(5))
            .await?;

        if deliveries.is_empty() {
            return Ok(());
        }
        debug!(count = deliveries.len(), "Consumed jobs from queue");

        for delivery in deliveries {
            let permit = Arc::clone(&self.job_semaphore)
                .acquire_owned()
                .await
                .map_err(|_| WorkerError::job_failed("Semaphore closed"))?;
            let ctx = Arc::clone(&self.ctx);
            let queue = Arc::clone(&self.queue);
            let timeout = self.config.job_timeout;

            tokio::spawn(async move {
                let _permit = permit;
                Self::execute_job(ctx, queue, delivery, timeout).await;
            });
        }

        Ok(())
    }

    async fn claim_loop(
        queue: Arc<JobQueue>,
        ctx: Arc<ProcessingContext>,
        semaphore: Arc<Semaphore>,
        mut shutdown_rx: watch::Receiver<bool>,
        consumer_name: String,
        config: WorkerConfig,
    ) {
        let mut interval = tokio::time::interval(config.claim_interval);
        let min_idle_ms = config.claim_min_idle.as_millis() as u64;

        loop {
            tokio::select! {
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        break;
                    }
                }
                _ = interval.tick() => {
                    let claimed = queue.claim_pending(&consumer_name, min_idle_ms, 5).await;
                    let deliveries = match claimed {
                        Ok(d) => d,
                        Err(e) => {
                            warn!(error = %e, "Failed to claim pending jobs");
                            continue;
                        }
                    };

                    for delivery in deliveries {
                        let Ok(permit) = Arc::clone(&semaphore).acquire_owned().await else {
                            return;
                        };
                        let ctx = Arc::clone(&ctx);
                        let queue = Arc::clone(&queue);
                        let timeout = config.job_timeout;

                        tokio::spawn(async move {
                            let _permit = permit;
                            Self::execute_job(ctx, queue, delivery, timeout).await;
                        });
                    }
                }
            }
        }
    }

    /// Run one delivery and settle its queue message.
    async fn execute_job(
        ctx: Arc<ProcessingContext>,
        queue: Arc<JobQueue>,
        delivery: Delivery,
        timeout: Duration,
    ) {
        let Delivery { message_id, job } = delivery;
        let job_id = job.job_id().to_string();

        let outcome = match tokio::time::timeout(timeout, Self::process_job(&ctx, &job)).await {
            Ok(outcome) => outcome,
            Err(_) => ProcessingOutcome {
                video_id: job.video_id(),
                status: OutcomeStatus::Stuck,
                message: format!("timed out after {:?}", timeout),
                record: None,
            },
        };

        info!(
            job_id = %job_id,
            video_id = %outcome.video_id,
            status = %outcome.status,
            message = %outcome.message,
            "Job finished"
        );

        let attempts = if outcome.status.is_settled() {
            0
        } else {
            match queue.increment_retry(&message_id).await {
                Ok(count) => count,
                Err(e) => {
                    // Counter unknown; stay pending rather than dead-letter
                    warn!(job_id = %job_id, error = %e, "Failed to increment retry count");
                    0
                }
            }
        };

        match disposition(outcome.status, attempts, queue.max_retries()) {
            Disposition::Ack => {
                if let Err(e) = queue.ack(&message_id).await {
                    error!(job_id = %job_id, error = %e, "Failed to ack job");
                }
            }
            Disposition::Retry => {
                info!(
                    job_id = %job_id,
                    attempt = attempts,
                    max = queue.max_retries(),
                    "Job left pending for redelivery"
                );
            }
            Disposition::DeadLetter => {
                metrics::record_dead_lettered();
                if let Err(e) = queue.dlq(&message_id, &job, &outcome.message).await {
                    error!(job_id = %job_id, error = %e, "Failed to move job to DLQ");
                }
            }
        }
    }

    async fn process_job(ctx: &ProcessingContext, job: &QueueJob) -> ProcessingOutcome {
        match job {
            QueueJob::ProcessVideo(j) => process_video(ctx, j).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settled_outcomes_are_acked() {
        for status in [
            OutcomeStatus::Success,
            OutcomeStatus::Failed,
            OutcomeStatus::NotFound,
            OutcomeStatus::Skipped,
        ] {
            assert_eq!(disposition(status, 0, 3), Disposition::Ack);
        }
    }

    #[test]
    fn test_stuck_retries_then_dead_letters() {
        assert_eq!(disposition(OutcomeStatus::Stuck, 1, 3), Disposition::Retry);
        assert_eq!(disposition(OutcomeStatus::Stuck, 2, 3), Disposition::Retry);
        assert_eq!(disposition(OutcomeStatus::Stuck, 3, 3), Disposition::DeadLetter);
        assert_eq!(
            disposition(OutcomeStatus::Stuck, u32::MAX, 3),
            Disposition::DeadLetter
        );
    }
}
