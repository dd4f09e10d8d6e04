//! Ограничитель исходящих запросов к API клиентов.
//!
//! Задачи попадают в очередь через канал; диспетчер держит кучу по
//! приоритету и запускает не более `max_concurrent` задач одновременно.
//! После завершения задачи слот освобождается только через `batch_delay`.

use futures::future::{join_all, BoxFuture};
use futures::FutureExt;
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot, Semaphore};

use crate::shared::config::ThrottleConfig;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ThrottleError {
    #[error("Request throttler is shut down")]
    Closed,

    #[error("Throttled task was cancelled before completing")]
    Cancelled,
}

type Job = Box<dyn FnOnce() -> BoxFuture<'static, ()> + Send>;

struct QueuedJob {
    priority: i32,
    seq: u64,
    job: Job,
}

// Max-heap: higher priority first, then lower sequence number (FIFO)
impl Ord for QueuedJob {
    fn cmp(&self, other: &Self) -> Ordering {
        self.priority
            .cmp(&other.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for QueuedJob {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for QueuedJob {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.seq == other.seq
    }
}

impl Eq for QueuedJob {}

/// Результат поставленной в очередь задачи
pub struct JobHandle<T> {
    rx: oneshot::Receiver<T>,
}

impl<T> JobHandle<T> {
    pub async fn wait(self) -> Result<T, ThrottleError> {
        self.rx.await.map_err(|_| ThrottleError::Cancelled)
    }
}

#[derive(Clone)]
pub struct RequestThrottler {
    tx: mpsc::UnboundedSender<QueuedJob>,
    seq: Arc<std::sync::atomic::AtomicU64>,
    config: ThrottleConfig,
}

impl RequestThrottler {
    /// Создаёт ограничитель и запускает диспетчер (нужен runtime tokio)
    pub fn new(config: ThrottleConfig) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let permits = Arc::new(Semaphore::new(config.max_concurrent.max(1)));
        tokio::spawn(dispatch(rx, permits, config.batch_delay()));

        tracing::debug!(
            "Request throttler started: max_concurrent={}, batch_delay={}ms",
            config.max_concurrent,
            config.batch_delay_ms
        );

        Self {
            tx,
            seq: Arc::new(std::sync::atomic::AtomicU64::new(0)),
            config,
        }
    }

    /// Ставит задачу в очередь немедленно и возвращает handle результата
    pub fn submit<F, Fut, T>(&self, priority: i32, f: F) -> Result<JobHandle<T>, ThrottleError>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let (result_tx, rx) = oneshot::channel();
        let job: Job = Box::new(move || {
            async move {
                let value = f().await;
                let _ = result_tx.send(value);
            }
            .boxed()
        });

        let seq = self
            .seq
            .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        self.tx
            .send(QueuedJob { priority, seq, job })
            .map_err(|_| ThrottleError::Closed)?;

        Ok(JobHandle { rx })
    }

    pub async fn execute<F, Fut, T>(&self, priority: i32, f: F) -> Result<T, ThrottleError>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        self.submit(priority, f)?.wait().await
    }

    /// Выполняет задачи пачками по `batch_size` с паузой `inter_batch_delay`
    /// между пачками. Ошибка одной задачи не прерывает соседние; результат
    /// возвращается по каждой задаче в исходном порядке.
    pub async fn execute_batch<F, Fut, T>(&self, tasks: Vec<F>) -> Vec<Result<T, ThrottleError>>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let batch_size = self.config.batch_size.max(1);
        let total = tasks.len();
        let mut results = Vec::with_capacity(total);
        let mut pending = tasks.into_iter().peekable();

        while pending.peek().is_some() {
            let batch: Vec<F> = pending.by_ref().take(batch_size).collect();
            let handles: Vec<_> = batch.into_iter().map(|f| self.submit(0, f)).collect();
            let settled = join_all(handles.into_iter().map(|h| async move {
                match h {
                    Ok(handle) => handle.wait().await,
                    Err(e) => Err(e),
                }
            }))
            .await;
            results.extend(settled);

            if pending.peek().is_some() {
                tokio::time::sleep(self.config.inter_batch_delay()).await;
            }
        }

        tracing::debug!("Batch finished: {} tasks", total);
        results
    }
}

async fn dispatch(
    mut rx: mpsc::UnboundedReceiver<QueuedJob>,
    permits: Arc<Semaphore>,
    batch_delay: Duration,
) {
    let mut queue: BinaryHeap<QueuedJob> = BinaryHeap::new();

    loop {
        if queue.is_empty() {
            match rx.recv().await {
                Some(job) => queue.push(job),
                None => break,
            }
        }

        let Ok(permit) = permits.clone().acquire_owned().await else {
            break;
        };

        // Всё, что пришло пока ждали слот, участвует в выборе по приоритету
        while let Ok(job) = rx.try_recv() {
            queue.push(job);
        }
        let Some(next) = queue.pop() else {
            continue;
        };

        tokio::spawn(async move {
            (next.job)().await;
            tokio::time::sleep(batch_delay).await;
            drop(permit);
        });
    }

    tracing::debug!("Request throttler dispatcher stopped");
}
