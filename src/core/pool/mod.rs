//! # Worker Pool Module
//!
//! Batched parallel task execution with a hard settlement barrier.
//!
//! Tasks are dispatched to a fixed set of worker threads in consecutive
//! batches of `batch_size`. Every task of a batch must settle (succeed,
//! fail or panic) before the next batch is dispatched, which caps both
//! concurrency and peak memory at `batch_size` tasks no matter how many
//! items a pass holds.
//!
//! ## Design
//! Dispatcher and workers exchange plain data messages over channels and
//! share no mutable state: jobs flow out as `(index, item)`, settlements
//! flow back as `(index, result)`. Panics inside a task are caught at the
//! worker boundary and settled as tagged failures, so a barrier can never
//! hang on a crashed task.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{unbounded, Receiver, Sender};
use tracing::warn;

use crate::core::library::AssetId;
use crate::error::{FailureKind, PoolError, TaskFailure};

/// An item a pool can process: plain data plus the asset id used to tag
/// failures.
pub trait PoolItem: Send + 'static {
    fn asset_id(&self) -> &AssetId;
}

/// Pool construction parameters.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Tasks per batch; also the number of worker threads. Zero is treated
    /// as one.
    pub batch_size: usize,
    /// Worker thread name prefix (threads are `<name>-0`, `<name>-1`, ...)
    pub worker_name: &'static str,
    /// Failure kind recorded when a task panics instead of returning
    pub panic_kind: FailureKind,
}

/// Counters describing one settled batch.
#[derive(Debug, Clone, Copy)]
pub struct BatchStats {
    /// Zero-based batch index
    pub batch: usize,
    /// Tasks settled in this batch
    pub settled: usize,
    /// Tasks settled so far, including this batch
    pub completed: usize,
    /// Total tasks in the pass
    pub total: usize,
}

type TaskResult<O> = Result<O, TaskFailure>;

/// Fixed-size worker pool with batch-barrier dispatch.
///
/// Dropping the pool closes the job channel and joins every worker.
pub struct WorkerPool<I, O> {
    jobs: Option<Sender<(usize, I)>>,
    results: Receiver<(usize, TaskResult<O>)>,
    workers: Vec<JoinHandle<()>>,
    batch_size: usize,
}

impl<I, O> WorkerPool<I, O>
where
    I: PoolItem,
    O: Send + 'static,
{
    /// Spawn `config.batch_size` workers running `task`.
    ///
    /// Failing to spawn a worker thread is an environment problem, not a
    /// per-task one, and aborts the whole pool.
    pub fn start<F>(config: PoolConfig, task: F) -> Result<Self, PoolError>
    where
        F: Fn(I) -> TaskResult<O> + Send + Sync + 'static,
    {
        let batch_size = config.batch_size.max(1);
        let task = Arc::new(task);
        let (job_sender, job_receiver) = unbounded::<(usize, I)>();
        let (result_sender, result_receiver) = unbounded();

        let mut workers = Vec::with_capacity(batch_size);
        for worker in 0..batch_size {
            let name = format!("{}-{}", config.worker_name, worker);
            let jobs = job_receiver.clone();
            let results = result_sender.clone();
            let task = Arc::clone(&task);
            let panic_kind = config.panic_kind;

            let handle = thread::Builder::new()
                .name(name.clone())
                .spawn(move || worker_loop(jobs, results, task, panic_kind))
                .map_err(|source| PoolError::ThreadSpawn { name, source })?;
            workers.push(handle);
        }

        Ok(Self {
            jobs: Some(job_sender),
            results: result_receiver,
            workers,
            batch_size,
        })
    }

    /// Run `items` through the pool in consecutive batches.
    ///
    /// Results come back in input order, one slot per item. `after_batch`
    /// runs on the dispatcher thread once a batch has fully settled -
    /// including the last one - and before the next batch is dispatched.
    pub fn run_batches<F>(
        &self,
        items: Vec<I>,
        mut after_batch: F,
    ) -> Result<Vec<TaskResult<O>>, PoolError>
    where
        F: FnMut(BatchStats),
    {
        let jobs = self.jobs.as_ref().ok_or(PoolError::Disconnected)?;
        let total = items.len();
        let mut settled = Vec::with_capacity(total);
        let mut items = items.into_iter();
        let mut batch = 0;

        loop {
            let chunk: Vec<I> = items.by_ref().take(self.batch_size).collect();
            if chunk.is_empty() {
                break;
            }

            let size = chunk.len();
            for (index, item) in chunk.into_iter().enumerate() {
                jobs.send((index, item)).map_err(|_| PoolError::Disconnected)?;
            }

            // Settlement barrier: block until every task of this batch has
            // reported back, then fold the results into input order.
            let mut slots: Vec<Option<TaskResult<O>>> = (0..size).map(|_| None).collect();
            for _ in 0..size {
                let (index, outcome) = self.results.recv().map_err(|_| PoolError::Disconnected)?;
                slots[index] = Some(outcome);
            }
            for slot in slots {
                settled.push(slot.ok_or(PoolError::Disconnected)?);
            }

            after_batch(BatchStats {
                batch,
                settled: size,
                completed: settled.len(),
                total,
            });
            batch += 1;
        }

        Ok(settled)
    }

    /// Tasks per batch after clamping.
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }
}

impl<I, O> Drop for WorkerPool<I, O> {
    fn drop(&mut self) {
        // Closing the job channel ends every worker's receive loop.
        self.jobs.take();
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
    }
}

fn worker_loop<I, O, F>(
    jobs: Receiver<(usize, I)>,
    results: Sender<(usize, TaskResult<O>)>,
    task: Arc<F>,
    panic_kind: FailureKind,
) where
    I: PoolItem,
    O: Send + 'static,
    F: Fn(I) -> TaskResult<O> + Send + Sync + 'static,
{
    for (index, item) in jobs.iter() {
        let asset_id = item.asset_id().clone();
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| task(item))).unwrap_or_else(
            |payload| {
                let detail = panic_detail(payload.as_ref());
                warn!(asset = %asset_id, "task panicked: {detail}");
                Err(TaskFailure::new(asset_id.clone(), panic_kind, detail))
            },
        );

        if results.send((index, outcome)).is_err() {
            // Dispatcher went away; nothing left to settle.
            break;
        }
    }
}

fn panic_detail(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Debug, Clone)]
    struct Job {
        id: AssetId,
        index: usize,
    }

    impl PoolItem for Job {
        fn asset_id(&self) -> &AssetId {
            &self.id
        }
    }

    fn jobs(count: usize) -> Vec<Job> {
        (0..count)
            .map(|index| Job {
                id: AssetId::new(format!("asset-{index:02}")),
                index,
            })
            .collect()
    }

    fn config(batch_size: usize) -> PoolConfig {
        PoolConfig {
            batch_size,
            worker_name: "test",
            panic_kind: FailureKind::Oracle,
        }
    }

    #[test]
    fn seven_items_settle_as_batches_of_three_three_one() {
        let pool = WorkerPool::start(config(3), |job: Job| Ok(job.index)).unwrap();

        let mut batches = Vec::new();
        let results = pool
            .run_batches(jobs(7), |stats| {
                batches.push((stats.batch, stats.settled, stats.completed));
            })
            .unwrap();

        assert_eq!(batches, vec![(0, 3, 3), (1, 3, 6), (2, 1, 7)]);
        assert_eq!(results.len(), 7);
        assert!(results.iter().all(|r| r.is_ok()));
    }

    #[test]
    fn results_keep_input_order_despite_uneven_task_times() {
        // Earlier items sleep longer, so completion order inverts dispatch
        // order inside every batch.
        let pool = WorkerPool::start(config(3), |job: Job| {
            thread::sleep(Duration::from_millis(30 - (job.index as u64 % 3) * 10));
            Ok(job.index)
        })
        .unwrap();

        let results = pool.run_batches(jobs(9), |_| {}).unwrap();
        let order: Vec<usize> = results.into_iter().map(|r| r.unwrap()).collect();
        assert_eq!(order, (0..9).collect::<Vec<_>>());
    }

    #[test]
    fn in_flight_tasks_never_exceed_the_batch_size() {
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let task_active = Arc::clone(&active);
        let task_peak = Arc::clone(&peak);
        let pool = WorkerPool::start(config(3), move |job: Job| {
            let now = task_active.fetch_add(1, Ordering::SeqCst) + 1;
            task_peak.fetch_max(now, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(15));
            task_active.fetch_sub(1, Ordering::SeqCst);
            Ok(job.index)
        })
        .unwrap();

        pool.run_batches(jobs(10), |_| {}).unwrap();
        assert!(peak.load(Ordering::SeqCst) <= 3);
    }

    #[test]
    fn a_batch_fully_settles_before_the_next_dispatches() {
        let log = Arc::new(Mutex::new(Vec::new()));

        let task_log = Arc::clone(&log);
        let pool = WorkerPool::start(config(3), move |job: Job| {
            task_log.lock().unwrap().push(("start", job.index));
            // One straggler per batch keeps the barrier honest.
            if job.index % 3 == 0 {
                thread::sleep(Duration::from_millis(40));
            }
            task_log.lock().unwrap().push(("end", job.index));
            Ok(())
        })
        .unwrap();

        pool.run_batches(jobs(6), |_| {}).unwrap();

        let log = log.lock().unwrap();
        let first_start_of_second_batch = log
            .iter()
            .position(|(kind, index)| *kind == "start" && *index >= 3)
            .unwrap();
        for index in 0..3 {
            let end = log
                .iter()
                .position(|entry| *entry == ("end", index))
                .unwrap();
            assert!(end < first_start_of_second_batch);
        }
    }

    #[test]
    fn one_failure_leaves_the_rest_of_the_pass_intact() {
        let pool = WorkerPool::start(config(3), |job: Job| {
            if job.index == 4 {
                Err(TaskFailure::new(
                    job.id.clone(),
                    FailureKind::Decode,
                    "synthetic failure",
                ))
            } else {
                Ok(job.index)
            }
        })
        .unwrap();

        let mut batches = 0;
        let results = pool.run_batches(jobs(7), |_| batches += 1).unwrap();

        assert_eq!(batches, 3);
        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 6);
        let failure = results[4].as_ref().unwrap_err();
        assert_eq!(failure.kind, FailureKind::Decode);
        assert_eq!(failure.asset_id, AssetId::new("asset-04"));
    }

    #[test]
    fn a_panicking_task_settles_as_a_tagged_failure() {
        let pool = WorkerPool::start(config(2), |job: Job| {
            if job.index == 1 {
                panic!("oracle exploded");
            }
            Ok(job.index)
        })
        .unwrap();

        let results = pool.run_batches(jobs(4), |_| {}).unwrap();

        let failure = results[1].as_ref().unwrap_err();
        assert_eq!(failure.kind, FailureKind::Oracle);
        assert!(failure.detail.contains("oracle exploded"));
        // The worker survives the panic and finishes the pass.
        assert!(results[2].is_ok());
        assert!(results[3].is_ok());

        // And the pool stays usable for another pass.
        let again = pool.run_batches(jobs(1), |_| {}).unwrap();
        assert!(again[0].is_ok());
    }

    #[test]
    fn empty_input_settles_zero_batches() {
        let pool = WorkerPool::start(config(3), |job: Job| Ok(job.index)).unwrap();

        let mut batches = 0;
        let results = pool.run_batches(Vec::new(), |_| batches += 1).unwrap();

        assert!(results.is_empty());
        assert_eq!(batches, 0);
    }

    #[test]
    fn zero_batch_size_degrades_to_serial_execution() {
        let pool = WorkerPool::start(config(0), |job: Job| Ok(job.index)).unwrap();
        assert_eq!(pool.batch_size(), 1);

        let mut batches = 0;
        let results = pool.run_batches(jobs(3), |_| batches += 1).unwrap();
        assert_eq!(results.len(), 3);
        assert_eq!(batches, 3);
    }
}
