//! # Task Management System
//!
//! This module provides the worker pools that run terrain generation and mesh generation off
//! the owning thread.
//!
//! ## Architecture Overview
//!
//! - `WorkerPool`: a fixed set of named OS threads pulling tasks off one shared FIFO queue
//!   and handing each to a processing closure. The pool knows nothing about chunks.
//! - `ResultChannel`: the lock-guarded buffer finished work is pushed into.
//! - `Task`: a unit of work whose `process()` output is pushed into a result channel by
//!   pools built with [`WorkerPool::for_tasks`].
//!
//! ## Task Lifecycle
//! 1. The owning thread submits tasks with `submit()` or `submit_batch()`
//! 2. A sleeping worker is woken through the condition variable and pops one task
//! 3. The worker releases the queue lock and runs the processor
//! 4. Panics raised by the processor are caught at the worker boundary and logged
//! 5. `shutdown()` rejects new submissions; workers exit once the queue is empty
//!
//! ## Example Usage
//! ```rust
//! use voxel_streamer::engine_state::task_management::{ResultChannel, WorkerPool};
//!
//! let results = ResultChannel::new();
//! let sink = results.clone();
//! let mut pool = WorkerPool::new("squares", 2, move |n: u64| sink.push(n * n)).unwrap();
//!
//! assert!(pool.submit_batch(vec![1, 2, 3]));
//! pool.shutdown();
//! pool.join();
//!
//! let mut squares = results.drain();
//! squares.sort();
//! assert_eq!(squares, vec![1, 4, 9]);
//! ```

pub mod result_channel;
pub mod task;

use std::any::Any;
use std::collections::VecDeque;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use log::{error, info, warn};
use parking_lot::{Condvar, Mutex};

pub use result_channel::ResultChannel;
pub use task::Task;

/// Queue contents and the shutdown flag, guarded together so a worker can never miss the
/// wake-up that accompanies shutdown.
struct PoolQueue<T> {
    tasks: VecDeque<T>,
    shutting_down: bool,
}

struct PoolShared<T> {
    queue: Mutex<PoolQueue<T>>,
    task_available: Condvar,
}

/// A fixed-size pool of worker threads applying one processing closure to queued tasks.
///
/// # Implementation Notes
/// - Submission order is preserved into the queue (FIFO); completion order across workers
///   is unordered
/// - Worker threads are named `"{name}-{index}"`
/// - Dropping the pool shuts it down and joins every worker
pub struct WorkerPool<T> {
    name: String,
    shared: Arc<PoolShared<T>>,
    workers: Vec<JoinHandle<()>>,
}

impl<T: Send + 'static> WorkerPool<T> {
    /// Spawns `num_workers` threads that run `processor` on every submitted task.
    ///
    /// # Arguments
    /// * `name` - Prefix used for thread names and log lines
    /// * `num_workers` - Number of worker threads (at least one is spawned)
    /// * `processor` - Closure invoked on a worker thread for each task
    ///
    /// # Returns
    /// The running pool, or the I/O error raised while spawning a thread. Threads spawned
    /// before the failure are shut down and joined when the partial pool is dropped.
    pub fn new<F>(name: &str, num_workers: usize, processor: F) -> io::Result<Self>
    where
        F: Fn(T) + Send + Sync + 'static,
    {
        let shared = Arc::new(PoolShared {
            queue: Mutex::new(PoolQueue {
                tasks: VecDeque::new(),
                shutting_down: false,
            }),
            task_available: Condvar::new(),
        });
        let processor = Arc::new(processor);

        let mut pool = WorkerPool {
            name: name.to_owned(),
            shared,
            workers: Vec::with_capacity(num_workers.max(1)),
        };

        for index in 0..num_workers.max(1) {
            let shared = pool.shared.clone();
            let processor = processor.clone();
            let thread_name = format!("{}-{}", name, index);
            let worker = thread::Builder::new()
                .name(thread_name.clone())
                .spawn(move || worker_loop(&thread_name, &shared, processor.as_ref()))?;
            pool.workers.push(worker);
        }

        info!("[{}] started {} worker(s)", pool.name, pool.workers.len());
        Ok(pool)
    }

    /// Queues one task and wakes one worker.
    ///
    /// # Returns
    /// `false` if the pool is shutting down; the task is dropped, not queued.
    pub fn submit(&self, task: T) -> bool {
        {
            let mut queue = self.shared.queue.lock();
            if queue.shutting_down {
                return false;
            }
            queue.tasks.push_back(task);
        }
        self.shared.task_available.notify_one();
        true
    }

    /// Queues a batch of tasks under a single lock acquisition and wakes every worker.
    ///
    /// # Returns
    /// `false` if the pool is shutting down; none of the tasks are queued.
    pub fn submit_batch(&self, tasks: Vec<T>) -> bool {
        {
            let mut queue = self.shared.queue.lock();
            if queue.shutting_down {
                return false;
            }
            if tasks.is_empty() {
                return true;
            }
            queue.tasks.extend(tasks);
        }
        self.shared.task_available.notify_all();
        true
    }
}

impl<T> WorkerPool<T> {
    /// Stops accepting tasks and wakes every worker. Calling it again has no effect.
    ///
    /// Workers finish whatever is still queued, then exit. Call
    /// [`clear_queue`](Self::clear_queue) first to discard queued work.
    pub fn shutdown(&self) {
        {
            let mut queue = self.shared.queue.lock();
            if queue.shutting_down {
                return;
            }
            queue.shutting_down = true;
        }
        self.shared.task_available.notify_all();
        info!("[{}] shutting down", self.name);
    }

    /// Drops every queued task that no worker has picked up yet.
    ///
    /// # Returns
    /// The number of discarded tasks.
    pub fn clear_queue(&self) -> usize {
        let mut queue = self.shared.queue.lock();
        let discarded = queue.tasks.len();
        queue.tasks.clear();
        discarded
    }

    /// Waits for every worker thread to exit. Only returns after `shutdown()`.
    pub fn join(&mut self) {
        for worker in self.workers.drain(..) {
            if let Err(payload) = worker.join() {
                warn!(
                    "[{}] worker thread terminated abnormally: {}",
                    self.name,
                    panic_message(payload.as_ref())
                );
            }
        }
    }

    /// Number of tasks waiting in the queue.
    pub fn queued_len(&self) -> usize {
        self.shared.queue.lock().tasks.len()
    }

    /// Whether `shutdown()` has been called.
    pub fn is_shutting_down(&self) -> bool {
        self.shared.queue.lock().shutting_down
    }

    /// Number of worker threads not yet joined.
    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }
}

impl<T: Task> WorkerPool<T> {
    /// Builds a pool that runs each task and pushes its output into `results`.
    pub fn for_tasks(
        name: &str,
        num_workers: usize,
        results: ResultChannel<T::Output>,
    ) -> io::Result<Self> {
        Self::new(name, num_workers, move |task: T| results.push(task.process()))
    }
}

impl<T> Drop for WorkerPool<T> {
    fn drop(&mut self) {
        self.shutdown();
        self.join();
    }
}

fn worker_loop<T, F>(name: &str, shared: &PoolShared<T>, processor: &F)
where
    F: Fn(T),
{
    loop {
        let task = {
            let mut queue = shared.queue.lock();
            loop {
                if let Some(task) = queue.tasks.pop_front() {
                    break task;
                }
                if queue.shutting_down {
                    return;
                }
                shared.task_available.wait(&mut queue);
            }
        };

        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| processor(task))) {
            error!("[{}] task panicked: {}", name, panic_message(payload.as_ref()));
        }
    }
}

/// Extracts a readable message from a caught panic payload.
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_owned()
    }
}
