//! # Task Trait
//!
//! A `Task` is a self-contained unit of work that is moved into a worker pool queue, run
//! once on a worker thread and turned into an output value that travels back to the owning
//! thread through a [`ResultChannel`](super::result_channel::ResultChannel).
//!
//! ## Task Lifecycle
//! 1. The owning thread builds the task, moving in everything it needs
//! 2. The task is submitted to a [`WorkerPool`](super::WorkerPool)
//! 3. A worker calls `process()`, consuming the task
//! 4. The output is pushed into the pool's result channel
//! 5. The owning thread drains the channel on its next update cycle
//!
//! ## Thread Safety
//! Tasks and their outputs cross thread boundaries and must be `Send + 'static`. Any data
//! shared with other tasks has to be immutable or reference-counted (`Arc`).

/// A unit of work that can be executed on a worker thread.
pub trait Task: Send + 'static {
    /// The value produced by the task and handed back to the owning thread.
    type Output: Send + 'static;

    /// Runs the task, consuming it.
    ///
    /// Implementations should turn their own failures into an `Output` value so the owning
    /// thread learns about them; panics escaping `process` are caught and logged by the pool.
    fn process(self) -> Self::Output;
}
