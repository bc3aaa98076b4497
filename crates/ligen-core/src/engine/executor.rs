use super::config::{ConfigError, ExecutionMode};
use super::error::EngineError;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use thiserror::Error;
use tracing::debug;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TaskError {
    #[error("Task panicked: {0}")]
    Panicked(String),
}

/// Runs a batch of independent tasks and returns their results in input order.
///
/// A panic inside one task is captured as that task's [`TaskError`]; the rest of the
/// batch still runs.
pub trait ParallelExecutor {
    fn name(&self) -> &'static str;

    fn workers(&self) -> usize;

    fn run<T, R, F>(&self, items: Vec<T>, f: F) -> Vec<Result<R, TaskError>>
    where
        T: Send,
        R: Send,
        F: Fn(T) -> R + Send + Sync;
}

fn run_caught<T, R, F: Fn(T) -> R>(f: &F, item: T) -> Result<R, TaskError> {
    panic::catch_unwind(AssertUnwindSafe(|| f(item)))
        .map_err(|payload| TaskError::Panicked(panic_message(payload.as_ref())))
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SerialExecutor;

impl ParallelExecutor for SerialExecutor {
    fn name(&self) -> &'static str {
        "serial"
    }

    fn workers(&self) -> usize {
        1
    }

    fn run<T, R, F>(&self, items: Vec<T>, f: F) -> Vec<Result<R, TaskError>>
    where
        T: Send,
        R: Send,
        F: Fn(T) -> R + Send + Sync,
    {
        items.into_iter().map(|item| run_caught(&f, item)).collect()
    }
}

/// A dedicated rayon pool, torn down when the executor is dropped.
#[cfg(feature = "parallel")]
pub struct ThreadPoolExecutor {
    pool: rayon::ThreadPool,
}

#[cfg(feature = "parallel")]
impl ThreadPoolExecutor {
    /// `workers == 0` sizes the pool to the available cores.
    pub fn new(workers: usize) -> Result<Self, EngineError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|index| format!("ligen-worker-{index}"))
            .build()
            .map_err(|e| EngineError::Executor(e.to_string()))?;
        debug!(workers = pool.current_num_threads(), "Thread pool started");
        Ok(Self { pool })
    }
}

#[cfg(feature = "parallel")]
impl ParallelExecutor for ThreadPoolExecutor {
    fn name(&self) -> &'static str {
        "threads"
    }

    fn workers(&self) -> usize {
        self.pool.current_num_threads()
    }

    fn run<T, R, F>(&self, items: Vec<T>, f: F) -> Vec<Result<R, TaskError>>
    where
        T: Send,
        R: Send,
        F: Fn(T) -> R + Send + Sync,
    {
        self.pool
            .install(|| items.into_par_iter().map(|item| run_caught(&f, item)).collect())
    }
}

#[cfg(feature = "parallel")]
impl Drop for ThreadPoolExecutor {
    fn drop(&mut self) {
        debug!(workers = self.pool.current_num_threads(), "Thread pool released");
    }
}

/// The backend selected by [`ExecutionMode`].
pub enum Executor {
    Serial(SerialExecutor),
    #[cfg(feature = "parallel")]
    ThreadPool(ThreadPoolExecutor),
}

impl Executor {
    pub fn from_mode(mode: ExecutionMode) -> Result<Self, EngineError> {
        match mode {
            ExecutionMode::Serial => Ok(Self::Serial(SerialExecutor)),
            #[cfg(feature = "parallel")]
            ExecutionMode::ThreadPool { workers } => {
                Ok(Self::ThreadPool(ThreadPoolExecutor::new(workers)?))
            }
            #[cfg(not(feature = "parallel"))]
            ExecutionMode::ThreadPool { .. } => {
                Err(ConfigError::Unsupported("thread pool execution").into())
            }
            ExecutionMode::Distributed => {
                Err(ConfigError::Unsupported("distributed execution").into())
            }
        }
    }
}

impl ParallelExecutor for Executor {
    fn name(&self) -> &'static str {
        match self {
            Self::Serial(executor) => executor.name(),
            #[cfg(feature = "parallel")]
            Self::ThreadPool(executor) => executor.name(),
        }
    }

    fn workers(&self) -> usize {
        match self {
            Self::Serial(executor) => executor.workers(),
            #[cfg(feature = "parallel")]
            Self::ThreadPool(executor) => executor.workers(),
        }
    }

    fn run<T, R, F>(&self, items: Vec<T>, f: F) -> Vec<Result<R, TaskError>>
    where
        T: Send,
        R: Send,
        F: Fn(T) -> R + Send + Sync,
    {
        match self {
            Self::Serial(executor) => executor.run(items, f),
            #[cfg(feature = "parallel")]
            Self::ThreadPool(executor) => executor.run(items, f),
        }
    }
}
