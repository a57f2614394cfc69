//! Execution contexts a caller hands to the engine to say where work and
//! callbacks should run. The engine never picks a thread on its own.

use std::sync::Arc;

pub type Job = Box<dyn FnOnce() + Send + 'static>;

pub trait ExecutionContext: Send + Sync {
    fn execute(&self, job: Job);
}

/// Runs the job on the calling thread before returning.
#[derive(Debug, Default, Clone, Copy)]
pub struct Inline;

impl ExecutionContext for Inline {
    fn execute(&self, job: Job) {
        job();
    }
}

/// Runs jobs on a rayon pool, either a dedicated one or the global pool.
#[derive(Clone, Default)]
pub struct RayonContext {
    pool: Option<Arc<rayon::ThreadPool>>,
}

impl RayonContext {
    pub fn global() -> Self {
        Self { pool: None }
    }

    pub fn with_threads(num_threads: usize) -> Result<Self, rayon::ThreadPoolBuildError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(num_threads)
            .thread_name(|i| format!("claim-validate-{}", i))
            .build()?;
        Ok(Self { pool: Some(Arc::new(pool)) })
    }
}

impl ExecutionContext for RayonContext {
    fn execute(&self, job: Job) {
        match &self.pool {
            Some(pool) => pool.spawn(job),
            None => rayon::spawn(job),
        }
    }
}

impl<E: ExecutionContext + ?Sized> ExecutionContext for Arc<E> {
    fn execute(&self, job: Job) {
        (**self).execute(job)
    }
}
