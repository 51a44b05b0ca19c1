use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use actix_web::{error::BlockingError, web};

/// Runs CPU-bound work (PBKDF2 derivation, diesel calls) on actix's blocking
/// threadpool so the async reactor is never starved. Ported from
/// `syncserver_common::BlockingThreadpool`.
///
/// Intentionally does not implement `Clone`: share it behind an `Arc`.
#[derive(Debug, Default)]
pub struct BlockingThreadpool {
    spawned_tasks: AtomicU64,
}

pub trait InternalError {
    fn internal_error(message: String) -> Self;
}

impl BlockingThreadpool {
    pub async fn spawn<F, T, E>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce() -> Result<T, E> + Send + 'static,
        T: Send + 'static,
        E: fmt::Debug + Send + InternalError + 'static,
    {
        self.spawned_tasks.fetch_add(1, Ordering::Relaxed);

        let result = web::block(f).await.unwrap_or_else(|_| {
            Err(E::internal_error(
                "blocking threadpool operation canceled".to_owned(),
            ))
        });

        self.spawned_tasks.fetch_sub(1, Ordering::Relaxed);
        result
    }

    pub fn active_threads(&self) -> u64 {
        self.spawned_tasks.load(Ordering::Relaxed)
    }
}

/// Free-function form for call sites that don't want to thread an
/// `Arc<BlockingThreadpool>` through.
pub async fn run_on_blocking_threadpool<F, T, E, M>(f: F, e: M) -> Result<T, E>
where
    F: FnOnce() -> Result<T, E> + Send + 'static,
    T: Send + 'static,
    E: fmt::Debug + Send + 'static,
    M: FnOnce(String) -> E,
{
    web::block(f).await.map_err(|_: BlockingError| {
        e("db threadpool operation canceled".to_owned())
    })?
}
