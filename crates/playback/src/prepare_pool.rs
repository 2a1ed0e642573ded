//! Fixed-size worker pool for per-frame preparation.
//!
//! Tasks are independent; there is no ordering between them.  Dropping the
//! pool's sender ends the workers once the queue drains.

use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use tracing::debug;

pub type Job = Box<dyn FnOnce() + Send>;

pub struct PreparePool {
    tx: Option<mpsc::Sender<Job>>,
    workers: Vec<JoinHandle<()>>,
}

impl PreparePool {
    pub fn new(threads: usize) -> Self {
        let (tx, rx) = mpsc::channel::<Job>();
        let rx = Arc::new(Mutex::new(rx));

        debug!(threads, "starting prepare pool");
        let workers = (0..threads.max(1))
            .map(|_| {
                let rx = rx.clone();
                std::thread::spawn(move || loop {
                    let job = rx.lock().unwrap().recv();
                    match job {
                        Ok(job) => job(),
                        Err(_) => return,
                    }
                })
            })
            .collect();

        Self {
            tx: Some(tx),
            workers,
        }
    }

    /// Default size: two workers per hardware thread.
    pub fn with_default_size() -> Self {
        let parallelism = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(2);
        Self::new(parallelism * 2)
    }

    /// A sender that outlives borrows of the pool; used by enqueue callbacks.
    pub fn sender(&self) -> mpsc::Sender<Job> {
        self.tx.as_ref().expect("pool already shut down").clone()
    }

    pub fn post<F: FnOnce() + Send + 'static>(&self, job: F) {
        if let Some(tx) = &self.tx {
            let _ = tx.send(Box::new(job));
        }
    }

    /// Drop the keep-alive sender and join all workers.  Queued jobs run to
    /// completion first.
    pub fn shutdown(&mut self) {
        self.tx = None;
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
    }
}

impl Drop for PreparePool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn runs_all_posted_jobs_before_shutdown() {
        let count = Arc::new(AtomicUsize::new(0));
        let mut pool = PreparePool::new(4);
        for _ in 0..100 {
            let count = count.clone();
            pool.post(move || {
                count.fetch_add(1, Ordering::SeqCst);
            });
        }
        pool.shutdown();
        assert_eq!(count.load(Ordering::SeqCst), 100);
    }

    #[test]
    fn sender_keeps_working_after_pool_borrow_ends() {
        let count = Arc::new(AtomicUsize::new(0));
        let mut pool = PreparePool::new(1);
        let tx = pool.sender();
        let c = count.clone();
        tx.send(Box::new(move || {
            c.fetch_add(1, Ordering::SeqCst);
        }))
        .unwrap();
        drop(tx);
        pool.shutdown();
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
