use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use crate::Error;

/// Fixed-size worker pool that claims tasks first-unclaimed, the same
/// scheduling the original build engine used for compiling many translation
/// units at once.
///
/// A task returns `true` to request that every other worker stop after
/// finishing its current task; this is how a single compile failure aborts
/// the rest of the batch without anyone needing to be interrupted mid-task.
pub struct Pool {
    worker_count: usize,
}

impl Pool {
    pub fn new(worker_count: usize) -> Self {
        Self {
            worker_count: worker_count.max(1),
        }
    }

    pub fn run<'a>(&self, tasks: Vec<Box<dyn FnOnce() -> bool + Send + 'a>>) -> Result<(), Error> {
        let queue: Mutex<Vec<Option<Box<dyn FnOnce() -> bool + Send + 'a>>>> =
            Mutex::new(tasks.into_iter().map(Some).collect());
        let aborted = AtomicBool::new(false);

        std::thread::scope(|scope| {
            for _ in 0..self.worker_count {
                scope.spawn(|| loop {
                    if aborted.load(Ordering::Relaxed) {
                        break;
                    }

                    let task = {
                        let mut guard = queue.lock().unwrap();
                        guard.iter_mut().find(|slot| slot.is_some()).and_then(Option::take)
                    };

                    match task {
                        Some(task) => {
                            if task() {
                                aborted.store(true, Ordering::Relaxed);
                            }
                        }
                        None => break,
                    }
                });
            }
        });

        if aborted.load(Ordering::Relaxed) {
            Err(Error::Aborted)
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn runs_all_tasks() {
        let counter = AtomicUsize::new(0);
        let pool = Pool::new(4);

        let tasks: Vec<Box<dyn FnOnce() -> bool + Send>> = (0..20)
            .map(|_| -> Box<dyn FnOnce() -> bool + Send> {
                Box::new(|| {
                    counter.fetch_add(1, Ordering::SeqCst);
                    false
                })
            })
            .collect();

        pool.run(tasks).unwrap();
        assert_eq!(counter.load(Ordering::SeqCst), 20);
    }

    #[test]
    fn abort_stops_pool_error() {
        let pool = Pool::new(2);
        let tasks: Vec<Box<dyn FnOnce() -> bool + Send>> = vec![
            Box::new(|| true),
            Box::new(|| false),
            Box::new(|| false),
        ];

        assert!(pool.run(tasks).is_err());
    }
}
