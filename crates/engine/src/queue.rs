use std::any::Any;
use std::sync::Arc;

use crate::Error;

/// Shared logic for a build step, invoked once with every piece of data
/// queued under the same `unique` key. A `Cc` host class, for instance,
/// enqueues one action per translation unit and shares a single action that
/// dispatches them all through a worker pool.
pub type StepAction = dyn Fn(&[Box<dyn Any + Send>]) -> Result<(), Error> + Send + Sync;

struct Step {
    unique: u64,
    name: String,
    action: Arc<StepAction>,
    data: Vec<Box<dyn Any + Send>>,
}

/// Deferred-execution queue of build steps. Consecutive `enqueue` calls with
/// the same `unique` key merge their data into one step instead of creating
/// a new one, so the action sees its full batch at once.
#[derive(Default)]
pub struct BuildStepQueue {
    steps: Vec<Step>,
}

impl BuildStepQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueue(
        &mut self,
        unique: u64,
        name: impl Into<String>,
        action: Arc<StepAction>,
        data: Box<dyn Any + Send>,
    ) -> Result<(), Error> {
        let name = name.into();

        if let Some(last) = self.steps.last_mut() {
            if last.unique == unique {
                if last.name != name {
                    return Err(Error::StepMismatch(last.name.clone(), name));
                }
                last.data.push(data);
                return Ok(());
            }
        }

        self.steps.push(Step {
            unique,
            name,
            action,
            data: vec![data],
        });
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Runs every step in enqueue order, stopping at the first failure.
    pub fn run(&self) -> Result<(), Error> {
        for step in &self.steps {
            log::debug!("running build step '{}' ({} item(s))", step.name, step.data.len());
            (step.action)(&step.data)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn consecutive_same_key_merges() {
        let mut queue = BuildStepQueue::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = calls.clone();

        let action: Arc<StepAction> = Arc::new(move |data| {
            calls_clone.fetch_add(1, Ordering::SeqCst);
            assert_eq!(data.len(), 2);
            Ok(())
        });

        queue.enqueue(1, "compile", action.clone(), Box::new(1i32)).unwrap();
        queue.enqueue(1, "compile", action, Box::new(2i32)).unwrap();

        assert_eq!(queue.len(), 1);
        queue.run().unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn different_key_creates_new_step() {
        let mut queue = BuildStepQueue::new();
        let action: Arc<StepAction> = Arc::new(|_| Ok(()));

        queue.enqueue(1, "compile", action.clone(), Box::new(1i32)).unwrap();
        queue.enqueue(2, "compile", action, Box::new(2i32)).unwrap();

        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn aborts_on_first_failing_step() {
        let mut queue = BuildStepQueue::new();
        let ok: Arc<StepAction> = Arc::new(|_| Ok(()));
        let fail: Arc<StepAction> = Arc::new(|_| Err(Error::Aborted));

        queue.enqueue(1, "a", ok, Box::new(())).unwrap();
        queue.enqueue(2, "b", fail, Box::new(())).unwrap();

        assert!(queue.run().is_err());
    }
}
