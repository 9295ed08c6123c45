use fxhash::FxHashMap;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

type Task = Box<dyn FnOnce()>;

/// Upper bound on tasks run by one `run_until_idle` call, so a task that
/// keeps re-posting itself cannot hang the host.
const MAX_IDLE_TASKS: usize = 10_000;

/// Main-thread task queue. Handles are cheap clones of the same queue.
#[derive(Clone, Default)]
pub struct MainLooper {
    queue: Rc<RefCell<VecDeque<Task>>>,
}

impl MainLooper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn post(&self, task: impl FnOnce() + 'static) {
        self.queue.borrow_mut().push_back(Box::new(task));
    }

    pub fn pending(&self) -> usize {
        self.queue.borrow().len()
    }

    /// Runs the tasks that were queued when the call began. Tasks they post
    /// wait for the next call.
    pub fn run_pending(&self) -> usize {
        let count = self.pending();
        for ran in 0..count {
            let task = self.queue.borrow_mut().pop_front();
            match task {
                Some(task) => task(),
                None => return ran,
            }
        }
        count
    }

    /// Runs tasks until the queue is empty.
    pub fn run_until_idle(&self) -> usize {
        let mut ran = 0;
        while ran < MAX_IDLE_TASKS {
            let task = self.queue.borrow_mut().pop_front();
            let Some(task) = task else { break };
            task();
            ran += 1;
        }
        if ran == MAX_IDLE_TASKS {
            log::warn!("looper still busy after {} tasks", ran);
        }
        ran
    }
}

/// The screen that hosts map fragments: a looper plus named containers.
#[derive(Default)]
pub struct MapHost {
    looper: MainLooper,
    containers: RefCell<FxHashMap<String, u64>>,
}

impl MapHost {
    pub fn new(looper: MainLooper) -> Self {
        Self {
            looper,
            containers: RefCell::default(),
        }
    }

    pub fn looper(&self) -> &MainLooper {
        &self.looper
    }

    /// Puts fragment `instance_id` into `container_id`, returning the
    /// fragment it displaced.
    pub fn attach(&self, container_id: &str, instance_id: u64) -> Option<u64> {
        let previous = self
            .containers
            .borrow_mut()
            .insert(container_id.to_string(), instance_id);
        log::debug!("fragment {} attached to {}", instance_id, container_id);
        previous
    }

    pub fn detach(&self, container_id: &str) -> Option<u64> {
        self.containers.borrow_mut().remove(container_id)
    }

    pub fn attached_to(&self, container_id: &str) -> Option<u64> {
        self.containers.borrow().get(container_id).copied()
    }

    /// Whether fragment `instance_id` is in any container.
    pub fn is_attached(&self, instance_id: u64) -> bool {
        self.containers.borrow().values().any(|id| *id == instance_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn test_run_pending_defers_new_tasks() {
        let looper = MainLooper::new();
        let hits = Rc::new(Cell::new(0));

        let inner_looper = looper.clone();
        let inner_hits = hits.clone();
        looper.post(move || {
            inner_hits.set(inner_hits.get() + 1);
            let again = inner_hits.clone();
            inner_looper.post(move || again.set(again.get() + 10));
        });

        assert_eq!(looper.run_pending(), 1);
        assert_eq!(hits.get(), 1);
        assert_eq!(looper.pending(), 1);
        assert_eq!(looper.run_until_idle(), 1);
        assert_eq!(hits.get(), 11);
    }

    #[test]
    fn test_containers() {
        let host = MapHost::default();
        assert_eq!(host.attach("map", 4), None);
        assert_eq!(host.attach("map", 5), Some(4));
        assert!(host.is_attached(5));
        assert!(!host.is_attached(4));
        assert_eq!(host.detach("map"), Some(5));
        assert_eq!(host.attached_to("map"), None);
    }
}
