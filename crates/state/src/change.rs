use std::sync::{Arc, Mutex};

/// Phase of a state change.  Every `Pending` is eventually matched by either
/// a `Done` or a `Cancelled`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChangeType {
    Pending,
    Done,
    Cancelled,
}

type Subscriber<A> = Arc<dyn Fn(&A) + Send + Sync>;

/// Ordered broadcast of events to subscribers.
///
/// Subscribers registered with [`Signal::connect_front`] observe events before
/// normal subscribers; the Butler relies on this to adjust its suspension
/// count before any consumer-facing handler runs.
pub struct Signal<A> {
    front: Mutex<Vec<Subscriber<A>>>,
    back: Mutex<Vec<Subscriber<A>>>,
}

impl<A> Default for Signal<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A> Signal<A> {
    pub fn new() -> Self {
        Self {
            front: Mutex::new(Vec::new()),
            back: Mutex::new(Vec::new()),
        }
    }

    pub fn connect<F>(&self, f: F)
    where
        F: Fn(&A) + Send + Sync + 'static,
    {
        self.back.lock().unwrap().push(Arc::new(f));
    }

    pub fn connect_front<F>(&self, f: F)
    where
        F: Fn(&A) + Send + Sync + 'static,
    {
        self.front.lock().unwrap().push(Arc::new(f));
    }

    pub fn emit(&self, a: &A) {
        // Subscribers are invoked outside the lock so they may connect
        // further subscribers or emit other signals.
        let subs: Vec<Subscriber<A>> = {
            let front = self.front.lock().unwrap();
            let back = self.back.lock().unwrap();
            front.iter().chain(back.iter()).cloned().collect()
        };
        for s in subs {
            s(a);
        }
    }
}

/// Emits `Pending` on construction and `Done` on [`ChangeGuard::done`];
/// dropping the guard without completing it emits `Cancelled`.
pub struct ChangeGuard<F: Fn(ChangeType)> {
    emit: F,
    completed: bool,
}

impl<F: Fn(ChangeType)> ChangeGuard<F> {
    pub fn new(emit: F) -> Self {
        emit(ChangeType::Pending);
        Self {
            emit,
            completed: false,
        }
    }

    pub fn done(mut self) {
        self.completed = true;
        (self.emit)(ChangeType::Done);
    }
}

impl<F: Fn(ChangeType)> Drop for ChangeGuard<F> {
    fn drop(&mut self) {
        if !self.completed {
            (self.emit)(ChangeType::Cancelled);
        }
    }
}
