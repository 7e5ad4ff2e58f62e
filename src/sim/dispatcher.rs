/// Publish/subscribe hub between the world and whatever presents it.
///
/// Listeners register globally or for one `GameEventKind` and are removed
/// by the `ListenerId` handed back at registration. `dispatch` snapshots
/// the matching listeners under the lock, releases it, then delivers:
///
///   **Sync** : inline on the caller's thread, registration order.
///   **Async**: queued to a single background worker; events are
///               delivered in the order `dispatch` was called.
///
/// A listener that returns `Err` or panics is logged and skipped. The
/// remaining listeners still see the event and the publisher never
/// learns about the failure.

use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, Sender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};

use log::{error, warn};
use serde::Deserialize;

use super::event::{GameEvent, GameEventKind};

type Listener = Arc<dyn Fn(&GameEvent) -> anyhow::Result<()> + Send + Sync>;

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct ListenerId(u64);

#[derive(Clone, Copy, PartialEq, Eq, Debug, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryMode {
    #[default]
    Sync,
    Async,
}

#[derive(Default)]
struct Registry {
    next_id: u64,
    global: Vec<(ListenerId, Listener)>,
    by_kind: HashMap<GameEventKind, Vec<(ListenerId, Listener)>>,
}

impl Registry {
    fn allocate(&mut self) -> ListenerId {
        self.next_id += 1;
        ListenerId(self.next_id)
    }

    fn snapshot(&self, kind: GameEventKind) -> Vec<Listener> {
        let typed = self.by_kind.get(&kind).into_iter().flatten();
        self.global
            .iter()
            .chain(typed)
            .map(|(_, l)| Arc::clone(l))
            .collect()
    }

    fn len(&self) -> usize {
        self.global.len() + self.by_kind.values().map(Vec::len).sum::<usize>()
    }
}

enum Job {
    Deliver(Vec<Listener>, Arc<GameEvent>),
    Flush(Sender<()>),
}

struct Worker {
    queue: Option<Sender<Job>>,
    handle: Option<JoinHandle<()>>,
}

struct Inner {
    registry: Mutex<Registry>,
    worker: Option<Worker>,
}

impl Drop for Inner {
    fn drop(&mut self) {
        let Some(worker) = self.worker.as_mut() else { return };
        // Closing the channel ends the worker loop once the queue drains.
        worker.queue.take();
        if let Some(handle) = worker.handle.take() {
            if handle.thread().id() != thread::current().id() {
                let _ = handle.join();
            }
        }
    }
}

/// Cloning yields another handle to the same listener set and worker.
#[derive(Clone)]
pub struct EventDispatcher {
    inner: Arc<Inner>,
}

impl Default for EventDispatcher {
    fn default() -> Self {
        EventDispatcher::new(DeliveryMode::Sync)
    }
}

impl std::fmt::Debug for EventDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventDispatcher")
            .field("mode", &self.mode())
            .field("listeners", &self.listener_count())
            .finish()
    }
}

impl EventDispatcher {
    pub fn new(mode: DeliveryMode) -> Self {
        let worker = match mode {
            DeliveryMode::Sync => None,
            DeliveryMode::Async => spawn_worker(),
        };
        EventDispatcher {
            inner: Arc::new(Inner { registry: Mutex::new(Registry::default()), worker }),
        }
    }

    /// Mode actually in effect. An async request degrades to sync if the
    /// worker thread could not be started.
    pub fn mode(&self) -> DeliveryMode {
        if self.inner.worker.is_some() {
            DeliveryMode::Async
        } else {
            DeliveryMode::Sync
        }
    }

    fn registry(&self) -> MutexGuard<'_, Registry> {
        self.inner.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Receive every event.
    pub fn subscribe_all<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&GameEvent) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let mut reg = self.registry();
        let id = reg.allocate();
        reg.global.push((id, Arc::new(listener)));
        id
    }

    /// Receive events of one kind only.
    pub fn subscribe<F>(&self, kind: GameEventKind, listener: F) -> ListenerId
    where
        F: Fn(&GameEvent) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let mut reg = self.registry();
        let id = reg.allocate();
        reg.by_kind.entry(kind).or_default().push((id, Arc::new(listener)));
        id
    }

    /// Returns false if the handle was unknown or already removed.
    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        let mut reg = self.registry();
        if let Some(i) = reg.global.iter().position(|(lid, _)| *lid == id) {
            reg.global.remove(i);
            return true;
        }
        for list in reg.by_kind.values_mut() {
            if let Some(i) = list.iter().position(|(lid, _)| *lid == id) {
                list.remove(i);
                return true;
            }
        }
        false
    }

    pub fn listener_count(&self) -> usize {
        self.registry().len()
    }

    pub fn dispatch(&self, event: GameEvent) {
        let listeners = self.registry().snapshot(event.kind());
        if listeners.is_empty() {
            return;
        }

        let job = Job::Deliver(listeners, Arc::new(event));
        let job = match self.inner.worker.as_ref().and_then(|w| w.queue.as_ref()) {
            Some(queue) => match queue.send(job) {
                Ok(()) => return,
                // Worker gone; deliver here rather than drop the event.
                Err(mpsc::SendError(job)) => job,
            },
            None => job,
        };
        run(job);
    }

    /// Block until every event dispatched so far has been delivered.
    /// Returns immediately in sync mode.
    pub fn flush(&self) {
        let Some(queue) = self.inner.worker.as_ref().and_then(|w| w.queue.as_ref()) else {
            return;
        };
        let (tx, rx) = mpsc::channel();
        if queue.send(Job::Flush(tx)).is_ok() {
            let _ = rx.recv();
        }
    }
}

fn spawn_worker() -> Option<Worker> {
    let (tx, rx) = mpsc::channel::<Job>();
    let spawned = thread::Builder::new()
        .name("event-dispatch".into())
        .spawn(move || {
            for job in rx {
                run(job);
            }
        });
    match spawned {
        Ok(handle) => Some(Worker { queue: Some(tx), handle: Some(handle) }),
        Err(e) => {
            warn!("could not start event worker ({e}); delivering synchronously");
            None
        }
    }
}

fn run(job: Job) {
    match job {
        Job::Deliver(listeners, event) => {
            for listener in listeners {
                deliver(&listener, &event);
            }
        }
        Job::Flush(done) => {
            let _ = done.send(());
        }
    }
}

fn deliver(listener: &Listener, event: &GameEvent) {
    match panic::catch_unwind(AssertUnwindSafe(|| listener(event))) {
        Ok(Ok(())) => {}
        Ok(Err(e)) => error!("listener failed on {:?}: {e:#}", event.kind()),
        Err(_) => error!("listener panicked on {:?}", event.kind()),
    }
}
