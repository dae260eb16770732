// crates/vidcast-media/src/registry.rs
//
// Operator-facing set of push sessions keyed by id.
//
// Lock order: the map lock is only held long enough to clone a slot's Arc.
// Starting, stopping and joining happen under the slot's own lock, never the
// map's, so a slow join on one session does not stall the others.
//
// Events (progress and final outcome) go out on a bounded channel with
// `try_send`; a consumer that falls behind loses events rather than slowing
// a push worker down.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use crossbeam_channel::{bounded, Receiver, Sender};
use parking_lot::Mutex;
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

use vidcast_core::{ProgressSink, PushOutcome, StreamTarget};

use crate::push::{self, RemuxPushSession, SessionState};

pub const EVENT_CAPACITY: usize = 512;

/// Session body. `push::run` outside of tests.
pub type Runner = Arc<dyn Fn(&StreamTarget, &AtomicBool) -> PushOutcome + Send + Sync>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("no session with id {0}")]
    UnknownSession(Uuid),
    #[error("could not spawn push worker: {0}")]
    Spawn(String),
}

#[derive(Clone, Debug, PartialEq)]
pub enum SessionEvent {
    Progress { id: Uuid, fraction: f64 },
    Finished { id: Uuid, outcome: PushOutcome },
}

struct Slot {
    target:  StreamTarget,
    session: RemuxPushSession,
}

#[derive(Default)]
struct Slots {
    by_id: HashMap<Uuid, Arc<Mutex<Slot>>>,
    order: Vec<Uuid>,
}

pub struct SessionRegistry {
    slots:  Mutex<Slots>,
    runner: Runner,
    tx:     Sender<SessionEvent>,
    pub rx: Receiver<SessionEvent>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::with_runner(Arc::new(push::run))
    }

    pub fn with_runner(runner: Runner) -> Self {
        let (tx, rx) = bounded(EVENT_CAPACITY);
        Self { slots: Mutex::new(Slots::default()), runner, tx, rx }
    }

    /// Register a session without starting it.
    pub fn add(&self, target: StreamTarget) -> Uuid {
        let id = Uuid::new_v4();
        let slot = Slot { target, session: RemuxPushSession::new() };
        let mut slots = self.slots.lock();
        slots.by_id.insert(id, Arc::new(Mutex::new(slot)));
        slots.order.push(id);
        id
    }

    /// Register and start in one step.
    pub fn spawn(&self, target: StreamTarget) -> Result<Uuid, RegistryError> {
        let id = self.add(target);
        self.restart(id)?;
        Ok(id)
    }

    /// (Re)start session `id` with a new target. A running worker is stopped first.
    pub fn start(&self, id: Uuid, target: StreamTarget) -> Result<(), RegistryError> {
        let slot = self.slot(id)?;
        let mut slot = slot.lock();
        slot.target = target;
        self.launch(id, &mut slot)
    }

    /// (Re)start session `id` with the target it already has.
    pub fn restart(&self, id: Uuid) -> Result<(), RegistryError> {
        let slot = self.slot(id)?;
        let mut slot = slot.lock();
        self.launch(id, &mut slot)
    }

    pub fn stop(&self, id: Uuid) -> Result<Option<PushOutcome>, RegistryError> {
        let slot = self.slot(id)?;
        let outcome = slot.lock().session.stop();
        Ok(outcome)
    }

    /// Stop and forget session `id`.
    pub fn remove(&self, id: Uuid) -> Result<Option<PushOutcome>, RegistryError> {
        let slot = {
            let mut slots = self.slots.lock();
            let slot = slots.by_id.remove(&id).ok_or(RegistryError::UnknownSession(id))?;
            slots.order.retain(|x| *x != id);
            slot
        };
        let outcome = slot.lock().session.stop();
        debug!(%id, "session removed");
        Ok(outcome)
    }

    /// Stop every session, in the order they were added.
    pub fn stop_all(&self) -> Vec<(Uuid, Option<PushOutcome>)> {
        let slots: Vec<_> = {
            let slots = self.slots.lock();
            slots.order.iter().map(|id| (*id, Arc::clone(&slots.by_id[id]))).collect()
        };
        slots
            .into_iter()
            .map(|(id, slot)| (id, slot.lock().session.stop()))
            .collect()
    }

    pub fn state(&self, id: Uuid) -> Result<SessionState, RegistryError> {
        Ok(self.slot(id)?.lock().session.state())
    }

    pub fn target(&self, id: Uuid) -> Result<StreamTarget, RegistryError> {
        Ok(self.slot(id)?.lock().target.clone())
    }

    /// Ids in insertion order.
    pub fn ids(&self) -> Vec<Uuid> {
        self.slots.lock().order.clone()
    }

    pub fn len(&self) -> usize {
        self.slots.lock().order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn slot(&self, id: Uuid) -> Result<Arc<Mutex<Slot>>, RegistryError> {
        self.slots
            .lock()
            .by_id
            .get(&id)
            .cloned()
            .ok_or(RegistryError::UnknownSession(id))
    }

    fn launch(&self, id: Uuid, slot: &mut Slot) -> Result<(), RegistryError> {
        let mut target = slot.target.clone();
        let user = target.progress.take();
        let tx = self.tx.clone();
        let progress: ProgressSink = Arc::new(move |fraction| {
            if let Some(user) = &user {
                user(fraction);
            }
            let _ = tx.try_send(SessionEvent::Progress { id, fraction });
        });
        target.progress = Some(progress);

        let runner = Arc::clone(&self.runner);
        let tx = self.tx.clone();
        info!(%id, url = %target.sink_url, "starting session");
        slot.session
            .start_with(move |stop| {
                let outcome = runner(&target, stop);
                let _ = tx.try_send(SessionEvent::Finished { id, outcome: outcome.clone() });
                outcome
            })
            .map_err(|e| RegistryError::Spawn(e.to_string()))
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for SessionRegistry {
    fn drop(&mut self) {
        self.stop_all();
    }
}
