//! Domain event bus: named event kinds with ordered subscriber dispatch.
//!
//! Deliberately a plain registry rather than a global pub/sub store — the
//! controller is an embeddable struct, not a process-wide singleton, so
//! subscribers are owned alongside the rest of its state and dispatch is a
//! direct method call, not a queued activity.

use std::fmt;

use crate::job::{HostId, JobId};

/// A domain event kind, dispatched to subscribers after the controller
/// commits the corresponding state change.
#[derive(Debug, Clone)]
pub enum DomainEvent {
    JobSubmitted { job_id: JobId },
    JobAllocated { job_id: JobId },
    JobStarted { job_id: JobId },
    JobCompleted { job_id: JobId },
    JobKilled { job_id: JobId },
    JobRejected { job_id: JobId },
    HostStateChanged { host_id: HostId },
    HostComputationPowerStateChanged { host_id: HostId },
    SimulationBegins,
    SimulationEnds,
}

/// The event kind, independent of its payload. Used as the subscription key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    JobSubmitted,
    JobAllocated,
    JobStarted,
    JobCompleted,
    JobKilled,
    JobRejected,
    HostStateChanged,
    HostComputationPowerStateChanged,
    SimulationBegins,
    SimulationEnds,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl DomainEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            DomainEvent::JobSubmitted { .. } => EventKind::JobSubmitted,
            DomainEvent::JobAllocated { .. } => EventKind::JobAllocated,
            DomainEvent::JobStarted { .. } => EventKind::JobStarted,
            DomainEvent::JobCompleted { .. } => EventKind::JobCompleted,
            DomainEvent::JobKilled { .. } => EventKind::JobKilled,
            DomainEvent::JobRejected { .. } => EventKind::JobRejected,
            DomainEvent::HostStateChanged { .. } => EventKind::HostStateChanged,
            DomainEvent::HostComputationPowerStateChanged { .. } => EventKind::HostComputationPowerStateChanged,
            DomainEvent::SimulationBegins => EventKind::SimulationBegins,
            DomainEvent::SimulationEnds => EventKind::SimulationEnds,
        }
    }
}

type Callback = Box<dyn FnMut(&DomainEvent) + Send>;

/// An ordered, per-kind subscriber registry. Dispatch is synchronous and
/// serialized: a handler runs to completion before the next one is invoked.
#[derive(Default)]
pub struct EventBus {
    subscribers: std::collections::HashMap<EventKind, Vec<Callback>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `callback` for `kind`. Multiple subscribers per kind are
    /// permitted and fire in registration order.
    pub fn subscribe(&mut self, kind: EventKind, callback: impl FnMut(&DomainEvent) + Send + 'static) {
        self.subscribers.entry(kind).or_default().push(Box::new(callback));
    }

    /// Dispatches `event` to every subscriber registered for its kind, in
    /// registration order.
    #[tracing::instrument(skip(self, event), fields(kind = %event.kind()))]
    pub fn dispatch(&mut self, event: DomainEvent) {
        if let Some(callbacks) = self.subscribers.get_mut(&event.kind()) {
            for callback in callbacks {
                callback(&event);
            }
        }
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("kinds_subscribed", &self.subscribers.keys().collect::<Vec<_>>())
            .finish()
    }
}
