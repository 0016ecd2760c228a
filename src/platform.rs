//! Static platform topology and per-host power-state lifecycle.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::job::{HostId, ResourceId};
use crate::utils::prelude::*;

/// The kind of a power state: a steady computation point, the sleep point,
/// or one of the two transitional states a host passes through between them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PstateType {
    Computation,
    Sleep,
    SwitchingOn,
    SwitchingOff,
}

/// A single named operating point of a host.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PowerState {
    pub id: u32,
    pub kind: PstateType,
    pub watt_idle: f64,
    pub watt_full: f64,
}

/// A host's lifecycle position. Transitions are restricted to the directed
/// graph idle↔computing, idle→switching-off→sleeping→switching-on→idle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostState {
    Idle,
    Computing,
    SwitchingOff,
    Sleeping,
    SwitchingOn,
}

impl HostState {
    /// Ordering used for greedy allocation candidate selection (§9): prefer
    /// hosts that need no wake-up over ones that do.
    pub fn allocation_preference(&self) -> u8 {
        match self {
            HostState::Computing => 0,
            HostState::Idle => 1,
            HostState::SwitchingOn => 2,
            HostState::SwitchingOff => 3,
            HostState::Sleeping => 4,
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, HostState::Idle | HostState::Computing)
    }
}

/// A leaf compute element belonging to exactly one host. The controller
/// reasons about allocations at resource granularity.
#[derive(Debug, Clone)]
pub struct Resource {
    pub id: ResourceId,
    pub host_id: HostId,
}

/// A named group of resources sharing a power state.
#[derive(Debug, Clone)]
pub struct Host {
    pub id: HostId,
    pub name: String,
    pub resource_ids: Vec<ResourceId>,
    pstates: Vec<PowerState>,
    default_pstate: u32,
    current_pstate: u32,
    state: HostState,
    /// set of resources on this host currently running a job; a host
    /// returns toward idle only once this set is empty.
    running_resources: std::collections::HashSet<ResourceId>,
}

impl Host {
    pub fn new(id: HostId, name: impl Into<String>, resource_ids: Vec<ResourceId>, pstates: Vec<PowerState>) -> Self {
        let default_pstate = pstates
            .iter()
            .find(|p| p.kind == PstateType::Computation)
            .map(|p| p.id)
            .unwrap_or(0);
        Host {
            id,
            name: name.into(),
            resource_ids,
            pstates,
            default_pstate,
            current_pstate: default_pstate,
            state: HostState::Idle,
            running_resources: Default::default(),
        }
    }

    pub fn state(&self) -> HostState {
        self.state
    }

    pub fn pstate(&self) -> u32 {
        self.current_pstate
    }

    pub fn default_pstate(&self) -> u32 {
        self.default_pstate
    }

    pub fn pstate_kind(&self, pstate_id: u32) -> Option<PstateType> {
        self.pstates.iter().find(|p| p.id == pstate_id).map(|p| p.kind)
    }

    /// Ids of every pstate of the given kind this host offers, in
    /// declaration order. A host is expected to have exactly one
    /// sleep/switching-on/switching-off pstate but may have several
    /// computation pstates.
    pub fn pstate_ids_of_kind(&self, kind: PstateType) -> impl Iterator<Item = u32> + '_ {
        self.pstates.iter().filter(move |p| p.kind == kind).map(|p| p.id)
    }

    /// idle → switching-off, only permitted from idle.
    #[tracing::instrument(skip(self), fields(host = self.id))]
    pub fn sleep(&mut self) -> Result<()> {
        if self.state != HostState::Idle {
            return Err(Error::InvalidState {
                host_id: self.id,
                reason: format!("cannot sleep from {:?}", self.state),
            });
        }
        self.state = HostState::SwitchingOff;
        Ok(())
    }

    /// sleeping → switching-on, only permitted from sleeping.
    #[tracing::instrument(skip(self), fields(host = self.id))]
    pub fn wake_up(&mut self) -> Result<()> {
        if self.state != HostState::Sleeping {
            return Err(Error::InvalidState {
                host_id: self.id,
                reason: format!("cannot wake up from {:?}", self.state),
            });
        }
        self.state = HostState::SwitchingOn;
        Ok(())
    }

    /// Applies a simulator-confirmed pstate change, driving the lifecycle
    /// forward. Returns `true` if the host's `state` changed (as opposed to
    /// a computation-to-computation pstate swap).
    #[tracing::instrument(skip(self), fields(host = self.id))]
    pub fn set_pstate(&mut self, pstate_id: u32) -> Result<bool> {
        let kind = self
            .pstate_kind(pstate_id)
            .ok_or_else(|| Error::InvalidArgument(format!("host {} has no pstate {}", self.id, pstate_id)))?;

        let prior_state = self.state;
        let new_state = match (self.state, kind) {
            (HostState::Idle, PstateType::Computation) | (HostState::Computing, PstateType::Computation) => {
                self.current_pstate = pstate_id;
                return Ok(false);
            }
            (HostState::SwitchingOff, PstateType::Sleep) => HostState::Sleeping,
            (HostState::SwitchingOn, PstateType::Computation) => HostState::Idle,
            _ => {
                return Err(Error::InvalidState {
                    host_id: self.id,
                    reason: format!("cannot apply pstate {:?} from {:?}", kind, self.state),
                });
            }
        };

        self.current_pstate = pstate_id;
        self.state = new_state;
        Ok(prior_state != new_state)
    }

    /// Marks a resource as computing; the host transitions idle → computing
    /// the first time any resource starts.
    pub fn start_computing(&mut self, resource_id: ResourceId) {
        self.running_resources.insert(resource_id);
        self.state = HostState::Computing;
    }

    /// Releases a resource's hold on this host. Once no resource on this
    /// host is running, the host returns to idle.
    pub fn release(&mut self, resource_id: ResourceId) {
        self.running_resources.remove(&resource_id);
        if self.running_resources.is_empty() && self.state == HostState::Computing {
            self.state = HostState::Idle;
        }
    }
}

/// The immutable-after-`simulation_begins` topology: hosts and their
/// resources, indexed by id for O(1) lookup.
#[derive(Debug, Clone)]
pub struct Platform {
    hosts: HashMap<HostId, Host>,
    resources: HashMap<ResourceId, Resource>,
    /// resource ids in ascending order, computed once at construction.
    resource_ids_sorted: Vec<ResourceId>,
}

impl Platform {
    pub fn new(hosts: Vec<Host>) -> Self {
        let mut resources = HashMap::new();
        for host in &hosts {
            for &rid in &host.resource_ids {
                resources.insert(rid, Resource { id: rid, host_id: host.id });
            }
        }
        let mut resource_ids_sorted: Vec<ResourceId> = resources.keys().copied().collect();
        resource_ids_sorted.sort_unstable();

        Platform {
            hosts: hosts.into_iter().map(|h| (h.id, h)).collect(),
            resources,
            resource_ids_sorted,
        }
    }

    pub fn get_host(&self, id: HostId) -> Result<&Host> {
        self.hosts.get(&id).ok_or(Error::HostNotFound(id))
    }

    pub fn get_host_mut(&mut self, id: HostId) -> Result<&mut Host> {
        self.hosts.get_mut(&id).ok_or(Error::HostNotFound(id))
    }

    pub fn get_resource(&self, id: ResourceId) -> Result<&Resource> {
        self.resources
            .get(&id)
            .ok_or_else(|| Error::InvalidArgument(format!("no such resource: {}", id)))
    }

    pub fn get_resources(&self, ids: &[ResourceId]) -> Result<Vec<&Resource>> {
        ids.iter().map(|id| self.get_resource(*id)).collect()
    }

    pub fn nb_resources(&self) -> usize {
        self.resources.len()
    }

    pub fn resource_ids(&self) -> &[ResourceId] {
        &self.resource_ids_sorted
    }

    pub fn hosts(&self) -> impl Iterator<Item = &Host> {
        self.hosts.values()
    }

    /// The host owning a resource.
    pub fn host_of(&self, resource_id: ResourceId) -> Result<&Host> {
        let resource = self.get_resource(resource_id)?;
        self.get_host(resource.host_id)
    }
}
