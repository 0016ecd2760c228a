//! Per-resource reservation view: what schedulers query for availability,
//! remaining reserved time, and progress.

use std::collections::BTreeMap;

use crate::job::{Duration, Job, JobId, ResourceId, Time};
use crate::platform::Platform;
use crate::utils::prelude::*;
use crate::utils::{BoxIterator, IntoBoxIter};

/// A resource's reservation snapshot at a point in time, as reported to
/// callers of `Agenda::progress`/`Agenda::reserved_time`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reservation {
    pub resource_id: ResourceId,
    pub value: f64,
}

#[derive(Debug, Clone)]
enum Slot {
    Free,
    Reserved(JobId),
}

/// Maps every resource id (sorted) to either a free slot or the job
/// currently occupying/reserving it. Exactly one job per resource at a time.
#[derive(Debug, Clone)]
pub struct Agenda {
    slots: BTreeMap<ResourceId, Slot>,
}

impl Agenda {
    pub fn new(platform: &Platform) -> Self {
        let slots = platform.resource_ids().iter().map(|&id| (id, Slot::Free)).collect();
        Agenda { slots }
    }

    /// Reserves every resource in `job.allocation` for `job`. Fails with
    /// `AlreadyReserved` if any of them is currently occupied, leaving the
    /// agenda untouched.
    pub fn reserve(&mut self, job: &Job) -> Result<()> {
        let allocation = job
            .allocation
            .as_ref()
            .ok_or_else(|| Error::InvalidArgument(format!("job {} has no allocation to reserve", job.id)))?;
        self.reserve_ids(&job.id, allocation)
    }

    /// Reserves `resource_ids` for `job_id` without requiring a `Job` whose
    /// `allocation` is already bound — callers that must validate a
    /// prospective allocation before committing it to the job (e.g.
    /// `Controller::allocate`) reserve through this first and only mutate
    /// the job once reservation actually succeeds. Fails with
    /// `AlreadyReserved` if any resource is currently occupied, or
    /// `InvalidArgument` for an unknown resource id; leaves the agenda
    /// untouched either way.
    pub fn reserve_ids(&mut self, job_id: &str, resource_ids: &[ResourceId]) -> Result<()> {
        for &rid in resource_ids {
            match self.slots.get(&rid) {
                Some(Slot::Free) => {}
                Some(Slot::Reserved(_)) => return Err(Error::AlreadyReserved(rid)),
                None => return Err(Error::InvalidArgument(format!("no such resource: {}", rid))),
            }
        }

        for &rid in resource_ids {
            self.slots.insert(rid, Slot::Reserved(job_id.to_string()));
        }
        Ok(())
    }

    /// Clears the reservation on each listed resource, regardless of which
    /// job held it.
    pub fn release(&mut self, resource_ids: &[ResourceId]) {
        for &rid in resource_ids {
            if let Some(slot) = self.slots.get_mut(&rid) {
                *slot = Slot::Free;
            }
        }
    }

    /// Free resources, in ascending id order.
    pub fn available_resources(&self) -> BoxIterator<'_, ResourceId> {
        self.slots
            .iter()
            .filter(|(_, slot)| matches!(slot, Slot::Free))
            .map(|(&id, _)| id)
            .into_boxed()
    }

    /// A host (given its resource ids) is available iff every one of its
    /// resources is free.
    pub fn available_nodes<'a>(&self, hosts: impl Iterator<Item = (crate::job::HostId, &'a [ResourceId])>) -> Vec<crate::job::HostId> {
        hosts
            .filter(|(_, resource_ids)| resource_ids.iter().all(|rid| matches!(self.slots.get(rid), Some(Slot::Free))))
            .map(|(host_id, _)| host_id)
            .collect()
    }

    /// `0` for free resources; for a reserved-and-running job with finite
    /// walltime, `1 − (now − start_time) / walltime` clamped at 0; `1` for
    /// reserved-but-not-running jobs (including infinite walltime, which
    /// never advances).
    pub fn progress(&self, now: Time, lookup: impl Fn(&JobId) -> Option<(Option<Time>, Duration)>) -> Vec<Reservation> {
        self.slots
            .iter()
            .map(|(&resource_id, slot)| {
                let value = match slot {
                    Slot::Free => 0.0,
                    Slot::Reserved(job_id) => match lookup(job_id) {
                        Some((Some(start_time), walltime)) if walltime.is_finite() => {
                            (1.0 - (*now - *start_time) / *walltime).max(0.0)
                        }
                        _ => 1.0,
                    },
                };
                Reservation { resource_id, value }
            })
            .collect()
    }

    /// `0` for free resources; `end_time − now` for a running job (infinite
    /// if its walltime is infinite); `walltime` for a reserved-but-not-yet-
    /// running job.
    pub fn reserved_time(&self, now: Time, lookup: impl Fn(&JobId) -> Option<(Option<Time>, Duration)>) -> Vec<Reservation> {
        self.slots
            .iter()
            .map(|(&resource_id, slot)| {
                let value = match slot {
                    Slot::Free => 0.0,
                    Slot::Reserved(job_id) => match lookup(job_id) {
                        Some((Some(start_time), walltime)) => {
                            if walltime.is_finite() {
                                *(start_time + walltime) - *now
                            } else {
                                f64::INFINITY
                            }
                        }
                        Some((None, walltime)) => *walltime,
                        None => 0.0,
                    },
                };
                Reservation { resource_id, value }
            })
            .collect()
    }
}
