//! The RJMS controller: the event-loop driver that owns the job cohorts,
//! drives host power transitions, and exposes the policy surface schedulers
//! call into.

use std::collections::{HashMap, HashSet};

use crate::adapter::{JobOutcome, NotifyKind, PlatformDescription, SimEvent, SimulatorAdapter};
use crate::agenda::Agenda;
use crate::event::{DomainEvent, EventBus, EventKind};
use crate::job::{Duration, FinalState, HostId, Job, JobId, ResourceId, Time};
use crate::platform::{Host, Platform, PstateType};
use crate::utils::app_config::Verbosity;
use crate::utils::prelude::*;

/// A wake-up scheduled via `set_callback`, fired once a `REQUESTED_CALL`
/// event arrives at or after its time.
struct ScheduledCallback {
    at: Time,
    callback: Box<dyn FnMut(&mut Controller) + Send>,
}

/// Owns the four job cohorts, the platform topology, the agenda, and the
/// event subscriber registry. Single-threaded: every suspension happens
/// inside an adapter call, never inside a policy-facing method.
pub struct Controller {
    adapter: Box<dyn SimulatorAdapter + Send>,
    events: EventBus,
    platform: Option<Platform>,
    agenda: Option<Agenda>,
    jobs: HashMap<JobId, Job>,
    queue: Vec<JobId>,
    ready: Vec<JobId>,
    running: Vec<JobId>,
    completed: Vec<JobId>,
    rejected: Vec<JobId>,
    is_running: bool,
    current_time: Time,
    submitter_ended: bool,
    simulation_time: Option<f64>,
    callbacks: Vec<ScheduledCallback>,
}

impl Controller {
    pub fn new(adapter: Box<dyn SimulatorAdapter + Send>) -> Self {
        Controller {
            adapter,
            events: EventBus::new(),
            platform: None,
            agenda: None,
            jobs: HashMap::new(),
            queue: Vec::new(),
            ready: Vec::new(),
            running: Vec::new(),
            completed: Vec::new(),
            rejected: Vec::new(),
            is_running: false,
            current_time: Time(0.0),
            submitter_ended: false,
            simulation_time: None,
            callbacks: Vec::new(),
        }
    }

    pub fn is_running(&self) -> bool {
        self.is_running
    }

    pub fn current_time(&self) -> Time {
        self.current_time
    }

    pub fn queue(&self) -> &[JobId] {
        &self.queue
    }

    pub fn ready_jobs(&self) -> &[JobId] {
        &self.ready
    }

    pub fn running_jobs(&self) -> &[JobId] {
        &self.running
    }

    pub fn completed_jobs(&self) -> &[JobId] {
        &self.completed
    }

    pub fn job(&self, id: &str) -> Option<&Job> {
        self.jobs.get(id)
    }

    pub fn platform(&self) -> Option<&Platform> {
        self.platform.as_ref()
    }

    pub fn agenda(&self) -> Option<&Agenda> {
        self.agenda.as_ref()
    }

    pub fn subscribe(&mut self, kind: EventKind, callback: impl FnMut(&DomainEvent) + Send + 'static) {
        self.events.subscribe(kind, callback);
    }

    // ---- policy surface -------------------------------------------------

    #[tracing::instrument(skip(self))]
    pub fn start(
        &mut self,
        platform_spec: &str,
        output: Option<&str>,
        simulation_time: Option<f64>,
        qos: Option<f64>,
        verbosity: Option<&str>,
    ) -> Result<()> {
        if self.is_running {
            return Err(Error::AlreadyRunning);
        }
        if let Some(t) = simulation_time {
            if t <= 0.0 {
                return Err(Error::InvalidArgument("simulation_time must be > 0".into()));
            }
        }
        if let Some(v) = verbosity {
            if Verbosity::parse(v).is_none() {
                return Err(Error::InvalidArgument(format!("unrecognized verbosity: {}", v)));
            }
        }

        self.jobs.clear();
        self.queue.clear();
        self.ready.clear();
        self.running.clear();
        self.completed.clear();
        self.rejected.clear();
        self.callbacks.clear();
        self.submitter_ended = false;
        self.simulation_time = simulation_time;

        let batch = self.adapter.start(platform_spec, output, qos)?;
        self.is_running = true;
        self.process_batch(batch);
        Ok(())
    }

    /// Always stops the controller; emits `finish()` if a simulation was in
    /// progress. Idempotent: calling this when not running is a no-op.
    #[tracing::instrument(skip(self))]
    pub fn close(&mut self) -> Result<()> {
        if self.is_running {
            self.adapter.finish()?;
        }
        self.is_running = false;
        self.submitter_ended = true;
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    pub fn proceed_time(&mut self, until: Option<f64>) -> Result<()> {
        if !self.is_running {
            return Err(Error::NotRunning);
        }
        if let Some(until) = until {
            if until < 0.0 || until <= *self.current_time {
                return Err(Error::InvalidArgument("until must be > current_time".into()));
            }
            self.adapter.call_me_later(Time(until + f64::EPSILON))?;
            while self.is_running && *self.current_time < until {
                let batch = self.adapter.proceed_simulation()?;
                self.process_batch(batch);
            }
        } else {
            let batch = self.adapter.proceed_simulation()?;
            self.process_batch(batch);
        }

        if self.submitter_ended && self.queue.is_empty() && self.ready.is_empty() && self.running.is_empty() {
            self.drain_to_end();
        }
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    pub fn allocate(&mut self, job_id: &str, resource_ids: Option<Vec<ResourceId>>) -> Result<()> {
        if !self.is_running {
            return Err(Error::NotRunning);
        }
        if !self.queue.iter().any(|id| id == job_id) {
            return Err(Error::JobNotFound(job_id.to_string()));
        }
        let platform = self.platform.as_ref().ok_or(Error::NotRunning)?;
        let agenda = self.agenda.as_ref().ok_or(Error::NotRunning)?;

        let job_res = self.jobs.get(job_id).ok_or_else(|| Error::JobNotFound(job_id.to_string()))?.res;

        let chosen = match resource_ids {
            Some(ids) => {
                if ids.len() != job_res {
                    return Err(Error::InsufficientResources { job_id: job_id.to_string(), requested: job_res, got: ids.len() });
                }
                ids
            }
            None => {
                let mut candidates: Vec<ResourceId> = agenda.available_resources().collect();
                candidates.sort_by_key(|&rid| {
                    let state_pref = platform.host_of(rid).map(|h| h.state().allocation_preference()).unwrap_or(u8::MAX);
                    (state_pref, rid)
                });
                if candidates.len() < job_res {
                    return Err(Error::InsufficientResources { job_id: job_id.to_string(), requested: job_res, got: candidates.len() });
                }
                candidates.into_iter().take(job_res).collect()
            }
        };

        // Reserve against the agenda before touching the job: a failed
        // reservation (AlreadyReserved, bad resource id) must leave both
        // the job and the queue untouched.
        match self.agenda.as_mut() {
            Some(agenda) => agenda.reserve_ids(job_id, &chosen)?,
            None => return Err(Error::NotRunning),
        }

        match self.jobs.get_mut(job_id) {
            Some(job) => job.set_allocation(chosen),
            None => return Err(Error::JobNotFound(job_id.to_string())),
        }

        self.queue.retain(|id| id != job_id);
        self.ready.push(job_id.to_string());
        self.events.dispatch(DomainEvent::JobAllocated { job_id: job_id.to_string() });

        self.start_ready_jobs();
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    pub fn kill_job(&mut self, job_id: &str) -> Result<()> {
        if !self.is_running {
            return Err(Error::NotRunning);
        }
        if !self.jobs.contains_key(job_id) {
            return Err(Error::JobNotFound(job_id.to_string()));
        }
        self.adapter.kill_jobs(&[job_id.to_string()])
    }

    #[tracing::instrument(skip(self))]
    pub fn reject_job(&mut self, job_id: &str) -> Result<()> {
        if !self.is_running {
            return Err(Error::NotRunning);
        }
        if !self.queue.iter().any(|id| id == job_id) {
            return Err(Error::JobNotFound(job_id.to_string()));
        }
        self.queue.retain(|id| id != job_id);
        if let Some(job) = self.jobs.get_mut(job_id) {
            job.reject();
        }
        self.rejected.push(job_id.to_string());
        self.events.dispatch(DomainEvent::JobRejected { job_id: job_id.to_string() });
        self.adapter.reject_job(job_id)
    }

    #[tracing::instrument(skip(self))]
    pub fn switch_off(&mut self, host_ids: &[HostId]) -> Result<()> {
        if !self.is_running {
            return Err(Error::NotRunning);
        }
        self.switch_hosts(host_ids, PstateType::SwitchingOff, |h| h.sleep())
    }

    #[tracing::instrument(skip(self))]
    pub fn switch_on(&mut self, host_ids: &[HostId]) -> Result<()> {
        if !self.is_running {
            return Err(Error::NotRunning);
        }
        self.switch_hosts(host_ids, PstateType::SwitchingOn, |h| h.wake_up())
    }

    fn switch_hosts(&mut self, host_ids: &[HostId], target_kind: PstateType, transition: impl Fn(&mut Host) -> Result<()>) -> Result<()> {
        let platform = self.platform.as_mut().ok_or(Error::NotRunning)?;
        let mut by_pstate: HashMap<u32, Vec<ResourceId>> = HashMap::new();

        for &host_id in host_ids {
            let host = platform.get_host_mut(host_id)?;
            transition(host)?;
            let pstate_id = host
                .pstate_ids_of_kind(target_kind)
                .next()
                .ok_or_else(|| Error::InvalidArgument(format!("host {} has no {:?} pstate", host_id, target_kind)))?;
            by_pstate.entry(pstate_id).or_default().extend(host.resource_ids.iter().copied());
        }

        for (pstate_id, resource_ids) in &by_pstate {
            self.adapter.set_resources_pstate(resource_ids, *pstate_id)?;
        }
        for &host_id in host_ids {
            self.events.dispatch(DomainEvent::HostStateChanged { host_id });
        }
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    pub fn switch_power_state(&mut self, host_id: HostId, pstate_id: u32) -> Result<()> {
        if !self.is_running {
            return Err(Error::NotRunning);
        }
        let resource_ids = {
            let platform = self.platform.as_mut().ok_or(Error::NotRunning)?;
            let host = platform.get_host_mut(host_id)?;
            host.set_pstate(pstate_id)?;
            host.resource_ids.clone()
        };
        self.adapter.set_resources_pstate(&resource_ids, pstate_id)?;
        self.events.dispatch(DomainEvent::HostComputationPowerStateChanged { host_id });
        Ok(())
    }

    #[tracing::instrument(skip(self, callback))]
    pub fn set_callback(&mut self, at: f64, callback: impl FnMut(&mut Controller) + Send + 'static) -> Result<()> {
        if !self.is_running {
            return Err(Error::NotRunning);
        }
        if at <= *self.current_time {
            return Err(Error::InvalidArgument("callback time must be in the future".into()));
        }
        self.adapter.call_me_later(Time(at))?;
        self.callbacks.push(ScheduledCallback { at: Time(at), callback: Box::new(callback) });
        Ok(())
    }

    // ---- event batch processing ------------------------------------------

    fn process_batch(&mut self, batch: crate::adapter::EventBatch) {
        self.current_time = batch.time;
        for event in batch.events {
            let triggers_sweep = matches!(event, SimEvent::JobCompleted { .. } | SimEvent::JobKilled { .. } | SimEvent::ResourceStateChanged { .. });
            self.handle_event(event);
            if triggers_sweep {
                self.start_ready_jobs();
            }
        }
    }

    fn handle_event(&mut self, event: SimEvent) {
        match event {
            SimEvent::SimulationBegins { platform } => self.on_simulation_begins(platform),
            SimEvent::SimulationEnds => {
                self.is_running = false;
                self.events.dispatch(DomainEvent::SimulationEnds);
            }
            SimEvent::JobSubmitted { job_id, res, walltime } => self.on_job_submitted(job_id, res, walltime),
            SimEvent::JobCompleted { job_id, outcome } => self.on_job_completed(job_id, outcome),
            SimEvent::JobKilled { job_ids } => self.on_job_killed(job_ids),
            SimEvent::ResourceStateChanged { resource_ids, pstate_id } => self.on_resource_state_changed(resource_ids, pstate_id),
            SimEvent::RequestedCall => self.on_requested_call(),
            SimEvent::Notify { kind } => self.on_notify(kind),
        }
    }

    fn on_simulation_begins(&mut self, description: PlatformDescription) {
        let hosts = description
            .hosts
            .into_iter()
            .map(|h| Host::new(h.id, h.name, h.resource_ids, h.pstates))
            .collect();
        let platform = Platform::new(hosts);
        self.agenda = Some(Agenda::new(&platform));
        self.platform = Some(platform);

        if let Some(t) = self.simulation_time {
            if let Err(err) = self.adapter.call_me_later(Time(t)) {
                tracing::error!(?err, "failed to schedule simulation_time wake-up");
            }
        }
        self.events.dispatch(DomainEvent::SimulationBegins);
    }

    fn on_job_submitted(&mut self, job_id: JobId, res: usize, walltime: Option<Duration>) {
        let nb_resources = self.platform.as_ref().map(|p| p.nb_resources()).unwrap_or(0);
        let job = Job::new(job_id.clone(), res, walltime, self.current_time);

        if res > nb_resources {
            if let Err(err) = self.adapter.reject_job(&job_id) {
                tracing::error!(?err, %job_id, "failed to send reject_job");
            }
            let mut job = job;
            job.reject();
            self.jobs.insert(job_id.clone(), job);
            self.rejected.push(job_id.clone());
            self.events.dispatch(DomainEvent::JobRejected { job_id });
            return;
        }

        self.jobs.insert(job_id.clone(), job);
        self.queue.push(job_id.clone());
        self.events.dispatch(DomainEvent::JobSubmitted { job_id });
    }

    fn on_job_completed(&mut self, job_id: JobId, outcome: JobOutcome) {
        let final_state = match outcome {
            JobOutcome::Ok => FinalState::Ok,
            JobOutcome::WalltimeExceeded => FinalState::WalltimeExceeded,
        };
        self.terminate_job(&job_id, final_state, DomainEvent::JobCompleted { job_id: job_id.clone() });
    }

    fn on_job_killed(&mut self, job_ids: Vec<JobId>) {
        for job_id in job_ids {
            self.terminate_job(&job_id, FinalState::Killed, DomainEvent::JobKilled { job_id: job_id.clone() });
        }
    }

    fn terminate_job(&mut self, job_id: &str, final_state: FinalState, completion_event: DomainEvent) {
        let now = self.current_time;
        let allocation = match self.jobs.get_mut(job_id) {
            Some(job) => {
                job.terminate(now, final_state);
                job.allocation.clone().unwrap_or_default()
            }
            None => {
                tracing::error!(job_id, "completion/kill event for unknown job");
                debug_assert!(false, "completion event for unknown job {}", job_id);
                return;
            }
        };

        // a kill can arrive for a job still in `queue` or `ready` (the
        // controller never pre-terminates those locally), so strip the id
        // from whichever cohort currently holds it, not just `running`.
        self.queue.retain(|id| id != job_id);
        self.ready.retain(|id| id != job_id);
        self.running.retain(|id| id != job_id);
        self.completed.push(job_id.to_string());

        if let Some(agenda) = self.agenda.as_mut() {
            agenda.release(&allocation);
        }

        let mut released_hosts = HashSet::new();
        if let Some(platform) = self.platform.as_mut() {
            for &rid in &allocation {
                if let Ok(resource) = platform.get_resource(rid) {
                    let host_id = resource.host_id;
                    if let Ok(host) = platform.get_host_mut(host_id) {
                        host.release(rid);
                        released_hosts.insert(host_id);
                    }
                }
            }
        }

        self.events.dispatch(completion_event);
        for host_id in released_hosts {
            self.events.dispatch(DomainEvent::HostStateChanged { host_id });
        }
    }

    fn on_resource_state_changed(&mut self, resource_ids: Vec<ResourceId>, pstate_id: u32) {
        let Some(platform) = self.platform.as_mut() else { return };

        let mut host_ids: Vec<HostId> = Vec::new();
        for &rid in &resource_ids {
            if let Ok(resource) = platform.get_resource(rid) {
                if !host_ids.contains(&resource.host_id) {
                    host_ids.push(resource.host_id);
                }
            }
        }

        for host_id in host_ids {
            let result = platform.get_host_mut(host_id).and_then(|h| h.set_pstate(pstate_id));
            match result {
                Ok(true) => self.events.dispatch(DomainEvent::HostStateChanged { host_id }),
                Ok(false) => self.events.dispatch(DomainEvent::HostComputationPowerStateChanged { host_id }),
                Err(err) => tracing::error!(?err, host_id, "invalid pstate transition"),
            }
        }
    }

    fn on_requested_call(&mut self) {
        let now = self.current_time;
        let mut fired: Vec<Box<dyn FnMut(&mut Controller) + Send>> = Vec::new();
        self.callbacks = std::mem::take(&mut self.callbacks)
            .into_iter()
            .filter_map(|cb| {
                if cb.at <= now {
                    fired.push(cb.callback);
                    None
                } else {
                    Some(cb)
                }
            })
            .collect();
        for mut callback in fired {
            callback(self);
        }

        if let Some(t) = self.simulation_time {
            if *now >= t {
                self.force_shutdown();
            }
        }
    }

    fn force_shutdown(&mut self) {
        if self.is_running {
            if let Err(err) = self.adapter.finish() {
                tracing::error!(?err, "failed to force finish");
            }
            self.is_running = false;
        } else {
            self.drain_to_end();
        }
    }

    fn on_notify(&mut self, kind: NotifyKind) {
        match kind {
            NotifyKind::NoMoreStaticJobToSubmit | NotifyKind::RegistrationFinished => {
                self.submitter_ended = true;
            }
            NotifyKind::NoMoreExternalEventToOccur => {
                if let Err(err) = self.close() {
                    tracing::error!(?err, "failed to close on no_more_external_event_to_occur");
                }
            }
        }
    }

    /// Drives `proceed_simulation()` repeatedly once the submitter is done
    /// and every cohort but `completed`/`rejected` is empty.
    fn drain_to_end(&mut self) {
        while self.is_running {
            match self.adapter.proceed_simulation() {
                Ok(batch) => self.process_batch(batch),
                Err(err) => {
                    tracing::error!(?err, "adapter unavailable during end-of-simulation drain");
                    self.is_running = false;
                }
            }
        }
    }

    // ---- ready-job activation ---------------------------------------------

    #[tracing::instrument(skip(self))]
    fn start_ready_jobs(&mut self) {
        let now = self.current_time;
        let snapshot = self.ready.clone();
        let mut woken_hosts: HashSet<HostId> = HashSet::new();
        let mut started = Vec::new();

        for job_id in snapshot {
            let Some(job) = self.jobs.get(&job_id) else { continue };
            let Some(allocation) = job.allocation.clone() else { continue };
            let Some(platform) = self.platform.as_ref() else { continue };

            let mut host_ids: Vec<HostId> = Vec::new();
            for &rid in &allocation {
                if let Ok(resource) = platform.get_resource(rid) {
                    if !host_ids.contains(&resource.host_id) {
                        host_ids.push(resource.host_id);
                    }
                }
            }

            let states: Vec<_> = host_ids
                .iter()
                .filter_map(|&hid| platform.get_host(hid).ok().map(|h| (hid, h.state())))
                .collect();

            if states.iter().any(|(_, s)| matches!(s, crate::platform::HostState::Sleeping)) {
                for &(host_id, state) in &states {
                    if matches!(state, crate::platform::HostState::Sleeping) && woken_hosts.insert(host_id) {
                        self.wake_host(host_id);
                    }
                }
                continue;
            }

            if states.iter().any(|(_, s)| matches!(s, crate::platform::HostState::SwitchingOn | crate::platform::HostState::SwitchingOff)) {
                continue;
            }

            // all hosts ready: start the job
            if let Some(platform) = self.platform.as_mut() {
                for &rid in &allocation {
                    if let Ok(resource) = platform.get_resource(rid) {
                        let host_id = resource.host_id;
                        if let Ok(host) = platform.get_host_mut(host_id) {
                            host.start_computing(rid);
                        }
                    }
                }
            }
            if let Some(job) = self.jobs.get_mut(&job_id) {
                job.start(now);
            }
            if let Err(err) = self.adapter.execute_job(&job_id, &allocation) {
                tracing::error!(?err, %job_id, "failed to send execute_job");
            }
            started.push(job_id);
        }

        for job_id in &started {
            self.ready.retain(|id| id != job_id);
            self.running.push(job_id.clone());
            self.events.dispatch(DomainEvent::JobStarted { job_id: job_id.clone() });
        }
    }

    fn wake_host(&mut self, host_id: HostId) {
        let pstate_and_resources = self.platform.as_mut().and_then(|platform| {
            let host = platform.get_host_mut(host_id).ok()?;
            if host.wake_up().is_err() {
                return None;
            }
            let pstate_id = host.pstate_ids_of_kind(PstateType::SwitchingOn).next()?;
            Some((pstate_id, host.resource_ids.clone()))
        });

        if let Some((pstate_id, resource_ids)) = pstate_and_resources {
            if let Err(err) = self.adapter.set_resources_pstate(&resource_ids, pstate_id) {
                tracing::error!(?err, host_id, "failed to send set_resources_pstate for wake-up");
            }
            self.events.dispatch(DomainEvent::HostStateChanged { host_id });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::{EventBatch, HostDescription, SyntheticAdapter};
    use crate::platform::PowerState;

    fn four_pstates() -> Vec<PowerState> {
        vec![
            PowerState { id: 0, kind: PstateType::Computation, watt_idle: 90.0, watt_full: 190.0 },
            PowerState { id: 1, kind: PstateType::Sleep, watt_idle: 9.0, watt_full: 9.0 },
            PowerState { id: 2, kind: PstateType::SwitchingOn, watt_idle: 100.0, watt_full: 100.0 },
            PowerState { id: 3, kind: PstateType::SwitchingOff, watt_idle: 100.0, watt_full: 100.0 },
        ]
    }

    fn two_host_platform_description() -> PlatformDescription {
        PlatformDescription {
            hosts: vec![
                HostDescription { id: 0, name: "host0".into(), resource_ids: vec![0], pstates: four_pstates() },
                HostDescription { id: 1, name: "host1".into(), resource_ids: vec![1], pstates: four_pstates() },
            ],
        }
    }

    fn started_controller() -> Controller {
        let mut adapter = SyntheticAdapter::new();
        adapter.push_batch(EventBatch {
            time: Time(0.0),
            events: vec![SimEvent::SimulationBegins { platform: two_host_platform_description() }],
        });
        let mut controller = Controller::new(Box::new(adapter));
        controller.start("platforms/two_hosts.yaml", None, None, None, None).unwrap();
        controller
    }

    #[test]
    fn start_rejects_unrecognized_verbosity() {
        let adapter = SyntheticAdapter::new();
        let mut controller = Controller::new(Box::new(adapter));
        let err = controller.start("platforms/two_hosts.yaml", None, None, None, Some("l")).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
        assert!(!controller.is_running());
    }

    #[test]
    fn start_accepts_recognized_verbosity() {
        let mut controller = started_controller_with_verbosity("debug");
        assert!(controller.is_running());
        let _ = controller.close();
    }

    fn started_controller_with_verbosity(verbosity: &str) -> Controller {
        let mut adapter = SyntheticAdapter::new();
        adapter.push_batch(EventBatch {
            time: Time(0.0),
            events: vec![SimEvent::SimulationBegins { platform: two_host_platform_description() }],
        });
        let mut controller = Controller::new(Box::new(adapter));
        controller.start("platforms/two_hosts.yaml", None, None, None, Some(verbosity)).unwrap();
        controller
    }

    #[test]
    fn auto_reject_oversize_job() {
        let mut controller = started_controller();
        controller.on_job_submitted("w!0".into(), 3, Some(Duration(10.0)));
        assert!(controller.queue().is_empty());
        assert_eq!(controller.job("w!0").unwrap().state, crate::job::JobState::Rejected);
    }

    #[test]
    fn killing_a_queued_job_clears_it_from_queue_not_just_running() {
        let mut controller = started_controller();
        controller.on_job_submitted("w!0".into(), 1, Some(Duration(100.0)));
        assert_eq!(controller.queue(), &["w!0".to_string()]);

        controller.on_job_killed(vec!["w!0".to_string()]);

        assert!(controller.queue().is_empty());
        assert!(controller.ready_jobs().is_empty());
        assert!(controller.running_jobs().is_empty());
        assert_eq!(controller.completed_jobs(), &["w!0".to_string()]);
        assert_eq!(controller.job("w!0").unwrap().state, crate::job::JobState::CompletedKilled);
    }

    #[test]
    fn allocate_leaves_job_and_queue_untouched_on_reservation_failure() {
        let mut controller = started_controller();
        controller.on_job_submitted("w!0".into(), 1, Some(Duration(100.0)));
        controller.on_job_submitted("w!1".into(), 1, Some(Duration(50.0)));

        controller.allocate("w!0", Some(vec![0])).unwrap();
        assert_eq!(controller.queue(), &["w!1".to_string()]);

        // resource 0 is already reserved (and now running) for w!0; this must fail
        // without mutating w!1's job state or its place in the queue.
        let err = controller.allocate("w!1", Some(vec![0])).unwrap_err();
        assert!(matches!(err, Error::AlreadyReserved(0)));

        assert_eq!(controller.queue(), &["w!1".to_string()]);
        assert_eq!(controller.job("w!1").unwrap().state, crate::job::JobState::Submitted);
        assert!(controller.job("w!1").unwrap().allocation.is_none());

        // retrying allocate for w!1 against a free resource must not panic on a
        // stale `allocation.is_some()` debug_assert from the failed attempt above.
        controller.allocate("w!1", Some(vec![1])).unwrap();
        assert_eq!(controller.job("w!1").unwrap().state, crate::job::JobState::Running);
    }

    #[test]
    fn happy_path_allocate_and_start() {
        let mut controller = started_controller();
        controller.on_job_submitted("w!0".into(), 1, Some(Duration(100.0)));
        assert_eq!(controller.queue(), &["w!0".to_string()]);

        controller.allocate("w!0", Some(vec![0])).unwrap();
        assert_eq!(controller.running_jobs(), &["w!0".to_string()]);
        assert_eq!(controller.platform().unwrap().get_host(0).unwrap().state(), crate::platform::HostState::Computing);
    }

    #[test]
    fn wake_up_gating_defers_start_until_host_ready() {
        let mut controller = started_controller();
        // put host 0 to sleep first
        {
            let platform = controller.platform.as_mut().unwrap();
            let host = platform.get_host_mut(0).unwrap();
            host.sleep().unwrap();
            host.set_pstate(1).unwrap();
        }

        controller.on_job_submitted("w!0".into(), 1, Some(Duration(50.0)));
        controller.allocate("w!0", Some(vec![0])).unwrap();

        assert_eq!(controller.job("w!0").unwrap().state, crate::job::JobState::Runnable);
        assert_eq!(controller.platform().unwrap().get_host(0).unwrap().state(), crate::platform::HostState::SwitchingOn);

        controller.on_resource_state_changed(vec![0], 0);
        controller.start_ready_jobs();
        assert_eq!(controller.job("w!0").unwrap().state, crate::job::JobState::Running);
    }

    #[test]
    fn set_callback_fires_once_requested_call_reaches_its_time() {
        let mut controller = started_controller();
        let fired = std::sync::Arc::new(std::sync::Mutex::new(false));
        let f = fired.clone();
        controller.set_callback(10.0, move |_| *f.lock().unwrap() = true).unwrap();

        // a REQUESTED_CALL before the scheduled time must not fire it.
        controller.current_time = Time(5.0);
        controller.on_requested_call();
        assert!(!*fired.lock().unwrap());

        controller.current_time = Time(10.0);
        controller.on_requested_call();
        assert!(*fired.lock().unwrap());
    }

    #[test]
    fn set_callback_rejects_past_or_present_time() {
        let mut controller = started_controller();
        assert!(controller.set_callback(*controller.current_time(), |_| {}).is_err());
    }
}
