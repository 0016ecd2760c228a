//! Typed bridge to the platform simulator's message contract.
//!
//! Two implementations conform: a real external simulator (message-passing
//! over a socket, out of scope here) and the synthetic in-process one below,
//! scriptable for tests. The controller depends only on the [`SimulatorAdapter`]
//! trait.

use serde::{Deserialize, Serialize};

use crate::job::{Duration, HostId, JobId, ResourceId, Time};
use crate::utils::prelude::*;

/// A platform description as delivered by `SIMULATION_BEGINS`. Kept as an
/// opaque bag of the fields the controller needs rather than reusing
/// [`crate::platform::Platform`] directly, mirroring the wire boundary: the
/// adapter produces a description, the controller builds its own topology
/// from it. Also the shape a `platform_spec` YAML file deserializes into
/// (see [`crate::platform_spec::load`]), since the synthetic adapter and the
/// on-disk spec describe the same topology.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformDescription {
    pub hosts: Vec<HostDescription>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostDescription {
    pub id: HostId,
    pub name: String,
    pub resource_ids: Vec<ResourceId>,
    pub pstates: Vec<crate::platform::PowerState>,
}

/// Final outcome reported alongside `JOB_COMPLETED`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobOutcome {
    Ok,
    WalltimeExceeded,
}

/// One of the notification subtypes carried by `NOTIFY`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyKind {
    NoMoreStaticJobToSubmit,
    RegistrationFinished,
    NoMoreExternalEventToOccur,
}

/// An inbound event from the simulator, always timestamp-stamped; event
/// batches arrive in non-decreasing timestamp order.
#[derive(Debug, Clone)]
pub enum SimEvent {
    SimulationBegins { platform: PlatformDescription },
    SimulationEnds,
    JobSubmitted { job_id: JobId, res: usize, walltime: Option<Duration> },
    JobCompleted { job_id: JobId, outcome: JobOutcome },
    JobKilled { job_ids: Vec<JobId> },
    ResourceStateChanged { resource_ids: Vec<ResourceId>, pstate_id: u32 },
    RequestedCall,
    Notify { kind: NotifyKind },
}

/// A timestamped batch of events, as the adapter guarantees them: every
/// request sent before `proceed_simulation()` is delivered before the batch
/// it returns.
#[derive(Debug, Clone)]
pub struct EventBatch {
    pub time: Time,
    pub events: Vec<SimEvent>,
}

/// The capability set the controller drives the simulator through. The
/// real backend (socket-framed wire codec) is not implemented here; only
/// the shared contract and the synthetic in-process backend are.
pub trait SimulatorAdapter {
    /// Initializes the simulation and blocks until the first batch, whose
    /// first event must be `SimulationBegins`.
    fn start(&mut self, platform_spec: &str, output_path: Option<&str>, qos: Option<f64>) -> Result<EventBatch>;

    /// Releases a waiting simulator and blocks for the next batch at a time
    /// `>= current_time`.
    fn proceed_simulation(&mut self) -> Result<EventBatch>;

    /// Schedules a `REQUESTED_CALL` wake-up at absolute time `t`.
    fn call_me_later(&mut self, t: Time) -> Result<()>;

    fn execute_job(&mut self, job_id: &str, allocation: &[ResourceId]) -> Result<()>;

    fn reject_job(&mut self, job_id: &str) -> Result<()>;

    fn kill_jobs(&mut self, job_ids: &[JobId]) -> Result<()>;

    fn set_resources_pstate(&mut self, resource_ids: &[ResourceId], pstate_id: u32) -> Result<()>;

    /// Forces the termination exchange.
    fn finish(&mut self) -> Result<()>;

    fn is_running(&self) -> bool;

    fn current_time(&self) -> Time;
}

/// A scripted, in-process [`SimulatorAdapter`]: event batches are queued up
/// front (or appended during a test) rather than read off a socket. Useful
/// both as the reference backend and as the controller's test harness.
pub struct SyntheticAdapter {
    pending: std::collections::VecDeque<EventBatch>,
    current_time: Time,
    running: bool,
    pub sent_requests: Vec<OutboundRequest>,
}

/// A request the controller issued, recorded for test assertions. The
/// synthetic backend does not otherwise act on these beyond bookkeeping;
/// scripted tests push the resulting `EventBatch`es themselves.
#[derive(Debug, Clone)]
pub enum OutboundRequest {
    ExecuteJob { job_id: JobId, allocation: Vec<ResourceId> },
    RejectJob { job_id: JobId },
    KillJobs { job_ids: Vec<JobId> },
    SetResourcesPstate { resource_ids: Vec<ResourceId>, pstate_id: u32 },
    CallMeLater { t: Time },
    Finish,
}

impl SyntheticAdapter {
    pub fn new() -> Self {
        SyntheticAdapter {
            pending: Default::default(),
            current_time: Time(0.0),
            running: false,
            sent_requests: Vec::new(),
        }
    }

    /// Appends a batch to the script. Batches must be pushed in
    /// non-decreasing timestamp order.
    pub fn push_batch(&mut self, batch: EventBatch) {
        self.pending.push_back(batch);
    }

    fn next_batch(&mut self) -> Result<EventBatch> {
        let batch = self
            .pending
            .pop_front()
            .ok_or_else(|| Error::AdapterUnavailable("synthetic adapter script exhausted".into()))?;
        self.current_time = batch.time;
        if batch.events.iter().any(|e| matches!(e, SimEvent::SimulationEnds)) {
            self.running = false;
        }
        Ok(batch)
    }
}

impl Default for SyntheticAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatorAdapter for SyntheticAdapter {
    #[tracing::instrument(skip(self))]
    fn start(&mut self, _platform_spec: &str, _output_path: Option<&str>, _qos: Option<f64>) -> Result<EventBatch> {
        let batch = self.next_batch()?;
        if !matches!(batch.events.first(), Some(SimEvent::SimulationBegins { .. })) {
            return Err(Error::AdapterUnavailable("first event must be SimulationBegins".into()));
        }
        self.running = true;
        Ok(batch)
    }

    fn proceed_simulation(&mut self) -> Result<EventBatch> {
        self.next_batch()
    }

    fn call_me_later(&mut self, t: Time) -> Result<()> {
        self.sent_requests.push(OutboundRequest::CallMeLater { t });
        Ok(())
    }

    fn execute_job(&mut self, job_id: &str, allocation: &[ResourceId]) -> Result<()> {
        self.sent_requests.push(OutboundRequest::ExecuteJob {
            job_id: job_id.to_string(),
            allocation: allocation.to_vec(),
        });
        Ok(())
    }

    fn reject_job(&mut self, job_id: &str) -> Result<()> {
        self.sent_requests.push(OutboundRequest::RejectJob { job_id: job_id.to_string() });
        Ok(())
    }

    fn kill_jobs(&mut self, job_ids: &[JobId]) -> Result<()> {
        self.sent_requests.push(OutboundRequest::KillJobs { job_ids: job_ids.to_vec() });
        Ok(())
    }

    fn set_resources_pstate(&mut self, resource_ids: &[ResourceId], pstate_id: u32) -> Result<()> {
        self.sent_requests.push(OutboundRequest::SetResourcesPstate {
            resource_ids: resource_ids.to_vec(),
            pstate_id,
        });
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.sent_requests.push(OutboundRequest::Finish);
        self.running = false;
        Ok(())
    }

    fn is_running(&self) -> bool {
        self.running
    }

    fn current_time(&self) -> Time {
        self.current_time
    }
}
