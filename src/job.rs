use std::cmp::Ordering;
use std::fmt;
use std::ops::{Add, AddAssign, Sub, SubAssign};

use derive_more::{Add, AddAssign, Deref, DerefMut, Display, From, Sub, SubAssign};

use crate::utils::float;

/// A resource id, dense and originating from the platform spec.
pub type ResourceId = u32;
/// A host id, dense and originating from the platform spec.
pub type HostId = u32;
/// A job id, as assigned by the submitter.
pub type JobId = String;

/// A simulation timestamp. Backed by `f64`, but totally ordered via
/// `total_cmp` since simulation time always advances and is never `NaN`.
#[derive(Debug, Clone, Copy, From, Display, Deref, DerefMut)]
pub struct Time(pub f64);

impl PartialEq for Time {
    fn eq(&self, other: &Self) -> bool {
        float::total_eq(&self.0, &other.0)
    }
}

impl Eq for Time {}

impl PartialOrd for Time {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        float::total_cmp(&self.0, &other.0)
    }
}

impl Ord for Time {
    fn cmp(&self, other: &Self) -> Ordering {
        self.partial_cmp(other).unwrap()
    }
}

impl Default for Time {
    fn default() -> Self {
        Time(0.0)
    }
}

/// A duration of simulation time; may be infinite (unbounded walltime).
#[derive(Debug, Clone, Copy, From, Display, Deref, DerefMut, Add, Sub, AddAssign, SubAssign)]
pub struct Duration(pub f64);

impl Duration {
    pub const INFINITE: Duration = Duration(f64::INFINITY);

    pub fn is_finite(&self) -> bool {
        self.0.is_finite()
    }
}

impl PartialEq for Duration {
    fn eq(&self, other: &Self) -> bool {
        float::total_eq(&self.0, &other.0)
    }
}

impl Eq for Duration {}

impl PartialOrd for Duration {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        float::total_cmp(&self.0, &other.0)
    }
}

impl Ord for Duration {
    fn cmp(&self, other: &Self) -> Ordering {
        self.partial_cmp(other).unwrap()
    }
}

impl Add<Duration> for Time {
    type Output = Time;

    fn add(self, rhs: Duration) -> Self::Output {
        Time(self.0 + rhs.0)
    }
}

impl AddAssign<Duration> for Time {
    fn add_assign(&mut self, rhs: Duration) {
        self.0 += rhs.0;
    }
}

impl Sub<Duration> for Time {
    type Output = Time;

    fn sub(self, rhs: Duration) -> Self::Output {
        Time(self.0 - rhs.0)
    }
}

impl SubAssign<Duration> for Time {
    fn sub_assign(&mut self, rhs: Duration) {
        self.0 -= rhs.0;
    }
}

impl Sub for Time {
    type Output = Duration;

    fn sub(self, rhs: Self) -> Self::Output {
        Duration(self.0 - rhs.0)
    }
}

/// The final state a job settled into. Distinct from `JobState` so that
/// `Job::final_state` can be recorded without re-deriving it from `state`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinalState {
    Ok,
    Killed,
    WalltimeExceeded,
}

/// A job's position in the submitted → rejected | runnable → running →
/// completed-* lifecycle (§8: no state is ever entered twice).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Submitted,
    Runnable,
    Running,
    CompletedOk,
    CompletedKilled,
    CompletedWalltime,
    Rejected,
}

impl JobState {
    pub fn is_completed(&self) -> bool {
        matches!(
            self,
            JobState::CompletedOk | JobState::CompletedKilled | JobState::CompletedWalltime
        )
    }
}

/// A job admitted into the RJMS.
#[derive(Debug, Clone)]
pub struct Job {
    pub id: JobId,
    /// number of resources requested
    pub res: usize,
    /// `None` means unbounded (infinite) walltime
    pub walltime: Option<Duration>,
    pub subtime: Time,
    pub state: JobState,
    pub allocation: Option<Vec<ResourceId>>,
    pub start_time: Option<Time>,
    pub stop_time: Option<Time>,
    pub final_state: Option<FinalState>,
}

impl Job {
    pub fn new(id: impl Into<JobId>, res: usize, walltime: Option<Duration>, subtime: Time) -> Self {
        Job {
            id: id.into(),
            res,
            walltime,
            subtime,
            state: JobState::Submitted,
            allocation: None,
            start_time: None,
            stop_time: None,
            final_state: None,
        }
    }

    /// Returns the walltime, or `Duration::INFINITE` if unbounded.
    pub fn walltime_or_infinite(&self) -> Duration {
        self.walltime.unwrap_or(Duration::INFINITE)
    }

    /// Binds this job's allocation. Invariant: set at most once.
    pub fn set_allocation(&mut self, resource_ids: Vec<ResourceId>) {
        debug_assert!(self.allocation.is_none(), "allocation set more than once for {}", self.id);
        debug_assert_eq!(resource_ids.len(), self.res);
        self.allocation = Some(resource_ids);
        self.state = JobState::Runnable;
    }

    pub fn start(&mut self, now: Time) {
        debug_assert!(self.allocation.is_some());
        self.start_time = Some(now);
        self.state = JobState::Running;
    }

    /// Settles the job into a terminal state. Usually called on a `running`
    /// job, but a kill may also arrive for a job still in `queue`/`ready`
    /// (the controller never pre-terminates those locally), in which case
    /// `start_time` stays `None`.
    pub fn terminate(&mut self, now: Time, final_state: FinalState) {
        if let Some(start) = self.start_time {
            debug_assert!(start <= now, "stop_time must not precede start_time");
        }
        self.stop_time = Some(now);
        self.final_state = Some(final_state);
        self.state = match final_state {
            FinalState::Ok => JobState::CompletedOk,
            FinalState::Killed => JobState::CompletedKilled,
            FinalState::WalltimeExceeded => JobState::CompletedWalltime,
        };
    }

    pub fn reject(&mut self) {
        self.state = JobState::Rejected;
    }

    pub fn is_running(&self) -> bool {
        self.state == JobState::Running
    }
}

impl fmt::Display for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Job({}, res={}, @{:.2})", self.id, self.res, self.subtime)
    }
}
