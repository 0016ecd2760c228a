pub mod adapter;
pub mod agenda;
pub mod controller;
pub mod event;
pub mod job;
pub mod platform;
pub mod platform_spec;
pub mod utils;

pub use adapter::{SimulatorAdapter, SyntheticAdapter};
pub use agenda::Agenda;
pub use controller::Controller;
pub use event::{DomainEvent, EventKind};
pub use job::{Duration, FinalState, Job, JobState, Time};
pub use platform::{Host, HostState, Platform, PowerState, PstateType, Resource};
pub use utils::{AppConfig, Error, Result};
