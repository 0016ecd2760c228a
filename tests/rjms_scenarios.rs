//! End-to-end scenarios driving the controller purely through its public
//! surface and a scripted synthetic adapter. Every batch the adapter will
//! ever hand back is queued up front, the way a recorded simulator trace
//! would be.

use std::sync::{Arc, Mutex};

use approx::assert_abs_diff_eq;

use rjms_core::adapter::{EventBatch, HostDescription, JobOutcome, NotifyKind, PlatformDescription, SimEvent, SyntheticAdapter};
use rjms_core::event::{DomainEvent, EventKind};
use rjms_core::job::{Duration, Time};
use rjms_core::platform::{HostState, PowerState, PstateType};
use rjms_core::Controller;

const COMPUTATION_PSTATE: u32 = 0;
const SLEEP_PSTATE: u32 = 1;

fn four_pstates() -> Vec<PowerState> {
    vec![
        PowerState { id: COMPUTATION_PSTATE, kind: PstateType::Computation, watt_idle: 90.0, watt_full: 190.0 },
        PowerState { id: SLEEP_PSTATE, kind: PstateType::Sleep, watt_idle: 9.0, watt_full: 9.0 },
        PowerState { id: 2, kind: PstateType::SwitchingOn, watt_idle: 100.0, watt_full: 100.0 },
        PowerState { id: 3, kind: PstateType::SwitchingOff, watt_idle: 100.0, watt_full: 100.0 },
    ]
}

fn two_hosts_one_resource_each() -> PlatformDescription {
    PlatformDescription {
        hosts: vec![
            HostDescription { id: 0, name: "host0".into(), resource_ids: vec![0], pstates: four_pstates() },
            HostDescription { id: 1, name: "host1".into(), resource_ids: vec![1], pstates: four_pstates() },
        ],
    }
}

fn one_host_two_resources() -> PlatformDescription {
    PlatformDescription {
        hosts: vec![HostDescription { id: 0, name: "host0".into(), resource_ids: vec![0, 1], pstates: four_pstates() }],
    }
}

fn subscribe_collector(controller: &mut Controller, kind: EventKind) -> Arc<Mutex<usize>> {
    let hits = Arc::new(Mutex::new(0));
    let h = hits.clone();
    controller.subscribe(kind, move |_: &DomainEvent| *h.lock().unwrap() += 1);
    hits
}

#[test]
fn scenario_1_auto_reject_oversize() {
    let mut adapter = SyntheticAdapter::new();
    adapter.push_batch(EventBatch { time: Time(0.0), events: vec![SimEvent::SimulationBegins { platform: two_hosts_one_resource_each() }] });
    adapter.push_batch(EventBatch { time: Time(5.0), events: vec![SimEvent::JobSubmitted { job_id: "w!0".into(), res: 3, walltime: Some(Duration(10.0)) }] });

    let mut controller = Controller::new(Box::new(adapter));
    let rejections = subscribe_collector(&mut controller, EventKind::JobRejected);

    controller.start("platforms/two_hosts.yaml", None, None, None, None).unwrap();
    controller.proceed_time(None).unwrap();

    assert!(controller.queue().is_empty());
    assert_eq!(*rejections.lock().unwrap(), 1);
}

#[test]
fn scenario_2_happy_path() {
    let mut adapter = SyntheticAdapter::new();
    adapter.push_batch(EventBatch { time: Time(0.0), events: vec![SimEvent::SimulationBegins { platform: two_hosts_one_resource_each() }] });
    adapter.push_batch(EventBatch { time: Time(0.0), events: vec![SimEvent::JobSubmitted { job_id: "w!0".into(), res: 1, walltime: Some(Duration(100.0)) }] });

    let mut controller = Controller::new(Box::new(adapter));
    let starts = subscribe_collector(&mut controller, EventKind::JobStarted);

    controller.start("platforms/two_hosts.yaml", None, None, None, None).unwrap();
    controller.proceed_time(None).unwrap();

    controller.allocate("w!0", Some(vec![0])).unwrap();

    assert_eq!(*starts.lock().unwrap(), 1);
    assert_eq!(controller.platform().unwrap().get_host(0).unwrap().state(), HostState::Computing);
    assert_eq!(controller.running_jobs(), &["w!0".to_string()]);

    let lookup = |job_id: &String| controller.job(job_id).map(|j| (j.start_time, j.walltime_or_infinite()));
    let reserved = controller.agenda().unwrap().reserved_time(Time(10.0), lookup);
    assert_abs_diff_eq!(reserved[0].value, 90.0);
    assert_abs_diff_eq!(reserved[1].value, 0.0);
}

#[test]
fn scenario_3_wake_up_gating() {
    let mut adapter = SyntheticAdapter::new();
    adapter.push_batch(EventBatch { time: Time(0.0), events: vec![SimEvent::SimulationBegins { platform: two_hosts_one_resource_each() }] });
    adapter.push_batch(EventBatch { time: Time(1.0), events: vec![SimEvent::ResourceStateChanged { resource_ids: vec![0], pstate_id: SLEEP_PSTATE }] });
    adapter.push_batch(EventBatch { time: Time(150.0), events: vec![SimEvent::JobSubmitted { job_id: "w!0".into(), res: 2, walltime: Some(Duration(50.0)) }] });
    adapter.push_batch(EventBatch { time: Time(160.0), events: vec![SimEvent::ResourceStateChanged { resource_ids: vec![0], pstate_id: COMPUTATION_PSTATE }] });

    let mut controller = Controller::new(Box::new(adapter));
    controller.start("platforms/two_hosts.yaml", None, None, None, None).unwrap();

    // host 0 requests to sleep; the scripted batch above confirms it shortly after.
    controller.switch_off(&[0]).unwrap();
    assert_eq!(controller.platform().unwrap().get_host(0).unwrap().state(), HostState::SwitchingOff);

    controller.proceed_time(None).unwrap();
    assert_eq!(controller.platform().unwrap().get_host(0).unwrap().state(), HostState::Sleeping);

    controller.proceed_time(None).unwrap();
    controller.allocate("w!0", Some(vec![0, 1])).unwrap();

    assert_eq!(controller.job("w!0").unwrap().state, rjms_core::JobState::Runnable);
    assert_eq!(controller.platform().unwrap().get_host(0).unwrap().state(), HostState::SwitchingOn);

    controller.proceed_time(None).unwrap();
    assert_eq!(controller.job("w!0").unwrap().state, rjms_core::JobState::Running);
}

#[test]
fn scenario_4_infinite_walltime() {
    let mut adapter = SyntheticAdapter::new();
    adapter.push_batch(EventBatch { time: Time(0.0), events: vec![SimEvent::SimulationBegins { platform: one_host_two_resources() }] });
    adapter.push_batch(EventBatch { time: Time(1.0), events: vec![SimEvent::JobSubmitted { job_id: "w!0".into(), res: 1, walltime: None }] });

    let mut controller = Controller::new(Box::new(adapter));
    controller.start("platforms/one_host.yaml", None, None, None, None).unwrap();
    controller.proceed_time(None).unwrap();

    controller.allocate("w!0", Some(vec![0])).unwrap();

    let lookup = |job_id: &String| controller.job(job_id).map(|j| (j.start_time, j.walltime_or_infinite()));
    let reserved = controller.agenda().unwrap().reserved_time(Time(1_000_000.0), lookup);
    assert!(reserved[0].value.is_infinite());
    assert_abs_diff_eq!(reserved[1].value, 0.0);
}

#[test]
fn scenario_5_two_jobs_same_host_sequentially() {
    let mut adapter = SyntheticAdapter::new();
    adapter.push_batch(EventBatch { time: Time(0.0), events: vec![SimEvent::SimulationBegins { platform: one_host_two_resources() }] });
    adapter.push_batch(EventBatch { time: Time(1.0), events: vec![SimEvent::JobSubmitted { job_id: "w!0".into(), res: 1, walltime: Some(Duration(100.0)) }] });
    adapter.push_batch(EventBatch { time: Time(5.0), events: vec![SimEvent::JobCompleted { job_id: "w!0".into(), outcome: JobOutcome::Ok }] });
    adapter.push_batch(EventBatch { time: Time(5.0), events: vec![SimEvent::JobSubmitted { job_id: "w!1".into(), res: 1, walltime: Some(Duration(200.0)) }] });

    let mut controller = Controller::new(Box::new(adapter));
    controller.start("platforms/one_host.yaml", None, None, None, None).unwrap();

    controller.proceed_time(None).unwrap();
    controller.allocate("w!0", Some(vec![0])).unwrap();

    controller.proceed_time(None).unwrap(); // job w!0 completes, resource 0 released
    assert!(controller.agenda().unwrap().available_resources().collect::<Vec<_>>().contains(&0));

    controller.proceed_time(None).unwrap(); // w!1 submitted
    controller.allocate("w!1", Some(vec![0])).unwrap();

    let start = controller.job("w!1").unwrap().start_time.unwrap();
    let lookup = |job_id: &String| controller.job(job_id).map(|j| (j.start_time, j.walltime_or_infinite()));
    let reserved = controller.agenda().unwrap().reserved_time(Time(*start + 10.0), lookup);
    assert_abs_diff_eq!(reserved[0].value, 190.0);
}

#[test]
fn scenario_6_forced_end() {
    let mut adapter = SyntheticAdapter::new();
    adapter.push_batch(EventBatch { time: Time(0.0), events: vec![SimEvent::SimulationBegins { platform: two_hosts_one_resource_each() }] });
    adapter.push_batch(EventBatch { time: Time(10.0), events: vec![SimEvent::Notify { kind: NotifyKind::NoMoreStaticJobToSubmit }] });
    adapter.push_batch(EventBatch { time: Time(100.0), events: vec![SimEvent::RequestedCall] });

    let mut controller = Controller::new(Box::new(adapter));
    controller.start("platforms/two_hosts.yaml", None, Some(100.0), None, None).unwrap();
    assert!(controller.is_running());

    controller.proceed_time(None).unwrap();

    assert!(!controller.is_running());
}
