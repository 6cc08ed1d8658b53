//! Facade behaviors end to end: results, panics, cancellation scoping, and
//! the object-safe seams, all over one shared clock.

use lockstep::{
    ClockConfig, ExecutorApi, JoinError, SchedulerError, SimTime, TimerApi, VirtualClock,
    VirtualExecutor, VirtualTimer,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant, SystemTime};

fn fast_clock() -> Arc<VirtualClock> {
    lockstep::test_utils::init_test_logging();
    Arc::new(VirtualClock::with_config(
        ClockConfig::default()
            .with_real_wait_ceiling(Duration::from_millis(500))
            .with_poll_granularity(Duration::from_millis(10)),
    ))
}

#[test]
fn result_flows_from_action_to_join() {
    let clock = fast_clock();
    let executor = VirtualExecutor::new(clock.clone());

    let task = executor
        .schedule(Duration::from_millis(120), || 6 * 7)
        .unwrap();

    let probe = task.handle();
    clock.wait_until(move || probe.is_complete()).unwrap();

    assert_eq!(task.join(Duration::from_secs(1)), Ok(42));
    assert_eq!(clock.now(), SimTime::from_millis(120));
}

#[test]
fn panicking_task_reports_through_join_and_spares_the_clock() {
    let clock = fast_clock();
    let executor = VirtualExecutor::new(clock.clone());

    let doomed = executor
        .schedule(Duration::from_millis(50), || -> i32 {
            panic!("worker exploded")
        })
        .unwrap();
    let healthy = executor.schedule(Duration::from_millis(100), || 1).unwrap();

    clock.wait_for(Duration::from_millis(100)).unwrap();

    assert_eq!(
        doomed.join(Duration::from_secs(1)),
        Err(JoinError::Panicked("worker exploded".to_string()))
    );
    // The panic was contained on the driver path; later work is unaffected.
    assert_eq!(healthy.join(Duration::from_secs(1)), Ok(1));
    assert_eq!(clock.now(), SimTime::from_millis(100));
}

#[test]
fn periodic_schedule_survives_action_panics() {
    let clock = fast_clock();
    let executor = VirtualExecutor::new(clock.clone());
    let ticks = Arc::new(AtomicUsize::new(0));

    let ticks_in_action = ticks.clone();
    executor
        .schedule_at_fixed_rate(
            Duration::from_millis(100),
            Duration::from_millis(100),
            move || {
                let tick = ticks_in_action.fetch_add(1, Ordering::SeqCst) + 1;
                assert_ne!(tick, 2, "second tick goes down in flames");
            },
        )
        .unwrap();

    clock.wait_for(Duration::from_millis(500)).unwrap();

    // All five fires were attempted; the panic on the second changed nothing
    // about the schedule.
    assert_eq!(ticks.load(Ordering::SeqCst), 5);
    clock.destroy();
}

#[test]
fn cancel_before_fire_prevents_execution() {
    let clock = fast_clock();
    let executor = VirtualExecutor::new(clock.clone());
    let ran = Arc::new(AtomicUsize::new(0));

    let ran_in_action = ran.clone();
    let task = executor
        .schedule(Duration::from_millis(100), move || {
            ran_in_action.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();

    assert!(task.cancel());
    clock.wait_for(Duration::from_millis(200)).unwrap();

    assert_eq!(ran.load(Ordering::SeqCst), 0);
    assert_eq!(task.join(Duration::from_millis(50)), Err(JoinError::Cancelled));
    assert_eq!(clock.now(), SimTime::from_millis(200));
}

#[test]
fn timer_cancellation_is_isolated_from_the_executor() {
    let clock = fast_clock();
    let timer = VirtualTimer::new(clock.clone());
    let executor = VirtualExecutor::new(clock.clone());
    let timer_hits = Arc::new(AtomicUsize::new(0));
    let executor_hits = Arc::new(AtomicUsize::new(0));

    let hits = timer_hits.clone();
    timer
        .schedule_once(Duration::from_millis(100), move || {
            hits.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();
    let hits = executor_hits.clone();
    executor
        .schedule(Duration::from_millis(100), move || {
            hits.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();

    assert_eq!(timer.cancel_all(), 1);
    clock.wait_for(Duration::from_millis(100)).unwrap();

    assert_eq!(timer_hits.load(Ordering::SeqCst), 0);
    assert_eq!(executor_hits.load(Ordering::SeqCst), 1);
}

#[test]
fn shutdown_now_settles_a_blocked_joiner() {
    let clock = fast_clock();
    let executor = Arc::new(VirtualExecutor::new(clock.clone()));

    let task = executor.schedule(Duration::from_secs(60), || ()).unwrap();
    let joiner = {
        let handle = task.handle();
        thread::spawn(move || handle.join(Duration::from_secs(30)))
    };

    thread::sleep(Duration::from_millis(30));
    let started = Instant::now();
    let removed = executor.shutdown_now();

    assert_eq!(removed.len(), 1);
    assert_eq!(joiner.join().unwrap(), Err(JoinError::Cancelled));
    assert!(started.elapsed() < Duration::from_secs(2));
    assert!(executor.is_shutdown());
}

#[test]
fn unsupported_operations_fail_loudly_not_silently() {
    let clock = fast_clock();
    let timer = VirtualTimer::new(clock.clone());
    let executor = VirtualExecutor::new(clock);

    assert_eq!(
        timer.schedule_at(SystemTime::now(), || {}).unwrap_err(),
        SchedulerError::Unsupported("date-based scheduling")
    );
    assert!(matches!(
        executor.invoke_all(vec![|| 0]),
        Err(SchedulerError::Unsupported(_))
    ));
    assert!(matches!(
        executor.invoke_any(vec![|| 0]),
        Err(SchedulerError::Unsupported(_))
    ));
}

#[test]
fn both_facades_work_behind_trait_objects() {
    let clock = fast_clock();
    let timer: Arc<dyn TimerApi> = Arc::new(VirtualTimer::new(clock.clone()));
    let executor: Arc<dyn ExecutorApi> = Arc::new(VirtualExecutor::new(clock.clone()));
    let hits = Arc::new(AtomicUsize::new(0));

    // Scheduling through the seams a consumer crate would inject.
    fn schedule_app_work(
        timer: &dyn TimerApi,
        executor: &dyn ExecutorApi,
        hits: &Arc<AtomicUsize>,
    ) {
        let h = hits.clone();
        timer
            .schedule_once(Duration::from_millis(100), Box::new(move || {
                h.fetch_add(1, Ordering::SeqCst);
            }))
            .unwrap();
        let h = hits.clone();
        executor
            .schedule(Duration::from_millis(200), Box::new(move || {
                h.fetch_add(1, Ordering::SeqCst);
            }))
            .unwrap();
        let h = hits.clone();
        executor
            .schedule_at_fixed_rate(
                Duration::from_millis(300),
                Duration::from_millis(300),
                Box::new(move || {
                    h.fetch_add(1, Ordering::SeqCst);
                }),
            )
            .unwrap();
    }

    schedule_app_work(timer.as_ref(), executor.as_ref(), &hits);
    clock.wait_for(Duration::from_millis(300)).unwrap();

    assert_eq!(hits.load(Ordering::SeqCst), 3);
    assert_eq!(executor.pending_count(), 1);
    executor.shutdown();
    assert!(executor.is_shutdown());
    assert_eq!(executor.pending_count(), 0);
    clock.destroy();
}

#[test]
fn a_task_scheduled_from_inside_an_action_lands_on_the_same_timeline() {
    let clock = fast_clock();
    let executor = Arc::new(VirtualExecutor::new(clock.clone()));
    let seen = Arc::new(AtomicUsize::new(0));

    let inner_executor = executor.clone();
    let inner_seen = seen.clone();
    executor
        .schedule(Duration::from_millis(100), move || {
            // Runs at 100ms; the follow-up lands at 100ms + 50ms.
            let seen = inner_seen.clone();
            inner_executor
                .schedule(Duration::from_millis(50), move || {
                    seen.fetch_add(1, Ordering::SeqCst);
                })
                .unwrap();
        })
        .unwrap();

    clock.wait_for(Duration::from_millis(150)).unwrap();
    assert_eq!(seen.load(Ordering::SeqCst), 1);
    assert_eq!(clock.now(), SimTime::from_millis(150));
}
