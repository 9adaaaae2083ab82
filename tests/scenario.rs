//! End-to-end runs of the reference task table on the simulated core.

use strata::config::{FIRST_EPOCH, POLICY, QUANTUM, SECOND_EPOCH, TASK_CLASSES, TASK_COUNT};
use strata::policy::{Policy, Promotion};
use strata::scheduler::Decision;
use strata::sim::{Machine, Phase};
use strata::task::{TaskSpec, TaskState};

extern "C" fn spin() -> ! {
    loop {
        core::hint::spin_loop();
    }
}

fn reference_machine() -> Machine<TASK_COUNT> {
    let specs: [TaskSpec; TASK_COUNT] =
        core::array::from_fn(|i| TaskSpec::new(spin, TASK_CLASSES[i]));
    Machine::boot(POLICY, &specs).expect("reference table boots")
}

/// Current task after every tick, indexed by tick number.
fn timeline(ticks: u64) -> Vec<usize> {
    let mut m = reference_machine();
    let mut current = vec![m.scheduler().current()];
    m.run(ticks, |m, _| current.push(m.scheduler().current()))
        .expect("handoff protocol holds");
    current
}

#[test]
fn test_class_two_runs_alone_until_first_epoch() {
    let current = timeline(FIRST_EPOCH - 1);
    assert!(current.iter().all(|&t| t == 0));
}

#[test]
fn test_class_one_round_robin_between_epochs() {
    let current = timeline(SECOND_EPOCH - 1);
    let first = FIRST_EPOCH as usize;

    assert_eq!(current[first], 1);
    assert!(current[first..].iter().all(|t| (1..=3).contains(t)));
    assert_eq!(current[first + 1], 2);
    assert_eq!(current[first + 4], 3);
    assert_eq!(current[first + 7], 1);
    assert_eq!(current[SECOND_EPOCH as usize - 1], 2);
}

#[test]
fn test_class_zero_takes_over_at_second_epoch() {
    let current = timeline(SECOND_EPOCH + 30);
    let second = SECOND_EPOCH as usize;

    assert_eq!(current[second], 4);
    assert_eq!(current[second + 2], 5);
    assert_eq!(current[second + 5], 6);
    assert_eq!(current[second + 8], 4);
    assert!(current[second..].iter().all(|t| (4..=6).contains(t)));
}

#[test]
fn test_switches_happen_only_on_reschedule_ticks() {
    let mut m = reference_machine();
    let mut last = m.scheduler().current();
    m.run(SECOND_EPOCH + 30, |m, decision| {
        let tick = m.scheduler().tick_count();
        let now = m.scheduler().current();
        if now != last {
            assert!(tick % QUANTUM as u64 == 0 || tick == FIRST_EPOCH || tick == SECOND_EPOCH);
            assert_eq!(decision, Decision::Reschedule { from: last, to: now });
        }
        last = now;
    })
    .unwrap();
}

#[test]
fn test_one_running_task_and_monotonic_ticks() {
    let mut m = reference_machine();
    let mut expected_tick = 0;
    m.run(SECOND_EPOCH + 30, |m, _| {
        let s = m.scheduler();
        expected_tick += 1;
        assert_eq!(s.tick_count(), expected_tick);
        assert_eq!(s.count_in(TaskState::Running), 1);
        assert_eq!(s.descriptor(s.current()).state(), TaskState::Running);
        assert_eq!(m.on_core(), s.current());
        assert_eq!(m.phase(), Phase::Running);
    })
    .unwrap();
}

#[test]
fn test_tasks_stay_new_until_their_epoch() {
    let mut m = reference_machine();
    m.run(FIRST_EPOCH - 1, |_, _| {}).unwrap();
    for task in 1..TASK_COUNT {
        assert_eq!(m.scheduler().descriptor(task).state(), TaskState::New);
    }

    m.run(1, |_, _| {}).unwrap();
    for task in 4..TASK_COUNT {
        assert_eq!(m.scheduler().descriptor(task).state(), TaskState::New);
    }
    assert_eq!(m.scheduler().descriptor(0).state(), TaskState::Ready);
}

#[test]
fn test_epochs_off_the_quantum_grid() {
    let policy = Policy {
        quantum: 4,
        initial_class: 2,
        promotions: [Promotion { epoch: 6, class: 1 }, Promotion { epoch: 9, class: 0 }],
    };
    let specs = [
        TaskSpec::new(spin, 2),
        TaskSpec::new(spin, 1),
        TaskSpec::new(spin, 1),
        TaskSpec::new(spin, 0),
    ];
    let mut m = Machine::<4>::boot(policy, &specs).unwrap();

    let mut decisions = Vec::new();
    m.run(12, |_, d| decisions.push(d)).unwrap();

    assert_eq!(decisions[3], Decision::Reschedule { from: 0, to: 0 });
    assert_eq!(decisions[4], Decision::Continue);
    assert_eq!(decisions[5], Decision::Reschedule { from: 0, to: 1 });
    assert_eq!(decisions[7], Decision::Reschedule { from: 1, to: 2 });
    assert_eq!(decisions[8], Decision::Reschedule { from: 2, to: 3 });
    assert_eq!(decisions[11], Decision::Reschedule { from: 3, to: 3 });
    assert_eq!(m.scheduler().active_class(), 0);
}
