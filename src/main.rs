//! # Strata Reference Firmware
//!
//! Seven busy tasks in three priority classes:
//!
//! | Slot | Body | Class | Eligible |
//! |------|------|-------|----------|
//! | 0 | `idle_task` | 2 | ticks 0-1999 |
//! | 1-3 | `counter_1`..`counter_3` | 1 | ticks 2000-3999 |
//! | 4-6 | `counter_4`..`counter_6` | 0 | from tick 4000 |
//!
//! None of the bodies yield; every switch comes from the SysTick/PendSV
//! handoff. On a development host the same table runs on the simulated
//! core and the selection timeline is printed instead.

#![cfg_attr(target_os = "none", no_std)]
#![cfg_attr(target_os = "none", no_main)]

use core::sync::atomic::{AtomicU32, Ordering};

use strata::config::{TASK_CLASSES, TASK_COUNT};
use strata::task::{TaskEntry, TaskSpec};

// ---------------------------------------------------------------------------
// Task bodies
// ---------------------------------------------------------------------------

/// Progress of the six counting tasks, visible to a debugger.
static COUNTERS: [AtomicU32; 6] = [const { AtomicU32::new(0) }; 6];

/// Class 2: the only task that runs until the first epoch.
extern "C" fn idle_task() -> ! {
    loop {
        #[cfg(target_os = "none")]
        cortex_m::asm::wfi();
        #[cfg(not(target_os = "none"))]
        core::hint::spin_loop();
    }
}

macro_rules! counter_task {
    ($name:ident, $slot:expr) => {
        extern "C" fn $name() -> ! {
            loop {
                COUNTERS[$slot].fetch_add(1, Ordering::Relaxed);
            }
        }
    };
}

counter_task!(counter_1, 0);
counter_task!(counter_2, 1);
counter_task!(counter_3, 2);
counter_task!(counter_4, 3);
counter_task!(counter_5, 4);
counter_task!(counter_6, 5);

const ENTRIES: [TaskEntry; TASK_COUNT] = [
    idle_task, counter_1, counter_2, counter_3, counter_4, counter_5, counter_6,
];

fn task_table() -> [TaskSpec; TASK_COUNT] {
    core::array::from_fn(|i| TaskSpec::new(ENTRIES[i], TASK_CLASSES[i]))
}

// ---------------------------------------------------------------------------
// Target entry point
// ---------------------------------------------------------------------------

#[cfg(target_os = "none")]
mod firmware {
    use cortex_m::peripheral::SCB;
    use cortex_m_rt::{entry, exception, ExceptionFrame};
    use defmt_rtt as _;
    use panic_halt as _;

    use strata::{kernel, log_error, log_info};

    /// Clock tree and peripherals are brought up by the environment
    /// before this point; the tick rate assumes a 168 MHz core clock.
    #[entry]
    fn main() -> ! {
        let Some(cp) = cortex_m::Peripherals::take() else {
            kernel::halt()
        };

        if let Err(e) = kernel::init(&super::task_table()) {
            log_error!("invalid task table: {}", e);
            kernel::halt()
        }
        log_info!("task table ready");

        kernel::start(cp)
    }

    /// Terminal fault hook. The scheduler never masks or handles faults.
    #[exception]
    unsafe fn HardFault(frame: &ExceptionFrame) -> ! {
        let cfsr = (*SCB::PTR).cfsr.read();
        log_error!("hard fault: CFSR={=u32:#x} PC={=u32:#x}", cfsr, frame.pc());
        kernel::halt()
    }
}

// ---------------------------------------------------------------------------
// Host entry point
// ---------------------------------------------------------------------------

#[cfg(not(target_os = "none"))]
fn main() {
    use strata::config::{POLICY, SECOND_EPOCH};
    use strata::scheduler::Decision;
    use strata::sim::Machine;

    let mut machine = match Machine::<TASK_COUNT>::boot(POLICY, &task_table()) {
        Ok(machine) => machine,
        Err(e) => {
            eprintln!("invalid task table: {e}");
            std::process::exit(1);
        }
    };

    let mut class = machine.scheduler().active_class();
    let mut quanta = [0u32; TASK_COUNT];
    println!("tick     0: class {class} active, task {} on core", machine.on_core());

    let result = machine.run(SECOND_EPOCH + 12, |m, decision| {
        let s = m.scheduler();
        if s.active_class() != class {
            class = s.active_class();
            println!("tick {:>5}: class {class} active", s.tick_count());
        }
        if let Decision::Reschedule { from, to } = decision {
            quanta[to] += 1;
            if from != to && s.tick_count() % 1000 < 12 {
                println!("tick {:>5}: task {from} -> task {to}", s.tick_count());
            }
        }
    });

    if let Err(e) = result {
        eprintln!("trap protocol violated: {e}");
        std::process::exit(1);
    }

    for (task, count) in quanta.iter().enumerate() {
        println!("task {task} (class {}): selected {count} times", TASK_CLASSES[task]);
    }
}
