//! Cooperative cancellation.
//!
//! The solvers never block on their own; a termination condition is polled
//! at the top of the search loop and a stopped search simply reports no
//! model for the current call. There is no preemption.

use std::io;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use std::time::Instant;

pub trait TerminationCondition {
    fn should_stop(&mut self) -> bool;
}

/// Never stops.
#[derive(Clone, Copy, Debug, Default)]
pub struct Indefinite;

impl TerminationCondition for Indefinite {
    fn should_stop(&mut self) -> bool {
        false
    }
}

/// Stops when a wall-clock budget is exhausted.
#[derive(Clone, Copy, Debug)]
pub struct TimeBudget {
    deadline: Instant,
}

impl TimeBudget {
    pub fn starting_now(budget: Duration) -> TimeBudget {
        TimeBudget {
            deadline: Instant::now() + budget,
        }
    }
}

impl TerminationCondition for TimeBudget {
    fn should_stop(&mut self) -> bool {
        Instant::now() >= self.deadline
    }
}

/// Stops once the process receives SIGINT; the flag is set by the signal
/// handler and observed cooperatively.
#[derive(Clone, Debug)]
pub struct OsSignal {
    triggered: Arc<AtomicBool>,
}

impl OsSignal {
    pub fn install_for_interrupt() -> io::Result<OsSignal> {
        let triggered = Arc::new(AtomicBool::new(false));
        let _ = signal_hook::flag::register(
            signal_hook::consts::SIGINT,
            Arc::clone(&triggered),
        )?;
        Ok(OsSignal { triggered })
    }
}

impl TerminationCondition for OsSignal {
    fn should_stop(&mut self) -> bool {
        self.triggered.load(Ordering::Relaxed)
    }
}
