//! Deduplicating deferred-task dispatcher.
//!
//! The scheduler maps an operation identity to a debounce delay and
//! guarantees at most one armed deferred execution per identity. Bursts of
//! "please run soon" signals for the same operation collapse into a single
//! firing per delay window.
//!
//! Operations are identified by a small `Copy` key (typically an enum tag)
//! rather than by callback identity; the finite set of operations a client
//! uses is declared up front.
//!
//! Misuse — declaring an operation twice, a zero delay, or scheduling an
//! undeclared operation — is a wiring bug in the caller and panics.

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::time::Duration;

/// Per-operation schedule state.
#[derive(Debug, Clone)]
struct OperationScheduleInfo {
    /// Debounce delay between a schedule request and the firing
    delay: Duration,
    /// Whether a firing is currently armed
    has_been_scheduled: bool,
    /// Deadline of the armed firing, meaningful only while armed
    run_at_ms: i64,
}

/// Maps operation identities to debounce state.
///
/// The driver arms operations with [`schedule`](Self::schedule) and
/// periodically pops expired entries with [`due`](Self::due), running each
/// popped operation itself. The armed flag is cleared when the entry is
/// popped, so a `schedule` issued while the operation runs arms the next
/// window instead of being swallowed.
pub struct OperationScheduler<Op> {
    operations: HashMap<Op, OperationScheduleInfo>,
}

impl<Op> OperationScheduler<Op>
where
    Op: Copy + Eq + Hash + fmt::Debug,
{
    /// Create a scheduler with no declared operations.
    #[must_use]
    pub fn new() -> Self {
        Self { operations: HashMap::new() }
    }

    /// Declare an operation with its debounce delay.
    ///
    /// # Panics
    ///
    /// Panics if the operation is already declared or the delay is zero.
    pub fn declare(&mut self, op: Op, delay: Duration) {
        assert!(
            !self.operations.contains_key(&op),
            "operation {op:?} already declared"
        );
        assert!(!delay.is_zero(), "delay must be positive for {op:?}");
        tracing::debug!(op = ?op, delay_ms = delay.as_millis() as u64, "declared operation");
        self.operations.insert(
            op,
            OperationScheduleInfo { delay, has_been_scheduled: false, run_at_ms: 0 },
        );
    }

    /// Change the delay of a declared operation.
    ///
    /// An already-armed firing keeps its original deadline; the new delay
    /// applies from the next `schedule`.
    ///
    /// # Panics
    ///
    /// Panics if the operation is not declared.
    pub fn change_delay(&mut self, op: Op, delay: Duration) {
        let info = self
            .operations
            .get_mut(&op)
            .unwrap_or_else(|| panic!("operation {op:?} not declared"));
        tracing::debug!(op = ?op, delay_ms = delay.as_millis() as u64, "changed delay");
        info.delay = delay;
    }

    /// Arm the operation to fire one delay from now, unless already armed.
    ///
    /// # Panics
    ///
    /// Panics if the operation is not declared.
    pub fn schedule(&mut self, op: Op, now_ms: i64) {
        let info = self
            .operations
            .get_mut(&op)
            .unwrap_or_else(|| panic!("operation {op:?} not declared"));

        if info.has_been_scheduled {
            return;
        }
        info.has_been_scheduled = true;
        info.run_at_ms = now_ms + info.delay.as_millis() as i64;
        tracing::trace!(op = ?op, run_at_ms = info.run_at_ms, "armed operation");
    }

    /// Pop every armed operation whose deadline has passed.
    ///
    /// The armed flag is cleared as the entry is popped; the caller runs the
    /// returned operations.
    pub fn due(&mut self, now_ms: i64) -> Vec<Op> {
        let mut fired = Vec::new();
        for (op, info) in &mut self.operations {
            if info.has_been_scheduled && info.run_at_ms <= now_ms {
                info.has_been_scheduled = false;
                fired.push(*op);
            }
        }
        fired
    }

    /// Whether the operation currently has an armed firing.
    #[must_use]
    pub fn is_scheduled(&self, op: Op) -> bool {
        self.operations.get(&op).is_some_and(|info| info.has_been_scheduled)
    }
}

impl<Op> Default for OperationScheduler<Op>
where
    Op: Copy + Eq + Hash + fmt::Debug,
{
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    enum TestOp {
        Flush,
        Heartbeat,
    }

    #[test]
    fn burst_of_schedules_fires_once() {
        let mut scheduler = OperationScheduler::new();
        scheduler.declare(TestOp::Flush, Duration::from_millis(100));

        for _ in 0..10 {
            scheduler.schedule(TestOp::Flush, 0);
        }

        assert!(scheduler.due(99).is_empty());
        assert_eq!(scheduler.due(100), vec![TestOp::Flush]);
        // Nothing armed after the firing is popped.
        assert!(scheduler.due(1000).is_empty());
    }

    #[test]
    fn rearm_after_pop_opens_next_window() {
        let mut scheduler = OperationScheduler::new();
        scheduler.declare(TestOp::Flush, Duration::from_millis(100));

        scheduler.schedule(TestOp::Flush, 0);
        assert_eq!(scheduler.due(100), vec![TestOp::Flush]);

        // A schedule issued while the popped operation runs arms a new
        // window from the schedule time.
        scheduler.schedule(TestOp::Flush, 100);
        assert!(scheduler.due(199).is_empty());
        assert_eq!(scheduler.due(200), vec![TestOp::Flush]);
    }

    #[test]
    fn operations_are_independent() {
        let mut scheduler = OperationScheduler::new();
        scheduler.declare(TestOp::Flush, Duration::from_millis(50));
        scheduler.declare(TestOp::Heartbeat, Duration::from_millis(200));

        scheduler.schedule(TestOp::Flush, 0);
        scheduler.schedule(TestOp::Heartbeat, 0);

        assert_eq!(scheduler.due(50), vec![TestOp::Flush]);
        assert!(scheduler.is_scheduled(TestOp::Heartbeat));
        assert_eq!(scheduler.due(200), vec![TestOp::Heartbeat]);
    }

    #[test]
    fn change_delay_applies_from_next_schedule() {
        let mut scheduler = OperationScheduler::new();
        scheduler.declare(TestOp::Flush, Duration::from_millis(100));
        scheduler.change_delay(TestOp::Flush, Duration::from_millis(10));

        scheduler.schedule(TestOp::Flush, 0);
        assert_eq!(scheduler.due(10), vec![TestOp::Flush]);
    }

    #[test]
    #[should_panic(expected = "already declared")]
    fn double_declare_panics() {
        let mut scheduler = OperationScheduler::new();
        scheduler.declare(TestOp::Flush, Duration::from_millis(100));
        scheduler.declare(TestOp::Flush, Duration::from_millis(100));
    }

    #[test]
    #[should_panic(expected = "delay must be positive")]
    fn zero_delay_panics() {
        let mut scheduler = OperationScheduler::new();
        scheduler.declare(TestOp::Flush, Duration::ZERO);
    }

    #[test]
    #[should_panic(expected = "not declared")]
    fn schedule_undeclared_panics() {
        let mut scheduler: OperationScheduler<TestOp> = OperationScheduler::new();
        scheduler.schedule(TestOp::Flush, 0);
    }
}
