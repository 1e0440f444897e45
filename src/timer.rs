//! Drift-tolerant countdown ticking.
//!
//! The engine remembers when it last consumed time and subtracts the full
//! elapsed amount in one step, so a stalled or suspended process catches up
//! on the next tick instead of undercounting one second per call.

use std::time::{Duration, Instant};

use crate::store::Store;

/// Advances every running task's countdown against real elapsed time.
pub struct TimerEngine {
    last_tick: Instant,
}

impl TimerEngine {
    pub fn new(now: Instant) -> Self {
        TimerEngine { last_tick: now }
    }

    /// Consume the whole seconds elapsed since the last tick and apply them
    /// to the store in a single subtraction. Returns the ids of tasks whose
    /// timer state changed, so views know what to redraw.
    ///
    /// The sub-second remainder stays banked: `last_tick` only advances by
    /// the seconds actually consumed, so frequent polling loses nothing.
    pub fn tick(&mut self, store: &mut Store, now: Instant) -> Vec<String> {
        let elapsed = now.saturating_duration_since(self.last_tick).as_secs();
        if elapsed == 0 {
            return Vec::new();
        }
        self.last_tick += Duration::from_secs(elapsed);
        store.advance_timers(elapsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::FlushHandle;
    use crate::store::{NewTask, Snapshot};

    fn store_with_running_task(minutes: u64) -> (Store, String) {
        let mut store = Store::new(
            Snapshot::new(Vec::new()),
            vec!["backlog".into(), "done".into()],
            minutes,
            FlushHandle::detached(),
        );
        let id = store
            .add_task(NewTask {
                title: "timed".into(),
                ..NewTask::default()
            })
            .unwrap()
            .id
            .clone();
        store.start_pause_timer(&id).unwrap();
        (store, id)
    }

    #[test]
    fn one_tick_subtracts_full_elapsed_time() {
        let (mut store, id) = store_with_running_task(1);
        let base = Instant::now();
        let mut engine = TimerEngine::new(base);
        let changed = engine.tick(&mut store, base + Duration::from_secs(45));
        assert_eq!(changed, vec![id.clone()]);
        assert_eq!(store.get(&id).unwrap().remaining_seconds, 15);
        assert!(store.get(&id).unwrap().timer_running);
    }

    #[test]
    fn overshoot_clamps_at_zero_and_pauses() {
        let (mut store, id) = store_with_running_task(1);
        let base = Instant::now();
        let mut engine = TimerEngine::new(base);
        store.apply_timer_preset(&id, 1).unwrap();
        store.start_pause_timer(&id).unwrap();
        store.advance_timers(57); // remaining = 3
        engine.tick(&mut store, base + Duration::from_secs(10));
        let task = store.get(&id).unwrap();
        assert_eq!(task.remaining_seconds, 0);
        assert!(!task.timer_running);
    }

    #[test]
    fn sub_second_polls_bank_the_remainder() {
        let (mut store, id) = store_with_running_task(1);
        let base = Instant::now();
        let mut engine = TimerEngine::new(base);
        // 700ms: nothing consumed, nothing reported.
        assert!(engine
            .tick(&mut store, base + Duration::from_millis(700))
            .is_empty());
        assert_eq!(store.get(&id).unwrap().remaining_seconds, 60);
        // 1.4s total: one whole second consumed, 0.4s stays banked.
        engine.tick(&mut store, base + Duration::from_millis(1400));
        assert_eq!(store.get(&id).unwrap().remaining_seconds, 59);
        // 2.1s total: another second.
        engine.tick(&mut store, base + Duration::from_millis(2100));
        assert_eq!(store.get(&id).unwrap().remaining_seconds, 58);
    }

    #[test]
    fn clock_going_nowhere_changes_nothing() {
        let (mut store, id) = store_with_running_task(1);
        let base = Instant::now();
        let mut engine = TimerEngine::new(base);
        assert!(engine.tick(&mut store, base).is_empty());
        assert_eq!(store.get(&id).unwrap().remaining_seconds, 60);
    }
}
