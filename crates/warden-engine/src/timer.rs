//! Deadline-ordered timer wheel.
//!
//! A single process-wide collection of pending callbacks, ordered by
//! absolute execution time and keyed by a monotonically increasing
//! 32-bit id. An external frame tick calls [`TimerWheel::run_frame`];
//! everything due runs on that thread, one callback at a time.
//!
//! # Reentrancy
//!
//! The collection lock is *released* while a callback runs; the
//! executing entry is tracked separately so [`kill`](TimerWheel::kill)
//! and [`reschedule`](TimerWheel::reschedule) called from inside a
//! callback keep their contract:
//!
//! - killing the currently executing timer marks it so the frame
//!   loop will not re-insert it;
//! - rescheduling the currently executing timer is a no-op.
//!
//! Callbacks carry no node handles, only tagged [`TimerValue`] user
//! data (a permission key, a group name, a user id); expiration
//! re-resolves its target, so a structure that moved or vanished in
//! the meantime simply makes the callback a no-op.

use std::collections::BTreeMap;
use std::sync::Arc;

use ahash::AHashMap;
use parking_lot::Mutex;
use warden_types::now_unix;

/// Opaque handle to a pending timer.
pub type TimerId = u32;

/// Callback invoked when a timer comes due.
pub type TimerCallback = Arc<dyn Fn(TimerId, &[TimerValue]) + Send + Sync>;

/// A tagged user-data value attached to a timer at creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimerValue {
    /// A string payload (permission line, group name).
    Str(String),
    /// An unsigned id payload (user id).
    U64(u64),
    /// A signed payload (timestamp).
    I64(i64),
}

impl TimerValue {
    /// Returns the string payload, if this is a `Str`.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the unsigned payload, if this is a `U64`.
    #[must_use]
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Self::U64(v) => Some(*v),
            _ => None,
        }
    }
}

struct TimerEntry {
    delay: i64,
    repeat: bool,
    callback: TimerCallback,
    user_data: Vec<TimerValue>,
}

struct Executing {
    id: TimerId,
    kill: bool,
}

#[derive(Default)]
struct WheelState {
    /// Due entries ordered by (execute_at, id).
    queue: BTreeMap<(i64, TimerId), TimerEntry>,
    /// id → execute_at, for O(1) kill/reschedule.
    index: AHashMap<TimerId, i64>,
    /// Set while the frame loop runs a callback.
    executing: Option<Executing>,
    next_id: TimerId,
}

/// Deadline-ordered collection of pending callbacks.
///
/// All operations are thread-safe behind one internal lock. The
/// frame tick is expected to come from a single thread; callbacks
/// run on it.
#[derive(Default)]
pub struct TimerWheel {
    state: Mutex<WheelState>,
}

impl std::fmt::Debug for TimerWheel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimerWheel")
            .field("pending", &self.len())
            .finish()
    }
}

impl TimerWheel {
    /// Creates an empty wheel.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedules a callback `delay` seconds from now and returns its
    /// id. A zero or negative delay makes the entry due on the next
    /// frame.
    pub fn create(
        &self,
        delay: i64,
        callback: TimerCallback,
        repeat: bool,
        user_data: Vec<TimerValue>,
    ) -> TimerId {
        let mut state = self.state.lock();
        let id = state.next_id;
        state.next_id = state.next_id.wrapping_add(1);
        let execute_at = now_unix() + delay;
        state.queue.insert(
            (execute_at, id),
            TimerEntry {
                delay,
                repeat,
                callback,
                user_data,
            },
        );
        state.index.insert(id, execute_at);
        id
    }

    /// Cancels a timer.
    ///
    /// If the timer is currently executing, it is marked killed: the
    /// running callback completes and the entry is not re-inserted.
    /// Killing an unknown id is a no-op.
    pub fn kill(&self, id: TimerId) {
        let mut state = self.state.lock();
        if let Some(exec) = state.executing.as_mut() {
            if exec.id == id {
                exec.kill = true;
                return;
            }
        }
        if let Some(at) = state.index.remove(&id) {
            state.queue.remove(&(at, id));
        }
    }

    /// Moves a pending timer to `now + new_delay` seconds.
    ///
    /// Rescheduling the currently executing timer, or an unknown id,
    /// is a no-op.
    pub fn reschedule(&self, id: TimerId, new_delay: i64) {
        let mut state = self.state.lock();
        if state.executing.as_ref().is_some_and(|e| e.id == id) {
            return;
        }
        let Some(at) = state.index.get(&id).copied() else {
            return;
        };
        let Some(mut entry) = state.queue.remove(&(at, id)) else {
            return;
        };
        entry.delay = new_delay;
        let execute_at = now_unix() + new_delay;
        state.queue.insert((execute_at, id), entry);
        state.index.insert(id, execute_at);
    }

    /// Runs every entry whose deadline has passed.
    ///
    /// Entries execute oldest-deadline first. The internal lock is
    /// released around each callback; repeating entries that were not
    /// killed mid-run are re-inserted at `now + delay`.
    pub fn run_frame(&self) {
        let now = now_unix();
        loop {
            let (id, entry) = {
                let mut state = self.state.lock();
                let Some((&(execute_at, id), _)) = state.queue.first_key_value() else {
                    break;
                };
                if execute_at > now {
                    break;
                }
                let entry = state
                    .queue
                    .remove(&(execute_at, id))
                    .expect("entry present under lock");
                state.index.remove(&id);
                state.executing = Some(Executing { id, kill: false });
                (id, entry)
            };

            (entry.callback)(id, &entry.user_data);

            let mut state = self.state.lock();
            let killed = state.executing.take().is_some_and(|e| e.kill);
            if entry.repeat && !killed {
                let execute_at = now + entry.delay;
                state.index.insert(id, execute_at);
                state.queue.insert((execute_at, id), entry);
            }
        }
    }

    /// Number of pending (not currently executing) timers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.lock().queue.len()
    }

    /// Returns `true` if no timers are pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns `true` if the id refers to a pending timer.
    #[must_use]
    pub fn contains(&self, id: TimerId) -> bool {
        self.state.lock().index.contains_key(&id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex as StdMutex;

    fn counting_callback(counter: Arc<AtomicUsize>) -> TimerCallback {
        Arc::new(move |_, _| {
            counter.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn due_timer_fires_once_and_is_gone() {
        let wheel = TimerWheel::new();
        let fired = Arc::new(AtomicUsize::new(0));
        let id = wheel.create(-1, counting_callback(fired.clone()), false, Vec::new());

        assert!(wheel.contains(id));
        wheel.run_frame();
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert!(!wheel.contains(id));
        assert!(wheel.is_empty());

        wheel.run_frame();
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn future_timer_does_not_fire() {
        let wheel = TimerWheel::new();
        let fired = Arc::new(AtomicUsize::new(0));
        wheel.create(3600, counting_callback(fired.clone()), false, Vec::new());

        wheel.run_frame();
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        assert_eq!(wheel.len(), 1);
    }

    #[test]
    fn due_timers_fire_in_deadline_order() {
        let wheel = TimerWheel::new();
        let order = Arc::new(StdMutex::new(Vec::new()));

        for delay in [-1_i64, -3, -2] {
            let order = order.clone();
            wheel.create(
                delay,
                Arc::new(move |_, data: &[TimerValue]| {
                    let tag = data[0].as_u64().expect("tag payload");
                    order.lock().expect("order lock").push(tag);
                }),
                false,
                vec![TimerValue::U64(delay.unsigned_abs())],
            );
        }

        wheel.run_frame();
        assert_eq!(*order.lock().expect("order lock"), vec![3, 2, 1]);
    }

    #[test]
    fn kill_pending_timer() {
        let wheel = TimerWheel::new();
        let fired = Arc::new(AtomicUsize::new(0));
        let id = wheel.create(-1, counting_callback(fired.clone()), false, Vec::new());

        wheel.kill(id);
        wheel.run_frame();
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn kill_unknown_id_is_noop() {
        let wheel = TimerWheel::new();
        wheel.kill(7777);
        assert!(wheel.is_empty());
    }

    #[test]
    fn repeat_timer_reinserts() {
        let wheel = TimerWheel::new();
        let fired = Arc::new(AtomicUsize::new(0));
        wheel.create(-1, counting_callback(fired.clone()), true, Vec::new());

        wheel.run_frame();
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        // Re-inserted at now + delay; delay is negative so it is due
        // again on the next frame.
        assert_eq!(wheel.len(), 1);
        wheel.run_frame();
        assert_eq!(fired.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn kill_from_inside_callback_stops_repeat() {
        let wheel = Arc::new(TimerWheel::new());
        let fired = Arc::new(AtomicUsize::new(0));

        let wheel2 = Arc::downgrade(&wheel);
        let fired2 = fired.clone();
        wheel.create(
            -1,
            Arc::new(move |id, _| {
                fired2.fetch_add(1, Ordering::SeqCst);
                if let Some(wheel) = wheel2.upgrade() {
                    wheel.kill(id);
                }
            }),
            true,
            Vec::new(),
        );

        wheel.run_frame();
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert!(wheel.is_empty());
    }

    #[test]
    fn create_from_inside_callback() {
        let wheel = Arc::new(TimerWheel::new());
        let fired = Arc::new(AtomicUsize::new(0));

        let wheel2 = Arc::downgrade(&wheel);
        let fired2 = fired.clone();
        wheel.create(
            -1,
            Arc::new(move |_, _| {
                fired2.fetch_add(1, Ordering::SeqCst);
                if let Some(wheel) = wheel2.upgrade() {
                    wheel.create(3600, Arc::new(|_, _| {}), false, Vec::new());
                }
            }),
            false,
            Vec::new(),
        );

        wheel.run_frame();
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert_eq!(wheel.len(), 1);
    }

    #[test]
    fn reschedule_pushes_deadline_out() {
        let wheel = TimerWheel::new();
        let fired = Arc::new(AtomicUsize::new(0));
        let id = wheel.create(-1, counting_callback(fired.clone()), false, Vec::new());

        wheel.reschedule(id, 3600);
        wheel.run_frame();
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        assert!(wheel.contains(id));
    }

    #[test]
    fn reschedule_unknown_id_is_noop() {
        let wheel = TimerWheel::new();
        wheel.reschedule(42, 10);
        assert!(wheel.is_empty());
    }

    #[test]
    fn user_data_reaches_callback() {
        let wheel = TimerWheel::new();
        let seen = Arc::new(StdMutex::new(None));

        let seen2 = seen.clone();
        wheel.create(
            -1,
            Arc::new(move |_, data: &[TimerValue]| {
                let perm = data[0].as_str().expect("perm payload").to_string();
                let user = data[1].as_u64().expect("user payload");
                *seen2.lock().expect("seen lock") = Some((perm, user));
            }),
            false,
            vec![TimerValue::Str("vip.badge".into()), TimerValue::U64(77)],
        );

        wheel.run_frame();
        assert_eq!(
            seen.lock().expect("seen lock").clone(),
            Some(("vip.badge".to_string(), 77))
        );
    }

    #[test]
    fn ids_are_monotonic() {
        let wheel = TimerWheel::new();
        let a = wheel.create(10, Arc::new(|_, _| {}), false, Vec::new());
        let b = wheel.create(10, Arc::new(|_, _| {}), false, Vec::new());
        assert!(b > a);
    }
}
