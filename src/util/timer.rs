//! Deadline queue for fire-and-forget delayed work.
//!
//! The queue owns its clock: callers advance it by the elapsed time of the
//! domain it measures (real or simulation seconds) and get back the payloads
//! whose deadlines passed.

/// Handle to a scheduled entry, used to cancel it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerHandle(u64);

#[derive(Debug)]
struct Entry<T> {
    handle: TimerHandle,
    deadline: f64,
    payload: T,
}

/// Ordered set of pending timers
#[derive(Debug)]
pub struct TimerQueue<T> {
    now: f64,
    next_handle: u64,
    entries: Vec<Entry<T>>,
}

impl<T> TimerQueue<T> {
    pub fn new() -> Self {
        Self {
            now: 0.0,
            next_handle: 0,
            entries: Vec::new(),
        }
    }

    /// Current clock reading in seconds
    pub fn now(&self) -> f64 {
        self.now
    }

    /// Schedule `payload` to fire `delay` seconds from now
    pub fn schedule(&mut self, delay: f32, payload: T) -> TimerHandle {
        let handle = TimerHandle(self.next_handle);
        self.next_handle += 1;

        let deadline = self.now + f64::from(delay.max(0.0));
        // Keep entries sorted by deadline, stable for equal deadlines.
        let pos = self
            .entries
            .iter()
            .position(|e| e.deadline > deadline)
            .unwrap_or(self.entries.len());
        self.entries.insert(
            pos,
            Entry {
                handle,
                deadline,
                payload,
            },
        );
        handle
    }

    /// Cancel a pending timer, returning its payload if it had not fired
    pub fn cancel(&mut self, handle: TimerHandle) -> Option<T> {
        let pos = self.entries.iter().position(|e| e.handle == handle)?;
        Some(self.entries.remove(pos).payload)
    }

    /// Whether `handle` is still pending
    pub fn is_pending(&self, handle: TimerHandle) -> bool {
        self.entries.iter().any(|e| e.handle == handle)
    }

    /// Advance the clock and drain every entry that is now due
    pub fn advance(&mut self, dt: f32) -> Vec<T> {
        self.now += f64::from(dt.max(0.0));
        let due = self
            .entries
            .iter()
            .take_while(|e| e.deadline <= self.now)
            .count();
        self.entries.drain(..due).map(|e| e.payload).collect()
    }

    /// Keep only the entries whose payload satisfies `keep`
    pub fn retain(&mut self, mut keep: impl FnMut(&T) -> bool) {
        self.entries.retain(|e| keep(&e.payload));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<T> Default for TimerQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}
