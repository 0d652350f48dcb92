use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::tools::error::{PcepError, Result};

/// Polling period of the timer thread. Expirations are detected within one
/// tick of their whole-second deadline.
const TICK: Duration = Duration::from_millis(250);

struct TimerEntry<T> {
    id: i32,
    delay: Duration,
    data: T,
}

struct TimerState<T> {
    /// keyed by (absolute expire second, insertion sequence) so that equal
    /// deadlines fire in insertion order
    queue: BTreeMap<(u64, u64), TimerEntry<T>>,
    index: HashMap<i32, (u64, u64)>,
    next_id: i32,
    next_seq: u64,
}

struct TimerInner<T> {
    active: AtomicBool,
    epoch: Instant,
    state: Mutex<TimerState<T>>,
    handler: Box<dyn Fn(i32, T) + Send + Sync>,
}

///
/// One-shot soft timer service with whole-second resolution.
///
/// Timer ids are issued monotonically and wrap at `i32::MAX`; an id is never
/// re-issued while its timer is outstanding. The expire handler runs on the
/// dedicated timer thread and must not block: post an event and return.
///
pub struct TimerService<T> {
    inner: Arc<TimerInner<T>>,
    thread: Mutex<Option<std::thread::JoinHandle<()>>>,
}

impl<T> std::fmt::Debug for TimerService<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.state.lock().unwrap();
        f.debug_struct("TimerService")
            .field("active", &self.inner.active.load(Ordering::Relaxed))
            .field("outstanding", &state.queue.len())
            .finish()
    }
}

impl<T> TimerService<T>
where
    T: Send + Clone + 'static,
{
    /// Start the timer service and its thread. `handler` is invoked with
    /// `(timer_id, data)` for every expired timer.
    pub fn start<F>(handler: F) -> TimerService<T>
    where
        F: Fn(i32, T) + Send + Sync + 'static,
    {
        let inner = Arc::new(TimerInner {
            active: AtomicBool::new(true),
            epoch: Instant::now(),
            state: Mutex::new(TimerState {
                queue: BTreeMap::new(),
                index: HashMap::new(),
                next_id: 1,
                next_seq: 0,
            }),
            handler: Box::new(handler),
        });

        let loop_inner = inner.clone();
        let thread = std::thread::Builder::new()
            .name("pcep-timers".to_owned())
            .spawn(move || timer_loop(loop_inner))
            .expect("Fail to spawn the timer thread");

        TimerService {
            inner,
            thread: Mutex::new(Some(thread)),
        }
    }

    fn now_second(&self) -> u64 {
        self.inner.epoch.elapsed().as_secs()
    }

    /// Schedule a one-shot timer. `delay` is rounded up to whole seconds.
    pub fn create_timer(&self, delay: Duration, data: T) -> Result<i32> {
        if !self.inner.active.load(Ordering::SeqCst) {
            return Err(PcepError::new("Timer service is not running"));
        }

        let mut delay_secs = delay.as_secs();
        if delay.subsec_nanos() > 0 {
            delay_secs += 1;
        }

        let mut state = self.inner.state.lock().unwrap();
        let id = issue_id(&mut state);
        let key = (self.now_second() + delay_secs, state.next_seq);
        state.next_seq += 1;
        state.queue.insert(
            key,
            TimerEntry {
                id,
                delay: Duration::from_secs(delay_secs),
                data,
            },
        );
        state.index.insert(id, key);
        Ok(id)
    }

    /// Cancel an outstanding timer. false when the id already expired, was
    /// already cancelled or never existed.
    pub fn cancel_timer(&self, id: i32) -> bool {
        let mut state = self.inner.state.lock().unwrap();
        match state.index.remove(&id) {
            Some(key) => {
                state.queue.remove(&key);
                true
            }
            None => {
                log::warn!("Cancel of unknown timer id {}", id);
                false
            }
        }
    }

    /// Re-arm an outstanding timer with a fresh deadline, keeping its id and
    /// data. Removal and re-insertion happen under one lock acquisition.
    pub fn reset_timer(&self, id: i32) -> bool {
        let now = self.now_second();
        let mut state = self.inner.state.lock().unwrap();
        let key = match state.index.get(&id) {
            Some(key) => *key,
            None => {
                log::warn!("Reset of unknown timer id {}", id);
                return false;
            }
        };

        let entry = state.queue.remove(&key).unwrap();
        let new_key = (now + entry.delay.as_secs(), state.next_seq);
        state.next_seq += 1;
        state.queue.insert(new_key, entry);
        state.index.insert(id, new_key);
        true
    }

    /// Stop the service, free outstanding timers and join the thread
    pub fn stop(&self) {
        if !self.inner.active.swap(false, Ordering::SeqCst) {
            return;
        }

        if let Some(thread) = self.thread.lock().unwrap().take() {
            thread.join().ok();
        }

        let mut state = self.inner.state.lock().unwrap();
        state.queue.clear();
        state.index.clear();
    }
}

impl<T> Drop for TimerService<T> {
    fn drop(&mut self) {
        self.inner.active.store(false, Ordering::SeqCst);
        if let Some(thread) = self.thread.lock().unwrap().take() {
            thread.join().ok();
        }
    }
}

fn issue_id<T>(state: &mut TimerState<T>) -> i32 {
    loop {
        let id = state.next_id;
        state.next_id = match state.next_id {
            i32::MAX => 1,
            n => n + 1,
        };
        if !state.index.contains_key(&id) {
            return id;
        }
    }
}

fn timer_loop<T: Clone>(inner: Arc<TimerInner<T>>) {
    log::debug!("Timer thread started");
    while inner.active.load(Ordering::SeqCst) {
        std::thread::sleep(TICK);

        let now = inner.epoch.elapsed().as_secs();
        let mut expired = Vec::new();
        {
            let mut state = inner.state.lock().unwrap();
            while let Some(entry) = state.queue.first_entry() {
                if entry.key().0 > now {
                    break;
                }
                let entry = entry.remove();
                state.index.remove(&entry.id);
                expired.push(entry);
            }
        }

        // handlers run without the lock held
        for entry in expired {
            (inner.handler)(entry.id, entry.data);
        }
    }
    log::debug!("Timer thread stopped");
}
