use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Condvar, Mutex};

use super::WaitWake;

/// Wait/wake emulated with a mutex and condition variable, for targets without
/// a futex. Only usable between threads of one process.
///
/// The word is checked under the mutex and the waker takes the same mutex after
/// storing the new value, so a wake cannot slip in between a waiter's check and
/// its sleep.
#[derive(Default)]
pub struct CondvarWaitWake {
    sleepers: Mutex<u32>,
    cond: Condvar,
}

impl CondvarWaitWake {
    pub fn new() -> Self {
        Self::default()
    }
}

impl WaitWake for CondvarWaitWake {
    fn wait(&self, word: &AtomicU32, expected: u32) -> bool {
        let Ok(mut sleepers) = self.sleepers.lock() else {
            return false;
        };
        if word.load(Ordering::Acquire) != expected {
            return false;
        }
        *sleepers += 1;
        let mut sleepers = match self.cond.wait(sleepers) {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *sleepers -= 1;
        true
    }

    fn wake(&self, _word: &AtomicU32, count: u32) -> u32 {
        let Ok(sleepers) = self.sleepers.lock() else {
            return 0;
        };
        let woken = (*sleepers).min(count);
        if woken == *sleepers {
            self.cond.notify_all();
        } else {
            for _ in 0..woken {
                self.cond.notify_one();
            }
        }
        woken
    }
}
