pub mod condvar;
pub mod futex;
pub mod word;

use std::sync::atomic::AtomicU32;

pub use condvar::CondvarWaitWake;
pub use futex::Futex;
pub use word::SharedWord;

/// Kernel-style wait/wake on a single 32-bit word.
///
/// Both calls may return without progress; callers re-check the word and retry.
pub trait WaitWake: Send + Sync {
    /// Sleeps while `word` holds `expected`.
    ///
    /// Returns `true` if the caller actually slept and was woken, `false` if the
    /// word already differed or the call was interrupted.
    fn wait(&self, word: &AtomicU32, expected: u32) -> bool;

    /// Wakes up to `count` sleepers on `word` and returns how many were woken.
    fn wake(&self, word: &AtomicU32, count: u32) -> u32;
}
