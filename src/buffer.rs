use std::io;
use std::mem;
use std::sync::atomic::{fence, Ordering};

use crate::sched;

/// Fixed-length, zero-filled, memory-resident array of per-iteration cycle deltas.
///
/// The backing pages are touched at allocation and locked with `mlock(2)` so that
/// writes from the measured loop never take a page fault. The lock is released
/// on drop.
pub struct SampleBuffer {
    samples: Vec<u32>,
    locked: bool,
}

impl SampleBuffer {
    /// Allocates `len` zeroed samples and pins them into RAM.
    ///
    /// `EAGAIN`/`EINTR` from `mlock` are retried until the lock succeeds.
    ///
    /// Other errors are deliberately not retried, even though the pin is otherwise
    /// treated as retry-until-success. `ENOMEM` from `RLIMIT_MEMLOCK` and `EPERM`
    /// from a missing `CAP_IPC_LOCK` are permanent for this process, so retrying
    /// would block forever. The buffer is then left prefaulted but unlocked and a
    /// warning is logged.
    pub fn new(len: usize) -> Self {
        let mut samples = vec![0u32; len];
        prefault(&mut samples);

        let mut buffer = SampleBuffer {
            samples,
            locked: false,
        };
        buffer.lock();
        buffer
    }

    fn lock(&mut self) {
        if self.samples.is_empty() {
            return;
        }
        let bytes = self.samples.len() * mem::size_of::<u32>();
        loop {
            // SAFETY: the range is exactly the live allocation of `self.samples`.
            let ret = unsafe { libc::mlock(self.samples.as_ptr().cast(), bytes) };
            if ret == 0 {
                self.locked = true;
                log::debug!("locked {} bytes of sample buffer", bytes);
                return;
            }
            let err = io::Error::last_os_error();
            match err.raw_os_error() {
                Some(libc::EAGAIN) | Some(libc::EINTR) => sched::yield_now(),
                _ => {
                    log::warn!(
                        "cannot lock {} byte sample buffer ({}); samples may include page faults",
                        bytes,
                        err
                    );
                    return;
                }
            }
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    pub fn as_slice(&self) -> &[u32] {
        &self.samples
    }

    pub fn as_mut_slice(&mut self) -> &mut [u32] {
        &mut self.samples
    }
}

impl Drop for SampleBuffer {
    fn drop(&mut self) {
        if self.locked {
            let bytes = self.samples.len() * mem::size_of::<u32>();
            // SAFETY: same range that was passed to mlock.
            unsafe { libc::munlock(self.samples.as_ptr().cast(), bytes) };
        }
    }
}

/// Volatile-writes every element so the kernel backs each page before measurement.
fn prefault(samples: &mut [u32]) {
    for slot in samples.iter_mut() {
        // SAFETY: pointer is valid and aligned (derived from a live mutable ref).
        unsafe { core::ptr::write_volatile(slot, 0) };
    }
    fence(Ordering::SeqCst);
}
