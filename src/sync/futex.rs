use std::ptr;
use std::sync::atomic::AtomicU32;

use super::WaitWake;

/// Linux `futex(2)` wait/wake.
///
/// A private futex only matches waiters in the same address space; a word
/// shared with a forked child needs the shared variant.
#[derive(Debug, Clone, Copy)]
pub struct Futex {
    private: bool,
}

impl Futex {
    pub fn private() -> Self {
        Futex { private: true }
    }

    pub fn shared() -> Self {
        Futex { private: false }
    }

    fn op(&self, base: libc::c_int) -> libc::c_int {
        if self.private {
            base | libc::FUTEX_PRIVATE_FLAG
        } else {
            base
        }
    }
}

impl WaitWake for Futex {
    fn wait(&self, word: &AtomicU32, expected: u32) -> bool {
        // SAFETY: `word` is a live, aligned 32-bit location; no timeout.
        let ret = unsafe {
            libc::syscall(
                libc::SYS_futex,
                word.as_ptr(),
                self.op(libc::FUTEX_WAIT),
                expected,
                ptr::null::<libc::timespec>(),
                ptr::null::<u32>(),
                0,
            )
        };
        ret == 0
    }

    fn wake(&self, word: &AtomicU32, count: u32) -> u32 {
        let count = count.min(i32::MAX as u32);
        // SAFETY: `word` is a live, aligned 32-bit location.
        let ret = unsafe {
            libc::syscall(
                libc::SYS_futex,
                word.as_ptr(),
                self.op(libc::FUTEX_WAKE),
                count,
                ptr::null::<libc::timespec>(),
                ptr::null::<u32>(),
                0,
            )
        };
        u32::try_from(ret).unwrap_or(0)
    }
}
