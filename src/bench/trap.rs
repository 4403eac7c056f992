use crate::buffer::SampleBuffer;
use crate::error::Error;

use super::{drive, RunResult};

pub const DEFAULT_ITERATIONS: usize = 10_000_000;

/// A side-effect-free system call whose result proves the trap happened.
pub trait Trap {
    /// Enters the kernel once and returns the raw syscall result.
    fn enter(&self) -> i64;
}

/// `gettid(2)`: always succeeds and never returns 0 or 1 for a user thread
/// (tid 1 is init).
pub struct Gettid;

impl Trap for Gettid {
    #[inline(always)]
    fn enter(&self) -> i64 {
        // SAFETY: gettid takes no arguments and has no side effects.
        unsafe { libc::syscall(libc::SYS_gettid) as i64 }
    }
}

/// Measures `iterations` consecutive traps.
pub fn run<T: Trap>(iterations: usize, trap: &T) -> Result<RunResult, Error> {
    let mut samples = SampleBuffer::new(iterations);
    let elapsed_ns = drive(&mut samples, || {
        let tid = trap.enter();
        if tid <= 1 {
            return Err(Error::Implausible(tid));
        }
        Ok(())
    })?;
    Ok(RunResult {
        elapsed_ns,
        samples,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    struct Failing;

    impl Trap for Failing {
        fn enter(&self) -> i64 {
            -1
        }
    }

    /// Returns a plausible tid until the nth call.
    struct FailsAt {
        calls: Cell<usize>,
        at: usize,
    }

    impl Trap for FailsAt {
        fn enter(&self) -> i64 {
            let n = self.calls.get() + 1;
            self.calls.set(n);
            if n == self.at {
                1
            } else {
                4242
            }
        }
    }

    #[test]
    fn test_gettid_is_plausible() {
        let tid = Gettid.enter();
        assert!(tid > 1);
        assert_eq!(tid, Gettid.enter());
    }

    #[test]
    fn test_run_fills_samples() {
        let result = run(1000, &Gettid).unwrap();
        assert_eq!(result.iterations(), 1000);
        assert!(result.elapsed_ns > 0);
        assert!(result.samples.as_slice().iter().any(|&s| s > 0));
    }

    #[test]
    fn test_run_with_ten_iterations() {
        let result = run(10, &Gettid).unwrap();
        assert_eq!(result.samples.len(), 10);
    }

    #[test]
    fn test_failing_trap_is_fatal() {
        let err = run(10, &Failing).err().unwrap();
        assert!(matches!(err, Error::Implausible(-1)));
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn test_trap_failure_mid_run() {
        let trap = FailsAt {
            calls: Cell::new(0),
            at: 5,
        };
        let err = run(100, &trap).err().unwrap();
        assert!(matches!(err, Error::Implausible(1)));
        assert_eq!(trap.calls.get(), 5);
    }
}
