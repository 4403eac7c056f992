//! Iteration drivers for the three measured operations.
//!
//! All variants share one loop: perform the operation, read the cycle counter,
//! store the delta from the previous read. Each sample therefore holds one
//! operation plus the constant cost of the loop body.

pub mod switch;
pub mod trap;
pub mod yielding;

use crate::buffer::SampleBuffer;
use crate::clock;
use crate::error::Error;

/// Wall-clock total plus one cycle delta per iteration.
pub struct RunResult {
    pub elapsed_ns: u64,
    pub samples: SampleBuffer,
}

impl RunResult {
    pub fn iterations(&self) -> usize {
        self.samples.len()
    }
}

/// Runs `op` once per slot of `samples`, bracketed by two wall-clock reads.
///
/// Returns the elapsed wall-clock nanoseconds. An error from `op` aborts the loop
/// immediately.
#[inline(always)]
fn drive<F>(samples: &mut SampleBuffer, mut op: F) -> Result<u64, Error>
where
    F: FnMut() -> Result<(), Error>,
{
    let slots = samples.as_mut_slice();
    let start_ns = clock::wall_ns()?;
    let mut previous = clock::cycles();
    for slot in slots.iter_mut() {
        op()?;
        let now = clock::cycles();
        *slot = clock::cycle_delta(previous, now);
        previous = now;
    }
    let stop_ns = clock::wall_ns()?;
    Ok(stop_ns.saturating_sub(start_ns))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drive_fills_every_slot() {
        let mut samples = SampleBuffer::new(256);
        let mut calls = 0;
        let elapsed = drive(&mut samples, || {
            calls += 1;
            std::hint::black_box(calls);
            Ok(())
        })
        .unwrap();
        assert_eq!(calls, 256);
        // Total cycles cannot be zero across 256 counter reads.
        let total: u64 = samples.as_slice().iter().map(|&s| s as u64).sum();
        assert!(total > 0);
        assert!(elapsed < 10_000_000_000);
    }

    /// Generous ceiling on counter rate: 10 GHz.
    const MAX_CYCLES_PER_NS: u64 = 10;

    #[test]
    fn test_drive_cycles_bounded_by_elapsed() {
        let mut samples = SampleBuffer::new(10_000);
        let elapsed = drive(&mut samples, || {
            // SAFETY: gettid has no side effects.
            std::hint::black_box(unsafe { libc::syscall(libc::SYS_gettid) });
            Ok(())
        })
        .unwrap();
        let cycles: u64 = samples.as_slice().iter().map(|&s| s as u64).sum();
        assert!(cycles > 0);
        assert!(
            cycles / MAX_CYCLES_PER_NS <= elapsed,
            "{} cycles in {} ns",
            cycles,
            elapsed
        );
    }

    #[test]
    fn test_drive_stops_on_error() {
        let mut samples = SampleBuffer::new(10);
        let mut calls = 0;
        let result = drive(&mut samples, || {
            calls += 1;
            if calls == 4 {
                Err(Error::Implausible(0))
            } else {
                Ok(())
            }
        });
        assert!(matches!(result, Err(Error::Implausible(0))));
        assert_eq!(calls, 4);
        // Slots past the failure stay zero.
        assert!(samples.as_slice()[3..].iter().all(|&s| s == 0));
    }
}
