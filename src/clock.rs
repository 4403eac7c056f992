use std::io;

use crate::error::Error;

// ---------------------------------------------------------------------------
// Cycle counter
// ---------------------------------------------------------------------------

#[cfg(target_arch = "x86_64")]
mod arch {
    use core::arch::asm;

    /// Executes RDTSC. Not serializing: no fence is placed around the read.
    #[inline(always)]
    pub fn read_cycles() -> u64 {
        let lo: u32;
        let hi: u32;
        // SAFETY: RDTSC is available on every x86_64 CPU and has no side effects.
        unsafe {
            asm!(
                "rdtsc",
                out("eax") lo,
                out("edx") hi,
                options(nomem, nostack, preserves_flags),
            );
        }
        (u64::from(hi) << 32) | u64::from(lo)
    }
}

#[cfg(target_arch = "aarch64")]
mod arch {
    use core::arch::asm;

    /// Reads the virtual counter (CNTVCT_EL0).
    #[inline(always)]
    pub fn read_cycles() -> u64 {
        let value: u64;
        // SAFETY: CNTVCT_EL0 is readable from EL0 on Linux.
        unsafe {
            asm!(
                "mrs {val}, cntvct_el0",
                val = out(reg) value,
                options(nomem, nostack, preserves_flags),
            );
        }
        value
    }
}

#[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64")))]
compile_error!("ctxbench needs a user-readable cycle counter (x86_64 or aarch64)");

/// Reads the hardware cycle counter.
#[inline(always)]
pub fn cycles() -> u64 {
    arch::read_cycles()
}

/// Difference between two counter reads, saturated to the 32-bit sample width.
#[inline(always)]
pub fn cycle_delta(previous: u64, current: u64) -> u32 {
    let delta = current.wrapping_sub(previous);
    u32::try_from(delta).unwrap_or(u32::MAX)
}

// ---------------------------------------------------------------------------
// Wall clock
// ---------------------------------------------------------------------------

/// Nanoseconds on CLOCK_MONOTONIC.
pub fn wall_ns() -> Result<u64, Error> {
    let mut ts = libc::timespec {
        tv_sec: 0,
        tv_nsec: 0,
    };
    // SAFETY: `ts` is a valid, writable timespec.
    if unsafe { libc::clock_gettime(libc::CLOCK_MONOTONIC, &mut ts) } != 0 {
        return Err(Error::Clock(io::Error::last_os_error()));
    }
    Ok((ts.tv_sec as u64)
        .wrapping_mul(1_000_000_000)
        .wrapping_add(ts.tv_nsec as u64))
}
