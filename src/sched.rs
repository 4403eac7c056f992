use std::io;
use std::mem;

use crate::error::Error;

/// Gives up the CPU via `sched_yield(2)`.
#[inline(always)]
pub fn yield_now() {
    // SAFETY: sched_yield takes no arguments and cannot fail on Linux.
    unsafe {
        libc::sched_yield();
    }
}

/// Holds the calling thread in `SCHED_FIFO` at the lowest real-time priority.
/// The previous policy and priority are restored on drop.
pub struct RealtimeGuard {
    policy: libc::c_int,
    param: libc::sched_param,
}

impl RealtimeGuard {
    pub fn acquire() -> Result<Self, Error> {
        // SAFETY: 0 selects the calling thread; `param` is a valid out-pointer.
        let policy = unsafe { libc::sched_getscheduler(0) };
        if policy < 0 {
            return Err(io::Error::last_os_error().into());
        }
        let mut param: libc::sched_param = unsafe { mem::zeroed() };
        if unsafe { libc::sched_getparam(0, &mut param) } != 0 {
            return Err(io::Error::last_os_error().into());
        }

        let priority = unsafe { libc::sched_get_priority_min(libc::SCHED_FIFO) };
        if priority < 0 {
            return Err(io::Error::last_os_error().into());
        }
        let mut fifo: libc::sched_param = unsafe { mem::zeroed() };
        fifo.sched_priority = priority;
        if unsafe { libc::sched_setscheduler(0, libc::SCHED_FIFO, &fifo) } != 0 {
            return Err(io::Error::last_os_error().into());
        }

        log::info!("running under SCHED_FIFO priority {}", priority);
        Ok(RealtimeGuard { policy, param })
    }
}

impl Drop for RealtimeGuard {
    fn drop(&mut self) {
        // SAFETY: restores values previously read from the kernel for this thread.
        if unsafe { libc::sched_setscheduler(0, self.policy, &self.param) } != 0 {
            log::warn!(
                "cannot restore scheduling policy {}: {}",
                self.policy,
                io::Error::last_os_error()
            );
        }
    }
}

/// Pins the calling thread (and anything it spawns or forks afterwards) to a
/// single CPU. The previous mask is restored on drop.
pub struct AffinityGuard {
    previous: libc::cpu_set_t,
}

impl AffinityGuard {
    pub fn pin(cpu: usize) -> Result<Self, Error> {
        if cpu >= libc::CPU_SETSIZE as usize {
            return Err(Error::InvalidArgs(format!("cpu {} out of range", cpu)));
        }

        let mut previous: libc::cpu_set_t = unsafe { mem::zeroed() };
        // SAFETY: the set pointer and size describe a valid cpu_set_t.
        let ret = unsafe {
            libc::sched_getaffinity(0, mem::size_of::<libc::cpu_set_t>(), &mut previous)
        };
        if ret != 0 {
            return Err(io::Error::last_os_error().into());
        }

        let mut wanted: libc::cpu_set_t = unsafe { mem::zeroed() };
        unsafe { libc::CPU_SET(cpu, &mut wanted) };
        let ret =
            unsafe { libc::sched_setaffinity(0, mem::size_of::<libc::cpu_set_t>(), &wanted) };
        if ret != 0 {
            return Err(Error::InvalidArgs(format!(
                "cannot pin to cpu {}: {}",
                cpu,
                io::Error::last_os_error()
            )));
        }

        log::info!("pinned to cpu {}", cpu);
        Ok(AffinityGuard { previous })
    }
}

impl Drop for AffinityGuard {
    fn drop(&mut self) {
        // SAFETY: restores a mask previously returned by sched_getaffinity.
        let ret = unsafe {
            libc::sched_setaffinity(0, mem::size_of::<libc::cpu_set_t>(), &self.previous)
        };
        if ret != 0 {
            log::warn!("cannot restore cpu affinity: {}", io::Error::last_os_error());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn current_cpu() -> Option<usize> {
        let cpu = unsafe { libc::sched_getcpu() };
        usize::try_from(cpu).ok()
    }

    fn current_mask() -> libc::cpu_set_t {
        let mut set: libc::cpu_set_t = unsafe { mem::zeroed() };
        unsafe { libc::sched_getaffinity(0, mem::size_of::<libc::cpu_set_t>(), &mut set) };
        set
    }

    fn first_allowed_cpu() -> usize {
        let set = current_mask();
        (0..libc::CPU_SETSIZE as usize)
            .find(|&cpu| unsafe { libc::CPU_ISSET(cpu, &set) })
            .unwrap()
    }

    #[test]
    fn test_affinity_pin_and_restore() {
        // Runs on its own thread so the test harness thread keeps its mask.
        std::thread::spawn(|| {
            let before = current_mask();
            let cpu = first_allowed_cpu();
            {
                let _guard = AffinityGuard::pin(cpu).unwrap();
                assert_eq!(current_cpu(), Some(cpu));
                let pinned = current_mask();
                assert_eq!(unsafe { libc::CPU_COUNT(&pinned) }, 1);
            }
            let after = current_mask();
            assert!(unsafe { libc::CPU_EQUAL(&before, &after) });
        })
        .join()
        .unwrap();
    }

    #[test]
    fn test_affinity_out_of_range() {
        let result = AffinityGuard::pin(libc::CPU_SETSIZE as usize);
        assert!(matches!(result, Err(Error::InvalidArgs(_))));
    }

    #[test]
    fn test_realtime_restores_policy() {
        std::thread::spawn(|| {
            let before = unsafe { libc::sched_getscheduler(0) };
            match RealtimeGuard::acquire() {
                Ok(guard) => {
                    assert_eq!(unsafe { libc::sched_getscheduler(0) }, libc::SCHED_FIFO);
                    drop(guard);
                }
                // Unprivileged: the request is refused and nothing changes.
                Err(e) => assert!(matches!(e, Error::Io(_))),
            }
            assert_eq!(unsafe { libc::sched_getscheduler(0) }, before);
        })
        .join()
        .unwrap();
    }
}
