use std::io;
use std::ptr::{self, NonNull};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use crate::error::Error;

/// Handle to the one 32-bit word two schedulable entities hand back and forth.
///
/// Clones refer to the same memory location. A `process_shared` word lives in a
/// `MAP_SHARED` anonymous page so that it stays shared across `fork(2)`.
#[derive(Clone)]
pub struct SharedWord {
    backing: Backing,
}

#[derive(Clone)]
enum Backing {
    Heap(Arc<AtomicU32>),
    Mapped(Arc<Mapping>),
}

struct Mapping {
    addr: NonNull<AtomicU32>,
    len: usize,
}

// SAFETY: the mapping is only accessed through `AtomicU32`.
unsafe impl Send for Mapping {}
unsafe impl Sync for Mapping {}

impl Drop for Mapping {
    fn drop(&mut self) {
        // SAFETY: addr/len are exactly what mmap returned.
        unsafe { libc::munmap(self.addr.as_ptr().cast(), self.len) };
    }
}

impl SharedWord {
    /// Word visible to threads of this process.
    pub fn new(initial: u32) -> Self {
        SharedWord {
            backing: Backing::Heap(Arc::new(AtomicU32::new(initial))),
        }
    }

    /// Word in a shared anonymous mapping, visible to children forked afterwards.
    pub fn process_shared(initial: u32) -> Result<Self, Error> {
        // SAFETY: sysconf has no preconditions.
        let page = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
        let len = usize::try_from(page).unwrap_or(4096);

        // SAFETY: anonymous mapping with no fixed address; checked for MAP_FAILED.
        let addr = unsafe {
            libc::mmap(
                ptr::null_mut(),
                len,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_SHARED | libc::MAP_ANONYMOUS,
                -1,
                0,
            )
        };
        if addr == libc::MAP_FAILED {
            return Err(io::Error::last_os_error().into());
        }
        let addr = NonNull::new(addr.cast::<AtomicU32>())
            .ok_or_else(|| Error::Peer("mmap returned null".into()))?;

        // SAFETY: the page is writable, zero-filled and suitably aligned.
        unsafe { addr.as_ptr().write(AtomicU32::new(initial)) };

        Ok(SharedWord {
            backing: Backing::Mapped(Arc::new(Mapping { addr, len })),
        })
    }

    /// The underlying atomic, for handing to a `WaitWake` implementation.
    pub fn atomic(&self) -> &AtomicU32 {
        match &self.backing {
            Backing::Heap(word) => &**word,
            // SAFETY: the mapping outlives `self` and was initialised in process_shared.
            Backing::Mapped(map) => unsafe { map.addr.as_ref() },
        }
    }

    pub fn load(&self) -> u32 {
        self.atomic().load(Ordering::Acquire)
    }

    pub fn store(&self, value: u32) {
        self.atomic().store(value, Ordering::Release)
    }

    pub fn is_process_shared(&self) -> bool {
        matches!(self.backing, Backing::Mapped(_))
    }
}
