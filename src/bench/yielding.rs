use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::buffer::SampleBuffer;
use crate::error::Error;
use crate::sched::{self, RealtimeGuard};

use super::{drive, RunResult};

pub const DEFAULT_ITERATIONS: usize = 500_000;

/// Thread that does nothing but yield, giving the measuring thread someone to
/// switch to. Stopped and joined on drop.
struct Yielder {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl Yielder {
    fn spawn() -> Result<Self, Error> {
        let stop = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&stop);
        let handle = thread::Builder::new()
            .name("yielder".into())
            .spawn(move || {
                while !flag.load(Ordering::Relaxed) {
                    sched::yield_now();
                }
            })
            .map_err(|e| Error::Peer(format!("cannot spawn yielder thread: {}", e)))?;
        Ok(Yielder {
            stop,
            handle: Some(handle),
        })
    }

    fn finish(mut self) -> Result<(), Error> {
        self.shutdown()
    }

    fn shutdown(&mut self) -> Result<(), Error> {
        let Some(handle) = self.handle.take() else {
            return Ok(());
        };
        self.stop.store(true, Ordering::Relaxed);
        handle
            .join()
            .map_err(|_| Error::Peer("yielder thread panicked".into()))
    }
}

impl Drop for Yielder {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            log::warn!("{}", e);
        }
    }
}

/// Measures `iterations` calls to `sched_yield(2)` against a second yielding thread.
///
/// With `realtime`, the calling thread first asks for `SCHED_FIFO`; the yielder is
/// spawned afterwards and inherits the same class. Refusal is logged and the run
/// continues under the normal scheduler.
pub fn run(iterations: usize, realtime: bool) -> Result<RunResult, Error> {
    let mut samples = SampleBuffer::new(iterations);

    let _realtime = if realtime {
        match RealtimeGuard::acquire() {
            Ok(guard) => Some(guard),
            Err(e) => {
                log::warn!(
                    "cannot switch to SCHED_FIFO ({}); yield timings will be noisier",
                    e
                );
                None
            }
        }
    } else {
        None
    };

    let yielder = Yielder::spawn()?;
    let elapsed_ns = drive(&mut samples, || {
        sched::yield_now();
        Ok(())
    })?;
    yielder.finish()?;

    Ok(RunResult {
        elapsed_ns,
        samples,
    })
}
