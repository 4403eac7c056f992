use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::buffer::SampleBuffer;
use crate::config::{PeerKind, Primitive};
use crate::error::Error;
use crate::sched;
use crate::sync::{CondvarWaitWake, Futex, SharedWord, WaitWake};

use super::{drive, RunResult};

pub const DEFAULT_ITERATIONS: usize = 500_000;

// Values of the shared word. Only the side whose turn it is may write it.
const PEER_TURN: u32 = 0xA;
const DRIVER_TURN: u32 = 0xB;
const STOP: u32 = 0xC;

#[derive(Debug, PartialEq, Eq)]
enum Turn {
    Mine,
    Stop,
}

/// Passes the word to `next` and wakes it.
///
/// A wake that finds no sleeper is retried after a yield for as long as the
/// other side has not yet claimed its turn.
#[inline(always)]
fn hand_off<W: WaitWake + ?Sized>(waker: &W, word: &SharedWord, next: u32) {
    word.store(next);
    while waker.wake(word.atomic(), 1) == 0 && word.load() == next {
        sched::yield_now();
    }
}

/// Blocks until the word reads `mine` (or `STOP`).
#[inline(always)]
fn await_turn<W: WaitWake + ?Sized>(waker: &W, word: &SharedWord, mine: u32) -> Turn {
    loop {
        let current = word.load();
        if current == mine {
            return Turn::Mine;
        }
        if current == STOP {
            return Turn::Stop;
        }
        if !waker.wait(word.atomic(), current) {
            sched::yield_now();
        }
    }
}

/// Mirror of the measured loop, run by the secondary entity until told to stop.
/// Makes no allocations so it is safe to run in a forked child.
fn peer_loop<W: WaitWake + ?Sized>(waker: &W, word: &SharedWord) {
    loop {
        sched::yield_now();
        if await_turn(waker, word, PEER_TURN) == Turn::Stop {
            return;
        }
        hand_off(waker, word, DRIVER_TURN);
    }
}

enum Handle {
    Thread(JoinHandle<()>),
    Process(libc::pid_t),
}

/// The secondary schedulable entity. Dropping it stops and reaps it.
struct Peer {
    word: SharedWord,
    waker: Arc<dyn WaitWake>,
    handle: Option<Handle>,
}

impl Peer {
    fn thread<W: WaitWake + 'static>(word: &SharedWord, waker: &Arc<W>) -> Result<Self, Error> {
        let peer_word = word.clone();
        let peer_waker = Arc::clone(waker);
        let handle = thread::Builder::new()
            .name("ctxsw-peer".into())
            .spawn(move || peer_loop(&*peer_waker, &peer_word))
            .map_err(|e| Error::Peer(format!("cannot spawn peer thread: {}", e)))?;
        log::debug!("peer thread started");

        Ok(Peer {
            word: word.clone(),
            waker: Arc::clone(waker) as Arc<dyn WaitWake>,
            handle: Some(Handle::Thread(handle)),
        })
    }

    fn process(word: &SharedWord, waker: &Arc<Futex>) -> Result<Self, Error> {
        if !word.is_process_shared() {
            return Err(Error::Peer("word is not in shared memory".into()));
        }

        // SAFETY: the child runs only peer_loop (atomics and raw syscalls) and
        // then _exit, so no state inherited from other threads is touched.
        let pid = unsafe { libc::fork() };
        if pid < 0 {
            return Err(Error::Peer(format!(
                "fork failed: {}",
                io::Error::last_os_error()
            )));
        }
        if pid == 0 {
            peer_loop(&**waker, word);
            unsafe { libc::_exit(0) };
        }
        log::debug!("peer process {} started", pid);

        Ok(Peer {
            word: word.clone(),
            waker: Arc::clone(waker) as Arc<dyn WaitWake>,
            handle: Some(Handle::Process(pid)),
        })
    }

    /// Stops and reaps the peer, reporting how it ended.
    fn finish(mut self) -> Result<(), Error> {
        self.shutdown()
    }

    fn shutdown(&mut self) -> Result<(), Error> {
        let Some(handle) = self.handle.take() else {
            return Ok(());
        };

        self.word.store(STOP);
        self.waker.wake(self.word.atomic(), u32::MAX);

        match handle {
            Handle::Thread(h) => h
                .join()
                .map_err(|_| Error::Peer("peer thread panicked".into())),
            Handle::Process(pid) => reap(pid),
        }
    }
}

impl Drop for Peer {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            log::warn!("{}", e);
        }
    }
}

fn reap(pid: libc::pid_t) -> Result<(), Error> {
    let mut status: libc::c_int = 0;
    loop {
        // SAFETY: `status` is a valid out-pointer; pid is our own child.
        let ret = unsafe { libc::waitpid(pid, &mut status, 0) };
        if ret == pid {
            break;
        }
        let err = io::Error::last_os_error();
        if err.raw_os_error() != Some(libc::EINTR) {
            return Err(Error::Peer(format!("waitpid({}) failed: {}", pid, err)));
        }
    }

    if libc::WIFEXITED(status) && libc::WEXITSTATUS(status) == 0 {
        Ok(())
    } else {
        Err(Error::Peer(format!(
            "peer process {} ended abnormally (status {:#x})",
            pid, status
        )))
    }
}

/// Measures `iterations` round trips of the word between this thread and a peer.
///
/// Each sample covers one hand-off to the peer and one back, so at least two
/// context switches when both sides share a CPU.
pub fn run(iterations: usize, peer: PeerKind, primitive: Primitive) -> Result<RunResult, Error> {
    match (peer, primitive) {
        (PeerKind::Thread, Primitive::Futex) => {
            let word = SharedWord::new(DRIVER_TURN);
            let waker = Arc::new(Futex::private());
            let peer = Peer::thread(&word, &waker)?;
            measure(iterations, &word, &*waker, peer)
        }
        (PeerKind::Thread, Primitive::Condvar) => {
            let word = SharedWord::new(DRIVER_TURN);
            let waker = Arc::new(CondvarWaitWake::new());
            let peer = Peer::thread(&word, &waker)?;
            measure(iterations, &word, &*waker, peer)
        }
        (PeerKind::Process, Primitive::Futex) => {
            let word = SharedWord::process_shared(DRIVER_TURN)?;
            let waker = Arc::new(Futex::shared());
            let peer = Peer::process(&word, &waker)?;
            measure(iterations, &word, &*waker, peer)
        }
        (PeerKind::Process, Primitive::Condvar) => Err(Error::InvalidArgs(
            "the condvar primitive only works with a thread peer".into(),
        )),
    }
}

fn measure<W: WaitWake + ?Sized>(
    iterations: usize,
    word: &SharedWord,
    waker: &W,
    peer: Peer,
) -> Result<RunResult, Error> {
    // Allocated after the peer exists so a forked child never shares these
    // pages copy-on-write with the measuring side.
    let mut samples = SampleBuffer::new(iterations);

    let elapsed_ns = drive(&mut samples, || {
        hand_off(waker, word, PEER_TURN);
        sched::yield_now();
        await_turn(waker, word, DRIVER_TURN);
        Ok(())
    })?;

    peer.finish()?;
    Ok(RunResult {
        elapsed_ns,
        samples,
    })
}
