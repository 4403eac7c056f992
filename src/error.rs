use std::fmt;
use std::io;
use std::path::PathBuf;

#[derive(Debug)]
pub enum Error {
    Io(io::Error),
    /// The monotonic wall clock could not be read.
    Clock(io::Error),
    /// The measured system call returned a value that cannot be a thread id.
    Implausible(i64),
    /// The result artifact could not be opened or written.
    Output(PathBuf, io::Error),
    InvalidArgs(String),
    /// The secondary schedulable entity could not be started or reaped.
    Peer(String),
}

impl Error {
    /// Process exit status reported for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::Implausible(_) => 2,
            _ => 1,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(e) => write!(f, "I/O error: {}", e),
            Error::Clock(e) => write!(f, "wall clock read failed: {}", e),
            Error::Implausible(v) => {
                write!(f, "sanity check failed: system call returned {}", v)
            }
            Error::Output(path, e) => {
                write!(f, "cannot write results to {}: {}", path.display(), e)
            }
            Error::InvalidArgs(msg) => write!(f, "invalid arguments: {}", msg),
            Error::Peer(msg) => write!(f, "peer error: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::Io(e)
    }
}
