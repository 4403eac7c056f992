use std::path::PathBuf;
use std::process;

use clap::{Args, Parser};

use crate::config::{PeerKind, Primitive};
use crate::logging::LogArgs;

#[derive(Debug, Args)]
pub struct BenchArgs {
    /// Write elapsed nanoseconds and raw cycle samples to this file
    pub output: Option<PathBuf>,

    /// Number of measured iterations
    #[arg(short = 'n', long)]
    pub iterations: Option<usize>,

    /// Pin the benchmark to this CPU for the duration of the run
    #[arg(long)]
    pub cpu: Option<usize>,

    /// Configuration file path (none is read unless given)
    #[arg(long = "config")]
    pub config_file: Option<PathBuf>,

    #[command(flatten)]
    pub log: LogArgs,
}

#[derive(Debug, Parser)]
#[command(
    name = "timesyscall",
    version,
    about = "Measure the cost of a trivial system call (gettid) in CPU cycles"
)]
pub struct SyscallCli {
    #[command(flatten)]
    pub bench: BenchArgs,
}

#[derive(Debug, Parser)]
#[command(
    name = "timetctxsw",
    version,
    about = "Measure context switches between two entities handing off a futex word"
)]
pub struct SwitchCli {
    #[command(flatten)]
    pub bench: BenchArgs,

    /// Secondary entity the word is handed to
    #[arg(long, value_enum)]
    pub peer: Option<PeerKind>,

    /// Wait/wake primitive used for the hand-off
    #[arg(long, value_enum)]
    pub primitive: Option<Primitive>,
}

#[derive(Debug, Parser)]
#[command(
    name = "timetctxsw2",
    version,
    about = "Measure sched_yield between two threads under SCHED_FIFO"
)]
pub struct YieldCli {
    #[command(flatten)]
    pub bench: BenchArgs,

    /// Stay in the normal scheduling class instead of requesting SCHED_FIFO
    #[arg(long)]
    pub no_realtime: bool,
}

/// Parses the command line. Usage errors exit with status 1, leaving 2 to the
/// syscall sanity check.
pub fn parse<P: Parser>() -> P {
    match P::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            process::exit(if e.use_stderr() { 1 } else { 0 });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_is_optional() {
        let cli = SyscallCli::try_parse_from(["timesyscall"]).unwrap();
        assert!(cli.bench.output.is_none());
        assert!(cli.bench.iterations.is_none());
    }

    #[test]
    fn test_positional_output_and_overrides() {
        let args = ["timesyscall", "-n", "10", "--cpu", "3", "out.bin"];
        let cli = SyscallCli::try_parse_from(args).unwrap();
        assert_eq!(cli.bench.output, Some(PathBuf::from("out.bin")));
        assert_eq!(cli.bench.iterations, Some(10));
        assert_eq!(cli.bench.cpu, Some(3));
    }

    #[test]
    fn test_switch_flags() {
        let args = ["timetctxsw", "--peer", "process", "--primitive", "futex"];
        let cli = SwitchCli::try_parse_from(args).unwrap();
        assert_eq!(cli.peer, Some(PeerKind::Process));
        assert_eq!(cli.primitive, Some(Primitive::Futex));
    }

    #[test]
    fn test_yield_flags() {
        let cli = YieldCli::try_parse_from(["timetctxsw2", "--no-realtime"]).unwrap();
        assert!(cli.no_realtime);
    }

    #[test]
    fn test_extra_positional_rejected() {
        assert!(SyscallCli::try_parse_from(["timesyscall", "a", "b"]).is_err());
    }
}
