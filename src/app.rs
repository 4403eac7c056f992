//! Glue shared by the three binaries: config layering, CPU pinning, emitting
//! the artifact, and mapping errors to exit codes.

use std::path::Path;
use std::process;

use crate::bench::RunResult;
use crate::cli::{BenchArgs, SwitchCli, YieldCli};
use crate::config::{self, SwitchConfig, TrapConfig, YieldConfig};
use crate::error::Error;
use crate::output;
use crate::sched::AffinityGuard;

/// Layers defaults → TOML file → CLI overrides for `timesyscall`.
pub fn build_trap_config(args: &BenchArgs) -> TrapConfig {
    let mut cfg = config::load_or_default(args.config_file.as_deref()).syscall;
    if let Some(v) = args.iterations {
        cfg.iterations = v;
    }
    if let Some(v) = args.cpu {
        cfg.cpu = Some(v);
    }
    cfg.validate();
    cfg
}

/// Layers defaults → TOML file → CLI overrides for `timetctxsw`.
pub fn build_switch_config(cli: &SwitchCli) -> SwitchConfig {
    let mut cfg = config::load_or_default(cli.bench.config_file.as_deref()).ctxsw;
    if let Some(v) = cli.bench.iterations {
        cfg.iterations = v;
    }
    if let Some(v) = cli.bench.cpu {
        cfg.cpu = Some(v);
    }
    if let Some(v) = cli.peer {
        cfg.peer = v;
    }
    if let Some(v) = cli.primitive {
        cfg.primitive = v;
    }
    cfg.validate();
    cfg
}

/// Layers defaults → TOML file → CLI overrides for `timetctxsw2`.
pub fn build_yield_config(cli: &YieldCli) -> YieldConfig {
    let mut cfg = config::load_or_default(cli.bench.config_file.as_deref()).yield_;
    if let Some(v) = cli.bench.iterations {
        cfg.iterations = v;
    }
    if let Some(v) = cli.bench.cpu {
        cfg.cpu = Some(v);
    }
    if cli.no_realtime {
        cfg.realtime = false;
    }
    cfg.validate();
    cfg
}

/// Runs one benchmark, optionally pinned to `cpu`, and writes the artifact if an
/// output path was given. Nothing is written when the run fails.
pub fn execute<F>(output: Option<&Path>, cpu: Option<usize>, run: F) -> Result<(), Error>
where
    F: FnOnce() -> Result<RunResult, Error>,
{
    let _affinity = cpu.map(AffinityGuard::pin).transpose()?;

    let result = run()?;
    log::info!(
        "{} iterations in {} ns",
        result.iterations(),
        result.elapsed_ns
    );

    match output {
        Some(path) => {
            output::write_artifact(path, &result)?;
            log::info!("wrote {}", path.display());
        }
        None => log::debug!("no output path given; discarding samples"),
    }
    Ok(())
}

/// Exits the process with the status matching `result`.
pub fn exit(result: Result<(), Error>) -> ! {
    match result {
        Ok(()) => process::exit(0),
        Err(e) => {
            log::error!("{}", e);
            log::logger().flush();
            process::exit(e.exit_code());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bench::trap::{self, Trap};
    use crate::cli::SyscallCli;
    use crate::config::{PeerKind, Primitive};
    use clap::Parser;

    struct Sentinel;

    impl Trap for Sentinel {
        fn enter(&self) -> i64 {
            -1
        }
    }

    fn temp_path(name: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("ctxbench_{}_{}", name, std::process::id()))
    }

    #[test]
    fn test_cli_overrides_defaults() {
        let cli = SyscallCli::try_parse_from(["timesyscall", "-n", "10"]).unwrap();
        let cfg = build_trap_config(&cli.bench);
        assert_eq!(cfg.iterations, 10);
        assert!(cfg.cpu.is_none());

        let cli = SwitchCli::try_parse_from(["timetctxsw", "--peer", "process"]).unwrap();
        let cfg = build_switch_config(&cli);
        assert_eq!(cfg.peer, PeerKind::Process);
        assert_eq!(cfg.primitive, Primitive::Futex);
        assert_eq!(cfg.iterations, 500_000);

        let cli = YieldCli::try_parse_from(["timetctxsw2", "--no-realtime", "-n", "0"]).unwrap();
        let cfg = build_yield_config(&cli);
        assert!(!cfg.realtime);
        assert_eq!(cfg.iterations, 1);
    }

    #[test]
    fn test_execute_writes_artifact() {
        let path = temp_path("execute.bin");
        execute(Some(&path), None, || trap::run(100, &trap::Gettid)).unwrap();
        assert_eq!(
            std::fs::metadata(&path).unwrap().len() as usize,
            output::artifact_len(100)
        );
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_execute_without_output() {
        execute(None, None, || trap::run(10, &trap::Gettid)).unwrap();
    }

    #[test]
    fn test_sanity_failure_writes_nothing() {
        let path = temp_path("sentinel.bin");
        let _ = std::fs::remove_file(&path);
        let err = execute(Some(&path), None, || trap::run(10, &Sentinel))
            .err()
            .unwrap();
        assert_eq!(err.exit_code(), 2);
        assert!(!path.exists());
    }

    #[test]
    fn test_bad_cpu_is_rejected() {
        let err = execute(None, Some(libc::CPU_SETSIZE as usize), || {
            trap::run(10, &trap::Gettid)
        })
        .err()
        .unwrap();
        assert!(matches!(err, Error::InvalidArgs(_)));
    }
}
