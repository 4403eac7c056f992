use std::path::Path;

use serde::Deserialize;

use crate::bench::{switch, trap, yielding};
use crate::error::Error;

/// Upper bound on any iteration count (1 GiB of samples).
pub const MAX_ITERATIONS: usize = 1 << 28;

/// What the secondary side of the context-switch benchmark is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum PeerKind {
    /// A second thread in this process
    Thread,
    /// A forked child sharing the word through a shared mapping
    Process,
}

/// Wait/wake implementation used for the hand-off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Primitive {
    /// Linux futex(2)
    Futex,
    /// Mutex + condition variable emulation (thread peer only)
    Condvar,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TrapConfig {
    pub iterations: usize,
    pub cpu: Option<usize>,
}

impl Default for TrapConfig {
    fn default() -> Self {
        Self {
            iterations: trap::DEFAULT_ITERATIONS,
            cpu: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SwitchConfig {
    pub iterations: usize,
    pub cpu: Option<usize>,
    pub peer: PeerKind,
    pub primitive: Primitive,
}

impl Default for SwitchConfig {
    fn default() -> Self {
        Self {
            iterations: switch::DEFAULT_ITERATIONS,
            cpu: None,
            peer: PeerKind::Thread,
            primitive: Primitive::Futex,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct YieldConfig {
    pub iterations: usize,
    pub cpu: Option<usize>,
    pub realtime: bool,
}

impl Default for YieldConfig {
    fn default() -> Self {
        Self {
            iterations: yielding::DEFAULT_ITERATIONS,
            cpu: None,
            realtime: true,
        }
    }
}

fn clamp_iterations(n: usize) -> usize {
    n.clamp(1, MAX_ITERATIONS)
}

impl TrapConfig {
    pub fn validate(&mut self) {
        self.iterations = clamp_iterations(self.iterations);
    }
}

impl SwitchConfig {
    pub fn validate(&mut self) {
        self.iterations = clamp_iterations(self.iterations);
    }
}

impl YieldConfig {
    pub fn validate(&mut self) {
        self.iterations = clamp_iterations(self.iterations);
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub syscall: TrapConfig,
    pub ctxsw: SwitchConfig,
    #[serde(rename = "yield")]
    pub yield_: YieldConfig,
}

/// Load configuration from a TOML file.
///
/// Only an explicitly named file is read; without one the defaults apply.
pub fn load_config(explicit_path: Option<&Path>) -> Result<Config, Error> {
    let Some(path) = explicit_path else {
        return Ok(Config::default());
    };
    if !path.exists() {
        return Err(Error::InvalidArgs(format!(
            "config file not found: {}",
            path.display()
        )));
    }

    let contents = std::fs::read_to_string(path).map_err(|e| {
        Error::InvalidArgs(format!("failed to read config {}: {}", path.display(), e))
    })?;

    let config: Config = toml::from_str(&contents).map_err(|e| {
        Error::InvalidArgs(format!("failed to parse config {}: {}", path.display(), e))
    })?;

    Ok(config)
}

/// Loads the file (if any), falling back to defaults with a warning.
pub fn load_or_default(explicit_path: Option<&Path>) -> Config {
    match load_config(explicit_path) {
        Ok(c) => c,
        Err(e) => {
            log::warn!("{}", e);
            Config::default()
        }
    }
}
