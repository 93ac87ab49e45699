//! Emulator configuration, loadable from a TOML file and overridable from the
//! command line.
use std::path::Path;

use serde::{Deserialize, Serialize};
use sloggers::types::Severity;

use crate::error::Error;

pub const DEFAULT_CPU_HZ: u32 = 540;
pub const DEFAULT_TIMER_HZ: u32 = 60;
pub const DEFAULT_DISPLAY_HZ: u32 = 60;
const MAX_CPU_HZ: u32 = 1_000_000;

/// What the scheduler does when an instruction faults.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FaultPolicy {
    #[default]
    /// Skip the faulting instruction and keep running, like most legacy
    /// interpreters. Running off the end of the program still stops.
    Permissive,
    /// Stop on the first fault.
    Strict,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// CPU cycles executed per second of emulated time.
    pub cpu_hz: u32,
    /// Delay/sound timer decrement rate.
    pub timer_hz: u32,
    /// Rate at which frames are handed to the rasterizer.
    pub display_hz: u32,
    pub fault_policy: FaultPolicy,
    /// Seed for CXKK. Entropy is used when absent.
    pub seed: Option<u64>,
    pub log_level: Severity,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            cpu_hz: DEFAULT_CPU_HZ,
            timer_hz: DEFAULT_TIMER_HZ,
            display_hz: DEFAULT_DISPLAY_HZ,
            fault_policy: FaultPolicy::default(),
            seed: None,
            log_level: Severity::Info,
        }
    }
}

impl Config {
    pub fn from_toml_str(s: &str) -> Result<Self, Error> {
        let config: Config = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| Error::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&contents)
    }

    pub fn validate(&self) -> Result<(), Error> {
        if self.cpu_hz == 0 || self.cpu_hz > MAX_CPU_HZ {
            return Err(Error::InvalidConfig(format!(
                "cpu_hz must be between 1 and {}, got {}",
                MAX_CPU_HZ, self.cpu_hz
            )));
        }
        if self.timer_hz == 0 {
            return Err(Error::InvalidConfig("timer_hz must be non-zero".into()));
        }
        if self.display_hz == 0 {
            return Err(Error::InvalidConfig("display_hz must be non-zero".into()));
        }
        Ok(())
    }
}

/// Parse a log level name as accepted on the command line.
pub fn parse_severity(s: &str) -> Result<Severity, Error> {
    match s.to_ascii_lowercase().as_str() {
        "trace" => Ok(Severity::Trace),
        "debug" => Ok(Severity::Debug),
        "info" => Ok(Severity::Info),
        "warn" | "warning" => Ok(Severity::Warning),
        "error" => Ok(Severity::Error),
        "critical" => Ok(Severity::Critical),
        other => Err(Error::InvalidConfig(format!("unknown log level {:?}", other))),
    }
}
