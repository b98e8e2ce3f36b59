use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::engine::{EngineSettings, ExpiryPolicy};
use crate::model::{parse_clock, Faculty, TimeRange};

/// Server configuration, read from `ROOMSLOT_*` environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub bind: String,
    pub data_dir: PathBuf,
    pub password: String,
    pub max_connections: usize,
    pub compact_threshold: u64,
    pub metrics_port: Option<u16>,
    pub tls_cert: Option<String>,
    pub tls_key: Option<String>,
    pub sweep_interval: Option<Duration>,
    pub faculty_seed: Option<PathBuf>,
    pub engine: EngineSettings,
}

#[derive(Debug)]
pub enum ConfigError {
    Invalid { var: &'static str, value: String, reason: String },
    Seed { path: PathBuf, reason: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Invalid { var, value, reason } => {
                write!(f, "invalid {var}={value:?}: {reason}")
            }
            ConfigError::Seed { path, reason } => {
                write!(f, "cannot load faculty seed {}: {reason}", path.display())
            }
        }
    }
}

impl std::error::Error for ConfigError {}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 5433,
            bind: "0.0.0.0".into(),
            data_dir: PathBuf::from("./data"),
            password: "roomslot".into(),
            max_connections: 256,
            compact_threshold: 1000,
            metrics_port: None,
            tls_cert: None,
            tls_key: None,
            sweep_interval: None,
            faculty_seed: None,
            engine: EngineSettings::default(),
        }
    }
}

fn parsed<T: std::str::FromStr>(var: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T::Err: fmt::Display,
{
    raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
        var,
        value: raw.to_string(),
        reason: e.to_string(),
    })
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup. Unset keys keep their defaults.
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut cfg = Config::default();

        if let Some(v) = get("ROOMSLOT_PORT") {
            cfg.port = parsed("ROOMSLOT_PORT", &v)?;
        }
        if let Some(v) = get("ROOMSLOT_BIND") {
            cfg.bind = v;
        }
        if let Some(v) = get("ROOMSLOT_DATA_DIR") {
            cfg.data_dir = PathBuf::from(v);
        }
        if let Some(v) = get("ROOMSLOT_PASSWORD") {
            cfg.password = v;
        }
        if let Some(v) = get("ROOMSLOT_MAX_CONNECTIONS") {
            cfg.max_connections = parsed("ROOMSLOT_MAX_CONNECTIONS", &v)?;
        }
        if let Some(v) = get("ROOMSLOT_COMPACT_THRESHOLD") {
            cfg.compact_threshold = parsed("ROOMSLOT_COMPACT_THRESHOLD", &v)?;
        }
        if let Some(v) = get("ROOMSLOT_METRICS_PORT") {
            cfg.metrics_port = Some(parsed("ROOMSLOT_METRICS_PORT", &v)?);
        }
        cfg.tls_cert = get("ROOMSLOT_TLS_CERT");
        cfg.tls_key = get("ROOMSLOT_TLS_KEY");
        if let Some(v) = get("ROOMSLOT_SWEEP_INTERVAL_SECS") {
            let secs: u64 = parsed("ROOMSLOT_SWEEP_INTERVAL_SECS", &v)?;
            cfg.sweep_interval = (secs > 0).then(|| Duration::from_secs(secs));
        }
        cfg.faculty_seed = get("ROOMSLOT_FACULTY_SEED").map(PathBuf::from);

        if let Some(v) = get("ROOMSLOT_EXPIRY_POLICY") {
            cfg.engine.expiry_policy =
                ExpiryPolicy::parse(&v).ok_or_else(|| ConfigError::Invalid {
                    var: "ROOMSLOT_EXPIRY_POLICY",
                    value: v.clone(),
                    reason: "expected delete or retain".into(),
                })?;
        }
        if let Some(v) = get("ROOMSLOT_STRICT_TIMETABLE") {
            cfg.engine.strict_timetable = parsed("ROOMSLOT_STRICT_TIMETABLE", &v)?;
        }

        let clock = |var: &'static str, v: String| {
            parse_clock(v.trim()).map_err(|e| ConfigError::Invalid {
                var,
                value: v.clone(),
                reason: e.to_string(),
            })
        };
        let start = match get("ROOMSLOT_DAY_START") {
            Some(v) => clock("ROOMSLOT_DAY_START", v)?,
            None => cfg.engine.day_window.start,
        };
        let end = match get("ROOMSLOT_DAY_END") {
            Some(v) => clock("ROOMSLOT_DAY_END", v)?,
            None => cfg.engine.day_window.end,
        };
        if start >= end {
            return Err(ConfigError::Invalid {
                var: "ROOMSLOT_DAY_END",
                value: crate::model::format_clock(end),
                reason: "day must end after it starts".into(),
            });
        }
        cfg.engine.day_window = TimeRange::new(start, end);
        if let Some(v) = get("ROOMSLOT_SLOT_MINUTES") {
            let minutes: u16 = parsed("ROOMSLOT_SLOT_MINUTES", &v)?;
            if minutes == 0 || minutes > end - start {
                return Err(ConfigError::Invalid {
                    var: "ROOMSLOT_SLOT_MINUTES",
                    value: v,
                    reason: "must be positive and fit inside the day".into(),
                });
            }
            cfg.engine.slot_minutes = minutes;
        }

        Ok(cfg)
    }

    /// Faculty directory seed, or empty when none is configured.
    pub fn load_faculty_seed(&self) -> Result<Vec<Faculty>, ConfigError> {
        match &self.faculty_seed {
            Some(path) => load_faculty_seed(path),
            None => Ok(Vec::new()),
        }
    }
}

/// Read a JSON array of `{"name": ..., "role": ...}` objects.
pub fn load_faculty_seed(path: &Path) -> Result<Vec<Faculty>, ConfigError> {
    let seed_err = |reason: String| ConfigError::Seed {
        path: path.to_path_buf(),
        reason,
    };
    let raw = std::fs::read_to_string(path).map_err(|e| seed_err(e.to_string()))?;
    serde_json::from_str(&raw).map_err(|e| seed_err(e.to_string()))
}
