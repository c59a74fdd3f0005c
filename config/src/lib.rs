//! Scenario files for evcheck.
//!
//! A scenario is a TOML document describing one checker run: its limits,
//! the expectation set, where events come from, and the commands run as
//! setup, workload and cleanup.
//!
//! ```toml
//! [checker]
//! name = "labels"
//! event_limit = 5000
//! time_limit_secs = 300
//! namespaces = ["labels"]
//!
//! [[expect]]
//! process = "redis"
//! attributes = { app = { exact = "redis-cart" }, pod-template-hash = { regex = "[a-f0-9]+" } }
//!
//! [events]
//! source = "command"
//! command = ["tetra", "getevents", "-o", "json"]
//!
//! [workload]
//! command = ["helm", "install", "boutique", "./chart"]
//! attempts = 3
//!
//! [cleanup]
//! commands = [["helm", "uninstall", "boutique"]]
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use evcheck_engine::{CheckerLimits, DEFAULT_EVENT_LIMIT, DEFAULT_TIME_LIMIT};
use evcheck_runner::{CommandSpec, DEFAULT_ATTEMPTS, DEFAULT_WAIT_TIMEOUT, RunDefaults};
use evcheck_types::{
    AttributePattern, EventKind, ExpectationSet, ExpectedEventPattern, PatternError,
};

/// Scenario file looked up in the working directory when none is given.
pub const DEFAULT_CONFIG_FILE: &str = "evcheck.toml";

const EXPECT_REQUIRED: &str = "at least one [[expect]] entry is required";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("invalid expectation #{index} in {}: {source}", path.display())]
    Pattern {
        path: PathBuf,
        index: usize,
        source: PatternError,
    },
    #[error("invalid {field} in {}: {reason}", path.display())]
    Invalid {
        path: PathBuf,
        field: String,
        reason: String,
    },
}

impl ConfigError {
    pub fn path(&self) -> &Path {
        match self {
            ConfigError::Read { path, .. }
            | ConfigError::Parse { path, .. }
            | ConfigError::Pattern { path, .. }
            | ConfigError::Invalid { path, .. } => path,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ScenarioConfig {
    #[serde(default)]
    pub checker: CheckerConfig,
    #[serde(default)]
    pub expect: Vec<ExpectConfig>,
    #[serde(default)]
    pub events: EventsConfig,
    pub workload: Option<WorkloadConfig>,
    #[serde(default)]
    pub setup: CommandListConfig,
    #[serde(default)]
    pub cleanup: CommandListConfig,
    #[serde(skip)]
    path: PathBuf,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct CheckerConfig {
    pub name: String,
    pub event_limit: u64,
    pub time_limit_secs: u64,
    /// How long the workload waits for the checker to start listening.
    pub wait_timeout_secs: u64,
    /// Only events from these namespaces are considered. Empty means all.
    pub namespaces: Vec<String>,
    pub export_dir: Option<PathBuf>,
}

impl Default for CheckerConfig {
    fn default() -> Self {
        Self {
            name: "evcheck".to_string(),
            event_limit: DEFAULT_EVENT_LIMIT,
            time_limit_secs: DEFAULT_TIME_LIMIT.as_secs(),
            wait_timeout_secs: DEFAULT_WAIT_TIMEOUT.as_secs(),
            namespaces: Vec::new(),
            export_dir: None,
        }
    }
}

/// One `[[expect]]` entry.
#[derive(Debug, Clone, Deserialize)]
pub struct ExpectConfig {
    #[serde(default = "default_kind")]
    pub kind: String,
    pub process: String,
    #[serde(default)]
    pub attributes: BTreeMap<String, AttributeConfig>,
}

fn default_kind() -> String {
    EventKind::ProcessExec.as_str().to_string()
}

/// `{ exact = "..." }` or `{ regex = "..." }`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeConfig {
    Exact(String),
    Regex(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum EventsConfig {
    /// JSON lines read from a file.
    File { path: PathBuf },
    /// JSON lines read from standard input.
    #[default]
    Stdin,
    /// JSON lines read from the stdout of a child process.
    Command { command: Vec<String> },
}

#[derive(Debug, Clone, Deserialize)]
pub struct WorkloadConfig {
    pub command: Vec<String>,
    #[serde(default = "default_attempts")]
    pub attempts: u32,
}

const fn default_attempts() -> u32 {
    DEFAULT_ATTEMPTS
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CommandListConfig {
    #[serde(default)]
    pub commands: Vec<Vec<String>>,
}

impl ScenarioConfig {
    /// Read, parse and validate a scenario file. Relative paths inside the
    /// file are resolved against the file's directory.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref().to_path_buf();
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(err) => {
                tracing::warn!("Failed to read scenario at {:?}: {}", path, err);
                return Err(ConfigError::Read { path, source: err });
            }
        };
        Self::parse(&content, path)
    }

    /// Parse and validate scenario text as if it had been read from `path`.
    pub fn parse(content: &str, path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let mut config: Self = match toml::from_str(content) {
            Ok(config) => config,
            Err(err) => {
                tracing::warn!("Failed to parse scenario at {:?}: {}", path, err);
                return Err(ConfigError::Parse { path, source: err });
            }
        };
        config.path = path;
        config.resolve_relative_paths();
        config.validate()?;
        Ok(config)
    }

    /// File this scenario was loaded from.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Apply per-run overrides (command line flags) on top of the file.
    pub fn override_limits(&mut self, event_limit: Option<u64>, time_limit_secs: Option<u64>) {
        if let Some(event_limit) = event_limit {
            self.checker.event_limit = event_limit;
        }
        if let Some(secs) = time_limit_secs {
            self.checker.time_limit_secs = secs;
        }
    }

    /// Compile the `[[expect]]` entries.
    pub fn expectation_set(&self) -> Result<ExpectationSet, ConfigError> {
        let mut patterns = Vec::with_capacity(self.expect.len());
        for (index, entry) in self.expect.iter().enumerate() {
            patterns.push(self.compile_entry(index, entry)?);
        }
        ExpectationSet::new(patterns).map_err(|_| self.invalid("expect".into(), EXPECT_REQUIRED.into()))
    }

    #[must_use]
    pub fn limits(&self) -> CheckerLimits {
        CheckerLimits::default()
            .with_event_limit(self.checker.event_limit)
            .with_time_limit(Duration::from_secs(self.checker.time_limit_secs))
    }

    #[must_use]
    pub fn run_defaults(&self) -> RunDefaults {
        RunDefaults {
            limits: self.limits(),
            wait_timeout: Duration::from_secs(self.checker.wait_timeout_secs),
            workload_attempts: self
                .workload
                .as_ref()
                .map_or(DEFAULT_ATTEMPTS, |workload| workload.attempts),
            namespaces: self.checker.namespaces.clone(),
            export_dir: self.checker.export_dir.clone(),
        }
    }

    pub fn workload_command(&self) -> Result<Option<CommandSpec>, ConfigError> {
        self.workload
            .as_ref()
            .map(|workload| self.command("workload.command", &workload.command))
            .transpose()
    }

    pub fn setup_commands(&self) -> Result<Vec<CommandSpec>, ConfigError> {
        self.command_list("setup", &self.setup)
    }

    pub fn cleanup_commands(&self) -> Result<Vec<CommandSpec>, ConfigError> {
        self.command_list("cleanup", &self.cleanup)
    }

    fn compile_entry(
        &self,
        index: usize,
        entry: &ExpectConfig,
    ) -> Result<ExpectedEventPattern, ConfigError> {
        let pattern_error = |source| ConfigError::Pattern {
            path: self.path.clone(),
            index,
            source,
        };
        let Some(kind) = EventKind::parse(&entry.kind) else {
            return Err(self.invalid(
                format!("expect[{index}].kind"),
                format!("unknown event kind '{}'", entry.kind),
            ));
        };
        let mut pattern = ExpectedEventPattern::new(kind, entry.process.clone()).map_err(pattern_error)?;
        for (key, attribute) in &entry.attributes {
            let matcher = match attribute {
                AttributeConfig::Exact(value) => AttributePattern::exact(value.clone()),
                AttributeConfig::Regex(source) => {
                    AttributePattern::regex(source).map_err(pattern_error)?
                }
            };
            pattern = pattern
                .with_attribute(key.clone(), matcher)
                .map_err(pattern_error)?;
        }
        Ok(pattern)
    }

    fn command(&self, field: &str, argv: &[String]) -> Result<CommandSpec, ConfigError> {
        CommandSpec::new(argv.iter().cloned()).map_err(|e| self.invalid(field.to_string(), e.to_string()))
    }

    fn command_list(
        &self,
        section: &str,
        list: &CommandListConfig,
    ) -> Result<Vec<CommandSpec>, ConfigError> {
        list.commands
            .iter()
            .enumerate()
            .map(|(i, argv)| self.command(&format!("{section}.commands[{i}]"), argv))
            .collect()
    }

    fn invalid(&self, field: String, reason: String) -> ConfigError {
        ConfigError::Invalid {
            path: self.path.clone(),
            field,
            reason,
        }
    }

    fn resolve_relative_paths(&mut self) {
        let Some(base) = self.path.parent().map(Path::to_path_buf) else {
            return;
        };
        if let EventsConfig::File { path } = &mut self.events
            && path.is_relative()
        {
            *path = base.join(&*path);
        }
        if let Some(dir) = &mut self.checker.export_dir
            && dir.is_relative()
        {
            *dir = base.join(&*dir);
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.checker.name.trim().is_empty() {
            return Err(self.invalid("checker.name".into(), "must not be empty".into()));
        }
        // The name doubles as the export file stem.
        let name = self.checker.name.as_str();
        if name.contains(['/', '\\']) || matches!(name, "." | "..") {
            return Err(self.invalid(
                "checker.name".into(),
                "must not contain path separators or be '.' or '..'".into(),
            ));
        }
        if self.checker.event_limit == 0 {
            return Err(self.invalid("checker.event_limit".into(), "must be at least 1".into()));
        }
        if self.checker.time_limit_secs == 0 {
            return Err(self.invalid("checker.time_limit_secs".into(), "must be at least 1".into()));
        }
        if self.expect.is_empty() {
            return Err(self.invalid("expect".into(), EXPECT_REQUIRED.into()));
        }
        if let EventsConfig::Command { command } = &self.events {
            self.command("events.command", command)?;
        }
        if let Some(workload) = &self.workload
            && workload.attempts == 0
        {
            return Err(self.invalid("workload.attempts".into(), "must be at least 1".into()));
        }
        self.expectation_set()?;
        self.workload_command()?;
        self.setup_commands()?;
        self.cleanup_commands()?;
        Ok(())
    }
}
