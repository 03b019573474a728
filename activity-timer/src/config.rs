//! Configuration for building a [`Timer`] from a YAML file or the environment.

use miette::{IntoDiagnostic, Result, WrapErr};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

use crate::format::{DefaultEndFormatter, HumanEndFormatter};
use crate::handler::{Handler, TracingHandler, WriterHandler};
use crate::timer::Timer;
use crate::timestamp::{Clock, SystemClock};

pub const ENV_ENABLED: &str = "ACTIVITY_TIMER_ENABLED";
pub const ENV_OUTPUTS: &str = "ACTIVITY_TIMER_OUTPUTS";

/// Built-in output handlers selectable from configuration
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum OutputKind {
    Tracing,
    Stderr,
    Stdout,
}

impl OutputKind {
    fn handler(self) -> Arc<dyn Handler> {
        match self {
            OutputKind::Tracing => Arc::new(TracingHandler::default()),
            OutputKind::Stderr => Arc::new(WriterHandler::stderr()),
            OutputKind::Stdout => Arc::new(WriterHandler::stdout()),
        }
    }
}

/// How `end` lines spell out the elapsed time
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EndFormat {
    /// `build (1250ms)`
    #[default]
    Millis,
    /// `build (1s 250ms)`
    Human,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerConfig {
    #[serde(skip_serializing_if = "is_true", default = "true_default")]
    pub enabled: bool,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub outputs: Vec<OutputKind>,
    #[serde(default)]
    pub end_format: EndFormat,
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            outputs: Vec::new(),
            end_format: EndFormat::default(),
        }
    }
}

fn true_default() -> bool {
    true
}

fn is_true(b: &bool) -> bool {
    *b
}

impl TimerConfig {
    pub fn from_yaml_str(contents: &str) -> Result<Self> {
        serde_yaml::from_str(contents)
            .into_diagnostic()
            .wrap_err("Failed to parse activity timer config")
    }

    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .into_diagnostic()
            .wrap_err_with(|| format!("Failed to read {}", path.display()))?;
        Self::from_yaml_str(&contents)
            .wrap_err_with(|| format!("Invalid config in {}", path.display()))
    }

    /// Apply `ACTIVITY_TIMER_ENABLED` and `ACTIVITY_TIMER_OUTPUTS` on top of `self`
    pub fn with_env_overrides(self) -> Result<Self> {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from `lookup`, which maps a variable name to its value.
    ///
    /// `ACTIVITY_TIMER_ENABLED` accepts `1/0`, `true/false`, `yes/no`, `on/off`.
    /// `ACTIVITY_TIMER_OUTPUTS` is a comma-separated list of output kinds and
    /// replaces the configured outputs.
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(value) = lookup(ENV_ENABLED) {
            self.enabled = parse_bool(&value)
                .ok_or_else(|| miette::miette!("{ENV_ENABLED}: expected a boolean, got {value:?}"))?;
        }

        if let Some(value) = lookup(ENV_OUTPUTS) {
            self.outputs = value
                .split(',')
                .map(str::trim)
                .filter(|kind| !kind.is_empty())
                .map(|kind| {
                    kind.parse::<OutputKind>()
                        .into_diagnostic()
                        .wrap_err_with(|| format!("{ENV_OUTPUTS}: unknown output {kind:?}"))
                })
                .collect::<Result<_>>()?;
        }

        Ok(self)
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

impl Timer {
    /// Build a system-clock timer with the configured outputs and end format
    pub fn from_config(config: &TimerConfig) -> Self {
        Self::from_config_with_clock(config, Arc::new(SystemClock))
    }

    pub fn from_config_with_clock(config: &TimerConfig, clock: Arc<dyn Clock>) -> Self {
        let timer = Timer::with_clock(clock);
        if !config.enabled {
            timer.disable();
        }
        timer.set_output_handlers(config.outputs.iter().map(|kind| kind.handler()).collect());
        match config.end_format {
            EndFormat::Millis => timer.set_end_formatter(DefaultEndFormatter),
            EndFormat::Human => timer.set_end_formatter(HumanEndFormatter),
        }
        timer
    }
}
