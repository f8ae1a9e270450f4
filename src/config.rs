use serde::{Deserialize, Serialize};
use clap::{ArgAction, Parser, ValueHint};
use dirs_next::home_dir;
use std::{fs, path::{Path, PathBuf}, time::Duration};
use thiserror::Error;

use crate::engine::Timing;

/// Error type for config loading/validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Validation error: {0}")]
    Validation(String),
}

/// Top-level daemon configuration. Every field is optional so layers merge.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    pub log_level: Option<String>,     // e.g., "info" | "debug"
    /// native panel geometry
    pub panel: Option<PanelConfig>,
    pub timing: Option<TimingConfig>,
    /// virtual panel writes each pushed frame here as PBM
    pub snapshot_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct PanelConfig {
    pub width: Option<u32>,
    pub height: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct TimingConfig {
    pub max_partial_refreshes: Option<u32>,
    pub timeout_secs: Option<u64>,
    pub max_refresh_interval_secs: Option<u64>,
    pub touch_poll_ms: Option<u64>,
    pub supervisor_tick_ms: Option<u64>,
    pub sleep_settle_ms: Option<u64>,
}

/// CLI overrides. All fields are Options so we can layer them over YAML.
#[derive(Debug, Parser, Clone, Default)]
#[command(name = "epaperd", version, about = "E-paper panel supervisor")]
pub struct Cli {
    /// Path to a YAML config file (overrides search)
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub config: Option<PathBuf>,
    /// Enable debug log level
    #[arg(long, short = 'v', alias = "verbose", action = ArgAction::SetTrue)]
    pub debug: bool,
    #[arg(long)]
    pub log_level: Option<String>,
    #[arg(long)]
    pub panel_width: Option<u32>,
    #[arg(long)]
    pub panel_height: Option<u32>,
    #[arg(long)]
    pub max_partial_refreshes: Option<u32>,
    #[arg(long)]
    pub timeout_secs: Option<u64>,
    #[arg(long, value_hint = ValueHint::DirPath)]
    pub snapshot_dir: Option<PathBuf>,
    /// dump fully merged config (after overrides) and exit
    #[arg(long, action = ArgAction::SetTrue)]
    pub dump_config: bool,
}

/// Public entry point: read YAML, merge CLI, validate.
pub fn load(cli: &Cli) -> Result<Config, ConfigError> {
    // 1) defaults (from `Default` impl)
    let mut cfg = Config::default();

    // 2) YAML file (explicit path or search)
    if let Some(p) = cli.config.as_ref() {
        if p.exists() {
            let y = read_yaml(p)?;
            merge(&mut cfg, y);
        } else {
            return Err(ConfigError::Validation(format!(
                "Config file not found: {}",
                p.display()
            )));
        }
    } else if let Some(p) = find_config_file() {
        let y = read_yaml(&p)?;
        merge(&mut cfg, y);
    }

    // 3) CLI overrides (highest precedence)
    apply_cli_overrides(&mut cfg, cli);

    // 4) Validate
    validate(&cfg)?;

    Ok(cfg)
}

/// Pretty YAML of the effective config
pub fn dump(cfg: &Config) -> Result<String, ConfigError> {
    Ok(serde_yaml::to_string(cfg)?)
}

/// Try common locations in order (first hit wins).
fn find_config_file() -> Option<PathBuf> {
    // XDG-style: ~/.config/epaperd/config.yaml
    if let Some(home) = home_dir() {
        let p = home.join(".config/epaperd/config.yaml");
        if p.exists() { return Some(p) }
        let p = home.join(".config/epaperd.yaml");
        if p.exists() { return Some(p) }
    }
    // project local
    for candidate in &["epaperd.yaml", "config.yaml"] {
        let p = PathBuf::from(candidate);
        if p.exists() { return Some(p) }
    }
    None
}

fn read_yaml(path: &Path) -> Result<Config, ConfigError> {
    let s = fs::read_to_string(path)?;
    parse(&s)
}

fn parse(s: &str) -> Result<Config, ConfigError> {
    let cfg: Config = serde_yaml::from_str(s)?;
    Ok(cfg)
}

/// Shallow merge `src` into `dst`, Option-by-Option.
fn merge(dst: &mut Config, src: Config) {
    // top-level
    if src.log_level.is_some()      { dst.log_level = src.log_level; }
    if src.snapshot_dir.is_some()   { dst.snapshot_dir = src.snapshot_dir; }
    // panel
    match (&mut dst.panel, src.panel) {
        (None, Some(c)) => dst.panel = Some(c),
        (Some(d), Some(s)) => merge_panel(d, s),
        _ => {}
    }
    // timing
    match (&mut dst.timing, src.timing) {
        (None, Some(c)) => dst.timing = Some(c),
        (Some(d), Some(s)) => merge_timing(d, s),
        _ => {}
    }
}

fn merge_panel(dst: &mut PanelConfig, src: PanelConfig) {
    if src.width.is_some()       { dst.width = src.width; }
    if src.height.is_some()      { dst.height = src.height; }
}

fn merge_timing(dst: &mut TimingConfig, src: TimingConfig) {
    if src.max_partial_refreshes.is_some()     { dst.max_partial_refreshes = src.max_partial_refreshes; }
    if src.timeout_secs.is_some()              { dst.timeout_secs = src.timeout_secs; }
    if src.max_refresh_interval_secs.is_some() { dst.max_refresh_interval_secs = src.max_refresh_interval_secs; }
    if src.touch_poll_ms.is_some()             { dst.touch_poll_ms = src.touch_poll_ms; }
    if src.supervisor_tick_ms.is_some()        { dst.supervisor_tick_ms = src.supervisor_tick_ms; }
    if src.sleep_settle_ms.is_some()           { dst.sleep_settle_ms = src.sleep_settle_ms; }
}

fn apply_cli_overrides(cfg: &mut Config, cli: &Cli) {
    if cli.debug                     { cfg.log_level = Some("debug".to_string()); }
    if cli.log_level.is_some()       { cfg.log_level = cli.log_level.clone(); }
    if cli.snapshot_dir.is_some()    { cfg.snapshot_dir = cli.snapshot_dir.clone(); }

    if cli.panel_width.is_some() || cli.panel_height.is_some() {
        let panel = cfg.panel.get_or_insert_with(PanelConfig::default);
        if cli.panel_width.is_some()   { panel.width = cli.panel_width; }
        if cli.panel_height.is_some()  { panel.height = cli.panel_height; }
    }
    if cli.max_partial_refreshes.is_some() || cli.timeout_secs.is_some() {
        let timing = cfg.timing.get_or_insert_with(TimingConfig::default);
        if cli.max_partial_refreshes.is_some() { timing.max_partial_refreshes = cli.max_partial_refreshes; }
        if cli.timeout_secs.is_some()          { timing.timeout_secs = cli.timeout_secs; }
    }
}

/// Put any invariants here (required fields, ranges, etc.)
fn validate(cfg: &Config) -> Result<(), ConfigError> {
    if let Some(panel) = cfg.panel.as_ref() {
        if panel.width == Some(0) || panel.height == Some(0) {
            return Err(ConfigError::Validation("panel width/height must be > 0".into()));
        }
    }
    if let Some(timing) = cfg.timing.as_ref() {
        let zero = [
            ("timeout_secs", timing.timeout_secs),
            ("max_refresh_interval_secs", timing.max_refresh_interval_secs),
            ("touch_poll_ms", timing.touch_poll_ms),
            ("supervisor_tick_ms", timing.supervisor_tick_ms),
        ]
        .into_iter()
        .find(|(_, v)| *v == Some(0));
        if let Some((name, _)) = zero {
            return Err(ConfigError::Validation(format!("timing {name} must be > 0")));
        }
    }
    if let Some(level) = cfg.log_level.as_deref() {
        match level {
            "error" | "warn" | "info" | "debug" | "trace" => {},
            _ => return Err(ConfigError::Validation(format!("unknown log_level '{level}'"))),
        }
    }
    Ok(())
}

impl Config {
    pub fn log_filter(&self) -> &str {
        self.log_level.as_deref().unwrap_or("info")
    }

    /// Native panel geometry, when overridden
    pub fn panel_size(&self) -> Option<(u32, u32)> {
        let panel = self.panel.as_ref()?;
        Some((panel.width?, panel.height?))
    }

    /// Engine timing with unset fields left at their defaults
    pub fn to_timing(&self) -> Timing {
        let mut timing = Timing::default();
        let Some(t) = self.timing.as_ref() else {
            return timing;
        };
        if let Some(n) = t.max_partial_refreshes     { timing.max_partial_refreshes = n; }
        if let Some(s) = t.timeout_secs              { timing.timeout_interval = Duration::from_secs(s); }
        if let Some(s) = t.max_refresh_interval_secs { timing.max_refresh_interval = Duration::from_secs(s); }
        if let Some(ms) = t.touch_poll_ms            { timing.touch_poll_period = Duration::from_millis(ms); }
        if let Some(ms) = t.supervisor_tick_ms       { timing.supervisor_period = Duration::from_millis(ms); }
        if let Some(ms) = t.sleep_settle_ms          { timing.sleep_settle = Duration::from_millis(ms); }
        timing
    }
}
