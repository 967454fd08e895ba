use crate::timeline::DEFAULT_MIN_BAR_WIDTH;
use anyhow::{Context, Result};
use chrono::Weekday;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

pub const CONFIG_FILE: &str = "config.yml";

/// Colours handed out in turn when a project is created without one.
pub const PALETTE: [&str; 8] = [
    "#0ea5e9", "#22c55e", "#f59e0b", "#ef4444", "#a855f7", "#ec4899", "#14b8a6", "#64748b",
];

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    /// First column of the calendar grid.
    pub week_start: Weekday,
    pub timeline: TimelineConfig,
    /// Colour for projects created without one; falls back to rotating the palette.
    pub default_color: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct TimelineConfig {
    /// Percent of the month width.
    pub min_bar_width: f64,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            week_start: Weekday::Sun,
            timeline: TimelineConfig::default(),
            default_color: None,
        }
    }
}

impl Default for TimelineConfig {
    fn default() -> Self {
        TimelineConfig {
            min_bar_width: DEFAULT_MIN_BAR_WIDTH,
        }
    }
}

impl Config {
    pub fn load(dir: &Path) -> Result<Config> {
        let path = dir.join(CONFIG_FILE);
        if !path.exists() {
            return Ok(Config::default());
        }
        let data = fs::read_to_string(&path).with_context(|| format!("reading {:?}", path))?;
        let config: Config =
            serde_yaml::from_str(&data).with_context(|| format!("parsing {:?}", path))?;
        Ok(config)
    }

    pub fn save(&self, dir: &Path) -> Result<()> {
        fs::create_dir_all(dir).with_context(|| format!("creating {:?}", dir))?;
        let path = dir.join(CONFIG_FILE);
        let serialized = serde_yaml::to_string(self).context("serializing config")?;
        fs::write(&path, serialized).with_context(|| format!("writing {:?}", path))?;
        Ok(())
    }

    /// Colour to give the `n`th project when the user did not pick one.
    pub fn color_for_new_project(&self, existing: usize) -> String {
        self.default_color
            .clone()
            .unwrap_or_else(|| PALETTE[existing % PALETTE.len()].to_string())
    }
}
