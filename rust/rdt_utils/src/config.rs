// Copyright (c) Meta Platforms, Inc. and affiliates.

// This software may be used and distributed according to the terms of the
// GNU General Public License version 2.

use std::fs;
use std::path::Path;

use anyhow::Context;
use anyhow::Result;
use log::info;
use serde::Deserialize;
use serde::Serialize;

/// MBA bandwidth value meaning "no limit", also the largest accepted.
pub const MBA_BW_UNLIMITED: u64 = u32::MAX as u64;

/// The kernel's PID_MAX_LIMIT on 64-bit hosts.
pub const PID_MAX_LIMIT: usize = 4 * 1024 * 1024;

/// Limits applied to operator input before anything is sent to the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub max_chars_name: usize,
    pub max_chars_cores: usize,
    pub max_chars_pids: usize,
    /// Highest core index accepted in a core list.
    pub max_cores: usize,
    /// Highest PID accepted in a PID list.
    pub max_pid: usize,
    /// Power profile frequency bounds in MHz.
    pub min_freq: u64,
    pub max_freq: u64,
    pub mba_bw_max: u64,
}

impl Default for Config {
    fn default() -> Self {
        get_default_config()
    }
}

/// Initialize config from first found config path, otherwise fall back to
/// the default config.
pub fn init_config() -> Result<Config> {
    if let Ok(config_path) = get_config_path() {
        info!("loading limits from {}", config_path);
        parse_config_file(&config_path)
    } else {
        Ok(get_default_config())
    }
}

pub fn parse_config_file(filepath: &str) -> Result<Config> {
    let file_content = fs::read_to_string(filepath)
        .with_context(|| format!("Failed to read config {}", filepath))?;
    parse_config_content(&file_content)
        .with_context(|| format!("Failed to parse config {}", filepath))
}

pub fn get_config_path() -> Result<String> {
    let check_paths = [
        "/etc/rdt_utils/config.toml".to_owned(),
        "/etc/rdt_utils.toml".to_owned(),
    ];
    for check_path in check_paths {
        if !Path::new(&check_path).exists() {
            continue;
        }
        return Ok(check_path);
    }

    anyhow::bail!("Failed to find config!");
}

pub fn parse_config_content(file_content: &str) -> Result<Config> {
    if file_content.is_empty() {
        anyhow::bail!("The config file is empty!")
    }
    let config: Config = toml::from_str(file_content)?;
    if config.min_freq > config.max_freq {
        anyhow::bail!(
            "min_freq ({}) cannot be greater than max_freq ({})",
            config.min_freq,
            config.max_freq
        );
    }
    Ok(config)
}

pub fn get_default_config() -> Config {
    Config {
        max_chars_name: 80,
        max_chars_cores: 4096,
        max_chars_pids: 4096,
        max_cores: 1024,
        max_pid: PID_MAX_LIMIT,
        min_freq: 400,
        max_freq: 5000,
        mba_bw_max: MBA_BW_UNLIMITED,
    }
}
