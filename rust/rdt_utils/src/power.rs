// Copyright (c) Meta Platforms, Inc. and affiliates.

// This software may be used and distributed according to the terms of the
// GNU General Public License version 2.

use crate::config::Config;
use crate::validate::validate_name;
use crate::validate::ValidationResult;
use crate::validate::Violation;
use anyhow::bail;
use anyhow::Result;
use serde::Deserialize;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// Energy performance preference of a power profile.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Epp {
    Performance,
    #[default]
    BalancePerformance,
    BalancePower,
    Power,
}

impl Epp {
    pub const ALL: [Epp; 4] = [
        Epp::Performance,
        Epp::BalancePerformance,
        Epp::BalancePower,
        Epp::Power,
    ];

    /// The value the backend expects.
    pub fn as_str(&self) -> &'static str {
        match self {
            Epp::Performance => "performance",
            Epp::BalancePerformance => "balance_performance",
            Epp::BalancePower => "balance_power",
            Epp::Power => "power",
        }
    }

    /// The label shown to operators.
    pub fn display_str(&self) -> &'static str {
        match self {
            Epp::Performance => "Performance",
            Epp::BalancePerformance => "Balance Performance",
            Epp::BalancePower => "Balance Power",
            Epp::Power => "Power",
        }
    }
}

/// Accepts both the backend value and the display label.
impl FromStr for Epp {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Epp> {
        match Epp::ALL
            .iter()
            .find(|epp| epp.as_str() == s || epp.display_str() == s)
        {
            Some(epp) => Ok(*epp),
            None => bail!("{} is not a valid energy performance preference", s),
        }
    }
}

impl fmt::Display for Epp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_str())
    }
}

/// One entry of `GET /power_profiles`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PowerProfile {
    pub id: u64,
    pub name: String,
    pub min_freq: u64,
    pub max_freq: u64,
    pub epp: Epp,
}

/// Body of `POST /power_profiles`. Frequencies are in MHz.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewPowerProfile {
    pub name: String,
    pub min_freq: u64,
    pub max_freq: u64,
    pub epp: Epp,
}

impl NewPowerProfile {
    /// Check the profile against the configured name and frequency limits.
    pub fn validate(&self, config: &Config) -> ValidationResult {
        let mut res = validate_name(&self.name, config.max_chars_name);

        for freq in [self.min_freq, self.max_freq] {
            if freq < config.min_freq || freq > config.max_freq {
                res.push(Violation::OutOfBounds {
                    min: config.min_freq,
                    max: config.max_freq,
                });
                break;
            }
        }

        if self.min_freq > self.max_freq {
            res.push(Violation::LessThanMin);
        }
        res
    }

    pub fn build(
        name: &str,
        min_freq: u64,
        max_freq: u64,
        epp: Epp,
        config: &Config,
    ) -> Result<Self> {
        let profile = NewPowerProfile {
            name: name.to_string(),
            min_freq,
            max_freq,
            epp,
        };
        let res = profile.validate(config);
        if !res.is_valid() {
            bail!("Invalid power profile '{}': {}", name, res);
        }
        Ok(profile)
    }
}
