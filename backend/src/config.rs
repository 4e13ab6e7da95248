//! Pipeline configuration.
//!
//! Defaults match the fleet the dashboard was built for. Every value can be
//! overridden from the environment (a `.env` file is honored) and then from
//! CLI flags.
//!
//! | Variable                | Values                        | Default    |
//! |-------------------------|-------------------------------|------------|
//! | `FUELBOARD_DIESEL_TAG`  | any non-empty substring       | `50A01990` |
//! | `FUELBOARD_DATE_ORDER`  | `day-first` / `month-first`   | `day-first`|
//! | `FUELBOARD_TOP_N`       | positive integer              | `10`       |

use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;

use crate::error::ConfigError;

/// Identifier fragment carried by every vehicle of the diesel fleet.
pub const DEFAULT_DIESEL_TAG: &str = "50A01990";

/// Length of the top consumers list.
pub const DEFAULT_TOP_N: usize = 10;

pub const ENV_DIESEL_TAG: &str = "FUELBOARD_DIESEL_TAG";
pub const ENV_DATE_ORDER: &str = "FUELBOARD_DATE_ORDER";
pub const ENV_TOP_N: &str = "FUELBOARD_TOP_N";

/// Which component comes first in `NN/NN/YYYY` dates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DateOrder {
    #[default]
    DayFirst,
    MonthFirst,
}

impl FromStr for DateOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('_', "-").as_str() {
            "day-first" | "dayfirst" | "dmy" => Ok(Self::DayFirst),
            "month-first" | "monthfirst" | "mdy" => Ok(Self::MonthFirst),
            other => Err(format!("expected day-first or month-first, got '{}'", other)),
        }
    }
}

/// Settings that influence normalization, derivation and projections.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineConfig {
    pub diesel_tag: String,
    pub date_order: DateOrder,
    pub top_n: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            diesel_tag: DEFAULT_DIESEL_TAG.to_string(),
            date_order: DateOrder::DayFirst,
            top_n: DEFAULT_TOP_N,
        }
    }
}

impl PipelineConfig {
    /// Load from the process environment, after reading `.env` if present.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Unset keys keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(tag) = lookup(ENV_DIESEL_TAG) {
            config = config.with_diesel_tag(tag)?;
        }

        if let Some(raw) = lookup(ENV_DATE_ORDER) {
            config.date_order = raw.parse::<DateOrder>().map_err(|message| ConfigError::InvalidValue {
                key: ENV_DATE_ORDER.to_string(),
                value: raw.clone(),
                message,
            })?;
        }

        if let Some(raw) = lookup(ENV_TOP_N) {
            config = config.with_top_n(raw.trim().parse::<usize>().map_err(|e: std::num::ParseIntError| {
                ConfigError::InvalidValue {
                    key: ENV_TOP_N.to_string(),
                    value: raw.clone(),
                    message: e.to_string(),
                }
            })?)?;
        }

        Ok(config)
    }

    pub fn with_diesel_tag(mut self, tag: impl Into<String>) -> Result<Self, ConfigError> {
        let tag = tag.into();
        if tag.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                key: ENV_DIESEL_TAG.to_string(),
                value: tag,
                message: "diesel tag must not be empty".to_string(),
            });
        }
        self.diesel_tag = tag;
        Ok(self)
    }

    pub fn with_date_order(mut self, order: DateOrder) -> Self {
        self.date_order = order;
        self
    }

    pub fn with_top_n(mut self, top_n: usize) -> Result<Self, ConfigError> {
        if top_n == 0 {
            return Err(ConfigError::InvalidValue {
                key: ENV_TOP_N.to_string(),
                value: "0".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        self.top_n = top_n;
        Ok(self)
    }
}
