use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use log::*;
use serde::Deserialize;

use crate::label_config::{LabelConfig, Slot};

pub const CONFIG_PATH: &str = "/etc/alloc-labels/config.yaml";

const ENV_PREFIX: &str = "ALLOC_LABELS_";
const DEFAULT_LOG_LEVEL: &str = "info";

#[derive(Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct Inner {
    log_level: Option<String>,

    labels: Option<LabelConfig>,
}

pub struct Config {
    inner: Inner,
}

impl Config {
    /// Loads the config file (if any) and applies `ALLOC_LABELS_*` overrides
    /// from the environment.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::load_with_env(path, |name| std::env::var(name).ok())
    }

    pub fn load_with_env<P, F>(path: P, env: F) -> Result<Self>
    where
        P: AsRef<Path>,
        F: Fn(&str) -> Option<String>,
    {
        let path = path.as_ref();
        let mut inner: Inner = match std::fs::File::open(path) {
            Ok(file) => serde_yaml::from_reader(file).with_context(|| {
                format!("Failed to parse config file at {}", path.display())
            })?,
            Err(err) => {
                if err.kind() != std::io::ErrorKind::NotFound {
                    return Err(err).with_context(|| {
                        format!("Could not open config file at {}", path.display())
                    });
                }

                // Not fatal since the config can also come from env vars
                warn!("Config file {} not found, using defaults", path.display());
                Inner::default()
            }
        };

        let labels = inner.labels.get_or_insert_with(LabelConfig::default);
        for slot in Slot::ALL {
            if let Some(val) = env_var(&env, slot.key()) {
                debug!("{slot} overridden from the environment");
                labels.set(slot, val);
            }
        }

        if let Some(level) = env_var(&env, "log_level") {
            inner.log_level = Some(level);
        }

        Ok(Self { inner })
    }

    pub fn log_level(&self) -> String {
        self.inner
            .log_level
            .clone()
            .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string())
    }

    pub fn label_config(&self) -> LabelConfig {
        self.inner.labels.clone().unwrap_or_default()
    }
}

fn env_var<F: Fn(&str) -> Option<String>>(env: &F, key: &str) -> Option<String> {
    let name = format!("{ENV_PREFIX}{}", key.to_uppercase());
    env(&name).filter(|v| !v.is_empty())
}

/// Parses a single `k=v` label. Keys and values are taken as is.
pub fn parse_label(kv: &str) -> Option<(String, String)> {
    match kv.split_once('=') {
        Some((k, v)) if !k.is_empty() => Some((k.to_string(), v.to_string())),
        _ => None,
    }
}

/// Parses a `k=v;k=v` list. Items without a `=` or a key are skipped.
pub fn parse_labels(s: &str) -> HashMap<String, String> {
    s.split(';').filter_map(parse_label).collect()
}
