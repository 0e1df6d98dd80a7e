use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;

use crate::constants::*;
use crate::Error;
use crate::Result;

/// A single setting value. Multi-valued settings read back as a comma
/// separated string, and single values split on commas when read as a list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SettingValue {
    Single(String),
    Multi(Vec<String>),
}

impl SettingValue {
    pub fn as_joined(&self) -> String {
        match self {
            SettingValue::Single(v) => v.clone(),
            SettingValue::Multi(vs) => vs.join(","),
        }
    }

    pub fn as_list(&self) -> Vec<String> {
        match self {
            SettingValue::Single(v) if v.is_empty() => vec![],
            SettingValue::Single(v) => v.split(',').map(|s| s.trim().to_string()).collect(),
            SettingValue::Multi(vs) => vs.clone(),
        }
    }
}

impl From<&str> for SettingValue {
    fn from(v: &str) -> Self {
        SettingValue::Single(v.to_string())
    }
}

impl From<String> for SettingValue {
    fn from(v: String) -> Self {
        SettingValue::Single(v)
    }
}

impl From<Vec<String>> for SettingValue {
    fn from(vs: Vec<String>) -> Self {
        SettingValue::Multi(vs)
    }
}

/// Named settings handed to the embedded subsystems. Last write wins per key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Settings {
    values: BTreeMap<String, SettingValue>,
}

impl Settings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(
        &mut self,
        key: impl Into<String>,
        value: impl Into<SettingValue>,
    ) {
        self.values.insert(key.into(), value.into());
    }

    pub fn set_values<I, S>(
        &mut self,
        key: impl Into<String>,
        values: I,
    ) where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let values = values.into_iter().map(Into::into).collect::<Vec<String>>();
        self.values.insert(key.into(), SettingValue::Multi(values));
    }

    pub fn set_i64(
        &mut self,
        key: impl Into<String>,
        value: i64,
    ) {
        self.set(key, value.to_string());
    }

    /// Overlays `other` on top of `self`.
    pub fn merge(
        &mut self,
        other: &Settings,
    ) {
        for (k, v) in &other.values {
            self.values.insert(k.clone(), v.clone());
        }
    }

    pub fn get(
        &self,
        key: &str,
    ) -> Option<&SettingValue> {
        self.values.get(key)
    }

    pub fn contains(
        &self,
        key: &str,
    ) -> bool {
        self.values.contains_key(key)
    }

    pub fn get_str(
        &self,
        key: &str,
    ) -> Option<String> {
        self.values.get(key).map(SettingValue::as_joined)
    }

    pub fn get_strings(
        &self,
        key: &str,
    ) -> Vec<String> {
        self.values.get(key).map(SettingValue::as_list).unwrap_or_default()
    }

    pub fn get_i64(
        &self,
        key: &str,
    ) -> Result<Option<i64>> {
        match self.get_str(key) {
            None => Ok(None),
            Some(raw) => raw.trim().parse::<i64>().map(Some).map_err(|e| Error::InvalidSetting {
                key: key.to_string(),
                reason: format!("{raw:?} is not an integer: {e}"),
            }),
        }
    }

    pub fn get_i64_or(
        &self,
        key: &str,
        default: i64,
    ) -> Result<i64> {
        Ok(self.get_i64(key)?.unwrap_or(default))
    }

    pub fn get_bool_or(
        &self,
        key: &str,
        default: bool,
    ) -> Result<bool> {
        match self.get_str(key) {
            None => Ok(default),
            Some(raw) => match raw.trim().to_ascii_lowercase().as_str() {
                "true" => Ok(true),
                "false" => Ok(false),
                _ => Err(Error::InvalidSetting {
                    key: key.to_string(),
                    reason: format!("{raw:?} is not a boolean"),
                }),
            },
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &SettingValue)> {
        self.values.iter()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Orchestrator defaults overlaid with the user's custom settings.
    ///
    /// Info servers are off and the client gives up after a single attempt
    /// unless the custom settings say otherwise.
    pub(crate) fn with_orchestrator_defaults(custom: &Settings) -> Settings {
        let mut merged = Settings::new();
        merged.set_i64(MASTER_INFO_PORT, INFO_PORT_DISABLED);
        merged.set_i64(REGIONSERVER_INFO_PORT, INFO_PORT_DISABLED);
        merged.set_i64(CLIENT_RETRIES_NUMBER, DEFAULT_CLIENT_RETRIES);
        merged.set_i64(CLIENT_PAUSE_MS, DEFAULT_CLIENT_PAUSE_MS);
        merged.set_i64(CLUSTER_FLUSH_INTERVAL_MS, DEFAULT_FLUSH_INTERVAL_MS);
        merged.set(CLUSTER_STORAGE_PERSISTENT, "true");
        merged.merge(custom);
        merged
    }
}
