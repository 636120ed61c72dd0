use crate::config::ConfigError;
use std::collections::HashMap;
use std::ffi::{OsStr, OsString};

/// Source of environment variables for [`crate::Config::load_from`].
///
/// Implemented for the process environment and for plain maps, so tests never
/// have to touch the real environment.
pub trait EnvSource {
    fn var_os(&self, key: &str) -> Option<OsString>;

    /// Returns the value of `key`. A value that is not valid Unicode is an
    /// error, never "unset".
    fn var(&self, key: &str) -> Result<Option<String>, ConfigError> {
        self.var_os(key)
            .map(|value| {
                value
                    .into_string()
                    .map_err(|_| ConfigError::NotUnicode { key: key.to_string() })
            })
            .transpose()
    }

    /// Returns the value of `key`, treating an empty value as unset.
    fn non_empty(&self, key: &str) -> Result<Option<String>, ConfigError> {
        Ok(self.var(key)?.filter(|value| !value.is_empty()))
    }

    fn get_or(&self, key: &str, default: &str) -> Result<String, ConfigError> {
        Ok(self.non_empty(key)?.unwrap_or_else(|| default.to_string()))
    }

    /// Only the literal strings `true` and `1` are truthy.
    fn get_bool(&self, key: &str, default: bool) -> Result<bool, ConfigError> {
        Ok(match self.non_empty(key)? {
            Some(value) => value == "true" || value == "1",
            None => default,
        })
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct ProcessEnv;

impl EnvSource for ProcessEnv {
    fn var_os(&self, key: &str) -> Option<OsString> {
        std::env::var_os(key)
    }
}

impl EnvSource for HashMap<String, String> {
    fn var_os(&self, key: &str) -> Option<OsString> {
        self.get(key).map(OsString::from)
    }
}

impl EnvSource for HashMap<OsString, OsString> {
    fn var_os(&self, key: &str) -> Option<OsString> {
        self.get(OsStr::new(key)).cloned()
    }
}
