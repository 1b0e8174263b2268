use std::{collections::BTreeMap, fmt::Display, str::FromStr};

use crate::registry::FilterBuildError;

/// Helpers for filter factories pulling their fields out of a settings map.
///
/// Fields are removed as they are read so that `ensure_empty` can reject
/// typos and leftovers.
pub trait SettingsExt {
    fn take_required(&mut self, key: &str) -> Result<String, FilterBuildError>;

    fn take_optional(&mut self, key: &str) -> Option<String>;

    fn take_parsed<T>(&mut self, key: &str) -> Result<Option<T>, FilterBuildError>
    where
        T: FromStr,
        T::Err: Display;

    fn ensure_empty(&self) -> Result<(), FilterBuildError>;
}

impl SettingsExt for BTreeMap<String, String> {
    fn take_required(&mut self, key: &str) -> Result<String, FilterBuildError> {
        self.remove(key).ok_or_else(|| {
            tracing::error!("Missing required configuration key: '{key}'");
            FilterBuildError::MissingSetting(key.to_string())
        })
    }

    fn take_optional(&mut self, key: &str) -> Option<String> {
        self.remove(key)
    }

    fn take_parsed<T>(&mut self, key: &str) -> Result<Option<T>, FilterBuildError>
    where
        T: FromStr,
        T::Err: Display,
    {
        self.remove(key)
            .map(|raw| {
                raw.parse::<T>().map_err(|e| {
                    tracing::error!("Field '{key}' has invalid value '{raw}': {e}");
                    FilterBuildError::InvalidSetting {
                        key: key.to_string(),
                        reason: e.to_string(),
                    }
                })
            })
            .transpose()
    }

    fn ensure_empty(&self) -> Result<(), FilterBuildError> {
        if self.is_empty() {
            return Ok(());
        }

        let leftover = self.keys().cloned().collect::<Vec<_>>();
        tracing::error!("Extra keys found: {leftover:?}");
        Err(FilterBuildError::UnexpectedSettings(leftover))
    }
}
