//! Encrypted environment configuration.

use crate::error::{EnvError, EnvResult};

/// Suffix appended to a data file's path to name its sidecar file.
///
/// Changing it makes previously written files undecryptable.
pub const DEFAULT_SIDECAR_SUFFIX: &str = ".meta";

/// Sidecar suffix used by the earlier on-disk layout.
///
/// Environments that must read files written by that layout should set
/// this suffix explicitly.
pub const LEGACY_SIDECAR_SUFFIX: &str = ".aead";

/// Configuration for an encrypted environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvConfig {
    /// Suffix appended to each data file path to name its sidecar.
    pub sidecar_suffix: String,

    /// Whether removing a data file also removes its sidecar.
    pub mirror_removals: bool,

    /// Whether closing a stream syncs its sidecar to disk (otherwise flush only).
    pub sync_sidecar_on_close: bool,

    /// Whether opening a file creates missing parent directories.
    pub create_parent_dirs: bool,
}

impl Default for EnvConfig {
    fn default() -> Self {
        Self {
            sidecar_suffix: DEFAULT_SIDECAR_SUFFIX.to_string(),
            mirror_removals: true,
            sync_sidecar_on_close: false,
            create_parent_dirs: false,
        }
    }
}

impl EnvConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the sidecar suffix.
    #[must_use]
    pub fn sidecar_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.sidecar_suffix = suffix.into();
        self
    }

    /// Sets whether removals are mirrored onto the sidecar.
    #[must_use]
    pub const fn mirror_removals(mut self, value: bool) -> Self {
        self.mirror_removals = value;
        self
    }

    /// Sets whether closing a stream syncs its sidecar.
    #[must_use]
    pub const fn sync_sidecar_on_close(mut self, value: bool) -> Self {
        self.sync_sidecar_on_close = value;
        self
    }

    /// Sets whether opening a file creates missing parent directories.
    #[must_use]
    pub const fn create_parent_dirs(mut self, value: bool) -> Self {
        self.create_parent_dirs = value;
        self
    }

    /// Checks that the configuration is usable.
    ///
    /// # Errors
    ///
    /// Returns [`EnvError::InvalidConfig`] if the sidecar suffix is empty or
    /// contains a path separator.
    pub fn validate(&self) -> EnvResult<()> {
        if self.sidecar_suffix.is_empty() {
            return Err(EnvError::invalid_config("sidecar suffix must not be empty"));
        }
        if self.sidecar_suffix.contains(['/', '\\']) {
            return Err(EnvError::invalid_config(format!(
                "sidecar suffix {:?} must not contain a path separator",
                self.sidecar_suffix
            )));
        }
        Ok(())
    }
}
