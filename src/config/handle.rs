//! Process-wide holder for the current [`RuntimeConfig`].
//!
//! Readers take a cheap `Arc` snapshot and never see a partially updated
//! config. The only write is a whole-object swap.

use std::sync::{Arc, RwLock};

use tracing::{info, warn};

use super::{ConfigError, RuntimeConfig};

/// Shared, atomically replaceable config.
#[derive(Debug)]
pub struct ConfigHandle {
    current: RwLock<Arc<RuntimeConfig>>,
}

impl ConfigHandle {
    /// Wrap an already validated config.
    pub fn new(config: RuntimeConfig) -> Self {
        Self {
            current: RwLock::new(Arc::new(config)),
        }
    }

    /// Snapshot of the current config.
    ///
    /// A poisoned lock still holds a fully formed `Arc` (the write is a
    /// single pointer swap), so the snapshot is taken from it regardless.
    pub fn current(&self) -> Arc<RuntimeConfig> {
        match self.current.read() {
            Ok(guard) => Arc::clone(&guard),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    /// Replace the whole config and return the previous one.
    pub fn replace(&self, config: RuntimeConfig) -> Arc<RuntimeConfig> {
        let next = Arc::new(config);
        let mut guard = match self.current.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let previous = std::mem::replace(&mut *guard, next);
        info!(
            from = %previous.to_mode(),
            to = %guard.to_mode(),
            "runtime config replaced"
        );
        previous
    }

    /// Rebuild from file and env and swap it in. On error the current
    /// config stays in place.
    ///
    /// # Errors
    ///
    /// Returns the [`ConfigError`] from loading; nothing is replaced.
    pub fn reload_with(
        &self,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Arc<RuntimeConfig>, ConfigError> {
        match RuntimeConfig::load_with(env) {
            Ok(config) => {
                self.replace(config);
                Ok(self.current())
            }
            Err(e) => {
                warn!(error = %e, "config reload rejected, keeping current config");
                Err(e)
            }
        }
    }
}

impl Default for ConfigHandle {
    fn default() -> Self {
        Self::new(RuntimeConfig::default())
    }
}
