//! Process environment access.
//!
//! Secrets may be indirected through environment variable names in the
//! config file. Every lookup goes through [`ReadEnv`] so tests never touch
//! the global process environment.

use std::env;

/// Read-only view of environment variables.
///
/// Unlike a per-task helper, the relay shares one reader across every request
/// handler, so implementations used with the server must be `Send + Sync`.
pub trait ReadEnv {
    fn var(&self, key: &str) -> Result<String, env::VarError>;

    /// Returns the value only when it is set and not blank.
    fn non_empty_var(&self, key: &str) -> Option<String> {
        self.var(key).ok().filter(|v| !v.trim().is_empty())
    }
}

/// Zero-sized type that delegates to `std::env`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemEnv;

impl ReadEnv for SystemEnv {
    #[inline]
    fn var(&self, key: &str) -> Result<String, env::VarError> {
        env::var(key)
    }
}

#[cfg(any(test, feature = "test-support"))]
pub use in_memory::InMemoryEnv;

#[cfg(any(test, feature = "test-support"))]
mod in_memory {
    use std::collections::HashMap;
    use std::env;
    use std::sync::RwLock;

    use super::ReadEnv;

    /// Map-backed environment for tests.
    ///
    /// Backed by an `RwLock` so it can sit behind the server state while a
    /// test keeps mutating it.
    #[derive(Debug, Default)]
    pub struct InMemoryEnv {
        vars: RwLock<HashMap<String, String>>,
    }

    impl InMemoryEnv {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
            if let Ok(vars) = self.vars.get_mut() {
                vars.insert(key.into(), value.into());
            }
            self
        }

        pub fn set(&self, key: impl Into<String>, value: impl Into<String>) {
            if let Ok(mut vars) = self.vars.write() {
                vars.insert(key.into(), value.into());
            }
        }

        pub fn remove(&self, key: &str) {
            if let Ok(mut vars) = self.vars.write() {
                vars.remove(key);
            }
        }
    }

    impl ReadEnv for InMemoryEnv {
        fn var(&self, key: &str) -> Result<String, env::VarError> {
            self.vars
                .read()
                .ok()
                .and_then(|vars| vars.get(key).cloned())
                .ok_or(env::VarError::NotPresent)
        }
    }
}
