//! Deferred credential values
//!
//! Client ID, username and password are wired at configuration time but only
//! evaluated when a connection is attempted, so they can depend on state that
//! does not exist yet when the manager is configured (a generated device ID,
//! a provisioning step writing an environment variable, ...).

use std::fmt;

/// A string whose concrete value is computed at the moment of use
pub struct DeferredString(Source);

enum Source {
    Empty,
    Literal(String),
    Env(String),
    Computed(Box<dyn Fn() -> Option<String>>),
}

impl DeferredString {
    /// A value that always resolves to the empty string
    pub fn empty() -> Self {
        Self(Source::Empty)
    }

    /// A fixed value
    pub fn literal(value: impl Into<String>) -> Self {
        Self(Source::Literal(value.into()))
    }

    /// Read from the named environment variable on every resolution
    pub fn from_env(var: impl Into<String>) -> Self {
        Self(Source::Env(var.into()))
    }

    /// Evaluate an arbitrary expression on every resolution
    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn() -> Option<String> + 'static,
    {
        Self(Source::Computed(Box::new(f)))
    }

    /// Resolve the current value; an unavailable value resolves to `""`
    pub fn resolve(&self) -> String {
        match &self.0 {
            Source::Empty => String::new(),
            Source::Literal(value) => value.clone(),
            Source::Env(var) => std::env::var(var).unwrap_or_default(),
            Source::Computed(f) => f().unwrap_or_default(),
        }
    }
}

impl Default for DeferredString {
    fn default() -> Self {
        Self::empty()
    }
}

impl fmt::Debug for DeferredString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Source::Empty => f.write_str("DeferredString::Empty"),
            Source::Literal(_) => f.write_str("DeferredString::Literal(..)"),
            Source::Env(var) => write!(f, "DeferredString::Env({var})"),
            Source::Computed(_) => f.write_str("DeferredString::Computed(..)"),
        }
    }
}

/// The three connect-time credentials
#[derive(Debug, Default)]
pub struct Credentials {
    pub client_id: DeferredString,
    pub username: DeferredString,
    pub password: DeferredString,
}

impl Credentials {
    pub fn new(client_id: DeferredString, username: DeferredString, password: DeferredString) -> Self {
        Self {
            client_id,
            username,
            password,
        }
    }

    /// Evaluate all three values now
    pub fn resolve(&self) -> ResolvedCredentials {
        ResolvedCredentials {
            client_id: self.client_id.resolve(),
            username: self.username.resolve(),
            password: self.password.resolve(),
        }
    }
}

/// Credentials evaluated for a single connection attempt
#[derive(Clone, PartialEq, Eq)]
pub struct ResolvedCredentials {
    pub client_id: String,
    pub username: String,
    pub password: String,
}

impl ResolvedCredentials {
    /// A connection may only be attempted when every value is non-empty
    pub fn is_complete(&self) -> bool {
        !self.client_id.is_empty() && !self.username.is_empty() && !self.password.is_empty()
    }
}

impl fmt::Debug for ResolvedCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedCredentials")
            .field("client_id", &self.client_id)
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    #[test]
    fn test_literal_and_empty() {
        assert_eq!(DeferredString::literal("device-1").resolve(), "device-1");
        assert_eq!(DeferredString::empty().resolve(), "");
        assert_eq!(DeferredString::default().resolve(), "");
    }

    #[test]
    fn test_env_is_read_at_resolution_time() {
        let var = "DYNAMIC_MQTT_TEST_DEFERRED_ENV";
        std::env::remove_var(var);
        let value = DeferredString::from_env(var);
        assert_eq!(value.resolve(), "");

        std::env::set_var(var, "late-bound");
        assert_eq!(value.resolve(), "late-bound");
        std::env::remove_var(var);
    }

    #[test]
    fn test_computed_is_evaluated_each_time() {
        let calls = Rc::new(Cell::new(0));
        let counter = calls.clone();
        let value = DeferredString::from_fn(move || {
            counter.set(counter.get() + 1);
            Some(format!("id-{}", counter.get()))
        });

        assert_eq!(value.resolve(), "id-1");
        assert_eq!(value.resolve(), "id-2");
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn test_computed_none_resolves_empty() {
        assert_eq!(DeferredString::from_fn(|| None).resolve(), "");
    }

    #[test]
    fn test_completeness_requires_all_three() {
        let full = Credentials::new(
            DeferredString::literal("cid"),
            DeferredString::literal("user"),
            DeferredString::literal("pass"),
        );
        assert!(full.resolve().is_complete());

        let missing_password = Credentials::new(
            DeferredString::literal("cid"),
            DeferredString::literal("user"),
            DeferredString::empty(),
        );
        assert!(!missing_password.resolve().is_complete());
        assert!(!Credentials::default().resolve().is_complete());
    }

    #[test]
    fn test_debug_never_prints_secrets() {
        let creds = Credentials::new(
            DeferredString::literal("cid"),
            DeferredString::literal("user"),
            DeferredString::literal("hunter2"),
        );
        assert!(!format!("{creds:?}").contains("hunter2"));
        assert!(!format!("{:?}", creds.resolve()).contains("hunter2"));
    }
}
