pub mod directory;
pub mod http;

use std::collections::HashMap;

pub use directory::DirectoryStore;
pub use http::HttpStore;

/// Whole-document access to the dashboards of one profile.
pub trait DashboardStore {
    /// Returns the raw dashboard body.
    fn get_dashboard(&self, name: &str) -> Result<String, StoreError>;

    /// Replaces the dashboard with `body`, returning the store's acknowledgement.
    fn put_dashboard(&self, name: &str, body: &str) -> Result<String, StoreError>;
}

/// Opens a store session for a named profile.
pub trait Connect {
    fn connect(&self, profile: &str) -> Result<Box<dyn DashboardStore>, StoreError>;
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("dashboard `{0}` does not exist")]
    NotFound(String),
    #[error("invalid dashboard name `{0}`")]
    InvalidName(String),
    #[error("profile `{0}` is not configured")]
    ProfileNotFound(String),
    #[error("invalid profile `{profile}`: {message}")]
    InvalidProfile { profile: String, message: String },
    #[error("request for dashboard `{board}` failed: {message}")]
    Transport { board: String, message: String },
    #[error("`{path}`: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Sessions keyed by profile name, opened on first use and kept for the
/// rest of the run.
pub struct SessionCache<C> {
    connector: C,
    sessions: HashMap<String, Box<dyn DashboardStore>>,
}

impl<C: Connect> SessionCache<C> {
    pub fn new(connector: C) -> Self {
        Self {
            connector,
            sessions: HashMap::new(),
        }
    }

    pub fn session(&mut self, profile: &str) -> Result<&dyn DashboardStore, StoreError> {
        if !self.sessions.contains_key(profile) {
            tracing::debug!(profile, "opening dashboard store session");
            let store = self.connector.connect(profile)?;
            self.sessions.insert(profile.to_string(), store);
        }
        Ok(self.sessions[profile].as_ref())
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.sessions.len()
    }
}
