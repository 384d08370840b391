//! Session handle resolution
//!
//! A scan request carries an opaque session handle; the engine turns it into
//! the project and database identifiers the classification service needs.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::SessionError;

/// Identifiers a session handle resolves to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionContext {
    pub project_id: String,
    pub connection_id: Option<String>,
    pub database_id: String,
}

/// Resolves session handles to identifiers
pub trait SessionProvider: Send + Sync {
    fn resolve(&self, handle: &str) -> Result<SessionContext, SessionError>;
}

/// One `sessions:` entry of the config file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database_id: Option<String>,
}

/// Session provider backed by the config file's session table
#[derive(Debug, Clone, Default)]
pub struct ConfigSessionProvider {
    sessions: BTreeMap<String, SessionEntry>,
}

impl ConfigSessionProvider {
    pub fn new(sessions: BTreeMap<String, SessionEntry>) -> Self {
        Self { sessions }
    }
}

impl SessionProvider for ConfigSessionProvider {
    fn resolve(&self, handle: &str) -> Result<SessionContext, SessionError> {
        let entry = self
            .sessions
            .get(handle)
            .ok_or_else(|| SessionError::NotFound(handle.to_string()))?;

        let required = |value: &Option<String>, field: &'static str| {
            value
                .as_deref()
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
                .ok_or_else(|| SessionError::Incomplete {
                    handle: handle.to_string(),
                    field,
                })
        };

        Ok(SessionContext {
            project_id: required(&entry.project_id, "project_id")?,
            connection_id: entry.connection_id.clone(),
            database_id: required(&entry.database_id, "database_id")?,
        })
    }
}
