//! Project lookups.

use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{CoreError, Result};
use crate::session::Session;
use crate::transport::Request;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: u64,
    #[serde(default)]
    pub attributes: ProjectAttributes,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectAttributes {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub active: bool,
}

impl Project {
    pub fn name(&self) -> &str {
        &self.attributes.name
    }

    pub fn is_active(&self) -> bool {
        self.attributes.active
    }
}

/// Project list, fetched once per session and never invalidated.
#[derive(Debug, Default)]
pub(crate) struct ProjectCache {
    projects: Mutex<Option<Vec<Project>>>,
}

impl Session {
    /// All projects visible to the logged-in user.
    ///
    /// # Errors
    ///
    /// [`CoreError::NotLoggedIn`] before login, transport/envelope errors on
    /// the first call.
    pub fn projects(&self) -> Result<Vec<Project>> {
        self.require_login()?;
        let mut cached = self
            .projects
            .projects
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(projects) = cached.as_ref() {
            return Ok(projects.clone());
        }

        let projects: Vec<Project> = self.fetch(Request::get(self.endpoints.projects.clone()))?;
        debug!(count = projects.len(), "cached project list");
        *cached = Some(projects.clone());
        Ok(projects)
    }

    /// Find a project by exact name, falling back to its numeric id.
    ///
    /// # Errors
    ///
    /// [`CoreError::ProjectNotFound`] when nothing matches.
    pub fn lookup_project(&self, name_or_id: &str) -> Result<Project> {
        let projects = self.projects()?;
        if let Some(project) = projects.iter().find(|p| p.name() == name_or_id) {
            return Ok(project.clone());
        }
        name_or_id
            .trim()
            .parse::<u64>()
            .ok()
            .and_then(|id| projects.into_iter().find(|p| p.id == id))
            .ok_or_else(|| CoreError::ProjectNotFound(name_or_id.to_string()))
    }

    /// # Errors
    ///
    /// [`CoreError::ProjectNotFound`] when no project has this exact name.
    pub fn project_id(&self, name: &str) -> Result<u64> {
        self.projects()?
            .into_iter()
            .find(|p| p.name() == name)
            .map(|p| p.id)
            .ok_or_else(|| CoreError::ProjectNotFound(name.to_string()))
    }

    /// # Errors
    ///
    /// [`CoreError::ProjectNotFound`] for an unknown id.
    pub fn project_name(&self, id: u64) -> Result<String> {
        self.projects()?
            .into_iter()
            .find(|p| p.id == id)
            .map(|p| p.attributes.name)
            .ok_or_else(|| CoreError::ProjectNotFound(id.to_string()))
    }
}
