//! In-process backend used by tests and local runs without a database.
use crate::types::{
    ErrorLogEntry, NewProject, NotificationRecord, Project, ProjectLink, Table, UserId,
};
use crate::{Backend, BackendError};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};

#[derive(Default)]
struct State {
    sessions: HashMap<String, UserId>,
    projects: Vec<Project>,
    error_logs: Vec<ErrorLogEntry>,
    notifications: Vec<NotificationRecord>,
    next_id: u64,
    failing: HashSet<Table>,
}

#[derive(Default)]
pub struct MemoryBackend {
    state: Mutex<State>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an access token that authenticates as `user_id`.
    pub fn with_session(self, token: &str, user_id: &str) -> Self {
        self.state
            .lock()
            .sessions
            .insert(token.to_string(), user_id.to_string());
        self
    }

    pub fn add_project(&self, project: Project) {
        self.state.lock().projects.push(project);
    }

    /// Makes every subsequent operation on `table` fail.
    pub fn fail_table(&self, table: Table) {
        self.state.lock().failing.insert(table);
    }

    pub fn projects(&self) -> Vec<Project> {
        self.state.lock().projects.clone()
    }

    pub fn error_logs(&self) -> Vec<ErrorLogEntry> {
        self.state.lock().error_logs.clone()
    }

    pub fn notifications(&self) -> Vec<NotificationRecord> {
        self.state.lock().notifications.clone()
    }

    fn check(state: &State, table: Table) -> Result<(), BackendError> {
        if state.failing.contains(&table) {
            return Err(BackendError::Rejected {
                table: table.as_str(),
                reason: "table is marked as failing".into(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl Backend for MemoryBackend {
    async fn authenticate(&self, access_token: &str) -> Result<Option<UserId>, BackendError> {
        Ok(self.state.lock().sessions.get(access_token).cloned())
    }

    async fn find_project_by_name(
        &self,
        owner: &str,
        name: &str,
    ) -> Result<Option<Project>, BackendError> {
        let state = self.state.lock();
        Self::check(&state, Table::Projects)?;
        Ok(state
            .projects
            .iter()
            .find(|p| p.user_id == owner && p.name == name)
            .cloned())
    }

    async fn find_owned_project(
        &self,
        owner: &str,
        project_id: &str,
    ) -> Result<Option<Project>, BackendError> {
        let state = self.state.lock();
        Self::check(&state, Table::Projects)?;
        Ok(state
            .projects
            .iter()
            .find(|p| p.user_id == owner && p.id == project_id)
            .cloned())
    }

    async fn insert_project(&self, project: NewProject) -> Result<Project, BackendError> {
        let mut state = self.state.lock();
        Self::check(&state, Table::Projects)?;
        state.next_id += 1;
        let row = Project {
            id: format!("project-{}", state.next_id),
            name: project.name,
            description: project.description,
            is_active: project.is_active,
            external_connection: project.external_connection,
            user_id: project.user_id,
        };
        state.projects.push(row.clone());
        Ok(row)
    }

    async fn update_project_link(
        &self,
        project_id: &str,
        link: ProjectLink,
    ) -> Result<Project, BackendError> {
        let mut state = self.state.lock();
        Self::check(&state, Table::Projects)?;
        let project = state
            .projects
            .iter_mut()
            .find(|p| p.id == project_id)
            .ok_or(BackendError::EmptyResult(Table::Projects.as_str()))?;
        project.external_connection = link.external_connection;
        project.is_active = link.is_active;
        Ok(project.clone())
    }

    async fn insert_error_log(&self, entry: ErrorLogEntry) -> Result<(), BackendError> {
        let mut state = self.state.lock();
        Self::check(&state, Table::ErrorLogs)?;
        state.error_logs.push(entry);
        Ok(())
    }

    async fn insert_notification(
        &self,
        notification: NotificationRecord,
    ) -> Result<(), BackendError> {
        let mut state = self.state.lock();
        Self::check(&state, Table::Notifications)?;
        state.notifications.push(notification);
        Ok(())
    }
}
