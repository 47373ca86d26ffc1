//! Project Service
//!
//! Creates projects and their catalog entries (components, milestones,
//! templates). Counter mutation lives in [`SequenceCounter`]; archiving and
//! deletion live in [`CascadeDeleter`].
//!
//! [`SequenceCounter`]: crate::services::SequenceCounter
//! [`CascadeDeleter`]: crate::services::CascadeDeleter

use crate::db::{to_document, Collection, DocumentStore, Filter};
use crate::models::{Component, Milestone, Project, ProjectRef, Template, ValidationError};
use crate::services::error::ServiceError;
use crate::services::lookup::{find_record, load_project};
use chrono::NaiveDate;
use serde::Serialize;
use std::sync::Arc;

pub struct ProjectService {
    store: Arc<dyn DocumentStore>,
}

fn require_name(name: &str) -> Result<(), ValidationError> {
    if name.trim().is_empty() {
        Err(ValidationError::MissingField("name".to_string()))
    } else {
        Ok(())
    }
}

impl ProjectService {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Create a project with a zeroed sequence counter
    ///
    /// # Errors
    ///
    /// - `Validation` for an empty name or malformed prefix
    /// - `Conflict` if another project already uses the prefix
    pub async fn create_project(
        &self,
        name: impl Into<String>,
        prefix: impl Into<String>,
    ) -> Result<Project, ServiceError> {
        let project = Project::new(name, prefix);
        project.validate()?;

        let existing: Option<Project> = find_record(
            self.store.as_ref(),
            Collection::Projects,
            &Filter::new().eq("prefix", project.prefix.as_str()),
        )
        .await?;
        if existing.is_some() {
            return Err(ServiceError::conflict(format!(
                "prefix {} is already used by another project",
                project.prefix
            )));
        }

        self.insert(Collection::Projects, &project).await?;
        tracing::info!(project_id = %project.id, prefix = %project.prefix, "Created project");
        Ok(project)
    }

    pub async fn get_project(&self, project: &ProjectRef) -> Result<Project, ServiceError> {
        load_project(self.store.as_ref(), project).await
    }

    pub async fn create_component(
        &self,
        project: &ProjectRef,
        name: impl Into<String>,
    ) -> Result<Component, ServiceError> {
        let name = name.into();
        require_name(&name)?;
        let project = self.get_project(project).await?;

        let component = Component::new(project.id, name);
        self.insert(Collection::Components, &component).await?;
        Ok(component)
    }

    pub async fn create_milestone(
        &self,
        project: &ProjectRef,
        name: impl Into<String>,
        target_date: Option<NaiveDate>,
    ) -> Result<Milestone, ServiceError> {
        let name = name.into();
        require_name(&name)?;
        let project = self.get_project(project).await?;

        let mut milestone = Milestone::new(project.id, name);
        milestone.target_date = target_date;
        self.insert(Collection::Milestones, &milestone).await?;
        Ok(milestone)
    }

    pub async fn create_template(
        &self,
        project: &ProjectRef,
        name: impl Into<String>,
        body: impl Into<String>,
    ) -> Result<Template, ServiceError> {
        let name = name.into();
        require_name(&name)?;
        let project = self.get_project(project).await?;

        let template = Template::new(project.id, name, body);
        self.insert(Collection::Templates, &template).await?;
        Ok(template)
    }

    async fn insert<T: Serialize>(
        &self,
        collection: Collection,
        record: &T,
    ) -> Result<(), ServiceError> {
        let doc = to_document(record)
            .map_err(|e| ServiceError::store(&format!("{} encode", collection), e))?;
        self.store
            .insert(collection, doc)
            .await
            .map_err(|e| ServiceError::store(&format!("{} insert", collection), e))
    }
}
