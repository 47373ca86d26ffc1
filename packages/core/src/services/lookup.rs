//! Store lookups shared by the services
//!
//! Resolves caller references into typed records and maps store failures
//! into `ServiceError`s with the operation that failed.

use crate::db::{from_document, Collection, DocumentStore, Filter, FindOptions};
use crate::models::{Issue, IssueRef, Project, ProjectRef};
use crate::services::error::ServiceError;
use serde::de::DeserializeOwned;

/// Load and decode the first document matching `filter`
pub(crate) async fn find_record<T: DeserializeOwned>(
    store: &dyn DocumentStore,
    collection: Collection,
    filter: &Filter,
) -> Result<Option<T>, ServiceError> {
    let doc = store
        .find_one(collection, filter)
        .await
        .map_err(|e| ServiceError::store(&format!("{} lookup", collection), e))?;

    doc.map(from_document)
        .transpose()
        .map_err(|e| ServiceError::store(&format!("{} decode", collection), e))
}

/// Load and decode every document matching `filter`
pub(crate) async fn find_records<T: DeserializeOwned>(
    store: &dyn DocumentStore,
    collection: Collection,
    filter: &Filter,
    options: &FindOptions,
) -> Result<Vec<T>, ServiceError> {
    let docs = store
        .find_all(collection, filter, options)
        .await
        .map_err(|e| ServiceError::store(&format!("{} scan", collection), e))?;

    docs.into_iter()
        .map(|doc| {
            from_document(doc).map_err(|e| ServiceError::store(&format!("{} decode", collection), e))
        })
        .collect()
}

pub(crate) async fn load_project(
    store: &dyn DocumentStore,
    project: &ProjectRef,
) -> Result<Project, ServiceError> {
    let filter = match project {
        ProjectRef::Id(id) => Filter::by_id(id.as_str()),
        ProjectRef::Prefix(prefix) => Filter::new().eq("prefix", prefix.as_str()),
    };

    find_record(store, Collection::Projects, &filter)
        .await?
        .ok_or_else(|| ServiceError::not_found("Project", project))
}

pub(crate) async fn load_issue(
    store: &dyn DocumentStore,
    issue: &IssueRef,
) -> Result<Issue, ServiceError> {
    let filter = match issue {
        IssueRef::Id(id) => Filter::by_id(id.as_str()),
        IssueRef::Identifier { .. } => Filter::new().eq("identifier", issue.to_string()),
    };

    find_record(store, Collection::Issues, &filter)
        .await?
        .ok_or_else(|| ServiceError::not_found("Issue", issue))
}

/// Direct children of an issue, ordered by number
pub(crate) async fn load_children(
    store: &dyn DocumentStore,
    parent_id: &str,
) -> Result<Vec<Issue>, ServiceError> {
    find_records(
        store,
        Collection::Issues,
        &Filter::new().eq("parentId", parent_id),
        &FindOptions::new().sort_asc("number"),
    )
    .await
}

/// Every issue of a project, ordered by number
pub(crate) async fn load_project_issues(
    store: &dyn DocumentStore,
    project_id: &str,
) -> Result<Vec<Issue>, ServiceError> {
    find_records(
        store,
        Collection::Issues,
        &Filter::new().eq("projectId", project_id),
        &FindOptions::new().sort_asc("number"),
    )
    .await
}
