//! Fail-fast schema validation
//!
//! Fields are checked in document order: manifest URL, version, entity,
//! projects, channels, plans, history. The first violation is returned with
//! the path of the offending field.

use crate::crawler::Fetcher;
use crate::schema::bounds::{
    count_in_range, in_list, in_range, in_table, is_email, is_id, is_tag, is_url, len_in_range,
};
use crate::schema::ownership::{AttestationCache, OwnershipVerifier};
use crate::schema::types::{
    Channel, Entity, History, Manifest, Plan, Project, UrlRef, CHANNEL_TYPES, ENTITY_ROLES,
    ENTITY_TYPES, PLAN_FREQUENCIES, PLAN_STATUSES,
};
use crate::schema::{
    LookupTables, ValidationError, ValidationErrorKind, LANGUAGE_PREFIX, LICENSE_PREFIX,
    MAX_URL_LEN, SCHEMA_MAJOR,
};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use url::Url;

const MAX_AMOUNT: f64 = 1e9;

/// The v1 manifest validator
#[derive(Debug, Clone)]
pub struct Schema {
    tables: Arc<LookupTables>,
    ownership: OwnershipVerifier,
}

impl Schema {
    /// Creates a validator
    ///
    /// # Arguments
    ///
    /// * `tables` - License, language and currency lookup tables
    /// * `fetcher` - Used to retrieve well-known attestation documents
    /// * `well_known_path` - Path of the attestation document on each origin
    pub fn new(tables: LookupTables, fetcher: Arc<Fetcher>, well_known_path: impl Into<String>) -> Self {
        Self {
            tables: Arc::new(tables),
            ownership: OwnershipVerifier::new(fetcher, well_known_path),
        }
    }

    pub fn tables(&self) -> &LookupTables {
        &self.tables
    }

    /// Validates a parsed manifest
    ///
    /// # Returns
    ///
    /// * `Ok(Manifest)` - The manifest, unchanged
    /// * `Err(ValidationError)` - The first violation found
    pub async fn validate(&self, manifest: Manifest) -> Result<Manifest, ValidationError> {
        self.check(&manifest).await?;
        Ok(manifest)
    }

    async fn check(&self, manifest: &Manifest) -> Result<(), ValidationError> {
        let manifest_url = is_url("url", &manifest.url, MAX_URL_LEN)?;
        check_version(&manifest.version)?;

        let mut cache = AttestationCache::new();

        self.check_entity(&manifest.entity, &manifest_url, &mut cache)
            .await?;

        for (n, project) in manifest.projects.iter().enumerate() {
            self.check_project(project, n, &manifest_url, &mut cache)
                .await?;
        }

        let mut channel_ids = HashSet::new();
        for (n, channel) in manifest.funding.channels.iter().enumerate() {
            check_channel(channel, n)?;
            if !channel_ids.insert(channel.id.as_str()) {
                return Err(ValidationError::new(
                    format!("channels[{}].id", n),
                    ValidationErrorKind::DuplicateId {
                        id: channel.id.clone(),
                    },
                ));
            }
        }

        for (n, plan) in manifest.funding.plans.iter().enumerate() {
            self.check_plan(plan, n, &channel_ids)?;
        }

        for (n, entry) in manifest.funding.history.iter().enumerate() {
            check_history(entry, n)?;
        }

        Ok(())
    }

    async fn check_entity(
        &self,
        entity: &Entity,
        manifest_url: &Url,
        cache: &mut AttestationCache,
    ) -> Result<(), ValidationError> {
        in_list("entity.type", &entity.kind, ENTITY_TYPES)?;
        in_list("entity.role", &entity.role, ENTITY_ROLES)?;
        len_in_range("entity.name", &entity.name, 2, 128)?;
        is_email("entity.email", &entity.email, 128)?;
        len_in_range("entity.telephone", &entity.telephone, 0, 24)?;
        self.check_reference("entity.webpageUrl", &entity.webpage_url, manifest_url, cache)
            .await
    }

    async fn check_project(
        &self,
        project: &Project,
        n: usize,
        manifest_url: &Url,
        cache: &mut AttestationCache,
    ) -> Result<(), ValidationError> {
        let path = |field: &str| format!("projects[{}].{}", n, field);

        len_in_range(&path("name"), &project.name, 1, 256)?;
        len_in_range(&path("description"), &project.description, 5, 1024)?;
        self.check_reference(&path("webpageUrl"), &project.webpage_url, manifest_url, cache)
            .await?;
        self.check_reference(
            &path("repositoryUrl"),
            &project.repository_url,
            manifest_url,
            cache,
        )
        .await?;

        let license_path = path("license");
        len_in_range(&license_path, &project.license, 2, 64)?;
        check_prefixed(
            &license_path,
            &project.license,
            LICENSE_PREFIX,
            "license",
            &self.tables.licenses,
        )?;

        count_in_range(&path("frameworks"), project.frameworks.len(), 0, 5)?;
        for (i, framework) in project.frameworks.iter().enumerate() {
            let framework_path = format!("projects[{}].frameworks[{}]", n, i);
            len_in_range(&framework_path, framework, 2, 64)?;
            check_prefixed(
                &framework_path,
                framework,
                LANGUAGE_PREFIX,
                "language",
                &self.tables.languages,
            )?;
        }

        count_in_range(&path("tags"), project.tags.len(), 1, 10)?;
        for (i, tag) in project.tags.iter().enumerate() {
            is_tag(&format!("projects[{}].tags[{}]", n, i), tag, 2, 32)?;
        }

        Ok(())
    }

    fn check_plan(
        &self,
        plan: &Plan,
        n: usize,
        channel_ids: &HashSet<&str>,
    ) -> Result<(), ValidationError> {
        let path = |field: &str| format!("plans[{}].{}", n, field);

        is_id(&path("id"), &plan.id, 3, 32)?;
        in_list(&path("status"), &plan.status, PLAN_STATUSES)?;
        len_in_range(&path("name"), &plan.name, 3, 128)?;
        len_in_range(&path("description"), &plan.description, 0, 1024)?;
        in_range(&path("amount"), plan.amount, 0.0, MAX_AMOUNT)?;
        in_table(
            &path("currency"),
            "currency",
            &plan.currency,
            &self.tables.currencies,
        )?;
        in_list(&path("frequency"), &plan.frequency, PLAN_FREQUENCIES)?;

        if let Some(missing) = plan
            .channels
            .iter()
            .find(|id| !channel_ids.contains(id.as_str()))
        {
            return Err(ValidationError::new(
                path("channels"),
                ValidationErrorKind::CrossReferenceMissing {
                    id: missing.clone(),
                },
            ));
        }

        Ok(())
    }

    async fn check_reference(
        &self,
        path: &str,
        reference: &UrlRef,
        manifest_url: &Url,
        cache: &mut AttestationCache,
    ) -> Result<(), ValidationError> {
        let url = is_url(path, &reference.url, MAX_URL_LEN)?;
        self.ownership
            .verify(path, manifest_url, &url, reference.well_known, cache)
            .await
    }
}

fn check_version(version: &str) -> Result<(), ValidationError> {
    match version.split('.').next() {
        Some(major) if major == SCHEMA_MAJOR => Ok(()),
        _ => Err(ValidationError::new(
            "version",
            ValidationErrorKind::Malformed(format!(
                "unsupported schema version '{}', expected {}.x.x",
                version, SCHEMA_MAJOR
            )),
        )),
    }
}

fn check_channel(channel: &Channel, n: usize) -> Result<(), ValidationError> {
    let path = |field: &str| format!("channels[{}].{}", n, field);

    is_id(&path("id"), &channel.id, 3, 32)?;
    in_list(&path("type"), &channel.kind, CHANNEL_TYPES)?;
    len_in_range(&path("address"), &channel.address, 0, 128)?;
    len_in_range(&path("description"), &channel.description, 0, 1024)
}

fn check_history(entry: &History, n: usize) -> Result<(), ValidationError> {
    let path = |field: &str| format!("history[{}].{}", n, field);

    in_range(&path("year"), entry.year, 1970, 2075)?;
    in_range(&path("income"), entry.income, 0.0, MAX_AMOUNT)?;
    in_range(&path("expenses"), entry.expenses, 0.0, MAX_AMOUNT)?;
    len_in_range(&path("description"), &entry.description, 0, 1024)
}

/// Resolves namespaced values such as `spdx:MIT` in their lookup table
///
/// Values without the prefix are free-form and pass.
fn check_prefixed(
    path: &str,
    value: &str,
    prefix: &str,
    table: &'static str,
    entries: &HashMap<String, String>,
) -> Result<(), ValidationError> {
    match value.strip_prefix(prefix) {
        Some(id) => in_table(path, table, id, entries),
        None => Ok(()),
    }
}
