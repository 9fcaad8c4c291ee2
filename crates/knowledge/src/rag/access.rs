//! Access-control filters derived from overrides and identity claims.

use super::overrides::{RetrievalOverrides, NO_RETRIEVAL_CATEGORY};
use super::types::IdentityClaims;
use crate::search::SearchFilter;
use grounded_core::config::SearchSettings;
use grounded_core::{AppError, AppResult};

/// Builds the filter restricting which documents a caller may see.
pub trait AccessFilterBuilder: Send + Sync {
    fn build_filter(
        &self,
        overrides: &RetrievalOverrides,
        claims: &IdentityClaims,
    ) -> AppResult<Option<SearchFilter>>;
}

/// Category and document-level security filters.
///
/// Category filters come from `include_category` / `exclude_category`.
/// Security filters match the caller's oid against `oids` and groups
/// against `groups`; they are enabled per request, or always when access
/// control is enforced.
#[derive(Debug, Clone, Default)]
pub struct SecurityFilterBuilder {
    use_authentication: bool,
    enforce_access_control: bool,
}

impl SecurityFilterBuilder {
    pub fn new(use_authentication: bool, enforce_access_control: bool) -> Self {
        Self {
            use_authentication,
            enforce_access_control,
        }
    }

    pub fn from_settings(settings: &SearchSettings) -> Self {
        Self::new(settings.use_authentication, settings.enforce_access_control)
    }

    fn security_filter(
        &self,
        overrides: &RetrievalOverrides,
        claims: &IdentityClaims,
    ) -> AppResult<Option<SearchFilter>> {
        let use_oid = overrides.use_oid_security_filter || self.enforce_access_control;
        let use_groups = overrides.use_groups_security_filter || self.enforce_access_control;

        if (use_oid || use_groups) && !self.use_authentication {
            return Err(AppError::Config(
                "Security filters require authentication to be enabled (search.useAuthentication)"
                    .to_string(),
            ));
        }

        let mut filters = Vec::new();
        if use_oid {
            if claims.oid.is_none() {
                tracing::warn!("OID security filter requested without an oid claim");
            }
            filters.push(SearchFilter::OidMatches(
                claims.oid.clone().unwrap_or_default(),
            ));
        }
        if use_groups {
            filters.push(SearchFilter::GroupsAnyOf(claims.groups.clone()));
        }

        Ok(SearchFilter::any(filters))
    }
}

impl AccessFilterBuilder for SecurityFilterBuilder {
    fn build_filter(
        &self,
        overrides: &RetrievalOverrides,
        claims: &IdentityClaims,
    ) -> AppResult<Option<SearchFilter>> {
        let mut filters = Vec::new();

        if let Some(category) = overrides
            .include_category
            .as_deref()
            .filter(|c| !c.is_empty() && *c != NO_RETRIEVAL_CATEGORY)
        {
            filters.push(SearchFilter::CategoryEq(category.to_string()));
        }

        if let Some(category) = overrides.exclude_category.as_deref().filter(|c| !c.is_empty()) {
            filters.push(SearchFilter::CategoryNe(category.to_string()));
        }

        if let Some(security) = self.security_filter(overrides, claims)? {
            filters.push(security);
        }

        let filter = SearchFilter::all(filters);
        if let Some(f) = &filter {
            tracing::debug!(filter = %f, "Built search filter");
        }
        Ok(filter)
    }
}
