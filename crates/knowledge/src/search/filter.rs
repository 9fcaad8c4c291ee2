//! Search filter expressions.
//!
//! Filters render to OData for remote indexes and are evaluated directly
//! against documents by the in-memory index.

use super::types::RetrievedDocument;
use serde::{Serialize, Serializer};
use std::fmt;

/// Structured filter over document fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchFilter {
    /// `category eq '<value>'`
    CategoryEq(String),

    /// `category ne '<value>'`; documents without a category match
    CategoryNe(String),

    /// Document lists the object id in `oids`
    OidMatches(String),

    /// Document lists at least one of the groups in `groups`
    GroupsAnyOf(Vec<String>),

    And(Vec<SearchFilter>),
    Or(Vec<SearchFilter>),
}

impl SearchFilter {
    /// Conjunction of `filters`; `None` when empty.
    pub fn all(mut filters: Vec<SearchFilter>) -> Option<SearchFilter> {
        match filters.len() {
            0 => None,
            1 => filters.pop(),
            _ => Some(SearchFilter::And(filters)),
        }
    }

    /// Disjunction of `filters`; `None` when empty.
    pub fn any(mut filters: Vec<SearchFilter>) -> Option<SearchFilter> {
        match filters.len() {
            0 => None,
            1 => filters.pop(),
            _ => Some(SearchFilter::Or(filters)),
        }
    }

    /// Render as an OData `$filter` expression.
    pub fn to_odata(&self) -> String {
        match self {
            Self::CategoryEq(value) => format!("category eq '{}'", escape(value)),
            Self::CategoryNe(value) => format!("category ne '{}'", escape(value)),
            Self::OidMatches(oid) => format!("oids/any(g:search.in(g, '{}'))", escape(oid)),
            Self::GroupsAnyOf(groups) => {
                let joined = groups.iter().map(|g| escape(g)).collect::<Vec<_>>().join(", ");
                format!("groups/any(g:search.in(g, '{}'))", joined)
            }
            Self::And(filters) => filters
                .iter()
                .map(Self::to_odata)
                .collect::<Vec<_>>()
                .join(" and "),
            Self::Or(filters) => format!(
                "({})",
                filters
                    .iter()
                    .map(Self::to_odata)
                    .collect::<Vec<_>>()
                    .join(" or ")
            ),
        }
    }

    /// Evaluate the filter against a document.
    pub fn matches(&self, document: &RetrievedDocument) -> bool {
        match self {
            Self::CategoryEq(value) => document.category.as_deref() == Some(value.as_str()),
            Self::CategoryNe(value) => document.category.as_deref() != Some(value.as_str()),
            Self::OidMatches(oid) => document.oids.iter().any(|o| o == oid),
            Self::GroupsAnyOf(groups) => document.groups.iter().any(|g| groups.contains(g)),
            Self::And(filters) => filters.iter().all(|f| f.matches(document)),
            Self::Or(filters) => filters.iter().any(|f| f.matches(document)),
        }
    }
}

fn escape(value: &str) -> String {
    value.replace('\'', "''")
}

impl fmt::Display for SearchFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_odata())
    }
}

impl Serialize for SearchFilter {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_odata())
    }
}
