//! Core data models used throughout the bugfix harness.
//!
//! These types represent the incident session, the inferred project
//! configuration produced by the analyzer, and the search/extraction
//! results that flow through the log mining pipeline. All of them
//! serialize to JSON for persistence under the incident directory.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One bugfix investigation, created at workflow start.
///
/// The session record is written once to `session.json`; later stages
/// append new artifacts rather than rewriting it (re-saving is permitted
/// and simply overwrites).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncidentSession {
    pub bug_id: String,
    pub session_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bug_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The output of one full analysis pass over a source tree.
///
/// Built fresh on every invocation and never mutated in place. Maps are
/// keyed by class name except `database_queries`, which is keyed by the
/// *inferred table name* — two repositories that infer the same table
/// collapse to one template entry (last write wins).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    pub project_info: ProjectInfo,
    pub repository_mapping: BTreeMap<String, String>,
    pub service_mapping: BTreeMap<String, ServiceInfo>,
    pub business_scenarios: Vec<BusinessScenario>,
    pub extraction_patterns: ExtractionPatterns,
    pub database_queries: BTreeMap<String, QueryTemplates>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectInfo {
    pub name: String,
    pub analyzed_at: DateTime<Utc>,
    pub total_repositories: usize,
    pub total_services: usize,
}

/// Business-capability facts derived from one service source file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceInfo {
    pub description: String,
    pub tables: Vec<String>,
    pub business_type: String,
    pub repositories: Vec<String>,
}

/// A cluster of services sharing an inferred business capability tag.
/// One scenario exists per distinct business type observed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusinessScenario {
    pub scenario: String,
    pub related_services: Vec<String>,
    pub core_tables: Vec<String>,
    pub common_issues: Vec<String>,
}

/// Static catalogs for pulling identifiers out of log text. These are
/// fixed, not derived from the scan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionPatterns {
    pub trace_id_patterns: Vec<String>,
    pub user_id_fields: Vec<String>,
}

/// Plain placeholder query strings keyed by inferred table name. The
/// caller substitutes `{condition}`, `{start_time}`, and `{end_time}`
/// later — there is no templating engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryTemplates {
    pub basic_query: String,
    pub count_query: String,
    pub time_range_query: String,
}

/// The outcome of one remote log search, immutable once produced.
///
/// `command` retains the exact remote command string for auditability.
/// A failed search carries `error` and an empty `output` regardless of
/// any partial stdout the remote side produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    pub trace_id: String,
    pub command: String,
    pub output: String,
    pub lines_count: usize,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Domain facts mined from a search result's output.
///
/// `user_ids` carries set semantics (first-seen order, deduplicated);
/// the other lists retain every matching line including duplicates.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BusinessInfo {
    pub sql_queries: Vec<String>,
    pub exceptions: Vec<String>,
    pub api_calls: Vec<String>,
    pub user_params: BTreeMap<String, String>,
    pub user_ids: Vec<String>,
}
