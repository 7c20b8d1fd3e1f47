//! Static project analyzer: source-tree → data-model inference.
//!
//! Walks a source tree, classifies files by naming convention
//! (`*Repository.java` / `*Service.java`), infers a repository→table
//! mapping and a service→business-capability mapping, and synthesizes
//! business scenarios and query templates.
//!
//! The inference is intentionally heuristic — an explicit, ordered rule
//! list rather than a compiler front end. Every rule's precedence is
//! documented on the function that applies it so behavior stays
//! reproducible.

use anyhow::{bail, Result};
use chrono::Utc;
use globset::{Glob, GlobSet, GlobSetBuilder};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::models::{
    BusinessScenario, ExtractionPatterns, ProjectConfig, ProjectInfo, QueryTemplates, ServiceInfo,
};

static REPO_CLASS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"class\s+(\w*Repository)").unwrap());
static SERVICE_CLASS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"class\s+(\w*Service)").unwrap());
static TABLE_ANNOTATION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"@Table\s*\(\s*name\s*=\s*"([^"]+)""#).unwrap());
static DOC_COMMENT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"/\*\*\s*\n\s*\*\s*([^\n*]+)").unwrap());
static AUTOWIRED_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)@Autowired[^;]*?(\w*Repository)").unwrap());
static CAMEL_BOUNDARY_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"([a-z0-9])([A-Z])").unwrap());

/// Embedded query fragments that reference a table name, scanned in order.
static SQL_TABLE_RES: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        Regex::new(r"(?i)FROM\s+(\w+)").unwrap(),
        Regex::new(r"(?i)UPDATE\s+(\w+)").unwrap(),
        Regex::new(r"(?i)INSERT\s+INTO\s+(\w+)").unwrap(),
        Regex::new(r"(?i)DELETE\s+FROM\s+(\w+)").unwrap(),
    ]
});

/// Ordered keyword→category pairs for business-type classification.
/// First case-insensitive substring match of the class name wins.
const BUSINESS_KEYWORDS: &[(&str, &str)] = &[
    ("query", "query"),
    ("create", "create"),
    ("update", "update"),
    ("delete", "delete"),
    ("payment", "payment"),
    ("subs", "deposit"),
    ("holdings", "holdings"),
    ("trade", "trade"),
    ("order", "order"),
    ("validate", "validate"),
    ("migrate", "migrate"),
];

/// Known failure modes per business category, attached to scenarios.
const COMMON_ISSUES: &[(&str, &[&str])] = &[
    (
        "payment",
        &[
            "payment status error",
            "amount calculation error",
            "freeze/unfreeze failed",
        ],
    ),
    (
        "deposit",
        &[
            "amount calculation error",
            "transaction status error",
            "share calculation error",
        ],
    ),
    (
        "query",
        &[
            "data inconsistency",
            "query timeout",
            "permission validation failed",
        ],
    ),
    (
        "holdings",
        &[
            "share calculation error",
            "profit calculation error",
            "data delay",
        ],
    ),
];

/// Common trace-id shapes seen in log output. Static, not derived.
const TRACE_ID_PATTERNS: &[&str] = &[
    r"traceId[=:\s]+([a-f0-9]{32})",
    r"trace-id[=:\s]+([a-f0-9-]{36})",
    r"requestId[=:\s]+([a-f0-9]{32})",
    r"tid[=:\s]+([a-f0-9]{32})",
    r"X-Trace-Id[=:\s]+([a-f0-9-]{36})",
];

/// Recognized user-identifier field names. Static, not derived.
const USER_ID_FIELDS: &[&str] = &[
    "custNo",
    "hboneNo",
    "customerId",
    "userId",
    "userNo",
    "clientId",
    "accountId",
];

/// Analyzes a source tree and infers its backing data model.
///
/// `analyze` is synchronous and side-effect-free; `save_config` is the
/// only operation that writes to disk.
pub struct ProjectAnalyzer {
    root: PathBuf,
}

impl ProjectAnalyzer {
    /// Create an analyzer rooted at `root`. Relative roots are resolved
    /// against the current directory so the project name and save path
    /// are stable.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let root = if root.is_absolute() {
            root
        } else {
            std::env::current_dir()
                .map(|cwd| cwd.join(&root))
                .unwrap_or(root)
        };
        Self { root }
    }

    /// Run a full analysis pass over the source tree.
    ///
    /// A single unreadable or unparsable file is warned about and
    /// skipped; only failure to enumerate the root at all is an error.
    pub fn analyze(&self) -> Result<ProjectConfig> {
        println!("[analyzer] Starting project structure analysis...");

        let repo_files = self.find_files("**/*Repository.java")?;
        let service_files = self.find_files("**/*Service.java")?;

        let repository_mapping = scan_repositories(&repo_files);
        let service_mapping = scan_services(&service_files, &repository_mapping);
        let business_scenarios = analyze_business_scenarios(&service_mapping);
        let database_queries = generate_query_templates(&repository_mapping);

        Ok(ProjectConfig {
            project_info: ProjectInfo {
                name: self
                    .root
                    .file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_else(|| "project".to_string()),
                analyzed_at: Utc::now(),
                total_repositories: repository_mapping.len(),
                total_services: service_mapping.len(),
            },
            repository_mapping,
            service_mapping,
            business_scenarios,
            extraction_patterns: ExtractionPatterns {
                trace_id_patterns: TRACE_ID_PATTERNS.iter().map(|s| s.to_string()).collect(),
                user_id_fields: USER_ID_FIELDS.iter().map(|s| s.to_string()).collect(),
            },
            database_queries,
        })
    }

    /// Run an analysis pass and persist the result as pretty JSON.
    ///
    /// Defaults to `<root>/bugfix.project.auto.json`; parent directories
    /// are created as needed.
    pub fn save_config(&self, output: Option<&Path>) -> Result<(ProjectConfig, PathBuf)> {
        let out_path = output
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|| self.root.join("bugfix.project.auto.json"));

        let config = self.analyze()?;

        if let Some(parent) = out_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(&out_path, serde_json::to_string_pretty(&config)?)?;

        println!(
            "[analyzer] Project configuration saved to: {}",
            out_path.display()
        );
        Ok((config, out_path))
    }

    /// Enumerate regular files under the root matching a suffix glob,
    /// sorted for deterministic iteration order.
    fn find_files(&self, pattern: &str) -> Result<Vec<PathBuf>> {
        if !self.root.is_dir() {
            bail!("Source root does not exist: {}", self.root.display());
        }

        let glob_set = build_globset(&[pattern.to_string()])?;
        let mut files = Vec::new();

        for entry in WalkDir::new(&self.root) {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    eprintln!("[analyzer] WARN: Skipping unreadable entry: {}", e);
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }

            let path = entry.path();
            let relative = path.strip_prefix(&self.root).unwrap_or(path);
            if glob_set.is_match(relative.to_string_lossy().as_ref()) {
                files.push(path.to_path_buf());
            }
        }

        files.sort();
        Ok(files)
    }
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}

/// Map each repository class to its inferred backing table. Classes
/// with no matched declaration or no inferable table are omitted.
fn scan_repositories(files: &[PathBuf]) -> BTreeMap<String, String> {
    println!("[analyzer] Scanning repository classes...");
    let mut mapping = BTreeMap::new();

    for file in files {
        let content = match std::fs::read_to_string(file) {
            Ok(c) => c,
            Err(e) => {
                eprintln!(
                    "[analyzer] WARN: Failed to read repository file {}: {}",
                    file.display(),
                    e
                );
                continue;
            }
        };

        if let Some(class_name) = REPO_CLASS_RE
            .captures(&content)
            .map(|c| c[1].to_string())
        {
            if let Some(table) = infer_table_name(&class_name, &content) {
                mapping.insert(class_name, table);
            }
        }
    }

    mapping
}

/// Table inference precedence, first match wins:
///
/// 1. an explicit `@Table(name = "...")` annotation;
/// 2. the table most frequently referenced by embedded SQL fragments
///    (ties broken by first-seen order);
/// 3. the snake-case form of the class name minus its suffix.
fn infer_table_name(class_name: &str, content: &str) -> Option<String> {
    if let Some(caps) = TABLE_ANNOTATION_RE.captures(content) {
        return Some(caps[1].to_string());
    }

    let mut counts: HashMap<String, usize> = HashMap::new();
    let mut first_seen: Vec<String> = Vec::new();
    for re in SQL_TABLE_RES.iter() {
        for caps in re.captures_iter(content) {
            let table = caps[1].to_string();
            if !counts.contains_key(&table) {
                first_seen.push(table.clone());
            }
            *counts.entry(table).or_insert(0) += 1;
        }
    }
    // Strict comparison keeps the first-seen table on ties.
    let mut best: Option<(&String, usize)> = None;
    for table in &first_seen {
        let count = counts[table];
        if best.map_or(true, |(_, c)| count > c) {
            best = Some((table, count));
        }
    }
    if let Some((table, _)) = best {
        return Some(table.clone());
    }

    class_name
        .strip_suffix("Repository")
        .map(camel_to_snake)
}

/// `TpDeal` → `tp_deal`.
fn camel_to_snake(name: &str) -> String {
    CAMEL_BOUNDARY_RE
        .replace_all(name, "${1}_${2}")
        .to_lowercase()
}

/// Derive a [`ServiceInfo`] per service class, resolving its tables
/// transitively through the repository mapping.
fn scan_services(
    files: &[PathBuf],
    repository_mapping: &BTreeMap<String, String>,
) -> BTreeMap<String, ServiceInfo> {
    println!("[analyzer] Scanning service classes...");
    let mut mapping = BTreeMap::new();

    for file in files {
        let content = match std::fs::read_to_string(file) {
            Ok(c) => c,
            Err(e) => {
                eprintln!(
                    "[analyzer] WARN: Failed to read service file {}: {}",
                    file.display(),
                    e
                );
                continue;
            }
        };

        if let Some(class_name) = SERVICE_CLASS_RE
            .captures(&content)
            .map(|c| c[1].to_string())
        {
            let info = analyze_service(&class_name, &content, repository_mapping);
            mapping.insert(class_name, info);
        }
    }

    mapping
}

fn analyze_service(
    class_name: &str,
    content: &str,
    repository_mapping: &BTreeMap<String, String>,
) -> ServiceInfo {
    let description = DOC_COMMENT_RE
        .captures(content)
        .map(|c| c[1].trim().to_string())
        .unwrap_or_default();

    // Dependency-injection sites referencing a repository type, deduplicated.
    let mut repositories: Vec<String> = Vec::new();
    for caps in AUTOWIRED_RE.captures_iter(content) {
        let repo = caps[1].to_string();
        if !repositories.contains(&repo) {
            repositories.push(repo);
        }
    }

    let tables: Vec<String> = repositories
        .iter()
        .filter_map(|r| repository_mapping.get(r).cloned())
        .collect();

    ServiceInfo {
        description,
        tables,
        business_type: infer_business_type(class_name),
        repositories,
    }
}

/// First-match classification over the fixed ordered keyword list;
/// a class name matching no keyword yields `"unknown"`.
fn infer_business_type(class_name: &str) -> String {
    let lowered = class_name.to_lowercase();
    for (keyword, category) in BUSINESS_KEYWORDS {
        if lowered.contains(keyword) {
            return category.to_string();
        }
    }
    "unknown".to_string()
}

/// Partition services by business type into scenarios, in the order
/// each type is first observed. Core tables are unioned and
/// deduplicated per scenario.
fn analyze_business_scenarios(
    service_mapping: &BTreeMap<String, ServiceInfo>,
) -> Vec<BusinessScenario> {
    println!("[analyzer] Analyzing business scenarios...");
    let mut scenarios: Vec<BusinessScenario> = Vec::new();
    let mut index_by_type: HashMap<String, usize> = HashMap::new();

    for (service_name, info) in service_mapping {
        let idx = *index_by_type
            .entry(info.business_type.clone())
            .or_insert_with(|| {
                scenarios.push(BusinessScenario {
                    scenario: info.business_type.clone(),
                    related_services: Vec::new(),
                    core_tables: Vec::new(),
                    common_issues: common_issues_for(&info.business_type),
                });
                scenarios.len() - 1
            });

        scenarios[idx].related_services.push(service_name.clone());
        for table in &info.tables {
            if !scenarios[idx].core_tables.contains(table) {
                scenarios[idx].core_tables.push(table.clone());
            }
        }
    }

    scenarios
}

fn common_issues_for(business_type: &str) -> Vec<String> {
    COMMON_ISSUES
        .iter()
        .find(|(category, _)| *category == business_type)
        .map(|(_, issues)| issues.iter().map(|s| s.to_string()).collect())
        .unwrap_or_else(|| vec!["unknown issue".to_string()])
}

/// Three placeholder templates per inferred table. Two repositories
/// mapping to the same table collapse to one entry, last write wins.
fn generate_query_templates(
    repository_mapping: &BTreeMap<String, String>,
) -> BTreeMap<String, QueryTemplates> {
    let mut templates = BTreeMap::new();

    for table in repository_mapping.values() {
        templates.insert(
            table.clone(),
            QueryTemplates {
                basic_query: format!("SELECT * FROM {} WHERE {{condition}} LIMIT 10", table),
                count_query: format!("SELECT COUNT(*) FROM {} WHERE {{condition}}", table),
                time_range_query: format!(
                    "SELECT * FROM {} WHERE created_time >= '{{start_time}}' AND created_time <= '{{end_time}}' LIMIT 20",
                    table
                ),
            },
        );
    }

    templates
}
