//! Remote log retrieval and business-fact extraction.
//!
//! The [`LogSearcher`] runs one remote content search per trace id and
//! mines the returned text for domain facts: SQL statements, exceptions,
//! API calls, and user identifiers. Extraction is a pure, line-independent
//! function — no cross-line state.

use chrono::Utc;
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::PathBuf;

use crate::config::{Config, LogServerConfig, SearchConfig};
use crate::models::{BusinessInfo, SearchResult};
use crate::remote::{RemoteExecutor, SshExecutor};
use crate::store::ArtifactStore;

static SQL_LINE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)SELECT|INSERT|UPDATE|DELETE").unwrap());
static EXCEPTION_LINE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)Exception|Error").unwrap());
static API_LINE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)https?://|api").unwrap());
static USER_ID_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(custNo|hboneNo)[=:]?\s*(\d+)").unwrap());

/// Search, extraction, and the optionally persisted raw log, bundled.
#[derive(Debug)]
pub struct SearchAnalysis {
    pub search_result: SearchResult,
    pub business_info: BusinessInfo,
    pub log_file: Option<PathBuf>,
}

/// Searches the remote log corpus for a trace identifier.
///
/// The configuration is read-only after construction; the transport is
/// any [`RemoteExecutor`] (the default is the `ssh` subprocess).
pub struct LogSearcher {
    log_server: LogServerConfig,
    search: SearchConfig,
    executor: Box<dyn RemoteExecutor>,
}

impl LogSearcher {
    /// Create a searcher with the default `ssh` transport.
    pub fn new(config: &Config) -> Self {
        let executor = Box::new(SshExecutor::new(config.log_server.clone()));
        Self::with_executor(config, executor)
    }

    /// Create a searcher over a caller-supplied transport.
    pub fn with_executor(config: &Config, executor: Box<dyn RemoteExecutor>) -> Self {
        Self {
            log_server: config.log_server.clone(),
            search: config.search.clone(),
            executor,
        }
    }

    /// Smoke-test the remote channel. Returns `true` only if the command
    /// completed cleanly; failures are logged, never thrown.
    pub async fn connect(&self) -> bool {
        println!(
            "[searcher] Testing connection to log server: {}",
            self.log_server.host
        );

        let result = self.executor.run(r#"echo "connection test""#).await;
        match result.error {
            Some(err) => {
                eprintln!("[searcher] Failed to connect to log server: {}", err);
                false
            }
            None => {
                println!(
                    "[searcher] Successfully connected to log server: {}",
                    self.log_server.host
                );
                true
            }
        }
    }

    /// Run one remote content search for `trace_id` over all log files
    /// under the configured base directory.
    ///
    /// The output cap (`head`) is applied on the remote side, and the
    /// exact command string is retained on the result for auditability.
    pub async fn search_by_trace_id(&self, trace_id: &str) -> SearchResult {
        if trace_id.len() != self.search.tid_length {
            eprintln!(
                "[searcher] WARN: trace id length {} differs from expected {}",
                trace_id.len(),
                self.search.tid_length
            );
        }

        let mut command = String::from("grep -r");
        if self.search.case_insensitive {
            command.push_str(" -i");
        }
        if self.search.context_lines > 0 {
            command.push_str(&format!(
                " -A {} -B {}",
                self.search.context_lines, self.search.context_lines
            ));
        }
        command.push_str(&format!(
            " '{}' {}*.log | head -{}",
            trace_id, self.log_server.base_directory, self.search.max_lines
        ));

        println!("[searcher] Searching trace id: {}", trace_id);
        println!(
            "[searcher] Search directory: {}",
            self.log_server.base_directory
        );

        let result = self.executor.run(&command).await;
        let lines_count = if result.output.is_empty() {
            0
        } else {
            result.output.split('\n').count()
        };

        SearchResult {
            trace_id: trace_id.to_string(),
            command,
            output: result.output,
            lines_count,
            timestamp: Utc::now(),
            error: result.error,
        }
    }

    /// Search, extract, and optionally persist the raw output under the
    /// incident's `logs/` directory.
    ///
    /// A failed search pairs the error-bearing result with an empty
    /// extraction and no saved path. A failed save is logged and skipped;
    /// extraction still runs over the full output.
    pub async fn search_and_analyze(
        &self,
        trace_id: &str,
        store: Option<(&ArtifactStore, &str)>,
    ) -> SearchAnalysis {
        let search_result = self.search_by_trace_id(trace_id).await;

        if let Some(err) = &search_result.error {
            eprintln!("[searcher] Search failed: {}", err);
            return SearchAnalysis {
                business_info: extract_business_info(""),
                search_result,
                log_file: None,
            };
        }

        println!(
            "[searcher] Search result: found {} lines of logs",
            search_result.lines_count
        );

        if search_result.output.is_empty() {
            println!("[searcher] No relevant logs found");
            return SearchAnalysis {
                business_info: extract_business_info(""),
                search_result,
                log_file: None,
            };
        }

        let mut log_file = None;
        if let Some((store, bug_id)) = store {
            let timestamp = Utc::now().format("%Y-%m-%dT%H-%M-%S-%3fZ");
            let filename = format!("logs_{}_{}.txt", trace_id, timestamp);
            match store.save_log(bug_id, &filename, &search_result.output) {
                Ok(path) => {
                    println!("[searcher] Complete log saved to: {}", path.display());
                    log_file = Some(path);
                }
                Err(e) => eprintln!("[searcher] WARN: Failed to save log file: {}", e),
            }
        }

        println!("\nLog content preview (first 5 lines):");
        for (i, line) in search_result.output.lines().take(5).enumerate() {
            let preview: String = line.chars().take(150).collect();
            println!("  {}: {}", i + 1, preview);
        }

        let business_info = extract_business_info(&search_result.output);

        println!("\nExtracted business information:");
        println!("  User IDs: {}", business_info.user_ids.join(", "));
        println!("  SQL queries: {}", business_info.sql_queries.len());
        println!("  Exceptions: {}", business_info.exceptions.len());
        println!("  API calls: {}", business_info.api_calls.len());

        SearchAnalysis {
            search_result,
            business_info,
            log_file,
        }
    }

    /// No persistent connection is held; this only marks the end of the
    /// remote session.
    pub fn disconnect(&self) {
        println!("[searcher] Remote session completed");
    }
}

/// Mine domain facts from log text.
///
/// Each line is tested against four independent classifiers. The SQL,
/// exception, and API lists retain every matching line including
/// duplicates; `user_ids` is deduplicated in first-seen order. Empty
/// input yields all-empty structures, never an error.
pub fn extract_business_info(log_content: &str) -> BusinessInfo {
    let mut info = BusinessInfo::default();

    for line in log_content.split('\n') {
        if SQL_LINE_RE.is_match(line) {
            info.sql_queries.push(line.trim().to_string());
        }
        if EXCEPTION_LINE_RE.is_match(line) {
            info.exceptions.push(line.trim().to_string());
        }
        if API_LINE_RE.is_match(line) {
            info.api_calls.push(line.trim().to_string());
        }
        for caps in USER_ID_RE.captures_iter(line) {
            let id = caps[2].to_string();
            if !info.user_ids.contains(&id) {
                info.user_ids.push(id);
            }
        }
    }

    info
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::RemoteOutput;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Records every command and replays a canned response.
    struct MockExecutor {
        response: RemoteOutput,
        commands: Mutex<Vec<String>>,
    }

    impl MockExecutor {
        fn ok(output: &str) -> Self {
            Self {
                response: RemoteOutput {
                    output: output.to_string(),
                    error: None,
                },
                commands: Mutex::new(Vec::new()),
            }
        }

        fn failing(error: &str) -> Self {
            Self {
                response: RemoteOutput::failed(error),
                commands: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl RemoteExecutor for MockExecutor {
        async fn run(&self, command: &str) -> RemoteOutput {
            self.commands.lock().unwrap().push(command.to_string());
            self.response.clone()
        }
    }

    fn test_config() -> Config {
        let raw = r#"[log_server]
host = "logs.internal"
username = "app"
base_directory = "/var/log/app/"

[search]
max_lines = 500
context_lines = 2
case_insensitive = true
tid_length = 32
"#;
        toml::from_str(raw).unwrap()
    }

    #[tokio::test]
    async fn test_connect_success_and_failure() {
        let cfg = test_config();
        let ok = LogSearcher::with_executor(&cfg, Box::new(MockExecutor::ok("connection test")));
        assert!(ok.connect().await);

        let bad =
            LogSearcher::with_executor(&cfg, Box::new(MockExecutor::failing("connection refused")));
        assert!(!bad.connect().await);
    }

    #[tokio::test]
    async fn test_search_command_shape() {
        let cfg = test_config();
        let exec = Box::new(MockExecutor::ok("line one\nline two"));
        let searcher = LogSearcher::with_executor(&cfg, exec);

        let result = searcher
            .search_by_trace_id("abcdef0123456789abcdef0123456789")
            .await;

        assert_eq!(
            result.command,
            "grep -r -i -A 2 -B 2 'abcdef0123456789abcdef0123456789' /var/log/app/*.log | head -500"
        );
        assert_eq!(result.lines_count, 2);
        assert!(result.error.is_none());
    }

    #[tokio::test]
    async fn test_search_error_surfaces_with_empty_output() {
        let cfg = test_config();
        let searcher =
            LogSearcher::with_executor(&cfg, Box::new(MockExecutor::failing("Permission denied")));

        let result = searcher.search_by_trace_id("deadbeef").await;
        assert_eq!(result.error.as_deref(), Some("Permission denied"));
        assert_eq!(result.output, "");
        assert_eq!(result.lines_count, 0);
    }

    #[tokio::test]
    async fn test_search_and_analyze_error_yields_empty_extraction() {
        let cfg = test_config();
        let searcher =
            LogSearcher::with_executor(&cfg, Box::new(MockExecutor::failing("timed out")));

        let analysis = searcher.search_and_analyze("deadbeef", None).await;
        assert!(analysis.search_result.error.is_some());
        assert!(analysis.business_info.sql_queries.is_empty());
        assert!(analysis.business_info.user_ids.is_empty());
        assert!(analysis.log_file.is_none());
    }

    #[tokio::test]
    async fn test_search_and_analyze_persists_log() {
        let cfg = test_config();
        let output = "2024-05-01 custNo=1001 SELECT * FROM orders\nordinary line";
        let searcher = LogSearcher::with_executor(&cfg, Box::new(MockExecutor::ok(output)));

        let tmp = TempDir::new().unwrap();
        let store = ArtifactStore::new(tmp.path());
        let analysis = searcher
            .search_and_analyze("deadbeef", Some((&store, "bug_42")))
            .await;

        let log_file = analysis.log_file.expect("log file saved");
        assert!(log_file.starts_with(tmp.path()));
        assert!(log_file.to_string_lossy().contains("logs_deadbeef_"));
        assert_eq!(std::fs::read_to_string(&log_file).unwrap(), output);
        assert_eq!(analysis.business_info.user_ids, vec!["1001"]);
        assert_eq!(analysis.business_info.sql_queries.len(), 1);
    }

    #[test]
    fn test_extract_empty_input() {
        let info = extract_business_info("");
        assert!(info.sql_queries.is_empty());
        assert!(info.exceptions.is_empty());
        assert!(info.api_calls.is_empty());
        assert!(info.user_ids.is_empty());
    }

    #[test]
    fn test_extract_classifiers_are_independent() {
        let text = "  select * from tp_deal where id = 1\n\
                    java.lang.NullPointerException at Foo.bar\n\
                    calling https://pay.example.com/v1/charge\n\
                    GET /api/orders returned 500";
        let info = extract_business_info(text);
        assert_eq!(info.sql_queries.len(), 1);
        assert_eq!(info.sql_queries[0], "select * from tp_deal where id = 1");
        assert_eq!(info.exceptions.len(), 1);
        assert_eq!(info.api_calls.len(), 2);
    }

    #[test]
    fn test_extract_duplicate_lines_are_kept() {
        let text = "SELECT 1\nSELECT 1";
        let info = extract_business_info(text);
        assert_eq!(info.sql_queries.len(), 2);
    }

    #[test]
    fn test_extract_user_ids_deduplicated() {
        let text = "custNo=1001 start\ncustNo=1001 retry\ncustNo=1002 other\nhboneNo: 7007";
        let info = extract_business_info(text);
        assert_eq!(info.user_ids, vec!["1001", "1002", "7007"]);
    }
}
