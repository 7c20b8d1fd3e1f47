//! Incident artifact store.
//!
//! Owns a fixed root directory and the per-incident four-way layout:
//!
//! ```text
//! <root>/<bug_id>/session.json
//! <root>/<bug_id>/logs/
//! <root>/<bug_id>/analysis/
//! <root>/<bug_id>/reports/
//! ```
//!
//! The layout is an append-only artifact log keyed by incident id, not a
//! mutable database. Every save ensures the layout exists first, so
//! callers never pre-create directories. Directory creation is
//! idempotent and order-independent; concurrent writers to the same file
//! name resolve last-writer-wins.

use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::PathBuf;

use crate::models::IncidentSession;

/// Ordered extraction patterns for tracking-system URLs, first match
/// wins: path-style id, alternate path-style id, query-parameter id.
static BUG_URL_RES: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        Regex::new(r"/bug/detail/(\d+)").unwrap(),
        Regex::new(r"/bug/(\d+)").unwrap(),
        Regex::new(r"[?&](?:bug_?id|id)=(\d+)").unwrap(),
    ]
});

pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    /// Create a store rooted at `root`. Relative roots are resolved
    /// against the current directory so every returned path is absolute.
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

    /// Create the incident directory and its `logs`, `analysis`, and
    /// `reports` subdirectories. Idempotent; returns the incident root.
    pub fn ensure_layout(&self, bug_id: &str) -> Result<PathBuf> {
        let incident_dir = self.root.join(bug_id);

        std::fs::create_dir_all(&incident_dir)
            .with_context(|| format!("Failed to create incident dir: {}", incident_dir.display()))?;
        for sub in ["logs", "analysis", "reports"] {
            std::fs::create_dir_all(incident_dir.join(sub))?;
        }

        Ok(incident_dir)
    }

    /// Persist the session record as `session.json`. Re-saving simply
    /// overwrites.
    pub fn save_session(&self, session: &IncidentSession) -> Result<PathBuf> {
        let incident_dir = self.ensure_layout(&session.bug_id)?;
        let path = incident_dir.join("session.json");
        std::fs::write(&path, serde_json::to_string_pretty(session)?)
            .with_context(|| format!("Failed to write session file: {}", path.display()))?;
        Ok(path)
    }

    /// Load the session record for an incident. A missing file is an
    /// explicit absent value, and a parse failure is warned about and
    /// also treated as absent — never an error.
    pub fn load_session(&self, bug_id: &str) -> Option<IncidentSession> {
        let path = self.root.join(bug_id).join("session.json");
        let raw = match std::fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                eprintln!(
                    "[store] WARN: Failed to read session file {}: {}",
                    path.display(),
                    e
                );
                return None;
            }
        };

        match serde_json::from_str(&raw) {
            Ok(session) => Some(session),
            Err(e) => {
                eprintln!(
                    "[store] WARN: Failed to parse session file {}: {}",
                    path.display(),
                    e
                );
                None
            }
        }
    }

    /// Save an analysis artifact; returns the absolute path written.
    pub fn save_analysis(&self, bug_id: &str, filename: &str, content: &str) -> Result<PathBuf> {
        self.save_artifact(bug_id, "analysis", filename, content)
    }

    /// Save a raw log capture; returns the absolute path written.
    pub fn save_log(&self, bug_id: &str, filename: &str, content: &str) -> Result<PathBuf> {
        self.save_artifact(bug_id, "logs", filename, content)
    }

    /// Save a report document; returns the absolute path written.
    pub fn save_report(&self, bug_id: &str, filename: &str, content: &str) -> Result<PathBuf> {
        self.save_artifact(bug_id, "reports", filename, content)
    }

    fn save_artifact(
        &self,
        bug_id: &str,
        kind: &str,
        filename: &str,
        content: &str,
    ) -> Result<PathBuf> {
        let incident_dir = self.ensure_layout(bug_id)?;
        let path = incident_dir.join(kind).join(filename);
        std::fs::write(&path, content)
            .with_context(|| format!("Failed to write artifact: {}", path.display()))?;
        Ok(path)
    }
}

/// Derive an incident identifier from a tracking-system URL when one is
/// supplied, otherwise synthesize `bug_<YYYYMMDD>_<last-6-of-session-id>`
/// on today's date. Deterministic given its inputs and the current time.
pub fn derive_bug_id(session_id: &str, bug_url: Option<&str>) -> String {
    derive_bug_id_on(session_id, bug_url, Utc::now().date_naive())
}

fn derive_bug_id_on(session_id: &str, bug_url: Option<&str>, today: NaiveDate) -> String {
    if let Some(url) = bug_url {
        for re in BUG_URL_RES.iter() {
            if let Some(caps) = re.captures(url) {
                return format!("bug_{}", &caps[1]);
            }
        }
    }

    let tail: String = {
        let chars: Vec<char> = session_id.chars().collect();
        let start = chars.len().saturating_sub(6);
        chars[start..].iter().collect()
    };
    format!("bug_{}_{}", today.format("%Y%m%d"), tail)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample_session(bug_id: &str) -> IncidentSession {
        IncidentSession {
            bug_id: bug_id.to_string(),
            session_id: "sess123456".to_string(),
            trace_id: Some("deadbeef".to_string()),
            bug_url: None,
            description: Some("orders stuck in pending".to_string()),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_ensure_layout_creates_four_subpaths() {
        let tmp = TempDir::new().unwrap();
        let store = ArtifactStore::new(tmp.path());

        let dir = store.ensure_layout("bug_1").unwrap();
        assert!(dir.is_dir());
        for sub in ["logs", "analysis", "reports"] {
            assert!(dir.join(sub).is_dir());
        }
    }

    #[test]
    fn test_ensure_layout_idempotent() {
        let tmp = TempDir::new().unwrap();
        let store = ArtifactStore::new(tmp.path());

        let first = store.ensure_layout("bug_1").unwrap();
        let second = store.ensure_layout("bug_1").unwrap();
        assert_eq!(first, second);

        let entries: Vec<_> = std::fs::read_dir(&first).unwrap().collect();
        assert_eq!(entries.len(), 3);
    }

    #[test]
    fn test_session_round_trip() {
        let tmp = TempDir::new().unwrap();
        let store = ArtifactStore::new(tmp.path());

        let session = sample_session("bug_7");
        store.save_session(&session).unwrap();

        let loaded = store.load_session("bug_7").expect("session present");
        assert_eq!(loaded.bug_id, "bug_7");
        assert_eq!(loaded.session_id, "sess123456");
        assert_eq!(loaded.trace_id.as_deref(), Some("deadbeef"));
    }

    #[test]
    fn test_load_missing_session_is_absent() {
        let tmp = TempDir::new().unwrap();
        let store = ArtifactStore::new(tmp.path());
        assert!(store.load_session("bug_none").is_none());
    }

    #[test]
    fn test_load_corrupt_session_is_absent() {
        let tmp = TempDir::new().unwrap();
        let store = ArtifactStore::new(tmp.path());

        let dir = store.ensure_layout("bug_9").unwrap();
        std::fs::write(dir.join("session.json"), "{not json").unwrap();
        assert!(store.load_session("bug_9").is_none());
    }

    #[test]
    fn test_save_artifacts_return_absolute_paths() {
        let tmp = TempDir::new().unwrap();
        let store = ArtifactStore::new(tmp.path());

        let log = store.save_log("bug_3", "capture.txt", "log body").unwrap();
        let analysis = store
            .save_analysis("bug_3", "model.json", "{}")
            .unwrap();
        let report = store.save_report("bug_3", "final.md", "# done").unwrap();

        for (path, sub) in [(&log, "logs"), (&analysis, "analysis"), (&report, "reports")] {
            assert!(path.is_absolute());
            assert!(path.parent().unwrap().ends_with(sub));
            assert!(path.exists());
        }
        assert_eq!(std::fs::read_to_string(&log).unwrap(), "log body");
    }

    #[test]
    fn test_derive_bug_id_from_url() {
        assert_eq!(
            derive_bug_id(
                "sess123456",
                Some("https://x/tapd_fe/1/bug/detail/1155014084001047319")
            ),
            "bug_1155014084001047319"
        );
        assert_eq!(
            derive_bug_id("sess123456", Some("https://tracker/bug/4711")),
            "bug_4711"
        );
        assert_eq!(
            derive_bug_id("sess123456", Some("https://tracker/view?bug_id=99")),
            "bug_99"
        );
    }

    #[test]
    fn test_derive_bug_id_fallback_uses_date_and_session_tail() {
        let date = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        assert_eq!(
            derive_bug_id_on("sess123456", None, date),
            "bug_20240501_123456"
        );
        // Unrecognized URLs fall back too
        assert_eq!(
            derive_bug_id_on("sess123456", Some("https://tracker/nothing-here"), date),
            "bug_20240501_123456"
        );
        // Short session ids keep what they have
        assert_eq!(derive_bug_id_on("abc", None, date), "bug_20240501_abc");
    }
}
