//! # Bugfix Harness
//!
//! A bugfix analysis toolkit: static data-model inference, remote log
//! mining, and incident artifact management.
//!
//! The harness takes a bug investigation from a trace identifier to a
//! filed set of artifacts: it infers the backing data model of a source
//! tree by naming convention, pulls correlated log lines from a remote
//! log host, mines them for business facts, and persists everything
//! under a deterministic per-incident directory layout.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────┐   ┌───────────────┐
//! │   Analyzer   │   │   Searcher   │──▶│ Remote channel │
//! │ source tree  │   │ grep + mine  │   │ (ssh command)  │
//! └──────┬───────┘   └──────┬───────┘   └───────────────┘
//!        │                  │
//!        ▼                  ▼
//!   ┌──────────────────────────────┐
//!   │        Artifact Store        │
//!   │ <root>/<bug_id>/{session.json,│
//!   │  logs/, analysis/, reports/} │
//!   └──────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! bfx start --bug-url https://tracker/bug/detail/4711
//! bfx analyze --root ./services --save
//! bfx connect
//! bfx search a1b2c3d4e5f60718293a4b5c6d7e8f90 --bug-id bug_4711
//! bfx report bug_4711 ./root-cause.md
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`analyzer`] | Source-tree → data-model inference |
//! | [`remote`] | Remote execution channel |
//! | [`searcher`] | Remote log retrieval and fact extraction |
//! | [`store`] | Per-incident artifact persistence |

pub mod analyzer;
pub mod config;
pub mod models;
pub mod remote;
pub mod searcher;
pub mod store;
