#![deny(missing_docs)]
//! Build metadata core library.
//!
//! This crate holds the domain types, matching rules and operations behind
//! the build metadata server: the user directory, the project registry, the
//! incremental vote/comment/badge feed, the issue tracker and telemetry.
//! Storage is abstracted behind [`MetadataStore`].

pub mod directory;
pub mod domain;
pub mod error;
pub mod feed;
pub mod issue;
pub mod issues;
pub mod memory;
pub mod project;
pub mod sanitize;
pub mod service;
pub mod store;
pub mod telemetry;

pub use directory::normalize_user_name;
pub use domain::{
    Build, BuildResult, ClientOrigin, Comment, ErrorEvent, ErrorKind, LatestIds, NewBuild,
    NewComment, NewErrorEvent, NewTimingEvent, NewVote, Vote, VoteVerdict,
};
pub use error::{MetadataError, Result};
pub use feed::{ChangeMark, WATERMARK_WINDOW, oldest_in_window, recent_distinct_changes};
pub use issue::{
    ISSUE_DIAGNOSTIC_MAX_LENGTH, ISSUE_SUMMARY_MAX_LENGTH, Issue, IssueBuild, IssueDiagnostic,
    IssuePatch, NewIssue, NewIssueBuild, NewIssueDiagnostic,
};
pub use memory::MemoryStore;
pub use project::{canonical_project, matches_project, project_pattern, same_project};
pub use sanitize::sanitize_text;
pub use service::{MetadataService, SharedStore};
pub use store::{FeedKind, IssueChanges, IssueFilter, MetadataStore, NewIssueRecord};
