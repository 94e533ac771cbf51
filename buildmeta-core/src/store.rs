//! Storage contract consumed by [`crate::MetadataService`].
//!
//! Implementations own connection handling: every method acquires what it
//! needs and releases it before returning, on success and failure alike.
//! Only [`MetadataStore::delete_issue`] spans several statements and must be
//! atomic.

use chrono::NaiveDateTime;

use crate::domain::{
    Build, ClientOrigin, Comment, ErrorEvent, NewBuild, NewComment, NewErrorEvent,
    NewTimingEvent, NewVote, Vote,
};
use crate::error::Result;
use crate::feed::ChangeMark;
use crate::issue::{Issue, IssueBuild, IssueDiagnostic, NewIssueBuild};

/// Which incremental feed a query targets.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum FeedKind {
    /// User votes.
    Votes,
    /// Comments.
    Comments,
    /// CI badges.
    Builds,
}

/// Issue row ready for insertion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewIssueRecord {
    /// Project name.
    pub project: String,
    /// Already sanitized summary.
    pub summary: String,
    /// Resolved owner id.
    pub owner_id: Option<i64>,
    /// Server time of creation.
    pub created_at: NaiveDateTime,
}

/// Column-level issue update. `None` leaves a column untouched; the nested
/// options on timestamps distinguish "set" from "clear".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IssueChanges {
    /// New sanitized summary.
    pub summary: Option<String>,
    /// New owner id.
    pub owner_id: Option<i64>,
    /// New nominator id.
    pub nominated_by_id: Option<i64>,
    /// New acknowledgement timestamp, or `Some(None)` to clear it.
    pub acknowledged_at: Option<Option<NaiveDateTime>>,
    /// New fix changelist.
    pub fix_change: Option<i32>,
    /// New resolution timestamp, or `Some(None)` to clear it.
    pub resolved_at: Option<Option<NaiveDateTime>>,
}

impl IssueChanges {
    /// Whether no column would be written.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Selection of issues to read.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IssueFilter {
    /// Only this issue.
    pub id: Option<i64>,
    /// Only issues watched by this user; rows come back with `notify` set.
    pub watcher_id: Option<i64>,
    /// Include issues with a resolution timestamp.
    pub include_resolved: bool,
    /// Maximum rows; `None` is unbounded.
    pub limit: Option<usize>,
}

/// Data-access primitives behind every metadata operation.
#[cfg_attr(test, mockall::automock)]
pub trait MetadataStore {
    /// Look up a normalized user name.
    fn find_user_id(&self, name: &str) -> Result<Option<i64>>;
    /// Insert a normalized user name, ignoring a conflicting row, and return the stored id.
    fn insert_user(&self, name: &str) -> Result<i64>;
    /// Insert a project name, ignoring a conflicting row, and return the stored id.
    fn ensure_project(&self, name: &str) -> Result<i64>;

    /// The `window` most recent distinct change numbers of a feed whose project
    /// name matches `pattern`, newest first, each with its smallest entry id.
    fn recent_changes(
        &self,
        kind: FeedKind,
        pattern: &str,
        window: usize,
    ) -> Result<Vec<ChangeMark>>;
    /// Votes newer than `last_id` whose project matches `pattern`, ascending.
    fn votes_after(&self, pattern: &str, last_id: i64) -> Result<Vec<Vote>>;
    /// Comments newer than `last_id` whose project matches `pattern`, ascending.
    fn comments_after(&self, pattern: &str, last_id: i64) -> Result<Vec<Comment>>;
    /// Builds newer than `last_id` whose project matches `pattern` or is unset, ascending.
    fn builds_after(&self, pattern: &str, last_id: i64) -> Result<Vec<Build>>;
    /// Append a vote.
    fn insert_vote(&self, vote: &NewVote, project_id: i64) -> Result<u64>;
    /// Append a comment.
    fn insert_comment(&self, comment: &NewComment, project_id: i64) -> Result<u64>;
    /// Append a build badge.
    fn insert_build(&self, build: &NewBuild, project_id: Option<i64>) -> Result<u64>;

    /// The `count` newest error reports, newest first.
    fn recent_errors(&self, count: usize) -> Result<Vec<ErrorEvent>>;
    /// Append a timing sample.
    fn insert_timing(
        &self,
        event: &NewTimingEvent,
        project_id: i64,
        origin: &ClientOrigin,
    ) -> Result<u64>;
    /// Append an error report.
    fn insert_error(
        &self,
        event: &NewErrorEvent,
        project_id: Option<i64>,
        origin: &ClientOrigin,
    ) -> Result<u64>;

    /// Insert an issue and return its id.
    fn insert_issue(&self, issue: &NewIssueRecord) -> Result<i64>;
    /// Read issues newest first.
    fn issues(&self, filter: &IssueFilter) -> Result<Vec<Issue>>;
    /// Apply a non-empty change set; returns affected rows.
    fn update_issue(&self, id: i64, changes: &IssueChanges) -> Result<u64>;
    /// Delete an issue with its diagnostics, watchers and builds in one transaction.
    fn delete_issue(&self, id: i64) -> Result<u64>;

    /// Attach a diagnostic.
    fn insert_diagnostic(&self, issue_id: i64, diagnostic: &IssueDiagnostic) -> Result<u64>;
    /// Diagnostics of an issue in insertion order.
    fn diagnostics(&self, issue_id: i64) -> Result<Vec<IssueDiagnostic>>;

    /// Add a watcher, ignoring an existing pair.
    fn insert_watcher(&self, issue_id: i64, user_id: i64) -> Result<u64>;
    /// Remove a watcher if present.
    fn delete_watcher(&self, issue_id: i64, user_id: i64) -> Result<u64>;
    /// Watcher names of an issue.
    fn watchers(&self, issue_id: i64) -> Result<Vec<String>>;

    /// Associate a CI job step and return its id.
    fn insert_issue_build(&self, issue_id: i64, build: &NewIssueBuild) -> Result<i64>;
    /// A single issue build.
    fn issue_build(&self, id: i64) -> Result<Option<IssueBuild>>;
    /// Builds of an issue in insertion order.
    fn issue_builds(&self, issue_id: i64) -> Result<Vec<IssueBuild>>;
    /// Overwrite a build's outcome code.
    fn update_issue_build_outcome(&self, id: i64, outcome: i32) -> Result<u64>;
}
