//! Database models for the metadata server.

use buildmeta_core::IssueChanges;
use chrono::NaiveDateTime;
use diesel::prelude::*;

use crate::schema::{
    badges, comments, errors, issue_builds, issue_diagnostics, issue_watchers, issues, telemetry,
    user_votes,
};

#[derive(Debug, Clone, Queryable)]
/// Vote joined with its project name.
pub struct VoteRow {
    /// Vote identifier.
    pub id: i64,
    /// Change number voted on.
    pub change_number: i32,
    /// Voter name as sent by the client.
    pub user_name: String,
    /// Stored verdict label.
    pub verdict: String,
    /// Project name.
    pub project: String,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = user_votes)]
/// Insertable vote.
pub struct NewVoteRow<'a> {
    /// Change number voted on.
    pub change_number: i32,
    /// Voter name.
    pub user_name: &'a str,
    /// Verdict label.
    pub verdict: &'a str,
    /// Owning project.
    pub project_id: i64,
}

#[derive(Debug, Clone, Queryable)]
/// Comment joined with its project name.
pub struct CommentRow {
    /// Comment identifier.
    pub id: i64,
    /// Change number commented on.
    pub change_number: i32,
    /// Author name.
    pub user_name: String,
    /// Comment body.
    pub text: String,
    /// Project name.
    pub project: String,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = comments)]
/// Insertable comment.
pub struct NewCommentRow<'a> {
    /// Change number commented on.
    pub change_number: i32,
    /// Author name.
    pub user_name: &'a str,
    /// Comment body.
    pub text: &'a str,
    /// Owning project.
    pub project_id: i64,
}

#[derive(Debug, Clone, Queryable)]
/// Badge left-joined with its optional project name.
pub struct BadgeRow {
    /// Badge identifier.
    pub id: i64,
    /// Change number the badge belongs to.
    pub change_number: i32,
    /// Badge label.
    pub build_type: String,
    /// Stored result label.
    pub result: String,
    /// Link to the CI job.
    pub url: String,
    /// Archive location, if any.
    pub archive_path: Option<String>,
    /// Project name; unset for universal badges.
    pub project: Option<String>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = badges)]
/// Insertable badge.
pub struct NewBadgeRow<'a> {
    /// Change number the badge belongs to.
    pub change_number: i32,
    /// Badge label.
    pub build_type: &'a str,
    /// Result label.
    pub result: &'a str,
    /// Link to the CI job.
    pub url: &'a str,
    /// Archive location.
    pub archive_path: Option<&'a str>,
    /// Owning project.
    pub project_id: Option<i64>,
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = errors)]
/// Stored error report.
pub struct ErrorRow {
    /// Report identifier.
    pub id: i64,
    /// Stored kind label.
    pub kind: String,
    /// Report body.
    pub text: String,
    /// Reporting user.
    pub user_name: String,
    /// Project name at report time.
    pub project: Option<String>,
    /// Client timestamp.
    pub reported_at: NaiveDateTime,
    /// Client version.
    pub version: String,
    /// Client address.
    pub ip_address: String,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = errors)]
/// Insertable error report.
pub struct NewErrorRow<'a> {
    /// Kind label.
    pub kind: &'a str,
    /// Report body.
    pub text: &'a str,
    /// Reporting user.
    pub user_name: &'a str,
    /// Project name.
    pub project: Option<&'a str>,
    /// Registered project.
    pub project_id: Option<i64>,
    /// Client timestamp.
    pub reported_at: NaiveDateTime,
    /// Client version.
    pub version: &'a str,
    /// Client address.
    pub ip_address: &'a str,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = telemetry)]
/// Insertable timing sample.
pub struct NewTimingRow<'a> {
    /// Timed action.
    pub action: &'a str,
    /// Action result.
    pub result: &'a str,
    /// Reporting user.
    pub user_name: &'a str,
    /// Project name.
    pub project: &'a str,
    /// Registered project.
    pub project_id: i64,
    /// Client timestamp.
    pub recorded_at: NaiveDateTime,
    /// Duration in seconds.
    pub duration: f32,
    /// Client version.
    pub version: &'a str,
    /// Client address.
    pub ip_address: &'a str,
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = issues)]
/// Issue record with user references unresolved.
pub struct IssueRow {
    /// Issue identifier.
    pub id: i64,
    /// Creation timestamp.
    pub created_at: NaiveDateTime,
    /// Project name.
    pub project: String,
    /// Summary line.
    pub summary: String,
    /// Owner user id.
    pub owner_id: Option<i64>,
    /// Nominator user id.
    pub nominated_by_id: Option<i64>,
    /// Acknowledgement timestamp.
    pub acknowledged_at: Option<NaiveDateTime>,
    /// Fix changelist, 0 when unset.
    pub fix_change: i32,
    /// Resolution timestamp.
    pub resolved_at: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = issues)]
/// Insertable issue.
pub struct NewIssueRow<'a> {
    /// Creation timestamp.
    pub created_at: NaiveDateTime,
    /// Project name.
    pub project: &'a str,
    /// Summary line.
    pub summary: &'a str,
    /// Owner user id.
    pub owner_id: Option<i64>,
}

#[derive(Debug, Clone, AsChangeset)]
#[diesel(table_name = issues)]
/// Partial issue update; `None` fields are left out of the statement.
pub struct IssueChangeset {
    /// New summary.
    pub summary: Option<String>,
    /// New owner id.
    pub owner_id: Option<i64>,
    /// New nominator id.
    pub nominated_by_id: Option<i64>,
    /// New acknowledgement timestamp; `Some(None)` writes NULL.
    pub acknowledged_at: Option<Option<NaiveDateTime>>,
    /// New fix changelist.
    pub fix_change: Option<i32>,
    /// New resolution timestamp; `Some(None)` writes NULL.
    pub resolved_at: Option<Option<NaiveDateTime>>,
}

impl From<&IssueChanges> for IssueChangeset {
    fn from(changes: &IssueChanges) -> Self {
        Self {
            summary: changes.summary.clone(),
            owner_id: changes.owner_id,
            nominated_by_id: changes.nominated_by_id,
            acknowledged_at: changes.acknowledged_at,
            fix_change: changes.fix_change,
            resolved_at: changes.resolved_at,
        }
    }
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = issue_builds)]
/// CI job step attached to an issue.
pub struct IssueBuildRow {
    /// Build identifier.
    pub id: i64,
    /// Stream the job ran on.
    pub stream: String,
    /// Change number built.
    pub change_number: i32,
    /// Job name.
    pub job_name: String,
    /// Job link.
    pub job_url: String,
    /// Step name.
    pub job_step_name: String,
    /// Step link.
    pub job_step_url: String,
    /// Error link.
    pub error_url: Option<String>,
    /// Outcome code.
    pub outcome: i32,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = issue_builds)]
/// Insertable issue build.
pub struct NewIssueBuildRow<'a> {
    /// Owning issue.
    pub issue_id: i64,
    /// Stream the job ran on.
    pub stream: &'a str,
    /// Change number built.
    pub change_number: i32,
    /// Job name.
    pub job_name: &'a str,
    /// Job link.
    pub job_url: &'a str,
    /// Step name.
    pub job_step_name: &'a str,
    /// Step link.
    pub job_step_url: &'a str,
    /// Error link.
    pub error_url: Option<&'a str>,
    /// Outcome code.
    pub outcome: i32,
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = issue_diagnostics)]
/// Diagnostic attached to an issue.
pub struct DiagnosticRow {
    /// Referenced issue build.
    pub build_id: Option<i64>,
    /// Sanitized message.
    pub message: String,
    /// Link to the full log.
    pub url: String,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = issue_diagnostics)]
/// Insertable diagnostic.
pub struct NewDiagnosticRow<'a> {
    /// Owning issue.
    pub issue_id: i64,
    /// Referenced issue build.
    pub build_id: Option<i64>,
    /// Sanitized message.
    pub message: &'a str,
    /// Link to the full log.
    pub url: &'a str,
}

#[derive(Debug, Clone, Copy, Insertable)]
#[diesel(table_name = issue_watchers)]
/// Watcher pair.
pub struct NewWatcherRow {
    /// Watched issue.
    pub issue_id: i64,
    /// Watching user.
    pub user_id: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn changeset_keeps_set_and_clear_apart() {
        let acknowledged = NaiveDate::from_ymd_opt(2024, 5, 1)
            .and_then(|date| date.and_hms_opt(8, 0, 0))
            .expect("timestamp");
        let changes = IssueChanges {
            acknowledged_at: Some(Some(acknowledged)),
            resolved_at: Some(None),
            fix_change: Some(12),
            ..IssueChanges::default()
        };
        let changeset = IssueChangeset::from(&changes);
        assert_eq!(changeset.acknowledged_at, Some(Some(acknowledged)));
        assert_eq!(changeset.resolved_at, Some(None));
        assert_eq!(changeset.fix_change, Some(12));
        assert_eq!(changeset.summary, None);
        assert_eq!(changeset.owner_id, None);
    }
}
