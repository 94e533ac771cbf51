//! Issue tracker operations.
//!
//! An issue is open until it carries a resolution timestamp; clearing the
//! timestamp reopens it. Acknowledgement is a separate flag owned by the
//! issue's owner and does not affect the lifecycle.

use log::info;

use crate::error::Result;
use crate::issue::{
    ISSUE_DIAGNOSTIC_MAX_LENGTH, ISSUE_SUMMARY_MAX_LENGTH, Issue, IssueBuild, IssueDiagnostic,
    IssuePatch, NewIssue, NewIssueBuild, NewIssueDiagnostic,
};
use crate::sanitize::sanitize_text;
use crate::service::MetadataService;
use crate::store::{IssueChanges, IssueFilter, NewIssueRecord};

impl MetadataService {
    /// Open an issue and return its id.
    pub fn create_issue(&self, issue: &NewIssue) -> Result<i64> {
        let owner_id = issue
            .owner
            .as_deref()
            .map(|owner| self.find_or_add_user(owner))
            .transpose()?;
        let record = NewIssueRecord {
            project: issue.project.clone(),
            summary: sanitize_text(&issue.summary, ISSUE_SUMMARY_MAX_LENGTH),
            owner_id,
            created_at: Self::now(),
        };
        let id = self.store.insert_issue(&record)?;
        info!("opened issue {id} in {}", record.project);
        Ok(id)
    }

    /// A single issue, if it exists.
    pub fn get_issue(&self, id: i64) -> Result<Option<Issue>> {
        let filter = IssueFilter {
            id: Some(id),
            include_resolved: true,
            ..IssueFilter::default()
        };
        Ok(self.store.issues(&filter)?.into_iter().next())
    }

    /// Issues newest first. A `limit` of zero or less returns every issue.
    pub fn list_issues(&self, include_resolved: bool, limit: i64) -> Result<Vec<Issue>> {
        let filter = IssueFilter {
            include_resolved,
            limit: usize::try_from(limit).ok().filter(|limit| *limit > 0),
            ..IssueFilter::default()
        };
        self.store.issues(&filter)
    }

    /// Open issues watched by `user_name`, each flagged for notification.
    ///
    /// Reading never registers the user; unknown users watch nothing.
    pub fn list_issues_for_user(&self, user_name: &str) -> Result<Vec<Issue>> {
        let Some(user_id) = self.find_user(user_name)? else {
            return Ok(Vec::new());
        };
        let filter = IssueFilter {
            watcher_id: Some(user_id),
            include_resolved: false,
            ..IssueFilter::default()
        };
        self.store.issues(&filter)
    }

    /// Apply the provided fields of `patch`; returns affected rows.
    ///
    /// Unknown ids and empty patches affect nothing and are not errors.
    pub fn update_issue(&self, id: i64, patch: &IssuePatch) -> Result<u64> {
        if patch.is_empty() {
            return Ok(0);
        }
        let now = Self::now();
        let stamp = |flag: bool| if flag { Some(now) } else { None };
        let changes = IssueChanges {
            summary: patch
                .summary
                .as_deref()
                .map(|summary| sanitize_text(summary, ISSUE_SUMMARY_MAX_LENGTH)),
            owner_id: patch
                .owner
                .as_deref()
                .map(|owner| self.find_or_add_user(owner))
                .transpose()?,
            nominated_by_id: patch
                .nominated_by
                .as_deref()
                .map(|nominator| self.find_or_add_user(nominator))
                .transpose()?,
            acknowledged_at: patch.acknowledged.map(stamp),
            fix_change: patch.fix_change,
            resolved_at: patch.resolved.map(stamp),
        };
        let affected = self.store.update_issue(id, &changes)?;
        match patch.resolved {
            Some(true) if affected > 0 => info!("resolved issue {id}"),
            Some(false) if affected > 0 => info!("reopened issue {id}"),
            _ => {}
        }
        Ok(affected)
    }

    /// Delete an issue together with its diagnostics, watchers and builds.
    pub fn delete_issue(&self, id: i64) -> Result<u64> {
        let affected = self.store.delete_issue(id)?;
        info!("deleted issue {id} ({affected} rows)");
        Ok(affected)
    }

    /// Attach a diagnostic; the message is capped before storage.
    pub fn add_diagnostic(&self, issue_id: i64, diagnostic: &NewIssueDiagnostic) -> Result<u64> {
        let diagnostic = IssueDiagnostic {
            build_id: diagnostic.build_id,
            message: sanitize_text(&diagnostic.message, ISSUE_DIAGNOSTIC_MAX_LENGTH),
            url: diagnostic.url.clone(),
        };
        self.store.insert_diagnostic(issue_id, &diagnostic)
    }

    /// Diagnostics of an issue in the order they were attached.
    pub fn get_diagnostics(&self, issue_id: i64) -> Result<Vec<IssueDiagnostic>> {
        self.store.diagnostics(issue_id)
    }

    /// Make `user_name` watch an issue. Watching twice is a no-op.
    pub fn add_watcher(&self, issue_id: i64, user_name: &str) -> Result<u64> {
        let user_id = self.find_or_add_user(user_name)?;
        self.store.insert_watcher(issue_id, user_id)
    }

    /// Stop `user_name` watching an issue. Removing an absent watcher is a no-op.
    pub fn remove_watcher(&self, issue_id: i64, user_name: &str) -> Result<u64> {
        match self.find_user(user_name)? {
            Some(user_id) => self.store.delete_watcher(issue_id, user_id),
            None => Ok(0),
        }
    }

    /// Normalized names of an issue's watchers.
    pub fn get_watchers(&self, issue_id: i64) -> Result<Vec<String>> {
        self.store.watchers(issue_id)
    }

    /// Associate a CI job step with an issue and return the build id.
    pub fn add_build(&self, issue_id: i64, build: &NewIssueBuild) -> Result<i64> {
        self.store.insert_issue_build(issue_id, build)
    }

    /// A single issue build, if it exists.
    pub fn get_build(&self, build_id: i64) -> Result<Option<IssueBuild>> {
        self.store.issue_build(build_id)
    }

    /// Builds associated with an issue.
    pub fn get_builds(&self, issue_id: i64) -> Result<Vec<IssueBuild>> {
        self.store.issue_builds(issue_id)
    }

    /// Record a new outcome code for an issue build.
    pub fn update_build_outcome(&self, build_id: i64, outcome: i32) -> Result<u64> {
        self.store.update_issue_build_outcome(build_id, outcome)
    }
}
