//! In-process [`MetadataStore`] for tests and local development.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, MutexGuard};

use chrono::Utc;

use crate::domain::{
    Build, ClientOrigin, Comment, ErrorEvent, NewBuild, NewComment, NewErrorEvent,
    NewTimingEvent, NewVote, Vote,
};
use crate::error::{MetadataError, Result};
use crate::feed::{ChangeMark, recent_distinct_changes};
use crate::issue::{Issue, IssueBuild, IssueDiagnostic, NewIssueBuild};
use crate::store::{FeedKind, IssueChanges, IssueFilter, MetadataStore, NewIssueRecord};

#[derive(Debug, Clone)]
struct IssueRow {
    id: i64,
    record: NewIssueRecord,
    nominated_by_id: Option<i64>,
    acknowledged_at: Option<chrono::NaiveDateTime>,
    fix_change: i32,
    resolved_at: Option<chrono::NaiveDateTime>,
}

#[derive(Debug, Default)]
struct State {
    users: Vec<String>,
    projects: Vec<String>,
    votes: Vec<(NewVote, i64)>,
    comments: Vec<(NewComment, i64)>,
    builds: Vec<(NewBuild, Option<i64>)>,
    errors: Vec<ErrorEvent>,
    timing_samples: BTreeMap<i64, u64>,
    issues: Vec<IssueRow>,
    next_issue_id: i64,
    diagnostics: Vec<(i64, IssueDiagnostic)>,
    watchers: BTreeSet<(i64, i64)>,
    builds_by_issue: Vec<(i64, IssueBuild)>,
    next_issue_build_id: i64,
}

impl State {
    fn project_name(&self, id: i64) -> Option<&str> {
        usize::try_from(id - 1)
            .ok()
            .and_then(|index| self.projects.get(index))
            .map(String::as_str)
    }

    fn user_name(&self, id: i64) -> Option<String> {
        usize::try_from(id - 1)
            .ok()
            .and_then(|index| self.users.get(index))
            .cloned()
    }

    fn require_issue(&self, issue_id: i64) -> Result<()> {
        if self.issues.iter().any(|issue| issue.id == issue_id) {
            Ok(())
        } else {
            Err(MetadataError::IntegrityViolation(format!(
                "issue {issue_id} does not exist"
            )))
        }
    }

    fn feed_marks(&self, kind: FeedKind, pattern: &str) -> Vec<ChangeMark> {
        let mark = |index: usize, change: i32| ChangeMark {
            change,
            id: index as i64 + 1,
        };
        match kind {
            FeedKind::Votes => self
                .votes
                .iter()
                .enumerate()
                .filter(|(_, (_, project_id))| self.project_like(Some(*project_id), pattern))
                .map(|(index, (vote, _))| mark(index, vote.change))
                .collect(),
            FeedKind::Comments => self
                .comments
                .iter()
                .enumerate()
                .filter(|(_, (_, project_id))| self.project_like(Some(*project_id), pattern))
                .map(|(index, (comment, _))| mark(index, comment.change_number))
                .collect(),
            FeedKind::Builds => self
                .builds
                .iter()
                .enumerate()
                .filter(|(_, (_, project_id))| self.project_like(*project_id, pattern))
                .map(|(index, (build, _))| mark(index, build.change_number))
                .collect(),
        }
    }

    /// Unscoped rows pass only for builds, which are the only feed that stores them.
    fn project_like(&self, project_id: Option<i64>, pattern: &str) -> bool {
        match project_id {
            None => true,
            Some(id) => self
                .project_name(id)
                .is_some_and(|name| like_contains(name, pattern)),
        }
    }
}

/// Case-insensitive `%needle%` match.
fn like_contains(value: &str, pattern: &str) -> bool {
    let needle = pattern.trim_matches('%').to_lowercase();
    value.to_lowercase().contains(&needle)
}

/// Mutex-guarded tables with the same semantics as the PostgreSQL schema:
/// unique user and project names, unique watcher pairs, and rejected child
/// rows for missing issues.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of timing samples recorded against `project`.
    pub fn timing_samples(&self, project: &str) -> Result<u64> {
        let state = self.lock()?;
        Ok(state
            .projects
            .iter()
            .position(|name| name == project)
            .and_then(|index| state.timing_samples.get(&row_id(index)))
            .copied()
            .unwrap_or(0))
    }

    fn lock(&self) -> Result<MutexGuard<'_, State>> {
        self.state
            .lock()
            .map_err(|_| MetadataError::StorageUnavailable("memory store poisoned".to_string()))
    }
}

fn row_id(index: usize) -> i64 {
    index as i64 + 1
}

impl MetadataStore for MemoryStore {
    fn find_user_id(&self, name: &str) -> Result<Option<i64>> {
        let state = self.lock()?;
        Ok(state.users.iter().position(|user| user == name).map(row_id))
    }

    fn insert_user(&self, name: &str) -> Result<i64> {
        let mut state = self.lock()?;
        if let Some(index) = state.users.iter().position(|user| user == name) {
            return Ok(row_id(index));
        }
        state.users.push(name.to_string());
        Ok(row_id(state.users.len() - 1))
    }

    fn ensure_project(&self, name: &str) -> Result<i64> {
        let mut state = self.lock()?;
        if let Some(index) = state.projects.iter().position(|project| project == name) {
            return Ok(row_id(index));
        }
        state.projects.push(name.to_string());
        Ok(row_id(state.projects.len() - 1))
    }

    fn recent_changes(
        &self,
        kind: FeedKind,
        pattern: &str,
        window: usize,
    ) -> Result<Vec<ChangeMark>> {
        let state = self.lock()?;
        Ok(recent_distinct_changes(
            state.feed_marks(kind, pattern),
            window,
        ))
    }

    fn votes_after(&self, pattern: &str, last_id: i64) -> Result<Vec<Vote>> {
        let state = self.lock()?;
        Ok(state
            .votes
            .iter()
            .enumerate()
            .map(|(index, row)| (row_id(index), row))
            .filter(|(id, (_, project_id))| {
                *id > last_id && state.project_like(Some(*project_id), pattern)
            })
            .map(|(id, (vote, project_id))| Vote {
                id,
                change: vote.change,
                user_name: vote.user_name.clone(),
                verdict: vote.verdict,
                project: state.project_name(*project_id).unwrap_or_default().to_string(),
            })
            .collect())
    }

    fn comments_after(&self, pattern: &str, last_id: i64) -> Result<Vec<Comment>> {
        let state = self.lock()?;
        Ok(state
            .comments
            .iter()
            .enumerate()
            .map(|(index, row)| (row_id(index), row))
            .filter(|(id, (_, project_id))| {
                *id > last_id && state.project_like(Some(*project_id), pattern)
            })
            .map(|(id, (comment, project_id))| Comment {
                id,
                change_number: comment.change_number,
                user_name: comment.user_name.clone(),
                text: comment.text.clone(),
                project: state.project_name(*project_id).unwrap_or_default().to_string(),
            })
            .collect())
    }

    fn builds_after(&self, pattern: &str, last_id: i64) -> Result<Vec<Build>> {
        let state = self.lock()?;
        Ok(state
            .builds
            .iter()
            .enumerate()
            .map(|(index, row)| (row_id(index), row))
            .filter(|(id, (_, project_id))| *id > last_id && state.project_like(*project_id, pattern))
            .map(|(id, (build, project_id))| Build {
                id,
                change_number: build.change_number,
                build_type: build.build_type.clone(),
                result: build.result,
                url: build.url.clone(),
                archive_path: build.archive_path.clone(),
                project: project_id
                    .and_then(|project_id| state.project_name(project_id))
                    .map(str::to_string),
            })
            .collect())
    }

    fn insert_vote(&self, vote: &NewVote, project_id: i64) -> Result<u64> {
        self.lock()?.votes.push((vote.clone(), project_id));
        Ok(1)
    }

    fn insert_comment(&self, comment: &NewComment, project_id: i64) -> Result<u64> {
        self.lock()?.comments.push((comment.clone(), project_id));
        Ok(1)
    }

    fn insert_build(&self, build: &NewBuild, project_id: Option<i64>) -> Result<u64> {
        self.lock()?.builds.push((build.clone(), project_id));
        Ok(1)
    }

    fn recent_errors(&self, count: usize) -> Result<Vec<ErrorEvent>> {
        let state = self.lock()?;
        Ok(state.errors.iter().rev().take(count).cloned().collect())
    }

    fn insert_timing(
        &self,
        _event: &NewTimingEvent,
        project_id: i64,
        _origin: &ClientOrigin,
    ) -> Result<u64> {
        let mut state = self.lock()?;
        if state.project_name(project_id).is_none() {
            return Err(MetadataError::IntegrityViolation(format!(
                "project {project_id} does not exist"
            )));
        }
        *state.timing_samples.entry(project_id).or_default() += 1;
        Ok(1)
    }

    fn insert_error(
        &self,
        event: &NewErrorEvent,
        project_id: Option<i64>,
        origin: &ClientOrigin,
    ) -> Result<u64> {
        let mut state = self.lock()?;
        let project = project_id
            .and_then(|project_id| state.project_name(project_id))
            .map(str::to_string);
        let id = row_id(state.errors.len());
        state.errors.push(ErrorEvent {
            id,
            kind: event.kind,
            text: event.text.clone(),
            user_name: event.user_name.clone(),
            project,
            timestamp: event.timestamp,
            version: origin.version.clone(),
            ip_address: origin.ip_address.clone(),
        });
        Ok(1)
    }

    fn insert_issue(&self, issue: &NewIssueRecord) -> Result<i64> {
        let mut state = self.lock()?;
        state.next_issue_id += 1;
        let id = state.next_issue_id;
        state.issues.push(IssueRow {
            id,
            record: issue.clone(),
            nominated_by_id: None,
            acknowledged_at: None,
            fix_change: 0,
            resolved_at: None,
        });
        Ok(id)
    }

    fn issues(&self, filter: &IssueFilter) -> Result<Vec<Issue>> {
        let state = self.lock()?;
        let retrieved_at = Utc::now().naive_utc();
        let mut issues: Vec<Issue> = state
            .issues
            .iter()
            .rev()
            .filter(|row| filter.id.is_none_or(|id| row.id == id))
            .filter(|row| filter.include_resolved || row.resolved_at.is_none())
            .filter(|row| {
                filter
                    .watcher_id
                    .is_none_or(|user_id| state.watchers.contains(&(row.id, user_id)))
            })
            .map(|row| Issue {
                id: row.id,
                created_at: row.record.created_at,
                retrieved_at,
                project: row.record.project.clone(),
                summary: row.record.summary.clone(),
                owner: row.record.owner_id.and_then(|id| state.user_name(id)),
                nominated_by: row.nominated_by_id.and_then(|id| state.user_name(id)),
                acknowledged_at: row.acknowledged_at,
                fix_change: row.fix_change,
                resolved_at: row.resolved_at,
                notify: filter.watcher_id.is_some(),
            })
            .collect();
        if let Some(limit) = filter.limit {
            issues.truncate(limit);
        }
        Ok(issues)
    }

    fn update_issue(&self, id: i64, changes: &IssueChanges) -> Result<u64> {
        let mut state = self.lock()?;
        let Some(row) = state.issues.iter_mut().find(|row| row.id == id) else {
            return Ok(0);
        };
        if let Some(summary) = &changes.summary {
            row.record.summary = summary.clone();
        }
        if let Some(owner_id) = changes.owner_id {
            row.record.owner_id = Some(owner_id);
        }
        if let Some(nominated_by_id) = changes.nominated_by_id {
            row.nominated_by_id = Some(nominated_by_id);
        }
        if let Some(acknowledged_at) = changes.acknowledged_at {
            row.acknowledged_at = acknowledged_at;
        }
        if let Some(fix_change) = changes.fix_change {
            row.fix_change = fix_change;
        }
        if let Some(resolved_at) = changes.resolved_at {
            row.resolved_at = resolved_at;
        }
        Ok(1)
    }

    fn delete_issue(&self, id: i64) -> Result<u64> {
        let mut state = self.lock()?;
        let before = state.diagnostics.len()
            + state.watchers.len()
            + state.builds_by_issue.len()
            + state.issues.len();
        state.diagnostics.retain(|(issue_id, _)| *issue_id != id);
        state.watchers.retain(|(issue_id, _)| *issue_id != id);
        let removed_builds: Vec<i64> = state
            .builds_by_issue
            .iter()
            .filter(|(issue_id, _)| *issue_id == id)
            .map(|(_, build)| build.id)
            .collect();
        state.builds_by_issue.retain(|(issue_id, _)| *issue_id != id);
        // Diagnostics of other issues keep their text but lose the build link.
        for (_, diagnostic) in &mut state.diagnostics {
            if diagnostic
                .build_id
                .is_some_and(|build_id| removed_builds.contains(&build_id))
            {
                diagnostic.build_id = None;
            }
        }
        state.issues.retain(|row| row.id != id);
        let after = state.diagnostics.len()
            + state.watchers.len()
            + state.builds_by_issue.len()
            + state.issues.len();
        Ok((before - after) as u64)
    }

    fn insert_diagnostic(&self, issue_id: i64, diagnostic: &IssueDiagnostic) -> Result<u64> {
        let mut state = self.lock()?;
        state.require_issue(issue_id)?;
        if let Some(build_id) = diagnostic.build_id {
            if !state.builds_by_issue.iter().any(|(_, build)| build.id == build_id) {
                return Err(MetadataError::IntegrityViolation(format!(
                    "issue build {build_id} does not exist"
                )));
            }
        }
        state.diagnostics.push((issue_id, diagnostic.clone()));
        Ok(1)
    }

    fn diagnostics(&self, issue_id: i64) -> Result<Vec<IssueDiagnostic>> {
        let state = self.lock()?;
        Ok(state
            .diagnostics
            .iter()
            .filter(|(owner, _)| *owner == issue_id)
            .map(|(_, diagnostic)| diagnostic.clone())
            .collect())
    }

    fn insert_watcher(&self, issue_id: i64, user_id: i64) -> Result<u64> {
        let mut state = self.lock()?;
        state.require_issue(issue_id)?;
        Ok(u64::from(state.watchers.insert((issue_id, user_id))))
    }

    fn delete_watcher(&self, issue_id: i64, user_id: i64) -> Result<u64> {
        let mut state = self.lock()?;
        Ok(u64::from(state.watchers.remove(&(issue_id, user_id))))
    }

    fn watchers(&self, issue_id: i64) -> Result<Vec<String>> {
        let state = self.lock()?;
        Ok(state
            .watchers
            .iter()
            .filter(|(watched, _)| *watched == issue_id)
            .filter_map(|(_, user_id)| state.user_name(*user_id))
            .collect())
    }

    fn insert_issue_build(&self, issue_id: i64, build: &NewIssueBuild) -> Result<i64> {
        let mut state = self.lock()?;
        state.require_issue(issue_id)?;
        state.next_issue_build_id += 1;
        let id = state.next_issue_build_id;
        state.builds_by_issue.push((
            issue_id,
            IssueBuild {
                id,
                stream: build.stream.clone(),
                change: build.change,
                job_name: build.job_name.clone(),
                job_url: build.job_url.clone(),
                job_step_name: build.job_step_name.clone(),
                job_step_url: build.job_step_url.clone(),
                error_url: build.error_url.clone(),
                outcome: build.outcome,
            },
        ));
        Ok(id)
    }

    fn issue_build(&self, id: i64) -> Result<Option<IssueBuild>> {
        let state = self.lock()?;
        Ok(state
            .builds_by_issue
            .iter()
            .find(|(_, build)| build.id == id)
            .map(|(_, build)| build.clone()))
    }

    fn issue_builds(&self, issue_id: i64) -> Result<Vec<IssueBuild>> {
        let state = self.lock()?;
        Ok(state
            .builds_by_issue
            .iter()
            .filter(|(owner, _)| *owner == issue_id)
            .map(|(_, build)| build.clone())
            .collect())
    }

    fn update_issue_build_outcome(&self, id: i64, outcome: i32) -> Result<u64> {
        let mut state = self.lock()?;
        match state
            .builds_by_issue
            .iter_mut()
            .find(|(_, build)| build.id == id)
        {
            Some((_, build)) => {
                build.outcome = outcome;
                Ok(1)
            }
            None => Ok(0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_inserts_are_idempotent() {
        let store = MemoryStore::new();
        let first = store.insert_user("ALICE").expect("insert");
        assert_eq!(store.insert_user("ALICE"), Ok(first));
        assert_eq!(store.find_user_id("ALICE"), Ok(Some(first)));
        assert_eq!(store.find_user_id("alice"), Ok(None));

        let project = store.ensure_project("//UE5/Main").expect("project");
        assert_eq!(store.ensure_project("//UE5/Main"), Ok(project));
        assert_ne!(store.ensure_project("//UE5/Release"), Ok(project));
    }

    #[test]
    fn pattern_narrowing_is_case_insensitive() {
        assert!(like_contains("//UE5/Main/Samples", "%//ue5/main%"));
        assert!(like_contains("anything", "%%"));
        assert!(!like_contains("//UE5/Release", "%//UE5/Main%"));
    }

    #[test]
    fn timing_for_unknown_project_is_rejected() {
        let store = MemoryStore::new();
        let origin = ClientOrigin {
            version: "5.4.1".to_string(),
            ip_address: "10.0.0.8".to_string(),
        };
        let sample = NewTimingEvent {
            action: "Build".to_string(),
            result: "Failed".to_string(),
            user_name: "alice".to_string(),
            project: "//UE5/Main".to_string(),
            timestamp: Utc::now().naive_utc(),
            duration: 3.0,
        };
        assert!(matches!(
            store.insert_timing(&sample, 4, &origin),
            Err(MetadataError::IntegrityViolation(_))
        ));
        let project = store.ensure_project("//UE5/Main").expect("project");
        assert_eq!(store.insert_timing(&sample, project, &origin), Ok(1));
        assert_eq!(store.timing_samples("//UE5/Main"), Ok(1));
    }

    #[test]
    fn watcher_pairs_are_unique() {
        let store = MemoryStore::new();
        let issue = store
            .insert_issue(&NewIssueRecord {
                project: "proj".to_string(),
                summary: "broken".to_string(),
                owner_id: None,
                created_at: Utc::now().naive_utc(),
            })
            .expect("issue");
        let user = store.insert_user("BOB").expect("user");
        assert_eq!(store.insert_watcher(issue, user), Ok(1));
        assert_eq!(store.insert_watcher(issue, user), Ok(0));
        assert_eq!(store.watchers(issue), Ok(vec!["BOB".to_string()]));
    }
}
