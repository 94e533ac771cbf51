//! PostgreSQL implementation of [`MetadataStore`].

use std::collections::HashMap;

use buildmeta_core::{
    Build, ChangeMark, ClientOrigin, Comment, ErrorEvent, FeedKind, Issue, IssueBuild,
    IssueChanges, IssueDiagnostic, IssueFilter, MetadataError, MetadataStore, NewBuild,
    NewComment, NewErrorEvent, NewIssueBuild, NewIssueRecord, NewTimingEvent, NewVote, Result,
    Vote,
};
use chrono::Utc;
use diesel::dsl::min;
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, PooledConnection};
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use log::warn;

use crate::db::DbPool;
use crate::models::{
    BadgeRow, CommentRow, DiagnosticRow, ErrorRow, IssueBuildRow, IssueChangeset, IssueRow,
    NewBadgeRow, NewCommentRow, NewDiagnosticRow, NewErrorRow, NewIssueBuildRow, NewIssueRow,
    NewTimingRow, NewVoteRow, NewWatcherRow, VoteRow,
};
use crate::schema::{
    badges, comments, errors, issue_builds, issue_diagnostics, issue_watchers, issues, projects,
    telemetry, user_votes, users,
};

type PgPooled = PooledConnection<ConnectionManager<PgConnection>>;

/// Diesel-backed store drawing connections from an r2d2 pool.
#[derive(Clone)]
pub struct PgStore {
    pool: DbPool,
}

impl PgStore {
    /// Wrap an initialized pool.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn conn(&self) -> Result<PgPooled> {
        self.pool
            .get()
            .map_err(|err| MetadataError::StorageUnavailable(format!("connection pool: {err}")))
    }
}

/// Map a diesel failure onto the storage error taxonomy.
fn storage_error(err: DieselError) -> MetadataError {
    match err {
        DieselError::DatabaseError(
            kind @ (DatabaseErrorKind::UniqueViolation
            | DatabaseErrorKind::ForeignKeyViolation
            | DatabaseErrorKind::NotNullViolation
            | DatabaseErrorKind::CheckViolation),
            info,
        ) => MetadataError::IntegrityViolation(format!("{kind:?}: {}", info.message())),
        DieselError::RollbackErrorOnCommit { commit_error, .. } => {
            MetadataError::IntegrityViolation(format!("commit failed: {commit_error}"))
        }
        other => MetadataError::StorageUnavailable(other.to_string()),
    }
}

fn sql_limit(count: usize) -> i64 {
    i64::try_from(count).unwrap_or(i64::MAX)
}

fn affected(rows: usize) -> u64 {
    u64::try_from(rows).unwrap_or(u64::MAX)
}

fn change_marks(rows: Vec<(i32, Option<i64>)>) -> Vec<ChangeMark> {
    rows.into_iter()
        .filter_map(|(change, id)| id.map(|id| ChangeMark { change, id }))
        .collect()
}

impl MetadataStore for PgStore {
    fn find_user_id(&self, name: &str) -> Result<Option<i64>> {
        let mut conn = self.conn()?;
        users::table
            .filter(users::name.eq(name))
            .select(users::id)
            .first::<i64>(&mut conn)
            .optional()
            .map_err(storage_error)
    }

    fn insert_user(&self, name: &str) -> Result<i64> {
        let mut conn = self.conn()?;
        diesel::insert_into(users::table)
            .values(users::name.eq(name))
            .on_conflict(users::name)
            .do_nothing()
            .execute(&mut conn)
            .map_err(storage_error)?;
        users::table
            .filter(users::name.eq(name))
            .select(users::id)
            .first::<i64>(&mut conn)
            .map_err(storage_error)
    }

    fn ensure_project(&self, name: &str) -> Result<i64> {
        let mut conn = self.conn()?;
        diesel::insert_into(projects::table)
            .values(projects::name.eq(name))
            .on_conflict(projects::name)
            .do_nothing()
            .execute(&mut conn)
            .map_err(storage_error)?;
        projects::table
            .filter(projects::name.eq(name))
            .select(projects::id)
            .first::<i64>(&mut conn)
            .map_err(storage_error)
    }

    fn recent_changes(
        &self,
        kind: FeedKind,
        pattern: &str,
        window: usize,
    ) -> Result<Vec<ChangeMark>> {
        let mut conn = self.conn()?;
        let limit = sql_limit(window);
        let rows: Vec<(i32, Option<i64>)> = match kind {
            FeedKind::Votes => user_votes::table
                .inner_join(projects::table)
                .filter(projects::name.ilike(pattern))
                .group_by(user_votes::change_number)
                .select((user_votes::change_number, min(user_votes::id)))
                .order(user_votes::change_number.desc())
                .limit(limit)
                .load::<(i32, Option<i64>)>(&mut conn),
            FeedKind::Comments => comments::table
                .inner_join(projects::table)
                .filter(projects::name.ilike(pattern))
                .group_by(comments::change_number)
                .select((comments::change_number, min(comments::id)))
                .order(comments::change_number.desc())
                .limit(limit)
                .load::<(i32, Option<i64>)>(&mut conn),
            FeedKind::Builds => badges::table
                .left_join(projects::table)
                .filter(
                    badges::project_id
                        .is_null()
                        .or(projects::name.ilike(pattern)),
                )
                .group_by(badges::change_number)
                .select((badges::change_number, min(badges::id)))
                .order(badges::change_number.desc())
                .limit(limit)
                .load::<(i32, Option<i64>)>(&mut conn),
        }
        .map_err(storage_error)?;
        Ok(change_marks(rows))
    }

    fn votes_after(&self, pattern: &str, last_id: i64) -> Result<Vec<Vote>> {
        let mut conn = self.conn()?;
        let rows: Vec<VoteRow> = user_votes::table
            .inner_join(projects::table)
            .filter(user_votes::id.gt(last_id))
            .filter(projects::name.ilike(pattern))
            .select((
                user_votes::id,
                user_votes::change_number,
                user_votes::user_name,
                user_votes::verdict,
                projects::name,
            ))
            .order(user_votes::id.asc())
            .load(&mut conn)
            .map_err(storage_error)?;
        Ok(rows
            .into_iter()
            .filter_map(|row| match row.verdict.parse() {
                Ok(verdict) => Some(Vote {
                    id: row.id,
                    change: row.change_number,
                    user_name: row.user_name,
                    verdict,
                    project: row.project,
                }),
                Err(err) => {
                    warn!("skipping vote {}: {err}", row.id);
                    None
                }
            })
            .collect())
    }

    fn comments_after(&self, pattern: &str, last_id: i64) -> Result<Vec<Comment>> {
        let mut conn = self.conn()?;
        let rows: Vec<CommentRow> = comments::table
            .inner_join(projects::table)
            .filter(comments::id.gt(last_id))
            .filter(projects::name.ilike(pattern))
            .select((
                comments::id,
                comments::change_number,
                comments::user_name,
                comments::text,
                projects::name,
            ))
            .order(comments::id.asc())
            .load(&mut conn)
            .map_err(storage_error)?;
        Ok(rows
            .into_iter()
            .map(|row| Comment {
                id: row.id,
                change_number: row.change_number,
                user_name: row.user_name,
                text: row.text,
                project: row.project,
            })
            .collect())
    }

    fn builds_after(&self, pattern: &str, last_id: i64) -> Result<Vec<Build>> {
        let mut conn = self.conn()?;
        let rows: Vec<BadgeRow> = badges::table
            .left_join(projects::table)
            .filter(badges::id.gt(last_id))
            .filter(
                badges::project_id
                    .is_null()
                    .or(projects::name.ilike(pattern)),
            )
            .select((
                badges::id,
                badges::change_number,
                badges::build_type,
                badges::result,
                badges::url,
                badges::archive_path,
                projects::name.nullable(),
            ))
            .order(badges::id.asc())
            .load(&mut conn)
            .map_err(storage_error)?;
        Ok(rows
            .into_iter()
            .filter_map(|row| match row.result.parse() {
                Ok(result) => Some(Build {
                    id: row.id,
                    change_number: row.change_number,
                    build_type: row.build_type,
                    result,
                    url: row.url,
                    archive_path: row.archive_path,
                    project: row.project,
                }),
                Err(err) => {
                    warn!("skipping badge {}: {err}", row.id);
                    None
                }
            })
            .collect())
    }

    fn insert_vote(&self, vote: &NewVote, project_id: i64) -> Result<u64> {
        let mut conn = self.conn()?;
        let row = NewVoteRow {
            change_number: vote.change,
            user_name: &vote.user_name,
            verdict: vote.verdict.as_str(),
            project_id,
        };
        diesel::insert_into(user_votes::table)
            .values(&row)
            .execute(&mut conn)
            .map(affected)
            .map_err(storage_error)
    }

    fn insert_comment(&self, comment: &NewComment, project_id: i64) -> Result<u64> {
        let mut conn = self.conn()?;
        let row = NewCommentRow {
            change_number: comment.change_number,
            user_name: &comment.user_name,
            text: &comment.text,
            project_id,
        };
        diesel::insert_into(comments::table)
            .values(&row)
            .execute(&mut conn)
            .map(affected)
            .map_err(storage_error)
    }

    fn insert_build(&self, build: &NewBuild, project_id: Option<i64>) -> Result<u64> {
        let mut conn = self.conn()?;
        let row = NewBadgeRow {
            change_number: build.change_number,
            build_type: &build.build_type,
            result: build.result.as_str(),
            url: &build.url,
            archive_path: build.archive_path.as_deref(),
            project_id,
        };
        diesel::insert_into(badges::table)
            .values(&row)
            .execute(&mut conn)
            .map(affected)
            .map_err(storage_error)
    }

    fn recent_errors(&self, count: usize) -> Result<Vec<ErrorEvent>> {
        let mut conn = self.conn()?;
        let rows: Vec<ErrorRow> = errors::table
            .select(ErrorRow::as_select())
            .order(errors::id.desc())
            .limit(sql_limit(count))
            .load(&mut conn)
            .map_err(storage_error)?;
        Ok(rows
            .into_iter()
            .filter_map(|row| match row.kind.parse() {
                Ok(kind) => Some(ErrorEvent {
                    id: row.id,
                    kind,
                    text: row.text,
                    user_name: row.user_name,
                    project: row.project,
                    timestamp: row.reported_at,
                    version: row.version,
                    ip_address: row.ip_address,
                }),
                Err(err) => {
                    warn!("skipping error report {}: {err}", row.id);
                    None
                }
            })
            .collect())
    }

    fn insert_timing(
        &self,
        event: &NewTimingEvent,
        project_id: i64,
        origin: &ClientOrigin,
    ) -> Result<u64> {
        let mut conn = self.conn()?;
        let row = NewTimingRow {
            action: &event.action,
            result: &event.result,
            user_name: &event.user_name,
            project: &event.project,
            project_id,
            recorded_at: event.timestamp,
            duration: event.duration,
            version: &origin.version,
            ip_address: &origin.ip_address,
        };
        diesel::insert_into(telemetry::table)
            .values(&row)
            .execute(&mut conn)
            .map(affected)
            .map_err(storage_error)
    }

    fn insert_error(
        &self,
        event: &NewErrorEvent,
        project_id: Option<i64>,
        origin: &ClientOrigin,
    ) -> Result<u64> {
        let mut conn = self.conn()?;
        let row = NewErrorRow {
            kind: event.kind.as_str(),
            text: &event.text,
            user_name: &event.user_name,
            project: event.project.as_deref(),
            project_id,
            reported_at: event.timestamp,
            version: &origin.version,
            ip_address: &origin.ip_address,
        };
        diesel::insert_into(errors::table)
            .values(&row)
            .execute(&mut conn)
            .map(affected)
            .map_err(storage_error)
    }

    fn insert_issue(&self, issue: &NewIssueRecord) -> Result<i64> {
        let mut conn = self.conn()?;
        let row = NewIssueRow {
            created_at: issue.created_at,
            project: &issue.project,
            summary: &issue.summary,
            owner_id: issue.owner_id,
        };
        diesel::insert_into(issues::table)
            .values(&row)
            .returning(issues::id)
            .get_result(&mut conn)
            .map_err(storage_error)
    }

    fn issues(&self, filter: &IssueFilter) -> Result<Vec<Issue>> {
        let mut conn = self.conn()?;
        let mut query = issues::table
            .select(IssueRow::as_select())
            .order(issues::id.desc())
            .into_boxed();
        if let Some(id) = filter.id {
            query = query.filter(issues::id.eq(id));
        }
        if !filter.include_resolved {
            query = query.filter(issues::resolved_at.is_null());
        }
        if let Some(user_id) = filter.watcher_id {
            query = query.filter(
                issues::id.eq_any(
                    issue_watchers::table
                        .filter(issue_watchers::user_id.eq(user_id))
                        .select(issue_watchers::issue_id),
                ),
            );
        }
        if let Some(limit) = filter.limit {
            query = query.limit(sql_limit(limit));
        }
        let rows: Vec<IssueRow> = query.load(&mut conn).map_err(storage_error)?;

        let user_ids: Vec<i64> = rows
            .iter()
            .flat_map(|row| [row.owner_id, row.nominated_by_id])
            .flatten()
            .collect();
        let names: HashMap<i64, String> = if user_ids.is_empty() {
            HashMap::new()
        } else {
            users::table
                .filter(users::id.eq_any(user_ids))
                .select((users::id, users::name))
                .load::<(i64, String)>(&mut conn)
                .map_err(storage_error)?
                .into_iter()
                .collect()
        };

        let retrieved_at = Utc::now().naive_utc();
        let notify = filter.watcher_id.is_some();
        Ok(rows
            .into_iter()
            .map(|row| Issue {
                id: row.id,
                created_at: row.created_at,
                retrieved_at,
                project: row.project,
                summary: row.summary,
                owner: row.owner_id.and_then(|id| names.get(&id).cloned()),
                nominated_by: row.nominated_by_id.and_then(|id| names.get(&id).cloned()),
                acknowledged_at: row.acknowledged_at,
                fix_change: row.fix_change,
                resolved_at: row.resolved_at,
                notify,
            })
            .collect())
    }

    fn update_issue(&self, id: i64, changes: &IssueChanges) -> Result<u64> {
        if changes.is_empty() {
            return Ok(0);
        }
        let mut conn = self.conn()?;
        diesel::update(issues::table.find(id))
            .set(&IssueChangeset::from(changes))
            .execute(&mut conn)
            .map(affected)
            .map_err(storage_error)
    }

    fn delete_issue(&self, id: i64) -> Result<u64> {
        let mut conn = self.conn()?;
        conn.transaction::<usize, DieselError, _>(|conn| {
            let diagnostics = diesel::delete(
                issue_diagnostics::table.filter(issue_diagnostics::issue_id.eq(id)),
            )
            .execute(conn)?;
            let watchers =
                diesel::delete(issue_watchers::table.filter(issue_watchers::issue_id.eq(id)))
                    .execute(conn)?;
            let builds = diesel::delete(issue_builds::table.filter(issue_builds::issue_id.eq(id)))
                .execute(conn)?;
            let issue = diesel::delete(issues::table.find(id)).execute(conn)?;
            Ok(diagnostics + watchers + builds + issue)
        })
        .map(affected)
        .map_err(storage_error)
    }

    fn insert_diagnostic(&self, issue_id: i64, diagnostic: &IssueDiagnostic) -> Result<u64> {
        let mut conn = self.conn()?;
        let row = NewDiagnosticRow {
            issue_id,
            build_id: diagnostic.build_id,
            message: &diagnostic.message,
            url: &diagnostic.url,
        };
        diesel::insert_into(issue_diagnostics::table)
            .values(&row)
            .execute(&mut conn)
            .map(affected)
            .map_err(storage_error)
    }

    fn diagnostics(&self, issue_id: i64) -> Result<Vec<IssueDiagnostic>> {
        let mut conn = self.conn()?;
        let rows: Vec<DiagnosticRow> = issue_diagnostics::table
            .filter(issue_diagnostics::issue_id.eq(issue_id))
            .select(DiagnosticRow::as_select())
            .order(issue_diagnostics::id.asc())
            .load(&mut conn)
            .map_err(storage_error)?;
        Ok(rows
            .into_iter()
            .map(|row| IssueDiagnostic {
                build_id: row.build_id,
                message: row.message,
                url: row.url,
            })
            .collect())
    }

    fn insert_watcher(&self, issue_id: i64, user_id: i64) -> Result<u64> {
        let mut conn = self.conn()?;
        diesel::insert_into(issue_watchers::table)
            .values(NewWatcherRow { issue_id, user_id })
            .on_conflict_do_nothing()
            .execute(&mut conn)
            .map(affected)
            .map_err(storage_error)
    }

    fn delete_watcher(&self, issue_id: i64, user_id: i64) -> Result<u64> {
        let mut conn = self.conn()?;
        diesel::delete(issue_watchers::table.find((issue_id, user_id)))
            .execute(&mut conn)
            .map(affected)
            .map_err(storage_error)
    }

    fn watchers(&self, issue_id: i64) -> Result<Vec<String>> {
        let mut conn = self.conn()?;
        issue_watchers::table
            .inner_join(users::table)
            .filter(issue_watchers::issue_id.eq(issue_id))
            .select(users::name)
            .order(users::id.asc())
            .load(&mut conn)
            .map_err(storage_error)
    }

    fn insert_issue_build(&self, issue_id: i64, build: &NewIssueBuild) -> Result<i64> {
        let mut conn = self.conn()?;
        let row = NewIssueBuildRow {
            issue_id,
            stream: &build.stream,
            change_number: build.change,
            job_name: &build.job_name,
            job_url: &build.job_url,
            job_step_name: &build.job_step_name,
            job_step_url: &build.job_step_url,
            error_url: build.error_url.as_deref(),
            outcome: build.outcome,
        };
        diesel::insert_into(issue_builds::table)
            .values(&row)
            .returning(issue_builds::id)
            .get_result(&mut conn)
            .map_err(storage_error)
    }

    fn issue_build(&self, id: i64) -> Result<Option<IssueBuild>> {
        let mut conn = self.conn()?;
        let row = issue_builds::table
            .find(id)
            .select(IssueBuildRow::as_select())
            .first(&mut conn)
            .optional()
            .map_err(storage_error)?;
        Ok(row.map(IssueBuild::from))
    }

    fn issue_builds(&self, issue_id: i64) -> Result<Vec<IssueBuild>> {
        let mut conn = self.conn()?;
        let rows: Vec<IssueBuildRow> = issue_builds::table
            .filter(issue_builds::issue_id.eq(issue_id))
            .select(IssueBuildRow::as_select())
            .order(issue_builds::id.asc())
            .load(&mut conn)
            .map_err(storage_error)?;
        Ok(rows.into_iter().map(IssueBuild::from).collect())
    }

    fn update_issue_build_outcome(&self, id: i64, outcome: i32) -> Result<u64> {
        let mut conn = self.conn()?;
        diesel::update(issue_builds::table.find(id))
            .set(issue_builds::outcome.eq(outcome))
            .execute(&mut conn)
            .map(affected)
            .map_err(storage_error)
    }
}

impl From<IssueBuildRow> for IssueBuild {
    fn from(row: IssueBuildRow) -> Self {
        Self {
            id: row.id,
            stream: row.stream,
            change: row.change_number,
            job_name: row.job_name,
            job_url: row.job_url,
            job_step_name: row.job_step_name,
            job_step_url: row.job_step_url,
            error_url: row.error_url,
            outcome: row.outcome,
        }
    }
}
