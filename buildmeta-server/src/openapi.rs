//! OpenAPI specification for the metadata server.

use utoipa::OpenApi;

use buildmeta_core::{
    Build, BuildResult, Comment, ErrorEvent, ErrorKind, Issue, IssueBuild, IssueDiagnostic,
    IssuePatch, LatestIds, NewBuild, NewComment, NewErrorEvent, NewIssue, NewIssueBuild,
    NewTimingEvent, NewVote, Vote, VoteVerdict,
};

use crate::routes::{ErrorResponse, IssueBuildUpdate};

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::routes::latest,
        crate::routes::events,
        crate::routes::post_event,
        crate::routes::comments,
        crate::routes::post_comment,
        crate::routes::builds,
        crate::routes::post_build,
        crate::routes::errors,
        crate::routes::post_error,
        crate::routes::post_telemetry,
        crate::routes::user,
        crate::routes::issues,
        crate::routes::create_issue,
        crate::routes::issue,
        crate::routes::update_issue,
        crate::routes::delete_issue,
        crate::routes::diagnostics,
        crate::routes::add_diagnostic,
        crate::routes::watchers,
        crate::routes::add_watcher,
        crate::routes::remove_watcher,
        crate::routes::issue_builds,
        crate::routes::add_issue_build,
        crate::routes::issue_build,
        crate::routes::update_issue_build,
        crate::routes::openapi_json
    ),
    components(
        schemas(
            LatestIds,
            Vote,
            NewVote,
            VoteVerdict,
            Comment,
            NewComment,
            Build,
            NewBuild,
            BuildResult,
            ErrorEvent,
            NewErrorEvent,
            ErrorKind,
            NewTimingEvent,
            Issue,
            NewIssue,
            IssuePatch,
            IssueDiagnostic,
            IssueBuild,
            NewIssueBuild,
            IssueBuildUpdate,
            ErrorResponse
        )
    ),
    servers((url = "/api", description = "Metadata API")),
    tags(
        (name = "feed", description = "Votes, comments and CI badges"),
        (name = "users", description = "User directory"),
        (name = "issues", description = "Issue tracker"),
        (name = "telemetry", description = "Timing and error reports"),
        (name = "system", description = "System endpoints")
    )
)]
/// OpenAPI specification for the metadata server.
pub struct ApiDoc;
