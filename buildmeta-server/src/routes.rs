//! HTTP handlers for the metadata server.

use actix_web::{HttpRequest, HttpResponse, Responder, delete, get, post, put, web};
use buildmeta_core::{
    ClientOrigin, IssuePatch, MetadataError, MetadataService, NewBuild, NewComment,
    NewErrorEvent, NewIssue, NewIssueBuild, NewIssueDiagnostic, NewTimingEvent, NewVote,
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, OpenApi, ToSchema};

use crate::openapi::ApiDoc;

/// Number of error reports returned when `records` is absent.
const DEFAULT_ERROR_RECORDS: usize = 10;

#[derive(Clone)]
/// Shared application state for handlers.
pub struct AppState {
    /// Metadata operations over the configured store.
    pub service: MetadataService,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "PascalCase")]
/// Error payload returned by failing endpoints.
pub struct ErrorResponse {
    /// Human-readable failure.
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "PascalCase")]
/// New outcome for an issue build.
pub struct IssueBuildUpdate {
    /// Outcome code.
    pub outcome: i32,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
/// Optional project scope.
pub struct LatestQuery {
    /// Project path; every project when absent.
    pub project: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
/// Vote feed cursor.
pub struct EventQuery {
    /// Project path.
    pub project: String,
    /// Highest vote id already seen.
    #[serde(rename = "lastEventId", default)]
    pub last_event_id: i64,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
/// Comment feed cursor.
pub struct CommentQuery {
    /// Project path.
    pub project: String,
    /// Highest comment id already seen.
    #[serde(rename = "lastCommentId", default)]
    pub last_comment_id: i64,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
/// Badge feed cursor.
pub struct BuildQuery {
    /// Project path.
    pub project: String,
    /// Highest badge id already seen.
    #[serde(rename = "lastBuildId", default)]
    pub last_build_id: i64,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
/// Error report page size.
pub struct RecordsQuery {
    /// Number of reports, newest first.
    pub records: Option<usize>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
/// Client identification attached to telemetry.
pub struct OriginQuery {
    /// Client version.
    pub version: Option<String>,
    /// Client address; the peer address is used when absent.
    #[serde(rename = "ipAddress")]
    pub ip_address: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
/// User lookup.
pub struct UserQuery {
    /// User name in any case.
    pub name: String,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
/// Issue listing options.
pub struct IssueQuery {
    /// Include resolved issues.
    #[serde(rename = "includeResolved", default)]
    pub include_resolved: bool,
    /// Maximum issues; zero or negative is unbounded.
    #[serde(rename = "maxResults", default)]
    pub max_results: i64,
    /// Only open issues this user watches.
    pub user: Option<String>,
}

fn error_response(err: &MetadataError) -> HttpResponse {
    let body = ErrorResponse {
        message: err.to_string(),
    };
    match err {
        MetadataError::InvalidInput(_) => HttpResponse::BadRequest().json(body),
        MetadataError::StorageUnavailable(_) => HttpResponse::ServiceUnavailable().json(body),
        MetadataError::IntegrityViolation(_) => HttpResponse::Conflict().json(body),
    }
}

fn not_found(what: &str) -> HttpResponse {
    HttpResponse::NotFound().json(ErrorResponse {
        message: format!("{what} not found"),
    })
}

/// Run a service call on the blocking pool.
async fn run<T, F>(state: &web::Data<AppState>, operation: F) -> Result<T, HttpResponse>
where
    T: Send + 'static,
    F: FnOnce(&MetadataService) -> buildmeta_core::Result<T> + Send + 'static,
{
    let service = state.service.clone();
    match web::block(move || operation(&service)).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(err)) => Err(error_response(&err)),
        Err(err) => Err(HttpResponse::InternalServerError().json(ErrorResponse {
            message: format!("blocking task failed: {err}"),
        })),
    }
}

fn respond<T: Serialize>(result: Result<T, HttpResponse>) -> HttpResponse {
    match result {
        Ok(value) => HttpResponse::Ok().json(value),
        Err(response) => response,
    }
}

fn respond_found<T: Serialize>(result: Result<Option<T>, HttpResponse>, what: &str) -> HttpResponse {
    match result {
        Ok(Some(value)) => HttpResponse::Ok().json(value),
        Ok(None) => not_found(what),
        Err(response) => response,
    }
}

fn client_origin(req: &HttpRequest, query: OriginQuery) -> ClientOrigin {
    let ip_address = query.ip_address.unwrap_or_else(|| {
        req.peer_addr()
            .map(|addr| addr.ip().to_string())
            .unwrap_or_default()
    });
    ClientOrigin {
        version: query.version.unwrap_or_default(),
        ip_address,
    }
}

#[utoipa::path(
    get,
    path = "/latest",
    params(LatestQuery),
    responses(
        (status = 200, description = "Resume points per feed", body = buildmeta_core::LatestIds),
        (status = 503, description = "Storage unavailable", body = ErrorResponse)
    ),
    tag = "feed"
)]
#[get("/api/latest")]
/// Resume points for a client catching up on a project.
pub async fn latest(state: web::Data<AppState>, query: web::Query<LatestQuery>) -> impl Responder {
    let project = query.into_inner().project;
    respond(run(&state, move |service| service.last_ids(project.as_deref())).await)
}

#[utoipa::path(
    get,
    path = "/event",
    params(EventQuery),
    responses(
        (status = 200, description = "Votes after the cursor", body = [buildmeta_core::Vote])
    ),
    tag = "feed"
)]
#[get("/api/event")]
/// Votes cast in a project since a cursor.
pub async fn events(state: web::Data<AppState>, query: web::Query<EventQuery>) -> impl Responder {
    let query = query.into_inner();
    respond(
        run(&state, move |service| {
            service.votes_since(&query.project, query.last_event_id)
        })
        .await,
    )
}

#[utoipa::path(
    post,
    path = "/event",
    request_body = NewVote,
    responses(
        (status = 200, description = "Rows written", body = u64),
        (status = 400, description = "Invalid vote", body = ErrorResponse)
    ),
    tag = "feed"
)]
#[post("/api/event")]
/// Record a vote.
pub async fn post_event(state: web::Data<AppState>, payload: web::Json<NewVote>) -> impl Responder {
    let vote = payload.into_inner();
    respond(run(&state, move |service| service.post_vote(&vote)).await)
}

#[utoipa::path(
    get,
    path = "/comment",
    params(CommentQuery),
    responses(
        (status = 200, description = "Comments after the cursor", body = [buildmeta_core::Comment])
    ),
    tag = "feed"
)]
#[get("/api/comment")]
/// Comments left in a project since a cursor.
pub async fn comments(
    state: web::Data<AppState>,
    query: web::Query<CommentQuery>,
) -> impl Responder {
    let query = query.into_inner();
    respond(
        run(&state, move |service| {
            service.comments_since(&query.project, query.last_comment_id)
        })
        .await,
    )
}

#[utoipa::path(
    post,
    path = "/comment",
    request_body = NewComment,
    responses(
        (status = 200, description = "Rows written", body = u64),
        (status = 400, description = "Invalid comment", body = ErrorResponse)
    ),
    tag = "feed"
)]
#[post("/api/comment")]
/// Record a comment.
pub async fn post_comment(
    state: web::Data<AppState>,
    payload: web::Json<NewComment>,
) -> impl Responder {
    let comment = payload.into_inner();
    respond(run(&state, move |service| service.post_comment(&comment)).await)
}

#[utoipa::path(
    get,
    path = "/build",
    params(BuildQuery),
    responses(
        (status = 200, description = "Badges after the cursor", body = [buildmeta_core::Build])
    ),
    tag = "feed"
)]
#[get("/api/build")]
/// Badges applying to a project since a cursor.
pub async fn builds(state: web::Data<AppState>, query: web::Query<BuildQuery>) -> impl Responder {
    let query = query.into_inner();
    respond(
        run(&state, move |service| {
            service.builds_since(&query.project, query.last_build_id)
        })
        .await,
    )
}

#[utoipa::path(
    post,
    path = "/build",
    request_body = NewBuild,
    responses(
        (status = 200, description = "Rows written", body = u64),
        (status = 400, description = "Invalid badge", body = ErrorResponse)
    ),
    tag = "feed"
)]
#[post("/api/build")]
/// Record a CI badge.
pub async fn post_build(state: web::Data<AppState>, payload: web::Json<NewBuild>) -> impl Responder {
    let build = payload.into_inner();
    respond(run(&state, move |service| service.post_build(&build)).await)
}

#[utoipa::path(
    get,
    path = "/error",
    params(RecordsQuery),
    responses(
        (status = 200, description = "Newest error reports", body = [buildmeta_core::ErrorEvent])
    ),
    tag = "telemetry"
)]
#[get("/api/error")]
/// Most recent error reports.
pub async fn errors(state: web::Data<AppState>, query: web::Query<RecordsQuery>) -> impl Responder {
    let count = query.records.unwrap_or(DEFAULT_ERROR_RECORDS);
    respond(run(&state, move |service| service.recent_errors(count)).await)
}

#[utoipa::path(
    post,
    path = "/error",
    params(OriginQuery),
    request_body = NewErrorEvent,
    responses(
        (status = 200, description = "Rows written", body = u64)
    ),
    tag = "telemetry"
)]
#[post("/api/error")]
/// Record a client error report.
pub async fn post_error(
    state: web::Data<AppState>,
    req: HttpRequest,
    query: web::Query<OriginQuery>,
    payload: web::Json<NewErrorEvent>,
) -> impl Responder {
    let origin = client_origin(&req, query.into_inner());
    let event = payload.into_inner();
    respond(run(&state, move |service| service.record_error(&event, &origin)).await)
}

#[utoipa::path(
    post,
    path = "/telemetry",
    params(OriginQuery),
    request_body = NewTimingEvent,
    responses(
        (status = 200, description = "Rows written", body = u64)
    ),
    tag = "telemetry"
)]
#[post("/api/telemetry")]
/// Record a timing sample.
pub async fn post_telemetry(
    state: web::Data<AppState>,
    req: HttpRequest,
    query: web::Query<OriginQuery>,
    payload: web::Json<NewTimingEvent>,
) -> impl Responder {
    let origin = client_origin(&req, query.into_inner());
    let event = payload.into_inner();
    respond(run(&state, move |service| service.record_timing(&event, &origin)).await)
}

#[utoipa::path(
    get,
    path = "/user",
    params(UserQuery),
    responses(
        (status = 200, description = "User id, created on first use", body = i64),
        (status = 400, description = "Empty name", body = ErrorResponse)
    ),
    tag = "users"
)]
#[get("/api/user")]
/// Resolve a user name to its id.
pub async fn user(state: web::Data<AppState>, query: web::Query<UserQuery>) -> impl Responder {
    let name = query.into_inner().name;
    respond(run(&state, move |service| service.find_or_add_user(&name)).await)
}

#[utoipa::path(
    get,
    path = "/issues",
    params(IssueQuery),
    responses(
        (status = 200, description = "Issues, newest first", body = [buildmeta_core::Issue])
    ),
    tag = "issues"
)]
#[get("/api/issues")]
/// List issues, or the open issues a user watches.
pub async fn issues(state: web::Data<AppState>, query: web::Query<IssueQuery>) -> impl Responder {
    let query = query.into_inner();
    respond(
        run(&state, move |service| match &query.user {
            Some(user_name) => service.list_issues_for_user(user_name),
            None => service.list_issues(query.include_resolved, query.max_results),
        })
        .await,
    )
}

#[utoipa::path(
    post,
    path = "/issues",
    request_body = NewIssue,
    responses(
        (status = 200, description = "New issue id", body = i64)
    ),
    tag = "issues"
)]
#[post("/api/issues")]
/// Open an issue.
pub async fn create_issue(
    state: web::Data<AppState>,
    payload: web::Json<NewIssue>,
) -> impl Responder {
    let new_issue = payload.into_inner();
    respond(run(&state, move |service| service.create_issue(&new_issue)).await)
}

#[utoipa::path(
    get,
    path = "/issues/{id}",
    params(("id" = i64, Path, description = "Issue identifier")),
    responses(
        (status = 200, description = "Issue", body = buildmeta_core::Issue),
        (status = 404, description = "No such issue", body = ErrorResponse)
    ),
    tag = "issues"
)]
#[get("/api/issues/{id}")]
/// Fetch an issue.
pub async fn issue(state: web::Data<AppState>, path: web::Path<i64>) -> impl Responder {
    let id = path.into_inner();
    respond_found(run(&state, move |service| service.get_issue(id)).await, "issue")
}

#[utoipa::path(
    put,
    path = "/issues/{id}",
    params(("id" = i64, Path, description = "Issue identifier")),
    request_body = IssuePatch,
    responses(
        (status = 200, description = "Rows updated", body = u64)
    ),
    tag = "issues"
)]
#[put("/api/issues/{id}")]
/// Apply a partial update to an issue.
pub async fn update_issue(
    state: web::Data<AppState>,
    path: web::Path<i64>,
    payload: web::Json<IssuePatch>,
) -> impl Responder {
    let id = path.into_inner();
    let patch = payload.into_inner();
    respond(run(&state, move |service| service.update_issue(id, &patch)).await)
}

#[utoipa::path(
    delete,
    path = "/issues/{id}",
    params(("id" = i64, Path, description = "Issue identifier")),
    responses(
        (status = 200, description = "Rows deleted", body = u64)
    ),
    tag = "issues"
)]
#[delete("/api/issues/{id}")]
/// Delete an issue with everything attached to it.
pub async fn delete_issue(state: web::Data<AppState>, path: web::Path<i64>) -> impl Responder {
    let id = path.into_inner();
    respond(run(&state, move |service| service.delete_issue(id)).await)
}

#[utoipa::path(
    get,
    path = "/issues/{id}/diagnostics",
    params(("id" = i64, Path, description = "Issue identifier")),
    responses(
        (status = 200, description = "Diagnostics in insertion order", body = [buildmeta_core::IssueDiagnostic])
    ),
    tag = "issues"
)]
#[get("/api/issues/{id}/diagnostics")]
/// Diagnostics of an issue.
pub async fn diagnostics(state: web::Data<AppState>, path: web::Path<i64>) -> impl Responder {
    let id = path.into_inner();
    respond(run(&state, move |service| service.get_diagnostics(id)).await)
}

#[utoipa::path(
    post,
    path = "/issues/{id}/diagnostics",
    params(("id" = i64, Path, description = "Issue identifier")),
    request_body = buildmeta_core::IssueDiagnostic,
    responses(
        (status = 200, description = "Rows written", body = u64),
        (status = 409, description = "Unknown issue or build", body = ErrorResponse)
    ),
    tag = "issues"
)]
#[post("/api/issues/{id}/diagnostics")]
/// Attach a diagnostic to an issue.
pub async fn add_diagnostic(
    state: web::Data<AppState>,
    path: web::Path<i64>,
    payload: web::Json<NewIssueDiagnostic>,
) -> impl Responder {
    let id = path.into_inner();
    let diagnostic = payload.into_inner();
    respond(run(&state, move |service| service.add_diagnostic(id, &diagnostic)).await)
}

#[utoipa::path(
    get,
    path = "/issues/{id}/watchers",
    params(("id" = i64, Path, description = "Issue identifier")),
    responses(
        (status = 200, description = "Watcher names", body = [String])
    ),
    tag = "issues"
)]
#[get("/api/issues/{id}/watchers")]
/// Users watching an issue.
pub async fn watchers(state: web::Data<AppState>, path: web::Path<i64>) -> impl Responder {
    let id = path.into_inner();
    respond(run(&state, move |service| service.get_watchers(id)).await)
}

#[utoipa::path(
    post,
    path = "/issues/{id}/watchers",
    params(("id" = i64, Path, description = "Issue identifier")),
    request_body = String,
    responses(
        (status = 200, description = "Rows written", body = u64),
        (status = 409, description = "Unknown issue", body = ErrorResponse)
    ),
    tag = "issues"
)]
#[post("/api/issues/{id}/watchers")]
/// Start watching an issue. The body is the user name as a JSON string.
pub async fn add_watcher(
    state: web::Data<AppState>,
    path: web::Path<i64>,
    payload: web::Json<String>,
) -> impl Responder {
    let id = path.into_inner();
    let user_name = payload.into_inner();
    respond(run(&state, move |service| service.add_watcher(id, &user_name)).await)
}

#[utoipa::path(
    delete,
    path = "/issues/{id}/watchers/{user}",
    params(
        ("id" = i64, Path, description = "Issue identifier"),
        ("user" = String, Path, description = "User name")
    ),
    responses(
        (status = 200, description = "Rows deleted", body = u64)
    ),
    tag = "issues"
)]
#[delete("/api/issues/{id}/watchers/{user}")]
/// Stop watching an issue.
pub async fn remove_watcher(
    state: web::Data<AppState>,
    path: web::Path<(i64, String)>,
) -> impl Responder {
    let (id, user_name) = path.into_inner();
    respond(run(&state, move |service| service.remove_watcher(id, &user_name)).await)
}

#[utoipa::path(
    get,
    path = "/issues/{id}/builds",
    params(("id" = i64, Path, description = "Issue identifier")),
    responses(
        (status = 200, description = "Builds in insertion order", body = [buildmeta_core::IssueBuild])
    ),
    tag = "issues"
)]
#[get("/api/issues/{id}/builds")]
/// CI job steps attached to an issue.
pub async fn issue_builds(state: web::Data<AppState>, path: web::Path<i64>) -> impl Responder {
    let id = path.into_inner();
    respond(run(&state, move |service| service.get_builds(id)).await)
}

#[utoipa::path(
    post,
    path = "/issues/{id}/builds",
    params(("id" = i64, Path, description = "Issue identifier")),
    request_body = NewIssueBuild,
    responses(
        (status = 200, description = "New build id", body = i64),
        (status = 409, description = "Unknown issue", body = ErrorResponse)
    ),
    tag = "issues"
)]
#[post("/api/issues/{id}/builds")]
/// Attach a CI job step to an issue.
pub async fn add_issue_build(
    state: web::Data<AppState>,
    path: web::Path<i64>,
    payload: web::Json<NewIssueBuild>,
) -> impl Responder {
    let id = path.into_inner();
    let build = payload.into_inner();
    respond(run(&state, move |service| service.add_build(id, &build)).await)
}

#[utoipa::path(
    get,
    path = "/issuebuilds/{id}",
    params(("id" = i64, Path, description = "Issue build identifier")),
    responses(
        (status = 200, description = "Issue build", body = buildmeta_core::IssueBuild),
        (status = 404, description = "No such build", body = ErrorResponse)
    ),
    tag = "issues"
)]
#[get("/api/issuebuilds/{id}")]
/// Fetch a single issue build.
pub async fn issue_build(state: web::Data<AppState>, path: web::Path<i64>) -> impl Responder {
    let id = path.into_inner();
    respond_found(
        run(&state, move |service| service.get_build(id)).await,
        "issue build",
    )
}

#[utoipa::path(
    put,
    path = "/issuebuilds/{id}",
    params(("id" = i64, Path, description = "Issue build identifier")),
    request_body = IssueBuildUpdate,
    responses(
        (status = 200, description = "Rows updated", body = u64)
    ),
    tag = "issues"
)]
#[put("/api/issuebuilds/{id}")]
/// Overwrite the outcome of an issue build.
pub async fn update_issue_build(
    state: web::Data<AppState>,
    path: web::Path<i64>,
    payload: web::Json<IssueBuildUpdate>,
) -> impl Responder {
    let id = path.into_inner();
    let outcome = payload.outcome;
    respond(run(&state, move |service| service.update_build_outcome(id, outcome)).await)
}

#[utoipa::path(
    get,
    path = "/openapi.json",
    responses(
        (status = 200, description = "OpenAPI document", body = serde_json::Value)
    ),
    tag = "system"
)]
#[get("/api/openapi.json")]
/// Serve the OpenAPI document.
pub async fn openapi_json() -> impl Responder {
    HttpResponse::Ok().json(ApiDoc::openapi())
}

/// Register every handler.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(latest)
        .service(events)
        .service(post_event)
        .service(comments)
        .service(post_comment)
        .service(builds)
        .service(post_build)
        .service(errors)
        .service(post_error)
        .service(post_telemetry)
        .service(user)
        .service(issues)
        .service(create_issue)
        .service(issue)
        .service(update_issue)
        .service(delete_issue)
        .service(diagnostics)
        .service(add_diagnostic)
        .service(watchers)
        .service(add_watcher)
        .service(remove_watcher)
        .service(issue_builds)
        .service(add_issue_build)
        .service(issue_build)
        .service(update_issue_build)
        .service(openapi_json);
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{App, http::StatusCode, test};
    use buildmeta_core::{
        Build, BuildResult, ErrorEvent, ErrorKind, Issue, IssueBuild, LatestIds, Vote, VoteVerdict,
    };
    use chrono::NaiveDate;

    fn test_state() -> web::Data<AppState> {
        web::Data::new(AppState {
            service: MetadataService::in_memory(),
        })
    }

    fn vote(project: &str, change: i32) -> NewVote {
        NewVote {
            change,
            user_name: "alice".to_string(),
            verdict: VoteVerdict::Good,
            project: project.to_string(),
        }
    }

    #[actix_web::test]
    async fn posted_votes_come_back_from_the_feed() {
        let state = test_state();
        let app = test::init_service(App::new().app_data(state.clone()).configure(configure)).await;

        for change in [100, 101] {
            let req = test::TestRequest::post()
                .uri("/api/event")
                .set_json(vote("//UE5/Main", change))
                .to_request();
            let written: u64 = test::call_and_read_body_json(&app, req).await;
            assert_eq!(written, 1);
        }

        let req = test::TestRequest::get()
            .uri("/api/event?project=//UE5/Main&lastEventId=1")
            .to_request();
        let votes: Vec<Vote> = test::call_and_read_body_json(&app, req).await;
        assert_eq!(votes.len(), 1);
        assert_eq!(votes[0].change, 101);

        let req = test::TestRequest::get()
            .uri("/api/latest?project=//UE5/Main")
            .to_request();
        let resume: LatestIds = test::call_and_read_body_json(&app, req).await;
        assert_eq!(resume.last_event_id, 1);
        assert_eq!(resume.last_build_id, 0);
    }

    #[actix_web::test]
    async fn feed_json_uses_pascal_case() {
        let state = test_state();
        let app = test::init_service(App::new().app_data(state.clone()).configure(configure)).await;

        let req = test::TestRequest::post()
            .uri("/api/build")
            .set_json(serde_json::json!({
                "ChangeNumber": 12,
                "BuildType": "Editor",
                "Result": "Success",
                "Url": "https://ci.example.com/12"
            }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let req = test::TestRequest::get()
            .uri("/api/build?project=//UE5/Main")
            .to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body[0]["ChangeNumber"], 12);
        assert_eq!(body[0]["Result"], "Success");
        let badges: Vec<Build> = serde_json::from_value(body).expect("badges");
        assert_eq!(badges[0].result, BuildResult::Success);
        assert_eq!(badges[0].project, None);
    }

    #[actix_web::test]
    async fn invalid_input_maps_to_bad_request() {
        let state = test_state();
        let app = test::init_service(App::new().app_data(state.clone()).configure(configure)).await;

        let req = test::TestRequest::post()
            .uri("/api/comment")
            .set_json(NewComment {
                change_number: 1,
                user_name: "alice".to_string(),
                text: "hello".to_string(),
                project: " ".to_string(),
            })
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: serde_json::Value = test::read_body_json(resp).await;
        assert!(body["Message"].as_str().is_some_and(|message| message.contains("project")));
    }

    #[actix_web::test]
    async fn error_reports_record_origin() {
        let state = test_state();
        let app = test::init_service(App::new().app_data(state.clone()).configure(configure)).await;

        let event = NewErrorEvent {
            kind: ErrorKind::Crash,
            text: "access violation".to_string(),
            user_name: "alice".to_string(),
            project: None,
            timestamp: NaiveDate::from_ymd_opt(2024, 5, 1)
                .and_then(|date| date.and_hms_opt(9, 30, 0))
                .expect("timestamp"),
        };
        let req = test::TestRequest::post()
            .uri("/api/error?version=5.4.1")
            .peer_addr("10.1.2.3:5000".parse().expect("addr"))
            .set_json(&event)
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let req = test::TestRequest::get().uri("/api/error").to_request();
        let reports: Vec<ErrorEvent> = test::call_and_read_body_json(&app, req).await;
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].version, "5.4.1");
        assert_eq!(reports[0].ip_address, "10.1.2.3");
    }

    #[actix_web::test]
    async fn user_lookup_is_case_insensitive() {
        let state = test_state();
        let app = test::init_service(App::new().app_data(state.clone()).configure(configure)).await;

        let req = test::TestRequest::get().uri("/api/user?name=alice").to_request();
        let first: i64 = test::call_and_read_body_json(&app, req).await;
        let req = test::TestRequest::get().uri("/api/user?name=ALICE").to_request();
        let second: i64 = test::call_and_read_body_json(&app, req).await;
        assert_eq!(first, second);

        let req = test::TestRequest::get().uri("/api/user?name=").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn issue_round_trip_over_http() {
        let state = test_state();
        let app = test::init_service(App::new().app_data(state.clone()).configure(configure)).await;

        let req = test::TestRequest::post()
            .uri("/api/issues")
            .set_json(serde_json::json!({
                "Project": "proj",
                "Summary": "build broke",
                "Owner": "alice"
            }))
            .to_request();
        let id: i64 = test::call_and_read_body_json(&app, req).await;

        let req = test::TestRequest::post()
            .uri(&format!("/api/issues/{id}/watchers"))
            .set_json("bob")
            .to_request();
        let added: u64 = test::call_and_read_body_json(&app, req).await;
        assert_eq!(added, 1);

        let req = test::TestRequest::get().uri("/api/issues?user=Bob").to_request();
        let watched: Vec<Issue> = test::call_and_read_body_json(&app, req).await;
        assert_eq!(watched.len(), 1);
        assert!(watched[0].notify);

        let req = test::TestRequest::put()
            .uri(&format!("/api/issues/{id}"))
            .set_json(serde_json::json!({ "Resolved": true }))
            .to_request();
        let updated: u64 = test::call_and_read_body_json(&app, req).await;
        assert_eq!(updated, 1);

        let req = test::TestRequest::get()
            .uri(&format!("/api/issues/{id}"))
            .to_request();
        let fetched: Issue = test::call_and_read_body_json(&app, req).await;
        assert_eq!(fetched.owner.as_deref(), Some("ALICE"));
        assert!(fetched.is_resolved());

        let req = test::TestRequest::get().uri("/api/issues").to_request();
        let open: Vec<Issue> = test::call_and_read_body_json(&app, req).await;
        assert!(open.is_empty());

        let req = test::TestRequest::delete()
            .uri(&format!("/api/issues/{id}/watchers/bob"))
            .to_request();
        let removed: u64 = test::call_and_read_body_json(&app, req).await;
        assert_eq!(removed, 1);

        let req = test::TestRequest::delete()
            .uri(&format!("/api/issues/{id}"))
            .to_request();
        let deleted: u64 = test::call_and_read_body_json(&app, req).await;
        assert_eq!(deleted, 1);

        let req = test::TestRequest::get()
            .uri(&format!("/api/issues/{id}"))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[actix_web::test]
    async fn issue_builds_track_outcome() {
        let state = test_state();
        let issue_id = state
            .service
            .create_issue(&NewIssue {
                project: "proj".to_string(),
                summary: "link error".to_string(),
                owner: None,
            })
            .expect("create");
        let app = test::init_service(App::new().app_data(state.clone()).configure(configure)).await;

        let build = NewIssueBuild {
            stream: "//UE5/Main".to_string(),
            change: 1200,
            job_name: "Incremental".to_string(),
            job_url: "https://ci.example.com/job/1".to_string(),
            job_step_name: "Compile".to_string(),
            job_step_url: "https://ci.example.com/job/1/step/2".to_string(),
            error_url: None,
            outcome: 1,
        };
        let req = test::TestRequest::post()
            .uri(&format!("/api/issues/{issue_id}/builds"))
            .set_json(&build)
            .to_request();
        let build_id: i64 = test::call_and_read_body_json(&app, req).await;

        let req = test::TestRequest::put()
            .uri(&format!("/api/issuebuilds/{build_id}"))
            .set_json(IssueBuildUpdate { outcome: 3 })
            .to_request();
        let updated: u64 = test::call_and_read_body_json(&app, req).await;
        assert_eq!(updated, 1);

        let req = test::TestRequest::get()
            .uri(&format!("/api/issuebuilds/{build_id}"))
            .to_request();
        let stored: IssueBuild = test::call_and_read_body_json(&app, req).await;
        assert_eq!(stored.outcome, 3);

        let req = test::TestRequest::post()
            .uri("/api/issues/999/builds")
            .set_json(&build)
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CONFLICT);
    }

    #[actix_web::test]
    async fn openapi_json_returns_document() {
        let app = test::init_service(App::new().configure(configure)).await;
        let req = test::TestRequest::get().uri("/api/openapi.json").to_request();
        let resp: serde_json::Value = test::call_and_read_body_json(&app, req).await;

        assert!(resp.get("paths").is_some());
        assert!(resp["paths"].get("/issues/{id}/watchers/{user}").is_some());
    }
}
