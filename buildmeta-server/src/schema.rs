//! Diesel schema definitions for the metadata database.

diesel::table! {
    projects (id) {
        id -> BigInt,
        name -> Text,
    }
}

diesel::table! {
    users (id) {
        id -> BigInt,
        name -> Text,
    }
}

diesel::table! {
    user_votes (id) {
        id -> BigInt,
        change_number -> Integer,
        user_name -> Text,
        verdict -> Text,
        project_id -> BigInt,
    }
}

diesel::table! {
    comments (id) {
        id -> BigInt,
        change_number -> Integer,
        user_name -> Text,
        text -> Text,
        project_id -> BigInt,
    }
}

diesel::table! {
    badges (id) {
        id -> BigInt,
        change_number -> Integer,
        build_type -> Text,
        result -> Text,
        url -> Text,
        archive_path -> Nullable<Text>,
        project_id -> Nullable<BigInt>,
    }
}

diesel::table! {
    errors (id) {
        id -> BigInt,
        kind -> Text,
        text -> Text,
        user_name -> Text,
        project -> Nullable<Text>,
        project_id -> Nullable<BigInt>,
        reported_at -> Timestamp,
        version -> Text,
        ip_address -> Text,
    }
}

diesel::table! {
    telemetry (id) {
        id -> BigInt,
        action -> Text,
        result -> Text,
        user_name -> Text,
        project -> Text,
        project_id -> BigInt,
        recorded_at -> Timestamp,
        duration -> Float,
        version -> Text,
        ip_address -> Text,
    }
}

diesel::table! {
    issues (id) {
        id -> BigInt,
        created_at -> Timestamp,
        project -> Text,
        summary -> Text,
        owner_id -> Nullable<BigInt>,
        nominated_by_id -> Nullable<BigInt>,
        acknowledged_at -> Nullable<Timestamp>,
        fix_change -> Integer,
        resolved_at -> Nullable<Timestamp>,
    }
}

diesel::table! {
    issue_builds (id) {
        id -> BigInt,
        issue_id -> BigInt,
        stream -> Text,
        change_number -> Integer,
        job_name -> Text,
        job_url -> Text,
        job_step_name -> Text,
        job_step_url -> Text,
        error_url -> Nullable<Text>,
        outcome -> Integer,
    }
}

diesel::table! {
    issue_diagnostics (id) {
        id -> BigInt,
        issue_id -> BigInt,
        build_id -> Nullable<BigInt>,
        message -> Text,
        url -> Text,
    }
}

diesel::table! {
    issue_watchers (issue_id, user_id) {
        issue_id -> BigInt,
        user_id -> BigInt,
    }
}

diesel::joinable!(user_votes -> projects (project_id));
diesel::joinable!(comments -> projects (project_id));
diesel::joinable!(badges -> projects (project_id));
diesel::joinable!(issue_builds -> issues (issue_id));
diesel::joinable!(issue_diagnostics -> issues (issue_id));
diesel::joinable!(issue_watchers -> issues (issue_id));
diesel::joinable!(issue_watchers -> users (user_id));

diesel::allow_tables_to_appear_in_same_query!(
    projects,
    users,
    user_votes,
    comments,
    badges,
    errors,
    telemetry,
    issues,
    issue_builds,
    issue_diagnostics,
    issue_watchers,
);
