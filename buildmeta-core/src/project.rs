//! Project names, streams and project-scoped matching.

use std::sync::LazyLock;

use regex::Regex;

static STREAM_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"//[a-zA-Z0-9._-]+/[a-zA-Z0-9._-]+").expect("stream pattern compiles")
});

const WILDCARD_SUFFIX: &str = "...";

/// Fold a project path to its top-level stream.
///
/// `//UE5/Main/Samples/Games` becomes `//UE5/Main`. Inputs without a
/// `//depot/stream` prefix are returned unchanged.
pub fn canonical_project(project: &str) -> &str {
    STREAM_PATTERN
        .find(project)
        .map(|found| found.as_str())
        .unwrap_or(project)
}

/// Search pattern used to narrow feed queries to a stream.
///
/// `None` selects every project. The pattern is deliberately wide; results
/// are re-checked with [`matches_project`] or an exact comparison.
pub fn project_pattern(project: Option<&str>) -> String {
    format!("%{}%", project.map(canonical_project).unwrap_or_default())
}

/// Whether a record scoped to `candidate` should be served to a client asking for `wanted`.
///
/// A record without a project applies everywhere. Otherwise the names must
/// match case-insensitively, or `candidate` must be a wildcard such as
/// `//UE5/Main/...` whose stem prefixes `wanted`.
pub fn matches_project(candidate: Option<&str>, wanted: &str) -> bool {
    match candidate {
        None => true,
        Some(candidate) => {
            same_project(candidate, wanted) || matches_wildcard(candidate, wanted)
        }
    }
}

/// Exact, case-insensitive project comparison used for votes and comments.
pub fn same_project(candidate: &str, wanted: &str) -> bool {
    candidate.to_lowercase() == wanted.to_lowercase()
}

fn matches_wildcard(wildcard: &str, project: &str) -> bool {
    let Some(stem) = wildcard.strip_suffix(WILDCARD_SUFFIX) else {
        return false;
    };
    let stem = stem.strip_suffix('/').unwrap_or(stem);
    if stem.is_empty() || project.is_empty() {
        return false;
    }
    project.to_lowercase().starts_with(&stem.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_project_keeps_first_two_segments() {
        assert_eq!(canonical_project("//UE5/Main/Samples/Games"), "//UE5/Main");
        assert_eq!(canonical_project("//UE5/Release-5.4"), "//UE5/Release-5.4");
        assert_eq!(canonical_project("//my_depot/dev.stream/x"), "//my_depot/dev.stream");
    }

    #[test]
    fn canonical_project_passes_through_non_streams() {
        assert_eq!(canonical_project("ShooterGame"), "ShooterGame");
        assert_eq!(canonical_project("//UE5"), "//UE5");
        assert_eq!(canonical_project(""), "");
    }

    #[test]
    fn project_pattern_wraps_stream() {
        assert_eq!(project_pattern(Some("//UE5/Main/Samples")), "%//UE5/Main%");
        assert_eq!(project_pattern(None), "%%");
    }

    #[test]
    fn matches_project_is_reflexive_and_case_insensitive() {
        for name in ["//UE5/Main", "Lyra", "//a/b/c...", ""] {
            assert!(matches_project(Some(name), name), "{name} should match itself");
        }
        assert!(matches_project(Some("//ue5/main"), "//UE5/Main"));
    }

    #[test]
    fn missing_candidate_matches_everything() {
        assert!(matches_project(None, "//UE5/Main"));
        assert!(matches_project(None, ""));
    }

    #[test]
    fn concrete_candidate_does_not_match_empty_request() {
        assert!(!matches_project(Some("//UE5/Main"), ""));
        assert!(!matches_project(Some("//UE5/Main/..."), ""));
    }

    #[test]
    fn wildcard_candidate_matches_sub_projects() {
        let badge = Some("//UE5/Main/...");
        assert!(matches_project(badge, "//UE5/Main"));
        assert!(matches_project(badge, "//ue5/main/Samples/Games/Lyra"));
        assert!(!matches_project(badge, "//UE5/Release-5.4"));
        assert!(!matches_project(Some("//UE5/Main"), "//UE5/Main/Samples"));
    }

    #[test]
    fn wildcard_without_separator_uses_bare_stem() {
        assert!(matches_project(Some("Shooter..."), "ShooterGame"));
        assert!(!matches_project(Some("..."), "ShooterGame"));
    }

    #[test]
    fn exact_comparison_ignores_case_only() {
        assert!(same_project("//UE5/Main", "//ue5/MAIN"));
        assert!(!same_project("//UE5/Main", "//UE5/Main/Samples"));
    }

    #[test]
    fn case_folding_covers_non_ascii_letters() {
        assert!(same_project("//Dépôt/Main", "//DÉPÔT/MAIN"));
        assert!(matches_project(Some("//Dépôt/Main"), "//DÉPÔT/MAIN"));
        assert!(matches_project(Some("//UE5/Dépôt/..."), "//ue5/DÉPÔT/Jeux"));
        assert!(!matches_project(Some("//UE5/Dépôt/..."), "//UE5/Dép"));
    }
}
