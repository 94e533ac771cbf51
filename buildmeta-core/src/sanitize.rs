//! Length capping for free text stored with issues.

const ELLIPSIS: &str = "...";

/// Cap `text` at `max_chars` characters.
///
/// Text that fits is returned unchanged. Longer text is cut at the last line
/// break that still leaves room for the ellipsis; failing that it is cut
/// mid-line, trailing whitespace is dropped, and the ellipsis is appended.
pub fn sanitize_text(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let ellipsis_len = ELLIPSIS.chars().count();
    if max_chars < ellipsis_len {
        return text.chars().take(max_chars).collect();
    }
    let budget = max_chars - ellipsis_len;

    let kept: String = text.chars().take(budget).collect();
    let cut = match kept.rfind('\n') {
        Some(newline) => &kept[..=newline],
        None => kept.trim_end(),
    };
    format!("{cut}{ELLIPSIS}")
}

#[cfg(test)]
mod tests {
    use super::sanitize_text;

    #[test]
    fn short_text_is_unchanged() {
        assert_eq!(sanitize_text("build broke", 200), "build broke");
        assert_eq!(sanitize_text("", 3), "");
        let exact = "x".repeat(200);
        assert_eq!(sanitize_text(&exact, 200), exact);
    }

    #[test]
    fn long_line_is_hard_truncated() {
        let text = "a".repeat(250);
        let sanitized = sanitize_text(&text, 200);
        assert_eq!(sanitized.chars().count(), 200);
        assert!(sanitized.ends_with("..."));
        assert!(sanitized.starts_with(&"a".repeat(197)));
    }

    #[test]
    fn trailing_whitespace_is_trimmed_before_ellipsis() {
        let text = format!("{}{}", "word ".repeat(10), "z".repeat(40));
        let sanitized = sanitize_text(&text, 13);
        assert_eq!(sanitized, "word word...");
    }

    #[test]
    fn cut_prefers_last_line_break() {
        let text = format!("first line\nsecond line\n{}", "x".repeat(50));
        let sanitized = sanitize_text(&text, 40);
        assert_eq!(sanitized, "first line\nsecond line\n...");
    }

    #[test]
    fn line_break_past_budget_is_ignored() {
        // The only newline sits where keeping it would overflow the cap.
        let text = format!("{}\n{}", "y".repeat(9), "y".repeat(20));
        let sanitized = sanitize_text(&text, 10);
        assert_eq!(sanitized, "yyyyyyy...");
        assert_eq!(sanitized.chars().count(), 10);
    }

    #[test]
    fn result_never_exceeds_cap() {
        let samples = [
            "line\n".repeat(300),
            "é".repeat(1500),
            format!("{}\n{}", " ".repeat(500), "b".repeat(700)),
            "\n".repeat(1200),
        ];
        for sample in &samples {
            for cap in [0, 1, 3, 4, 10, 200, 1000] {
                let sanitized = sanitize_text(sample, cap);
                assert!(
                    sanitized.chars().count() <= cap,
                    "cap {cap} exceeded: {}",
                    sanitized.chars().count()
                );
            }
        }
    }

    #[test]
    fn multibyte_text_is_cut_on_char_boundaries() {
        let text = "ü".repeat(20);
        assert_eq!(sanitize_text(&text, 8), "üüüüü...");
    }
}
