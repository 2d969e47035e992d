//! Whitespace cleanup for detail-page description text.

/// Normalize a description block's raw text: trim every line, break runs of
/// doubled spaces into separate chunks, drop empties, rejoin with newlines.
pub fn normalize_description(raw: &str) -> String {
    raw.lines()
        .flat_map(|line| line.split("  "))
        .map(str::trim)
        .filter(|chunk| !chunk.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collapses_blank_runs_and_trims() {
        let raw = "  Responsibilities:  \n\n\n   - ship code   \n\t\n - review PRs  ";
        assert_eq!(
            normalize_description(raw),
            "Responsibilities:\n- ship code\n- review PRs"
        );
    }

    #[test]
    fn test_double_spaces_split_into_chunks() {
        assert_eq!(
            normalize_description("Stack:  Rust  Postgres"),
            "Stack:\nRust\nPostgres"
        );
    }

    #[test]
    fn test_empty_input_stays_empty() {
        assert_eq!(normalize_description(""), "");
        assert_eq!(normalize_description("   \n \n"), "");
    }
}
