//! Shared helper functions for CLI commands

/// Truncate a string to max_len characters, adding "..." if truncated
pub fn truncate_str(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

/// Split a comma-separated argument into trimmed, non-empty parts
pub fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

/// Join a list for one table cell, "-" when empty
pub fn join_or_dash<T: std::fmt::Display>(items: &[T]) -> String {
    if items.is_empty() {
        "-".to_string()
    } else {
        items
            .iter()
            .map(|i| i.to_string())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_str() {
        assert_eq!(truncate_str("hello", 10), "hello");
        assert_eq!(truncate_str("hello world", 8), "hello...");
        assert_eq!(truncate_str("hi", 2), "hi");
        assert_eq!(truncate_str("Sécurité des données", 8), "Sécur...");
    }

    #[test]
    fn test_split_list() {
        assert_eq!(split_list("Legal, IT ,,Ops"), vec!["Legal", "IT", "Ops"]);
        assert!(split_list(" , ").is_empty());
    }

    #[test]
    fn test_join_or_dash() {
        let empty: Vec<String> = Vec::new();
        assert_eq!(join_or_dash(&empty), "-");
        assert_eq!(join_or_dash(&["ACC-01", "SEC-02"]), "ACC-01, SEC-02");
    }
}
