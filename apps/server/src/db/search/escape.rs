//! Free-text search sanitizing

/// Replace control whitespace and SQL wildcard characters with spaces, then trim.
///
/// `%` and `_` would otherwise act as wildcards inside `ILIKE` patterns.
pub fn sanitize_search(input: &str) -> String {
    input
        .chars()
        .map(|c| match c {
            '\n' | '\r' | '\t' | '%' | '_' => ' ',
            _ => c,
        })
        .collect::<String>()
        .trim()
        .to_string()
}

/// Split sanitized search text into non-empty tokens.
pub fn search_tokens(search: &str) -> impl Iterator<Item = &str> {
    search.split_whitespace()
}
