use std::collections::HashSet;

/// Strips all HTML tags from input, leaving plain text. Used for every
/// donor- or admin-supplied text field before it reaches the database.
pub fn strip_all_html(input: &str) -> String {
    ammonia::Builder::new()
        .tags(HashSet::new())
        .clean(input)
        .to_string()
}

/// Trims and strips an optional free-text field, collapsing blank input to
/// None.
pub fn clean_optional_text(input: Option<&str>) -> Option<String> {
    let cleaned = strip_all_html(input?.trim());
    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned)
    }
}
