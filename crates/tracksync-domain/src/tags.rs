use std::collections::BTreeMap;

/// Maps a board tag onto a subsystem label on the issue tracker.
///
/// Lookup is exact first, then case-insensitive; with no entry the tag itself
/// is returned lower-cased, so a non-blank tag never maps to an empty label.
/// Tags are trimmed first: a whitespace-only tag is empty and maps to `""`.
/// Blank table values count as missing entries.
pub fn map_tag_to_label(tag: &str, table: &BTreeMap<String, String>) -> String {
    let tag = tag.trim();
    if tag.is_empty() {
        return String::new();
    }

    let mapped = table
        .get(tag)
        .or_else(|| {
            let lowered = tag.to_lowercase();
            table
                .iter()
                .find(|(key, _)| key.trim().to_lowercase() == lowered)
                .map(|(_, label)| label)
        })
        .map(|label| label.trim())
        .filter(|label| !label.is_empty());

    match mapped {
        Some(label) => label.to_owned(),
        None => tag.to_lowercase(),
    }
}
