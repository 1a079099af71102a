//! Text probes used to link records that share no key: labeled
//! back-references embedded in issue descriptions, and title normalization.

use tracksync_domain::fold_label;

/// Finds the first labeled back-reference in `text`, e.g. a line reading
/// `**Asana Task ID:** 1204481` or `Task ID #1204481`. Labels match
/// case-insensitively on a word boundary; a URL token yields its last path
/// segment that carries a digit.
pub fn extract_reference<S: AsRef<str>>(text: &str, labels: &[S]) -> Option<String> {
    text.lines()
        .find_map(|line| extract_from_line(line, labels))
}

fn extract_from_line<S: AsRef<str>>(line: &str, labels: &[S]) -> Option<String> {
    let cleaned = line.replace(['*', '`'], "");
    extract_with_offsets(&cleaned, &cleaned.to_ascii_lowercase(), labels)
}

fn extract_with_offsets<S: AsRef<str>>(
    cleaned: &str,
    lowered: &str,
    labels: &[S],
) -> Option<String> {
    for label in labels {
        let label = label.as_ref().trim().to_ascii_lowercase();
        if label.is_empty() {
            continue;
        }

        let mut search_from = 0;
        while let Some(offset) = lowered[search_from..].find(label.as_str()) {
            let start = search_from + offset;
            let end = start + label.len();
            search_from = end;

            let preceded_by_word = lowered[..start]
                .chars()
                .next_back()
                .is_some_and(char::is_alphanumeric);
            if preceded_by_word {
                continue;
            }

            if let Some(token) = token_after_label(&cleaned[end..]) {
                return Some(token);
            }
        }
    }
    None
}

fn token_after_label(rest: &str) -> Option<String> {
    let rest = rest.trim_start();
    let rest = rest
        .strip_prefix(':')
        .or_else(|| rest.strip_prefix('#'))?
        .trim_start();
    let rest = rest.strip_prefix('#').unwrap_or(rest);

    let raw = rest.split_whitespace().next()?;
    let token = raw
        .trim_start_matches(['(', '<', '[', '"', '\''])
        .trim_end_matches(['.', ',', ';', ')', '>', ']', '"', '\'']);

    let token = if token.starts_with("http://") || token.starts_with("https://") {
        last_identifier_segment(token)?
    } else {
        token
    };

    if token.is_empty() {
        None
    } else {
        Some(token.to_owned())
    }
}

fn last_identifier_segment(url: &str) -> Option<&str> {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    path.rsplit('/')
        .find(|segment| !segment.is_empty() && segment.chars().any(|ch| ch.is_ascii_digit()))
}

/// Title key for exact-match pairing: a leading tracker key such as
/// `PAY-42` or `[PAY-42]` is dropped, then the rest is folded. Returns an
/// empty string when nothing comparable is left.
pub fn normalize_title(title: &str) -> String {
    fold_label(strip_leading_tracker_key(title))
}

fn strip_leading_tracker_key(title: &str) -> &str {
    let trimmed = title.trim_start();
    let (inner, bracketed) = match trimmed.strip_prefix('[') {
        Some(rest) => (rest, true),
        None => (trimmed, false),
    };

    if !inner.starts_with(|ch: char| ch.is_ascii_uppercase()) {
        return title;
    }
    let prefix_len = inner
        .chars()
        .take_while(|ch| ch.is_ascii_uppercase() || ch.is_ascii_digit())
        .count();
    let Some(after_dash) = inner[prefix_len..].strip_prefix('-') else {
        return title;
    };
    let digits = after_dash
        .chars()
        .take_while(char::is_ascii_digit)
        .count();
    if digits == 0 {
        return title;
    }

    let mut rest = &after_dash[digits..];
    if bracketed {
        match rest.strip_prefix(']') {
            Some(after_bracket) => rest = after_bracket,
            None => return title,
        }
    }

    if rest.is_empty() {
        return rest;
    }
    if rest.starts_with(':') || rest.starts_with(char::is_whitespace) {
        return rest.trim_start_matches(':');
    }
    title
}
