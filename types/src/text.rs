//! Small pure text helpers used when rendering failure details.

/// Truncate a string to at most `max` characters, appending `...` when cut.
///
/// - Trims surrounding whitespace before truncating.
/// - Uses `char` count (not bytes) to avoid splitting Unicode scalar values.
/// - Enforces a minimum `max` of 3 so the ellipsis fits.
#[must_use]
pub fn truncate_with_ellipsis(raw: &str, max: usize) -> String {
    let max = max.max(3);
    let trimmed = raw.trim();
    if trimmed.chars().count() <= max {
        return trimmed.to_string();
    }
    let head: String = trimmed.chars().take(max - 3).collect();
    format!("{head}...")
}

/// Keep the last `max_lines` non-empty lines of `raw`.
///
/// Command output usually carries the interesting part (the error) at the
/// end, so failure details keep the tail rather than the head. A leading
/// `...` line marks that earlier lines were dropped.
#[must_use]
pub fn tail_lines(raw: &str, max_lines: usize) -> String {
    let lines: Vec<&str> = raw
        .lines()
        .map(str::trim_end)
        .filter(|line| !line.trim().is_empty())
        .collect();
    if lines.len() <= max_lines {
        return lines.join("\n");
    }
    let kept = &lines[lines.len() - max_lines..];
    let mut out = String::from("...");
    for line in kept {
        out.push('\n');
        out.push_str(line);
    }
    out
}
