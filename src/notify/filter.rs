//! notify::filter
//!
//! Limits applied to message bodies. Headers, intro and footer never pass
//! through here.

/// Marker appended to a truncated line.
const TRUNCATION_MARKER: &str = " [...]";

/// Body limits taken from the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BodyLimits {
    /// Keep at most this many body lines
    pub max_lines: Option<usize>,
    /// Truncate lines longer than this
    pub max_line_length: Option<usize>,
    /// Measure line length in characters rather than bytes
    pub strict_utf8: bool,
}

impl Default for BodyLimits {
    fn default() -> Self {
        Self {
            max_lines: None,
            max_line_length: Some(500),
            strict_utf8: true,
        }
    }
}

/// Apply line-length truncation, then the line-count limit.
///
/// Text reaching this point is already valid UTF-8 (undecodable bytes were
/// replaced with U+FFFD when read from the repository). With `strict_utf8`
/// the length limit counts characters; otherwise it counts bytes and cuts
/// at the nearest character boundary.
pub fn filter_body(lines: Vec<String>, limits: &BodyLimits) -> Vec<String> {
    let lines: Vec<String> = match limits.max_line_length {
        Some(max) => lines
            .into_iter()
            .map(|line| limit_line_length(line, max, limits.strict_utf8))
            .collect(),
        None => lines,
    };

    match limits.max_lines {
        Some(max) => limit_lines(lines, max),
        None => lines,
    }
}

fn limit_line_length(line: String, max: usize, count_chars: bool) -> String {
    let keep = max.saturating_sub(TRUNCATION_MARKER.len() + 1);
    if count_chars {
        if line.chars().count() <= max {
            return line;
        }
        let mut cut: String = line.chars().take(keep).collect();
        cut.push_str(TRUNCATION_MARKER);
        cut
    } else {
        if line.len() <= max {
            return line;
        }
        let mut end = keep;
        while !line.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}{}", &line[..end], TRUNCATION_MARKER)
    }
}

fn limit_lines(mut lines: Vec<String>, max: usize) -> Vec<String> {
    if lines.len() <= max {
        return lines;
    }
    let suppressed = lines.len() - max;
    lines.truncate(max);
    lines.push(format!("... {} lines suppressed ...", suppressed));
    lines
}
