//! Mass-post CSV parsing.
//!
//! The format is deliberately loose: a header row naming at least `content`
//! and `time`, then one post per line. Quoted values may contain commas; a
//! backslash before a quote keeps it from toggling the quoted state.

use crate::batch::BatchOutcome;
use crate::models::PostCandidate;
use crate::schedule::{ScheduleTime, TIME_FORMAT_HINT};

pub const REQUIRED_HEADERS: &[&str] = &["content", "time"];

pub const TEMPLATE: &str = "\
content,time
\"Check out our new product launch!\",9:00 AM
\"Happy holidays to all our customers!\",10:00 AM
\"New year sale starting soon!\",12:00 PM
";


fn strip_outer_quotes(value: &str) -> &str {
    let value = value.strip_prefix('"').unwrap_or(value);
    value.strip_suffix('"').unwrap_or(value)
}

/// Split one CSV line on commas that sit outside quotes.
pub fn split_csv_line(line: &str) -> Vec<String> {
    let mut values = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut prev: Option<char> = None;

    for c in line.chars() {
        if c == '"' && prev != Some('\\') {
            in_quotes = !in_quotes;
        } else if c == ',' && !in_quotes {
            values.push(std::mem::take(&mut current));
        } else {
            current.push(c);
        }
        prev = Some(c);
    }
    values.push(current);

    values
        .iter()
        .map(|v| strip_outer_quotes(v.trim()).to_string())
        .collect()
}

pub fn parse_posts(text: &str) -> BatchOutcome<PostCandidate> {
    let mut outcome = BatchOutcome::new();
    let lines: Vec<&str> = text
        .trim()
        .split('\n')
        .map(|l| l.strip_suffix('\r').unwrap_or(l))
        .collect();

    if lines.len() < 2 {
        outcome.reject(
            "header",
            "CSV file must have at least a header row and one data row",
        );
        return outcome;
    }

    let headers: Vec<String> = lines[0]
        .split(',')
        .map(|h| h.trim().to_lowercase())
        .collect();
    let missing: Vec<&str> = REQUIRED_HEADERS
        .iter()
        .filter(|required| !headers.iter().any(|h| h == *required))
        .copied()
        .collect();
    if !missing.is_empty() {
        outcome.reject(
            "header",
            format!("Missing required headers: {}", missing.join(", ")),
        );
        return outcome;
    }

    // A repeated header name refers to its last column.
    let column = |name: &str| headers.iter().rposition(|h| h == name).unwrap_or(0);
    let content_idx = column("content");
    let time_idx = column("time");

    for (i, line) in lines.iter().enumerate().skip(1) {
        if line.trim().is_empty() {
            continue;
        }
        let line_no = i + 1;
        let source = format!("Line {line_no}");

        let values = split_csv_line(line);
        if values.len() != headers.len() {
            outcome.reject(
                source,
                format!(
                    "Line {line_no}: Expected {} values, got {}",
                    headers.len(),
                    values.len()
                ),
            );
            continue;
        }

        let time = match values[time_idx].trim().parse::<ScheduleTime>() {
            Ok(t) => t,
            Err(_) => {
                outcome.reject(source, format!("Line {line_no}: {TIME_FORMAT_HINT}"));
                continue;
            }
        };

        let content = values[content_idx].clone();
        if content.trim().is_empty() {
            outcome.reject(source, format!("Line {line_no}: Post content is empty"));
            continue;
        }

        outcome.accept(PostCandidate { content, time });
    }

    tracing::debug!(
        rows = outcome.processed(),
        posts = outcome.items.len(),
        errors = outcome.errors.len(),
        "parsed mass-post CSV"
    );
    outcome
}
