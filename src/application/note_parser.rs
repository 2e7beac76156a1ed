use regex::Regex;
use std::sync::LazyLock;

static TIME_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d{2}:\d{2}").expect("time pattern compiles"));

/// Returns the first `DD:DD` token in `notes`, verbatim.
///
/// Hours and minutes are not range-checked, so `"99:99"` is returned as is.
pub fn extract_time(notes: &str) -> Option<String> {
    TIME_PATTERN.find(notes).map(|found| found.as_str().to_string())
}

/// Note text written onto a relocated task.
pub fn deadline_annotation(time: &str) -> String {
    format!("Deadline time: {time}")
}
