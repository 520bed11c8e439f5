use std::{
    fs, io,
    path::{Path, PathBuf},
    time::Duration,
};

use reqwest::StatusCode;
use serde_json::Value;

pub fn is_retryable_status(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::TOO_MANY_REQUESTS
            | StatusCode::INTERNAL_SERVER_ERROR
            | StatusCode::BAD_GATEWAY
            | StatusCode::SERVICE_UNAVAILABLE
            | StatusCode::GATEWAY_TIMEOUT
    )
}

pub fn parse_retry_after(value: Option<&reqwest::header::HeaderValue>) -> Option<Duration> {
    let value = value?.to_str().ok()?.trim();
    let secs = value.parse::<u64>().ok()?;
    Some(Duration::from_secs(secs))
}

pub fn truncate_for_log(text: &str) -> String {
    let trimmed = text.trim();
    let max_len = 300usize;
    match trimmed.char_indices().nth(max_len) {
        None => trimmed.to_string(),
        Some((cut, _)) => format!("{}...", &trimmed[..cut]),
    }
}

/// Pulls a human-readable message out of an error body. Flask-style services
/// answer `{"message": "..."}`; anything else is shown truncated.
pub fn error_message_from_body(body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<Value>(body) {
        for key in ["message", "Message", "error"] {
            if let Some(message) = value.get(key).and_then(Value::as_str) {
                return message.to_string();
            }
        }
    }
    truncate_for_log(body)
}

/// Writes `bytes` next to `output_path` first and renames into place.
pub fn write_atomically(output_path: &Path, bytes: &[u8]) -> io::Result<()> {
    let tmp_path = temp_path_for(output_path);
    let written = fs::write(&tmp_path, bytes).and_then(|()| fs::rename(&tmp_path, output_path));
    if written.is_err() {
        let _ = fs::remove_file(&tmp_path);
    }
    written
}

pub fn temp_path_for(output_path: &Path) -> PathBuf {
    let file_name = output_path
        .file_name()
        .and_then(|x| x.to_str())
        .unwrap_or("output");
    output_path.with_file_name(format!("{file_name}.tmp"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_statuses() {
        assert!(is_retryable_status(StatusCode::TOO_MANY_REQUESTS));
        assert!(is_retryable_status(StatusCode::SERVICE_UNAVAILABLE));
        assert!(!is_retryable_status(StatusCode::NOT_FOUND));
        assert!(!is_retryable_status(StatusCode::BAD_REQUEST));
    }

    #[test]
    fn error_message_prefers_json_message() {
        assert_eq!(
            error_message_from_body(r#"{"message": "Could not find practitioner"}"#),
            "Could not find practitioner"
        );
        assert_eq!(error_message_from_body("  plain failure \n"), "plain failure");
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        let long = "é".repeat(400);
        let cut = truncate_for_log(&long);
        assert!(cut.ends_with("..."));
        assert_eq!(cut.chars().count(), 303);
    }

    #[test]
    fn atomic_write_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("out.json");
        write_atomically(&target, b"{}").unwrap();
        assert_eq!(fs::read_to_string(&target).unwrap(), "{}");
        assert!(!temp_path_for(&target).exists());
    }

    #[test]
    fn failed_atomic_write_cleans_up() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("busy");
        fs::create_dir(&target).unwrap();
        fs::write(target.join("inner"), "x").unwrap();
        assert!(write_atomically(&target, b"{}").is_err());
        assert!(!temp_path_for(&target).exists());
    }
}
