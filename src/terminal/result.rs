use chrono::{DateTime, Utc};
use serde::Serialize;

/// Outcome of one submitted command line. Failures are data, never errors.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionResult {
    pub ok: bool,
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub duration_ms: u64,
    /// Spawn failures and timeouts
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Child output exceeded the capture limit
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub truncated: bool,
}

impl ExecutionResult {
    /// Result of an in-process call: success is "nothing on stderr".
    pub fn from_output(started_at: DateTime<Utc>, stdout: String, stderr: String) -> Self {
        let ok = stderr.is_empty();
        Self::finish(started_at, ok, Some(if ok { 0 } else { 1 }), stdout, stderr)
    }

    /// Result of a command the dispatcher refused to run.
    pub fn failure(started_at: DateTime<Utc>, message: impl Into<String>) -> Self {
        Self::finish(started_at, false, Some(1), String::new(), message.into())
    }

    /// Result of a child process; `code` is `None` when it was killed or never ran.
    pub fn from_process(
        started_at: DateTime<Utc>,
        code: Option<i32>,
        stdout: String,
        stderr: String,
    ) -> Self {
        Self::finish(started_at, code == Some(0), code, stdout, stderr)
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.ok = false;
        self.error = Some(error.into());
        self
    }

    pub fn with_truncated(mut self, truncated: bool) -> Self {
        self.truncated = truncated;
        self
    }

    fn finish(
        started_at: DateTime<Utc>,
        ok: bool,
        code: Option<i32>,
        stdout: String,
        stderr: String,
    ) -> Self {
        let ended_at = Utc::now().max(started_at);
        let duration_ms = (ended_at - started_at).num_milliseconds().max(0) as u64;
        Self {
            ok,
            code,
            stdout,
            stderr,
            started_at,
            ended_at,
            duration_ms,
            error: None,
            truncated: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_in_process_ok_follows_stderr() {
        let started = Utc::now();
        let ok = ExecutionResult::from_output(started, "schema".into(), String::new());
        assert!(ok.ok);
        assert_eq!(ok.code, Some(0));

        let failed = ExecutionResult::from_output(started, String::new(), "boom".into());
        assert!(!failed.ok);
        assert_eq!(failed.code, Some(1));
    }

    #[test]
    fn test_process_ok_follows_exit_code() {
        let started = Utc::now();
        assert!(ExecutionResult::from_process(started, Some(0), String::new(), "warn".into()).ok);
        assert!(!ExecutionResult::from_process(started, Some(2), String::new(), String::new()).ok);
        assert!(!ExecutionResult::from_process(started, None, String::new(), String::new()).ok);
    }

    #[test]
    fn test_duration_matches_timestamps() {
        let started = Utc::now() - Duration::milliseconds(25);
        let r = ExecutionResult::failure(started, "nope");
        assert!(r.duration_ms >= 25);
        assert_eq!(
            r.duration_ms as i64,
            (r.ended_at - r.started_at).num_milliseconds()
        );
    }

    #[test]
    fn test_clock_skew_never_goes_negative() {
        let future = Utc::now() + Duration::seconds(60);
        let r = ExecutionResult::failure(future, "nope");
        assert_eq!(r.duration_ms, 0);
        assert!(r.ended_at >= r.started_at);
    }

    #[test]
    fn test_serialized_shape() {
        let r = ExecutionResult::failure(Utc::now(), "bad").with_error("spawn failed");
        let v = serde_json::to_value(&r).unwrap();
        assert_eq!(v["ok"], false);
        assert_eq!(v["stderr"], "bad");
        assert_eq!(v["error"], "spawn failed");
        assert!(v.get("startedAt").is_some());
        assert!(v.get("durationMs").is_some());
        assert!(v.get("truncated").is_none());
    }
}
