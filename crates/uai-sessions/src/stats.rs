use chrono::{DateTime, Duration, Utc};

use crate::types::{Session, SessionStats};

/// Summarize a session as of `now`.
///
/// Closed sessions measure up to their end time. Open sessions measure up to
/// `now`, so the figure keeps growing until the session is closed.
pub fn session_stats(session: &Session, now: DateTime<Utc>) -> SessionStats {
    let end = session.end_time.unwrap_or(now);
    SessionStats {
        message_count: session.messages.len(),
        duration: format_duration(end - session.start_time),
    }
}

/// Format as whole minutes and whole seconds, e.g. `"3m7s"`.
///
/// Sub-second remainders are truncated and negative spans clamp to zero.
pub fn format_duration(duration: Duration) -> String {
    let total_secs = duration.num_seconds().max(0);
    format!("{}m{}s", total_secs / 60, total_secs % 60)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Message, Role};

    #[test]
    fn test_format_duration_truncates() {
        assert_eq!(format_duration(Duration::milliseconds(0)), "0m0s");
        assert_eq!(format_duration(Duration::milliseconds(59_999)), "0m59s");
        assert_eq!(format_duration(Duration::seconds(187)), "3m7s");
        assert_eq!(format_duration(Duration::seconds(3600)), "60m0s");
    }

    #[test]
    fn test_format_duration_clamps_negative() {
        assert_eq!(format_duration(Duration::seconds(-5)), "0m0s");
    }

    #[test]
    fn test_closed_session_uses_end_time() {
        let mut session = Session::new("id".to_string(), "demo", "/tmp/p");
        session.end_time = Some(session.start_time + Duration::seconds(125));
        session.messages.push(Message::new(Role::User, "hi"));

        let far_future = session.start_time + Duration::days(3);
        let stats = session_stats(&session, far_future);

        assert_eq!(stats.message_count, 1);
        assert_eq!(stats.duration, "2m5s");
    }

    #[test]
    fn test_open_session_measures_against_now() {
        let session = Session::new("id".to_string(), "demo", "/tmp/p");
        let now = session.start_time + Duration::seconds(61);

        assert_eq!(session_stats(&session, now).duration, "1m1s");
    }
}
