use serde::Serialize;
use tracing::{debug, info, warn};

// Credential operations worth an audit line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SecurityEvent {
    PasswordHashed,
    PasswordVerified,
    TokenIssued,
    TokenValidated,
}

impl std::fmt::Display for SecurityEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SecurityEvent::PasswordHashed => write!(f, "password_hashed"),
            SecurityEvent::PasswordVerified => write!(f, "password_verified"),
            SecurityEvent::TokenIssued => write!(f, "token_issued"),
            SecurityEvent::TokenValidated => write!(f, "token_validated"),
        }
    }
}

// Log a security event. Subjects are masked; secrets and tokens never reach this function.
pub fn log_security_event(
    event: SecurityEvent,
    subject: Option<&str>,
    success: bool,
    details: Option<&str>,
) {
    let subject = subject.map(sanitize_for_logging);

    if !success {
        warn!(
            event_type = %event,
            subject = subject.as_deref(),
            details = details,
            "Security event failed"
        );
    } else if event == SecurityEvent::TokenValidated {
        // once per request; keep out of info logs
        debug!(
            event_type = %event,
            subject = subject.as_deref(),
            details = details,
            "Security event"
        );
    } else {
        info!(
            event_type = %event,
            subject = subject.as_deref(),
            details = details,
            "Security event"
        );
    }
}

// Sanitize sensitive data in logs
pub fn sanitize_for_logging<T: AsRef<str>>(value: T) -> String {
    let chars: Vec<char> = value.as_ref().chars().collect();
    if chars.len() <= 4 {
        return "[REDACTED]".to_string();
    }

    // Show only first and last 2 characters
    let head: String = chars[..2].iter().collect();
    let tail: String = chars[chars.len() - 2..].iter().collect();
    format!("{}****{}", head, tail)
}
