//! Transfer error taxonomy for retry classification.

use std::fmt;

/// Network-level failure detail, used for the human-readable classification
/// surfaced in terminal results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkKind {
    /// Connect or read timed out.
    Timeout,
    /// Connection refused, reset, or dropped mid-transfer.
    Connection,
    /// Name resolution failed.
    Dns,
    /// TLS handshake or certificate failure.
    Tls,
}

/// Error from one transfer attempt. Classified so the retry policy can
/// decide whether another attempt is worthwhile before the result is
/// flattened into a `TransferResult`.
#[derive(Debug)]
pub enum TransferError {
    /// Network failure (retryable).
    Network(NetworkKind),
    /// Non-2xx HTTP response. 404 is fatal; others are retryable.
    Http(u32),
    /// Local filesystem failure (disk full, permission). Fatal, no retry.
    LocalIo(std::io::Error),
    /// The requested resume range starts past the end of the resource and
    /// no partial file was available to finalize. Retryable from offset 0.
    RangeNotSatisfiable,
    /// Stop was requested; the partial temp file is preserved and the
    /// result discarded. Never retried.
    Aborted,
    /// Anything unclassified. Retryable; logged with full context.
    Unknown(String),
}

impl fmt::Display for TransferError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransferError::Network(NetworkKind::Timeout) => write!(f, "network timeout"),
            TransferError::Network(NetworkKind::Connection) => write!(f, "connection error"),
            TransferError::Network(NetworkKind::Dns) => write!(f, "DNS resolution failed"),
            TransferError::Network(NetworkKind::Tls) => write!(f, "TLS/certificate error"),
            TransferError::Http(code) => write!(f, "HTTP {}", code),
            TransferError::LocalIo(e) => write!(f, "local I/O error: {}", e),
            TransferError::RangeNotSatisfiable => write!(f, "range not satisfiable"),
            TransferError::Aborted => write!(f, "aborted by stop request"),
            TransferError::Unknown(msg) => write!(f, "unknown error: {}", msg),
        }
    }
}

impl std::error::Error for TransferError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TransferError::LocalIo(e) => Some(e),
            _ => None,
        }
    }
}

impl TransferError {
    /// True for errors where further attempts cannot help.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            TransferError::LocalIo(_) | TransferError::Http(404) | TransferError::Aborted
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fatal_errors() {
        assert!(TransferError::Http(404).is_fatal());
        assert!(TransferError::LocalIo(std::io::Error::other("disk full")).is_fatal());
        assert!(TransferError::Aborted.is_fatal());
        assert!(!TransferError::Http(503).is_fatal());
        assert!(!TransferError::Network(NetworkKind::Timeout).is_fatal());
        assert!(!TransferError::Unknown("?".into()).is_fatal());
    }

    #[test]
    fn display_classifications_are_nonempty() {
        let errors = [
            TransferError::Network(NetworkKind::Timeout),
            TransferError::Network(NetworkKind::Dns),
            TransferError::Http(500),
            TransferError::RangeNotSatisfiable,
            TransferError::Unknown("x".into()),
        ];
        for e in errors {
            assert!(!e.to_string().is_empty());
        }
    }
}
