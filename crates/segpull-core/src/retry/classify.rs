//! Map curl and HTTP failures into the transfer error taxonomy.

use super::error::{NetworkKind, TransferError};

/// Classify a curl error into a `TransferError`.
pub fn classify_curl_error(e: &curl::Error) -> TransferError {
    if e.is_operation_timedout() {
        return TransferError::Network(NetworkKind::Timeout);
    }
    if e.is_couldnt_resolve_host() || e.is_couldnt_resolve_proxy() {
        return TransferError::Network(NetworkKind::Dns);
    }
    if e.is_ssl_connect_error() || e.is_ssl_certproblem() || e.is_peer_failed_verification() {
        return TransferError::Network(NetworkKind::Tls);
    }
    if e.is_couldnt_connect()
        || e.is_recv_error()
        || e.is_send_error()
        || e.is_got_nothing()
        || e.is_partial_file()
    {
        return TransferError::Network(NetworkKind::Connection);
    }
    TransferError::Unknown(e.to_string())
}

/// Classify a non-2xx HTTP status. 416 is resolved by the transfer unit
/// before classification when a partial file can be finalized; reaching
/// here means no partial file existed and the fetch should restart clean.
pub fn classify_http_status(code: u32) -> TransferError {
    match code {
        416 => TransferError::RangeNotSatisfiable,
        _ => TransferError::Http(code),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_404_is_fatal() {
        assert!(classify_http_status(404).is_fatal());
    }

    #[test]
    fn http_5xx_is_retryable() {
        assert!(!classify_http_status(500).is_fatal());
        assert!(!classify_http_status(503).is_fatal());
    }

    #[test]
    fn http_416_maps_to_range_not_satisfiable() {
        assert!(matches!(
            classify_http_status(416),
            TransferError::RangeNotSatisfiable
        ));
    }
}
