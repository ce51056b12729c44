//! TCP reachability check
//!
//! Resolves the target and tries each address with a bounded connect.

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use thiserror::Error;

/// Error type for reachability checks
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ReachabilityError {
    /// Host resolution failed
    #[error("Failed to resolve host '{host}': {reason}")]
    ResolutionFailed {
        /// The hostname that failed to resolve
        host: String,
        /// The reason for the failure
        reason: String,
    },
    /// Connection refused or timed out on every resolved address
    #[error("Port {port} on '{host}' is not reachable: {reason}")]
    Unreachable {
        /// The hostname that was unreachable
        host: String,
        /// The port that was unreachable
        port: u16,
        /// The last failure seen
        reason: String,
    },
}

/// Checks that a TCP connection to `host:port` can be established.
///
/// `timeout` bounds the whole check: resolution plus the connect attempts
/// over every resolved address. Resolution failures are reported
/// separately from refused or timed-out connects.
///
/// # Returns
/// The connect latency to the first address that accepted.
///
/// # Errors
/// * [`ReachabilityError::ResolutionFailed`] if the host cannot be resolved
/// * [`ReachabilityError::Unreachable`] if no address accepted a connection
///   before the deadline
pub async fn check_reachable(
    host: &str,
    port: u16,
    timeout: Duration,
) -> Result<Duration, ReachabilityError> {
    let mut last_error = None;
    let outcome = tokio::time::timeout(timeout, connect_any(host, port, &mut last_error)).await;
    match outcome {
        Ok(result) => result,
        Err(_) => match last_error {
            Some(reason) => Err(ReachabilityError::Unreachable {
                host: host.to_string(),
                port,
                reason: format!("{reason}; gave up after {}s", timeout.as_secs()),
            }),
            None => Err(ReachabilityError::Unreachable {
                host: host.to_string(),
                port,
                reason: format!("Connection timed out after {}s", timeout.as_secs()),
            }),
        },
    }
}

async fn connect_any(
    host: &str,
    port: u16,
    last_error: &mut Option<String>,
) -> Result<Duration, ReachabilityError> {
    let addrs: Vec<SocketAddr> = tokio::net::lookup_host((host, port))
        .await
        .map_err(|e| ReachabilityError::ResolutionFailed {
            host: host.to_string(),
            reason: e.to_string(),
        })?
        .collect();

    if addrs.is_empty() {
        return Err(ReachabilityError::ResolutionFailed {
            host: host.to_string(),
            reason: "No addresses found".to_string(),
        });
    }

    for addr in addrs {
        let start = Instant::now();
        match tokio::net::TcpStream::connect(addr).await {
            Ok(_stream) => return Ok(start.elapsed()),
            Err(e) => *last_error = Some(format!("{addr}: {e}")),
        }
    }

    Err(ReachabilityError::Unreachable {
        host: host.to_string(),
        port,
        reason: last_error.take().unwrap_or_default(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_open_local_port_is_reachable() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let latency = check_reachable("127.0.0.1", port, Duration::from_secs(2)).await;
        assert!(latency.is_ok());
    }

    #[tokio::test]
    async fn test_closed_local_port_is_unreachable() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let err = check_reachable("127.0.0.1", port, Duration::from_secs(2))
            .await
            .unwrap_err();
        assert!(matches!(err, ReachabilityError::Unreachable { .. }));
    }

    #[tokio::test]
    async fn test_unresolvable_host() {
        let err = check_reachable("host.invalid", 22, Duration::from_secs(2))
            .await
            .unwrap_err();
        assert!(matches!(err, ReachabilityError::ResolutionFailed { .. }));
    }

    #[tokio::test]
    async fn test_deadline_covers_every_address() {
        // Non-routable addresses stall until the deadline
        let timeout = Duration::from_millis(300);
        let started = Instant::now();
        let result = check_reachable("10.255.255.1", 9, timeout).await;
        let elapsed = started.elapsed();

        assert!(matches!(result, Err(ReachabilityError::Unreachable { .. })));
        assert!(elapsed < timeout * 2, "check took {elapsed:?}");
    }
}
