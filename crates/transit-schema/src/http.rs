//! Shared HTTP response helpers for the structural API client.
//!
//! Centralizes status-code interpretation (401/403 → permission denied,
//! other non-success → [`SchemaError::Api`] or [`SchemaError::Apply`]) and transport-error
//! classification (timeout vs. unreachable) so the client stays focused on
//! request construction.

use std::time::Duration;

use crate::error::SchemaError;

/// Response bodies quoted in errors are cut to this many characters.
pub const EXCERPT_LEN: usize = 500;

/// Check a response from a read endpoint.
///
/// Returns the response unchanged on success. Handles:
/// - **401 / 403** → [`SchemaError::PermissionDenied`]
/// - **Non-success status** → [`SchemaError::Api`] with a body excerpt
pub async fn check_response(
    resp: reqwest::Response,
    url: &str,
) -> Result<reqwest::Response, SchemaError> {
    check_status(resp, url, |url, status, excerpt| SchemaError::Api {
        url,
        status,
        excerpt,
    })
    .await
}

/// Check a response from the apply endpoint. Same as [`check_response`]
/// except that a rejection is [`SchemaError::Apply`].
pub async fn check_apply_response(
    resp: reqwest::Response,
    url: &str,
) -> Result<reqwest::Response, SchemaError> {
    check_status(resp, url, |url, status, excerpt| SchemaError::Apply {
        url,
        status,
        excerpt,
    })
    .await
}

async fn check_status(
    resp: reqwest::Response,
    url: &str,
    rejected: impl FnOnce(String, u16, String) -> SchemaError,
) -> Result<reqwest::Response, SchemaError> {
    let status = resp.status().as_u16();
    if matches!(status, 401 | 403) {
        return Err(SchemaError::PermissionDenied {
            url: url.to_string(),
            status,
        });
    }
    if !resp.status().is_success() {
        let excerpt = match resp.text().await {
            Ok(body) => excerpt(&body),
            Err(error) => format!("<response body unreadable: {error}>"),
        };
        return Err(rejected(url.to_string(), status, excerpt));
    }
    Ok(resp)
}

/// Map a transport failure to a distinguishable error.
pub fn classify(error: reqwest::Error, url: &str, timeout: Duration) -> SchemaError {
    if error.is_timeout() {
        SchemaError::Timeout {
            url: url.to_string(),
            after_secs: timeout.as_secs(),
        }
    } else if error.is_connect() {
        SchemaError::Unreachable {
            url: url.to_string(),
            message: error.to_string(),
        }
    } else {
        SchemaError::Http(error)
    }
}

/// First [`EXCERPT_LEN`] characters of a body, whitespace-collapsed.
#[must_use]
pub fn excerpt(body: &str) -> String {
    let collapsed = body.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.chars().count() <= EXCERPT_LEN {
        return collapsed;
    }
    let mut cut: String = collapsed.chars().take(EXCERPT_LEN).collect();
    cut.push('…');
    cut
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mock_response(status: u16, body: &str) -> reqwest::Response {
        reqwest::Response::from(
            ::http::Response::builder()
                .status(status)
                .body(body.to_string())
                .unwrap(),
        )
    }

    #[tokio::test]
    async fn forbidden_is_permission_denied() {
        let err = check_response(mock_response(403, ""), "http://cms/schema/snapshot")
            .await
            .unwrap_err();
        assert!(matches!(err, SchemaError::PermissionDenied { status: 403, .. }));
    }

    #[tokio::test]
    async fn unauthorized_is_permission_denied() {
        let err = check_response(mock_response(401, ""), "http://cms")
            .await
            .unwrap_err();
        assert!(matches!(err, SchemaError::PermissionDenied { status: 401, .. }));
    }

    #[tokio::test]
    async fn server_error_carries_excerpt() {
        let err = check_response(
            mock_response(500, r#"{"errors":[{"message":"boom"}]}"#),
            "http://cms",
        )
        .await
        .unwrap_err();
        match err {
            SchemaError::Api {
                status, excerpt, ..
            } => {
                assert_eq!(status, 500);
                assert!(excerpt.contains("boom"));
            }
            other => panic!("unexpected: {other}"),
        }
    }

    #[tokio::test]
    async fn apply_maps_statuses_like_reads() {
        let denied = check_apply_response(mock_response(401, ""), "http://cms/schema/apply")
            .await
            .unwrap_err();
        assert!(matches!(denied, SchemaError::PermissionDenied { status: 401, .. }));

        let rejected = check_apply_response(mock_response(400, "hash mismatch"), "http://cms/schema/apply")
            .await
            .unwrap_err();
        assert!(
            matches!(rejected, SchemaError::Apply { status: 400, ref excerpt, .. } if excerpt == "hash mismatch")
        );
        assert!(check_apply_response(mock_response(204, ""), "http://cms").await.is_ok());
    }

    #[tokio::test]
    async fn success_passes_through() {
        assert!(check_response(mock_response(200, "{}"), "http://cms").await.is_ok());
    }

    #[test]
    fn excerpt_truncates_long_bodies() {
        let long = "x".repeat(EXCERPT_LEN + 50);
        let cut = excerpt(&long);
        assert_eq!(cut.chars().count(), EXCERPT_LEN + 1);
        assert!(cut.ends_with('…'));
    }

    #[test]
    fn excerpt_collapses_whitespace() {
        assert_eq!(excerpt("a\n\n  b\tc"), "a b c");
    }
}
