//! Attach the current access credential to outgoing requests
//!
//! Applied to every request, login and refresh included. Endpoint semantics
//! are the coordinator's concern, not the authenticator's.

use tracing::{debug, warn};
use transport::Request;
use transport::header::{AUTHORIZATION, HeaderValue};

use crate::constants::BEARER_PREFIX;

/// Return `request` with `Authorization: Bearer <access>` when an access
/// credential is present, or unmodified otherwise.
pub fn authenticate(mut request: Request, access: Option<&str>) -> Request {
    let Some(token) = access else {
        debug!(path = %request.path, "no access credential, sending unauthenticated");
        return request;
    };

    match HeaderValue::from_str(&format!("{BEARER_PREFIX}{token}")) {
        Ok(mut value) => {
            value.set_sensitive(true);
            request.headers.insert(AUTHORIZATION, value);
        }
        Err(e) => {
            warn!(path = %request.path, error = %e, "access credential is not a valid header value, sending unauthenticated");
        }
    }
    request
}

/// The bearer token a request carries, if any.
pub fn bearer_token(request: &Request) -> Option<&str> {
    request
        .headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix(BEARER_PREFIX)
}
