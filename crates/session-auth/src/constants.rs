//! Bookshelf API auth constants

/// Login endpoint, relative to the API base URL. Form-encoded credentials.
pub const LOGIN_PATH: &str = "/auth/login";

/// Account registration endpoint. JSON body, answers with the created user.
pub const REGISTER_PATH: &str = "/auth/register";

/// Refresh endpoint, relative to the API base URL. JSON `{ refresh_token }`.
pub const REFRESH_PATH: &str = "/auth/refresh";

/// API base URL used when none is configured (local development server)
pub const DEFAULT_BASE_URL: &str = "http://localhost:8000/api/v1";

/// Scheme prefix for the Authorization header value
pub const BEARER_PREFIX: &str = "Bearer ";

/// `token_type` value the service returns for bearer credentials
pub const TOKEN_TYPE_BEARER: &str = "bearer";
