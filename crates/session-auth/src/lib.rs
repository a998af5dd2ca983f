//! Credential handling for the bookshelf API session
//!
//! Provides the persisted credential store, the request authenticator, and
//! the wire contract for the register, login and refresh endpoints. This
//! crate performs no network I/O itself: it builds `transport::Request`s and
//! parses `transport::Response`s, leaving the sending to the session pipeline.
//!
//! Credential flow:
//! 1. `token::login_request()` is sent; `token::parse_login()` yields both tokens
//! 2. Both are stored via `CredentialStore::store_login()`
//! 3. `authenticate()` attaches the access token to every outgoing request
//! 4. On expiry, `token::refresh_request()` exchanges the refresh token
//! 5. The new access token is saved via `CredentialStore::set_access()`
//! 6. Logout or a failed refresh calls `CredentialStore::clear()`

pub mod authenticator;
pub mod constants;
pub mod credentials;
pub mod error;
pub mod token;

pub use authenticator::{authenticate, bearer_token};
pub use constants::*;
pub use credentials::{CredentialPair, CredentialStore, Generation};
pub use error::{Error, Result};
pub use token::{
    AccountType, LoginResponse, RefreshResponse, RegisteredUser, login_request, parse_login,
    parse_refresh, parse_registered, refresh_request, register_request,
};
