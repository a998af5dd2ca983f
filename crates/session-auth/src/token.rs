//! Auth endpoint wire contract
//!
//! The service exposes three auth endpoints:
//! 1. `POST /auth/register` with a JSON account description, answering with the
//!    created user (no tokens; the new account logs in separately)
//! 2. `POST /auth/login` with form fields `username` and `password`, answering
//!    with both an access and a refresh token
//! 3. `POST /auth/refresh` with JSON `{ "refresh_token": ... }`, answering with
//!    a new access token only (the refresh token is not rotated)
//!
//! All three requests are flagged as auth endpoints so a 401 from them is
//! never treated as an expired session.

use serde::{Deserialize, Serialize};
use transport::{Body, Method, Request, Response};

use crate::constants::{LOGIN_PATH, REFRESH_PATH, REGISTER_PATH, TOKEN_TYPE_BEARER};
use crate::error::{Error, Result};

/// Response from the login endpoint.
#[derive(Debug, Deserialize, Serialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
}

/// Response from the refresh endpoint.
#[derive(Debug, Deserialize, Serialize)]
pub struct RefreshResponse {
    pub access_token: String,
    pub token_type: String,
}

/// Kind of account to register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountType {
    Author,
    Reader,
}

/// User returned by the register endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct RegisteredUser {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub account_type: AccountType,
}

/// Build the account registration request.
pub fn register_request(
    first_name: &str,
    last_name: &str,
    email: &str,
    password: &str,
    account_type: AccountType,
) -> Request {
    Request::auth_endpoint(
        Method::POST,
        REGISTER_PATH,
        Body::Json(serde_json::json!({
            "first_name": first_name,
            "last_name": last_name,
            "email": email,
            "password": password,
            "account_type": account_type,
        })),
    )
}

/// Parse a successful register response.
pub fn parse_registered(response: &Response) -> Result<RegisteredUser> {
    response
        .json()
        .map_err(|e| Error::InvalidResponse(format!("invalid register response: {e}")))
}

/// Build the login request. The service reads the account email from the
/// `username` form field.
pub fn login_request(username: &str, password: &str) -> Request {
    Request::auth_endpoint(
        Method::POST,
        LOGIN_PATH,
        Body::Form(vec![
            ("username".to_string(), username.to_string()),
            ("password".to_string(), password.to_string()),
        ]),
    )
}

/// Build the refresh request for the stored refresh token.
pub fn refresh_request(refresh: &str) -> Request {
    Request::auth_endpoint(
        Method::POST,
        REFRESH_PATH,
        Body::Json(serde_json::json!({ "refresh_token": refresh })),
    )
}

/// Parse a successful login response.
pub fn parse_login(response: &Response) -> Result<LoginResponse> {
    let login: LoginResponse = response
        .json()
        .map_err(|e| Error::InvalidResponse(format!("invalid login response: {e}")))?;
    check_token(&login.access_token, &login.token_type)?;
    if login.refresh_token.is_empty() {
        return Err(Error::InvalidResponse(
            "login response has an empty refresh_token".into(),
        ));
    }
    Ok(login)
}

/// Parse a successful refresh response.
pub fn parse_refresh(response: &Response) -> Result<RefreshResponse> {
    let refreshed: RefreshResponse = response
        .json()
        .map_err(|e| Error::InvalidResponse(format!("invalid refresh response: {e}")))?;
    check_token(&refreshed.access_token, &refreshed.token_type)?;
    Ok(refreshed)
}

fn check_token(access_token: &str, token_type: &str) -> Result<()> {
    if access_token.is_empty() {
        return Err(Error::InvalidResponse("empty access_token".into()));
    }
    if !token_type.eq_ignore_ascii_case(TOKEN_TYPE_BEARER) {
        return Err(Error::InvalidResponse(format!(
            "unsupported token_type {token_type:?}"
        )));
    }
    Ok(())
}
