use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use axum::{
    Json,
    extract::{Request, State},
    http::Method,
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::{Duration, SystemTime};
use thiserror::Error;
use uuid::Uuid;

use crate::app::AppState;
use crate::error::AppError;
use crate::storage::{self, StoreError, read_json_or_default, validate_username, write_json_pretty};

/// Name of the cookie carrying the session id
pub const SESSION_COOKIE: &str = "session";

/// How long a login stays valid (one week)
pub const SESSION_DURATION: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// User data structure representing a registered application user
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// Username (unique identifier, also names the user's card file)
    pub username: String,

    /// Argon2 hash of the user's password
    ///
    /// Older files stored an unsalted digest under `password`; such a
    /// value never verifies.
    #[serde(alias = "password")]
    pub password_hash: String,
}

/// Credential data for login and registration
///
/// Used to receive login and signup JSON bodies from the client.
#[derive(Debug, Serialize, Deserialize)]
pub struct UserCredentials {
    #[serde(default)]
    pub username: String,

    /// Password in plaintext (only transmitted, never stored)
    #[serde(default)]
    pub password: String,
}

/// Authenticated user attached to a request by [`require_auth`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentUser(pub String);

/// Failures of sign-up and login
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Username and password are required")]
    MissingFields,

    #[error("User already exists")]
    UserExists,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Password hashing failed")]
    Hashing,

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Registered users, kept as a JSON array in `<data>/users.json`
#[derive(Debug)]
pub struct UserStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl UserStore {
    /// Open the user database
    ///
    /// Creates the data directory and an empty `users.json` if they don't
    /// exist yet.
    ///
    /// # Arguments
    /// * `data_dir` - Root directory of the application data
    ///
    /// # Returns
    /// * `Result<UserStore, StoreError>` - The store or an IO error
    pub fn new(data_dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = data_dir.as_ref().join("users.json");
        if !path.exists() {
            write_json_pretty(&path, &Vec::<User>::new())?;
        }
        Ok(UserStore {
            path,
            write_lock: Mutex::new(()),
        })
    }

    /// Get all registered users
    ///
    /// # Errors
    /// * Returns an error if the users file cannot be read or parsed
    pub fn get_users(&self) -> Result<Vec<User>, StoreError> {
        read_json_or_default(&self.path)
    }

    /// Register a new user
    ///
    /// The password is hashed before storage.
    ///
    /// # Arguments
    /// * `username` - Unique username for the new account
    /// * `password` - Plain text password (will be hashed)
    ///
    /// # Errors
    /// * `MissingFields` if either field is empty
    /// * `UserExists` if the username is taken
    /// * `Store(InvalidUsername)` if the name is not usable as a file name
    pub fn register(&self, username: &str, password: &str) -> Result<(), AuthError> {
        if username.is_empty() || password.is_empty() {
            return Err(AuthError::MissingFields);
        }
        validate_username(username)?;

        let _guard = storage::lock(&self.write_lock);
        let mut users = self.get_users()?;
        if users.iter().any(|u| u.username == username) {
            return Err(AuthError::UserExists);
        }

        users.push(User {
            username: username.to_string(),
            password_hash: hash_password(password)?,
        });
        write_json_pretty(&self.path, &users)?;

        info!("Registered user {}", username);
        Ok(())
    }

    /// Verify user credentials
    ///
    /// # Returns
    /// * `Result<bool, AuthError>` - True if the credentials are valid, false otherwise
    pub fn verify(&self, username: &str, password: &str) -> Result<bool, AuthError> {
        let users = self.get_users()?;
        match users.iter().find(|u| u.username == username) {
            Some(user) => Ok(verify_password(password, &user.password_hash)),
            None => Ok(false),
        }
    }
}

/// Hash a password using Argon2
///
/// # Errors
/// * Returns `AuthError::Hashing` if the password hashing fails
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| AuthError::Hashing)
}

/// Verify a password against a stored hash
///
/// A stored value that is not a valid Argon2 hash never matches.
pub fn verify_password(password: &str, hash: &str) -> bool {
    let Ok(parsed_hash) = PasswordHash::new(hash) else {
        warn!("Stored password hash has an invalid format");
        return false;
    };

    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok()
}

/// User session data
#[derive(Debug, Clone)]
pub struct AuthSession {
    /// Username of the authenticated user
    pub username: String,

    /// Time when the session expires
    pub expires_at: SystemTime,
}

/// Active login sessions keyed by session id
#[derive(Debug)]
pub struct SessionStore {
    sessions: RwLock<HashMap<String, AuthSession>>,
    ttl: Duration,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new(SESSION_DURATION)
    }
}

impl SessionStore {
    pub fn new(ttl: Duration) -> Self {
        SessionStore {
            sessions: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    /// Create a new session for an authenticated user
    ///
    /// # Returns
    /// * `String` - A unique session ID
    pub fn create(&self, username: &str) -> String {
        let session_id = Uuid::new_v4().to_string();
        let session = AuthSession {
            username: username.to_string(),
            expires_at: SystemTime::now() + self.ttl,
        };

        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        sessions.retain(|_, s| s.expires_at > SystemTime::now());
        sessions.insert(session_id.clone(), session);

        session_id
    }

    /// Username for a live session, `None` if unknown or expired
    pub fn validate(&self, session_id: &str) -> Option<String> {
        let sessions = self.sessions.read().unwrap_or_else(PoisonError::into_inner);
        sessions
            .get(session_id)
            .filter(|s| s.expires_at > SystemTime::now())
            .map(|s| s.username.clone())
    }

    /// Forget a session (logout)
    pub fn remove(&self, session_id: &str) {
        self.sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(session_id);
    }
}

fn session_cookie(value: String, secure: bool) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, value))
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Strict)
        .path("/")
        .max_age(time::Duration::seconds(SESSION_DURATION.as_secs() as i64))
        .build()
}

/// Handle user registration
///
/// # Returns
/// * `200 {"message"}` on success, `400 {"error"}` on missing fields or a taken name
pub async fn handle_signup(
    State(state): State<Arc<AppState>>,
    Json(credentials): Json<UserCredentials>,
) -> Result<Json<serde_json::Value>, AppError> {
    state
        .users
        .register(credentials.username.trim(), &credentials.password)?;
    Ok(Json(json!({ "message": "User created successfully" })))
}

/// Handle user login requests
///
/// Validates credentials and, if valid, sets the session cookie.
///
/// # Returns
/// * `(CookieJar, Json)` - The cookie and the logged-in user, or `401` on bad credentials
pub async fn handle_login(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Json(credentials): Json<UserCredentials>,
) -> Result<(CookieJar, Json<serde_json::Value>), AppError> {
    let username = credentials.username.trim();
    if !state.users.verify(username, &credentials.password)? {
        warn!("Failed login for {}", username);
        return Err(AuthError::InvalidCredentials.into());
    }

    let session_id = state.sessions.create(username);
    info!("{} logged in", username);
    Ok((
        jar.add(session_cookie(session_id, state.config.secure_cookies)),
        Json(json!({
            "message": "Logged in successfully",
            "user": { "username": username }
        })),
    ))
}

/// Handle user logout
///
/// Drops the server-side session and clears the cookie.
pub async fn handle_logout(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
) -> (CookieJar, Json<serde_json::Value>) {
    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        state.sessions.remove(cookie.value());
    }
    let jar = jar.remove(Cookie::build((SESSION_COOKIE, "")).path("/"));
    (jar, Json(json!({ "message": "Logged out" })))
}

/// Report whether the request carries a live session
pub async fn handle_me(State(state): State<Arc<AppState>>, jar: CookieJar) -> Json<serde_json::Value> {
    match jar
        .get(SESSION_COOKIE)
        .and_then(|cookie| state.sessions.validate(cookie.value()))
    {
        Some(username) => Json(json!({
            "authenticated": true,
            "user": { "username": username }
        })),
        None => Json(json!({ "authenticated": false })),
    }
}

/// Authentication middleware
///
/// Attaches [`CurrentUser`] to requests with a live session. Audio clips
/// stay readable without one, like the card prompts that link to them;
/// everything else answers `401`.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Response {
    if let Some(username) = jar
        .get(SESSION_COOKIE)
        .and_then(|cookie| state.sessions.validate(cookie.value()))
    {
        request.extensions_mut().insert(CurrentUser(username));
        return next.run(request).await;
    }

    if request.method() == Method::GET && request.uri().path().starts_with("/api/audio/") {
        return next.run(request).await;
    }

    AppError::Unauthorized.into_response()
}
