use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use askama::Template;
use axum::Router;
use axum::extract::{Extension, Form, MatchedPath, Request, State};
use axum::http::{HeaderMap, HeaderName, HeaderValue};
use axum::middleware::Next;
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum_extra::extract::CookieJar;
use axum_extra::extract::cookie::Cookie;
use jsonwebtoken::encode;
use sea_orm::*;
use std::sync::Arc;
use tower_http::trace::MakeSpan;
use tracing::Span;

use crate::config::Config;
use crate::entities::user;

pub mod api;

/// Minimum accepted password length, checked before any store call.
pub const MIN_PASSWORD_LEN: usize = 6;

/// Represents the currently authenticated user.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub id: i32,
    pub email: String,
}

impl CurrentUser {
    /// Creates a new CurrentUser instance.
    pub fn new(id: i32, email: String) -> Self {
        Self { id, email }
    }
}

/// Authentication state containing the user store handle and JWT secret.
#[derive(Clone)]
pub struct AuthState {
    pub db: Arc<DatabaseConnection>,
    pub jwt_secret: String,
}

impl AuthState {
    /// Creates a new AuthState from the application config and a database handle.
    pub fn new(db: Arc<DatabaseConnection>, config: &Config) -> Self {
        Self {
            db,
            jwt_secret: config.jwt_secret.clone(),
        }
    }
}

/// An account in the user store. The password hash never leaves this module.
#[derive(Debug, PartialEq, Clone, Eq)]
pub struct User {
    id: i32,
    email: String,
}

impl User {
    pub fn new(id: i32, email: String) -> Self {
        Self { id, email }
    }

    pub fn id(&self) -> i32 {
        self.id
    }

    pub fn email(&self) -> &str {
        &self.email
    }
}

impl From<user::Model> for User {
    fn from(model: user::Model) -> Self {
        User::new(model.id, model.email)
    }
}

/// Error type for UserService operations.
#[derive(Debug, thiserror::Error)]
pub enum UserServiceError {
    /// An account with this email already exists.
    #[error("An account with email '{0}' already exists")]
    DuplicateEmail(String),
    /// The email/password pair did not match a stored account.
    #[error("Invalid email or password")]
    InvalidCredentials,
    /// Represents a database error.
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),
    /// Represents a password hashing error.
    #[error("Password hashing failed")]
    PasswordHash(#[from] argon2::password_hash::Error),
}

pub struct UserService<'a> {
    db: &'a DatabaseConnection,
}

impl UserService<'_> {
    pub fn new(db: &DatabaseConnection) -> UserService {
        UserService { db }
    }

    /// Registers a new account, storing an argon2id hash of the password.
    ///
    /// # Returns
    ///
    /// A `Result` containing the created `User`, or `DuplicateEmail` if the
    /// email is already taken.
    #[tracing::instrument(skip(self, password))]
    pub async fn register(&self, email: &str, password: &str) -> Result<User, UserServiceError> {
        if self.email_exists(email).await? {
            return Err(UserServiceError::DuplicateEmail(email.to_string()));
        }

        let password_hash = hash_password(password)?;
        let active_model = user::ActiveModel {
            email: ActiveValue::Set(email.to_string()),
            password_hash: ActiveValue::Set(password_hash),
            created_at: ActiveValue::Set(chrono::Utc::now()),
            ..Default::default()
        };
        let created_model = active_model.insert(self.db).await?;
        Ok(User::from(created_model))
    }

    /// Verifies an email/password pair against the user store.
    ///
    /// # Returns
    ///
    /// A `Result` containing the matching `User`, or `InvalidCredentials` when
    /// either the email is unknown or the password does not match.
    #[tracing::instrument(skip(self, password))]
    pub async fn authenticate(
        &self,
        email: &str,
        password: &str,
    ) -> Result<User, UserServiceError> {
        let stored = user::Entity::find()
            .filter(user::Column::Email.eq(email))
            .one(self.db)
            .await?
            .ok_or(UserServiceError::InvalidCredentials)?;

        if verify_password(password, &stored.password_hash) {
            Ok(User::from(stored))
        } else {
            Err(UserServiceError::InvalidCredentials)
        }
    }

    /// Checks whether an account with the given email already exists.
    #[tracing::instrument(skip(self))]
    async fn email_exists(&self, email: &str) -> Result<bool, UserServiceError> {
        let existing = user::Entity::find()
            .filter(user::Column::Email.eq(email))
            .one(self.db)
            .await?;
        Ok(existing.is_some())
    }
}

fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default().hash_password(password.as_bytes(), &salt)?;
    Ok(hash.to_string())
}

fn verify_password(password: &str, stored_hash: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(stored_hash) else {
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

/// Shallow email shape check, mirroring what the sign-in form enforces.
pub fn is_valid_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.is_empty() {
        return false;
    }
    match domain.rsplit_once('.') {
        Some((host, tld)) => !host.is_empty() && !tld.is_empty(),
        None => false,
    }
}

/// Creates the router with sign-in, sign-up, and sign-out routes.
pub fn create_auth_router(state: Arc<AuthState>) -> Router<()> {
    Router::new()
        .route(
            "/login",
            axum::routing::get(login_page_handler).post(login_handler),
        )
        .route(
            "/register",
            axum::routing::get(register_page_handler).post(register_handler),
        )
        .route("/logout", axum::routing::post(logout_handler))
        .with_state(state)
}

/// Authentication middleware that checks for valid JWT tokens and sets CurrentUser extension.
/// This middleware only populates the CurrentUser extension and does not perform redirects.
pub async fn auth_user_middleware(
    State(state): State<Arc<AuthState>>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Response {
    if let Some(token_cookie) = jar.get("auth_token") {
        if let Ok(claims) = decode_jwt(token_cookie.value(), &state.jwt_secret).await {
            if let Ok(id) = claims.sub.parse::<i32>() {
                let current_user = CurrentUser::new(id, claims.email);
                request.extensions_mut().insert(current_user);
            }
        }
    }

    next.run(request).await
}

/// Login redirect middleware that redirects unauthenticated users to the login page.
/// This middleware should be applied after auth_user_middleware to check for CurrentUser extension.
pub async fn login_redirect_middleware(request: Request, next: Next) -> Response {
    let is_authenticated = request.extensions().get::<CurrentUser>().is_some();

    if !is_authenticated {
        return Redirect::to("/login").into_response();
    }

    next.run(request).await
}

/// Represents the sign-in form payload.
#[derive(serde::Deserialize, Debug)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Represents the sign-up form payload.
#[derive(serde::Deserialize, Debug)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub confirm_password: String,
}

#[derive(serde::Serialize, serde::Deserialize, Debug)]
pub struct Claims {
    pub exp: usize,      // Expiry time of the token
    pub iat: usize,      // Issued at time of the token
    pub sub: String,     // Id of the authenticated user
    pub email: String,   // Email of the authenticated user
}

/// Custom error type for authentication operations.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// Represents an error during template rendering.
    /// The specific `askama::Error` is captured as the source of this error.
    #[error("Template rendering failed")]
    Template(#[from] askama::Error),
    /// Represents an error during JWT operations.
    #[error("JWT operation failed")]
    JwtError,
    /// Represents a user service error.
    #[error("User service error")]
    Service(#[from] UserServiceError),
}

impl axum::response::IntoResponse for AuthError {
    fn into_response(self) -> axum::response::Response {
        let user_facing_error_message =
            "An unexpected error occurred while processing your request. Please try again later.";
        (
            axum::http::StatusCode::INTERNAL_SERVER_ERROR,
            Html(format!(
                "<h1>Internal Server Error</h1><p>{}</p>",
                user_facing_error_message
            )),
        )
            .into_response()
    }
}

/// Renders an auth form error fragment, retargeted at the message div.
fn auth_message_response(message: &str) -> Result<Response, AuthError> {
    let html = AuthErrorMessageTemplate {
        message: message.to_string(),
    }
    .render()
    .map_err(AuthError::from)?;

    let mut headers = HeaderMap::new();
    headers.insert(
        HeaderName::from_static("hx-retarget"),
        HeaderValue::from_static("#auth-message"),
    );
    headers.insert(
        HeaderName::from_static("hx-reswap"),
        HeaderValue::from_static("outerHTML"),
    );

    let mut response = Html(html).into_response();
    response.headers_mut().extend(headers);
    Ok(response)
}

/// Validates the fields shared by the sign-in and sign-up forms.
/// Returns the first failed check as a user-facing message.
fn validate_credentials(email: &str, password: &str) -> Result<(), &'static str> {
    if email.is_empty() || password.is_empty() {
        return Err("Please fill in all fields");
    }
    if !is_valid_email(email) {
        return Err("Please enter a valid email address");
    }
    if password.len() < MIN_PASSWORD_LEN {
        return Err("Password must be at least 6 characters");
    }
    Ok(())
}

/// Builds the session cookie carrying a freshly signed JWT for the user.
async fn session_cookie(user: &User, jwt_secret: &str) -> Result<Cookie<'static>, AuthError> {
    let jwt_token = encode_jwt(user.id(), user.email(), jwt_secret)
        .await
        .map_err(|_| AuthError::JwtError)?;

    Ok(Cookie::build(("auth_token", jwt_token))
        .http_only(true)
        .secure(false) // Set to true in production with HTTPS
        .same_site(axum_extra::extract::cookie::SameSite::Lax)
        .max_age(time::Duration::hours(24))
        .path("/")
        .build())
}

/// Handles the sign-in request.
/// Validates the form locally, then checks the credentials against the user
/// store. If a user is already logged in, returns a success message.
pub async fn login_handler(
    State(state): State<Arc<AuthState>>,
    jar: CookieJar,
    current_user: Option<Extension<CurrentUser>>,
    Form(payload): Form<LoginRequest>,
) -> Result<(CookieJar, Response), AuthError> {
    if let Some(Extension(user)) = current_user {
        return handle_already_logged_in_user(jar, &user).await;
    }

    handle_login_attempt(state, jar, payload).await
}

/// Handles the case when a user is already logged in.
/// Returns a success response with the current user's information.
#[tracing::instrument(skip(jar))]
async fn handle_already_logged_in_user(
    jar: CookieJar,
    user: &CurrentUser,
) -> Result<(CookieJar, Response), AuthError> {
    let html = LoginSuccessTemplate { email: &user.email }
        .render()
        .map_err(AuthError::from)?;

    Ok((jar, Html(html).into_response()))
}

/// Handles a sign-in attempt when the user is not logged in.
/// Validates the form and either returns success with a session cookie or an
/// inline error fragment.
#[tracing::instrument(skip(state, jar, payload))]
async fn handle_login_attempt(
    state: Arc<AuthState>,
    jar: CookieJar,
    payload: LoginRequest,
) -> Result<(CookieJar, Response), AuthError> {
    if let Err(message) = validate_credentials(&payload.email, &payload.password) {
        return Ok((jar, auth_message_response(message)?));
    }

    let user_service = UserService::new(&state.db);
    match user_service
        .authenticate(&payload.email, &payload.password)
        .await
    {
        Ok(user) => {
            let cookie = session_cookie(&user, &state.jwt_secret).await?;
            let updated_jar = jar.add(cookie);

            let html = LoginSuccessTemplate {
                email: user.email(),
            }
            .render()
            .map_err(AuthError::from)?;

            Ok((updated_jar, Html(html).into_response()))
        }
        Err(UserServiceError::InvalidCredentials) => {
            Ok((jar, auth_message_response("Invalid email or password")?))
        }
        Err(err) => Err(AuthError::Service(err)),
    }
}

/// Handles the sign-up request. Validation runs before any store call; a
/// successful registration immediately establishes an authenticated session.
#[tracing::instrument(skip(state, jar, payload))]
pub async fn register_handler(
    State(state): State<Arc<AuthState>>,
    jar: CookieJar,
    Form(payload): Form<RegisterRequest>,
) -> Result<(CookieJar, Response), AuthError> {
    if let Err(message) = validate_credentials(&payload.email, &payload.password) {
        return Ok((jar, auth_message_response(message)?));
    }
    if payload.password != payload.confirm_password {
        return Ok((jar, auth_message_response("Passwords do not match")?));
    }

    let user_service = UserService::new(&state.db);
    match user_service
        .register(&payload.email, &payload.password)
        .await
    {
        Ok(user) => {
            let cookie = session_cookie(&user, &state.jwt_secret).await?;
            let updated_jar = jar.add(cookie);

            let html = RegisterSuccessTemplate {
                email: user.email(),
            }
            .render()
            .map_err(AuthError::from)?;

            Ok((updated_jar, Html(html).into_response()))
        }
        Err(UserServiceError::DuplicateEmail(_)) => Ok((
            jar,
            auth_message_response("An account with this email already exists")?,
        )),
        Err(err) => Err(AuthError::Service(err)),
    }
}

/// Handles sign-out. Clears the session cookie unconditionally and sends the
/// browser back to the login page.
#[tracing::instrument(skip(jar))]
pub async fn logout_handler(jar: CookieJar) -> (CookieJar, Redirect) {
    let removal = Cookie::build(("auth_token", "")).path("/").build();
    (jar.remove(removal), Redirect::to("/login"))
}

pub async fn encode_jwt(user_id: i32, email: &str, jwt_secret: &str) -> anyhow::Result<String> {
    let now = chrono::Utc::now();
    let expire = chrono::Duration::hours(24);
    let exp = (now + expire).timestamp() as usize;
    let iat = now.timestamp() as usize;
    let claims = Claims {
        exp,
        iat,
        sub: user_id.to_string(),
        email: email.to_string(),
    };
    let jwt = encode(
        &jsonwebtoken::Header::default(),
        &claims,
        &jsonwebtoken::EncodingKey::from_secret(jwt_secret.as_bytes()),
    )?;
    Ok(jwt)
}

pub async fn decode_jwt(token: &str, jwt_secret: &str) -> anyhow::Result<Claims> {
    let token_data = jsonwebtoken::decode(
        token,
        &jsonwebtoken::DecodingKey::from_secret(jwt_secret.as_bytes()),
        &jsonwebtoken::Validation::default(),
    )?;
    Ok(token_data.claims)
}

#[derive(Template)]
#[template(path = "auth/login_success.html")]
pub struct LoginSuccessTemplate<'a> {
    pub email: &'a str,
}

#[derive(Template)]
#[template(path = "auth/register_success.html")]
pub struct RegisterSuccessTemplate<'a> {
    pub email: &'a str,
}

#[derive(Template)]
#[template(path = "auth/error_message.html")]
pub struct AuthErrorMessageTemplate {
    pub message: String,
}

#[derive(Template)]
#[template(path = "login.html")]
pub struct LoginTemplate {
    pub email: Option<String>,
}

#[derive(Template)]
#[template(path = "register.html")]
pub struct RegisterTemplate {
    pub email: Option<String>,
}

/// Handles GET requests to display the login page.
#[tracing::instrument]
pub async fn login_page_handler(
    current_user: Option<Extension<CurrentUser>>,
) -> Result<Html<String>, AuthError> {
    let email = current_user.map(|Extension(user)| user.email);

    let template = LoginTemplate { email };
    template.render().map(Html).map_err(AuthError::from)
}

/// Handles GET requests to display the registration page.
#[tracing::instrument]
pub async fn register_page_handler(
    current_user: Option<Extension<CurrentUser>>,
) -> Result<Html<String>, AuthError> {
    let email = current_user.map(|Extension(user)| user.email);

    let template = RegisterTemplate { email };
    template.render().map(Html).map_err(AuthError::from)
}

/// Custom span maker that filters sensitive data from credential requests.
/// This implementation avoids logging request bodies and cookies for security.
#[derive(Clone, Debug)]
pub struct FilteredMakeSpan;

impl<B> MakeSpan<B> for FilteredMakeSpan {
    fn make_span(&mut self, request: &axum::http::Request<B>) -> Span {
        let uri = request.uri();
        let method = request.method();
        let matched_path = request
            .extensions()
            .get::<MatchedPath>()
            .map(MatchedPath::as_str);

        // Credential routes get a span without sensitive data
        if uri.path() == "/login" || uri.path() == "/register" {
            tracing::info_span!(
                "request",
                method = %method,
                uri = %uri,
                matched_path,
                sensitive_route = true,
                // Explicitly omit headers, cookies, and body for credential requests
            )
        } else {
            tracing::info_span!(
                "request",
                method = %method,
                uri = %uri,
                matched_path,
            )
        }
    }
}
