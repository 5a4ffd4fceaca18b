use crate::auth::{
    AuthState, CurrentUser, MIN_PASSWORD_LEN, UserService, UserServiceError, decode_jwt,
    encode_jwt, is_valid_email,
};
use crate::web::api::ErrorResponse;
use axum::{
    Json, Router,
    extract::{Request, State},
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;

/// JSON request payload for API login and registration.
#[derive(Deserialize, Debug, ToSchema)]
pub struct CredentialsRequest {
    /// Account email address
    pub email: String,
    /// Account password
    pub password: String,
}

/// JSON response for successful API login or registration.
#[derive(Serialize, Debug, ToSchema)]
pub struct TokenResponse {
    /// Bearer token for subsequent API calls
    pub token: String,
}

/// Creates a JSON API router for authentication endpoints.
pub fn create_api_router(state: Arc<AuthState>) -> Router<()> {
    Router::new()
        .route("/auth/register", axum::routing::post(json_register_handler))
        .route("/auth/login", axum::routing::post(json_login_handler))
        .with_state(state)
}

/// API authentication middleware that extracts the current user from the
/// Authorization Bearer header. Sets the CurrentUser extension if a valid JWT
/// token is found.
pub async fn auth_user_middleware(
    State(state): State<Arc<AuthState>>,
    headers: HeaderMap,
    mut request: Request,
    next: Next,
) -> Response {
    if let Some(auth_header) = headers.get("authorization") {
        if let Ok(auth_str) = auth_header.to_str() {
            if let Some(token) = auth_str.strip_prefix("Bearer ") {
                if let Ok(claims) = decode_jwt(token, &state.jwt_secret).await {
                    if let Ok(id) = claims.sub.parse::<i32>() {
                        let current_user = CurrentUser::new(id, claims.email);
                        request.extensions_mut().insert(current_user);
                    }
                }
            }
        }
    }

    next.run(request).await
}

/// Middleware that ensures the current user is authenticated.
/// Returns UNAUTHORIZED if the CurrentUser extension is not found in the request.
/// This middleware should be applied after auth_user_middleware.
pub async fn require_auth_middleware(request: Request, next: Next) -> Response {
    let is_authenticated = request.extensions().get::<CurrentUser>().is_some();

    if !is_authenticated {
        let error_response = ErrorResponse::new(
            "UNAUTHORIZED",
            "Authentication required to access this resource",
        );
        return (StatusCode::UNAUTHORIZED, Json(error_response)).into_response();
    }

    next.run(request).await
}

fn validation_error(message: &str) -> (StatusCode, Json<ErrorResponse>) {
    (
        StatusCode::UNPROCESSABLE_ENTITY,
        Json(ErrorResponse::new("VALIDATION_ERROR", message)),
    )
}

/// Checks the credential payload before any store call.
fn validate_payload(payload: &CredentialsRequest) -> Result<(), (StatusCode, Json<ErrorResponse>)> {
    if payload.email.is_empty() || payload.password.is_empty() {
        return Err(validation_error("Email and password are required"));
    }
    if !is_valid_email(&payload.email) {
        return Err(validation_error("Please enter a valid email address"));
    }
    if payload.password.len() < MIN_PASSWORD_LEN {
        return Err(validation_error("Password must be at least 6 characters"));
    }
    Ok(())
}

async fn issue_token(
    state: &AuthState,
    user: &crate::auth::User,
) -> Result<Json<TokenResponse>, (StatusCode, Json<ErrorResponse>)> {
    let token = encode_jwt(user.id(), user.email(), &state.jwt_secret)
        .await
        .map_err(|_| {
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new(
                    "JWT_ERROR",
                    "Failed to generate authentication token",
                )),
            )
        })?;

    Ok(Json(TokenResponse { token }))
}

/// Handler for POST /api/auth/register - Creates an account and returns a token.
#[tracing::instrument(skip(state, payload))]
#[utoipa::path(
    post,
    path = "/api/auth/register",
    request_body = CredentialsRequest,
    responses(
        (status = 200, description = "Account created", body = TokenResponse),
        (status = 422, description = "Validation failed or email taken", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "Auth"
)]
pub async fn json_register_handler(
    State(state): State<Arc<AuthState>>,
    Json(payload): Json<CredentialsRequest>,
) -> Result<Json<TokenResponse>, (StatusCode, Json<ErrorResponse>)> {
    validate_payload(&payload)?;

    let user_service = UserService::new(&state.db);
    match user_service.register(&payload.email, &payload.password).await {
        Ok(user) => issue_token(&state, &user).await,
        Err(UserServiceError::DuplicateEmail(_)) => Err((
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(ErrorResponse::new(
                "EMAIL_TAKEN",
                "An account with this email already exists",
            )),
        )),
        Err(err) => {
            tracing::error!("Failed to register account: {}", err);
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new(
                    "INTERNAL_ERROR",
                    "Failed to create account",
                )),
            ))
        }
    }
}

/// Handler for POST /api/auth/login - Verifies credentials and returns a token.
#[tracing::instrument(skip(state, payload))]
#[utoipa::path(
    post,
    path = "/api/auth/login",
    request_body = CredentialsRequest,
    responses(
        (status = 200, description = "Authenticated", body = TokenResponse),
        (status = 401, description = "Invalid credentials", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "Auth"
)]
pub async fn json_login_handler(
    State(state): State<Arc<AuthState>>,
    Json(payload): Json<CredentialsRequest>,
) -> Result<Json<TokenResponse>, (StatusCode, Json<ErrorResponse>)> {
    let user_service = UserService::new(&state.db);
    match user_service
        .authenticate(&payload.email, &payload.password)
        .await
    {
        Ok(user) => issue_token(&state, &user).await,
        Err(UserServiceError::InvalidCredentials) => Err((
            StatusCode::UNAUTHORIZED,
            Json(ErrorResponse::new(
                "INVALID_CREDENTIALS",
                "Invalid email or password",
            )),
        )),
        Err(err) => {
            tracing::error!("Failed to authenticate: {}", err);
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new("INTERNAL_ERROR", "Failed to sign in")),
            ))
        }
    }
}
