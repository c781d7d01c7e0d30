use axum::{
    extract::{FromRef, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::{
    auth::{
        dto::{
            AuthResponse, DashboardResponse, LoginRequest, PublicUser, RefreshRequest,
            RegisterRequest, UpdateProfileRequest,
        },
        jwt::{AuthUser, JwtKeys},
        repo_types::{NewUser, Role, User},
        services::{hash_password, is_valid_email, normalize_email, verify_password, MIN_PASSWORD_LEN},
    },
    extract::{ApiJson, ApiPath},
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/refresh", post(refresh))
}

pub fn profile_routes() -> Router<AppState> {
    Router::new()
        .route("/me", get(get_me))
        .route("/users/:id", get(get_profile).put(update_profile))
        .route("/dashboard/user", get(user_dashboard))
        .route("/dashboard/cinema", get(cinema_dashboard))
}

fn issue_tokens(keys: &JwtKeys, user: User) -> Result<AuthResponse, (StatusCode, String)> {
    let access_token = keys.sign_access(user.id, user.role).map_err(|e| {
        error!(error = %e, "jwt sign access failed");
        (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
    })?;
    let refresh_token = keys.sign_refresh(user.id, user.role).map_err(|e| {
        error!(error = %e, "jwt sign refresh failed");
        (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
    })?;
    Ok(AuthResponse {
        access_token,
        refresh_token,
        user: user.into(),
    })
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    ApiJson(mut payload): ApiJson<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), (StatusCode, String)> {
    payload.email = normalize_email(&payload.email);
    let name = payload.name.trim();

    if name.is_empty() {
        return Err((StatusCode::BAD_REQUEST, "Name is required".into()));
    }

    if !is_valid_email(&payload.email) {
        warn!(email = %payload.email, "invalid email");
        return Err((StatusCode::BAD_REQUEST, "Invalid email".into()));
    }

    if payload.password.len() < MIN_PASSWORD_LEN {
        warn!("password too short");
        return Err((StatusCode::BAD_REQUEST, "Password too short".into()));
    }

    match state.users.find_by_email(&payload.email).await {
        Ok(Some(_)) => {
            warn!(email = %payload.email, "email already registered");
            return Err((StatusCode::CONFLICT, "User already exists".into()));
        }
        Ok(None) => {}
        Err(e) => {
            error!(error = %e, "find_by_email failed");
            return Err((StatusCode::INTERNAL_SERVER_ERROR, "Cannot register user".into()));
        }
    }

    let hash = hash_password(&payload.password).map_err(|e| {
        error!(error = %e, "hash_password failed");
        (StatusCode::INTERNAL_SERVER_ERROR, "Cannot register user".to_string())
    })?;

    let created = state
        .users
        .create(NewUser {
            name,
            email: &payload.email,
            password_hash: &hash,
            role: payload.role,
        })
        .await
        .map_err(|e| {
            error!(error = %e, "create user failed");
            (StatusCode::INTERNAL_SERVER_ERROR, "Cannot register user".to_string())
        })?;

    // A concurrent registration can win between the lookup and the insert.
    let Some(user) = created else {
        warn!(email = %payload.email, "email registered concurrently");
        return Err((StatusCode::CONFLICT, "User already exists".into()));
    };

    info!(user_id = %user.id, email = %user.email, role = %user.role, "user registered");
    let keys = JwtKeys::from_ref(&state);
    Ok((StatusCode::CREATED, Json(issue_tokens(&keys, user)?)))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    ApiJson(mut payload): ApiJson<LoginRequest>,
) -> Result<Json<AuthResponse>, (StatusCode, String)> {
    payload.email = normalize_email(&payload.email);

    if !is_valid_email(&payload.email) {
        warn!(email = %payload.email, "invalid email");
        return Err((StatusCode::BAD_REQUEST, "Invalid email".into()));
    }

    let user = match state.users.find_by_email(&payload.email).await {
        Ok(Some(u)) if u.role == payload.role => u,
        Ok(Some(u)) => {
            warn!(user_id = %u.id, role = %payload.role, "login role mismatch");
            return Err((StatusCode::UNAUTHORIZED, "Invalid credentials".into()));
        }
        Ok(None) => {
            warn!(email = %payload.email, "login unknown email");
            return Err((StatusCode::UNAUTHORIZED, "Invalid credentials".into()));
        }
        Err(e) => {
            error!(error = %e, "find_by_email failed");
            return Err((StatusCode::INTERNAL_SERVER_ERROR, "Login failed".into()));
        }
    };

    let ok = verify_password(&payload.password, &user.password_hash).map_err(|e| {
        error!(error = %e, "verify_password failed");
        (StatusCode::INTERNAL_SERVER_ERROR, "Login failed".to_string())
    })?;

    if !ok {
        warn!(user_id = %user.id, "login invalid password");
        return Err((StatusCode::UNAUTHORIZED, "Invalid credentials".into()));
    }

    info!(user_id = %user.id, "user logged in");
    let keys = JwtKeys::from_ref(&state);
    Ok(Json(issue_tokens(&keys, user)?))
}

#[instrument(skip(state, payload))]
pub async fn refresh(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<RefreshRequest>,
) -> Result<Json<AuthResponse>, (StatusCode, String)> {
    let keys = JwtKeys::from_ref(&state);
    let claims = keys
        .verify_refresh(&payload.refresh_token)
        .map_err(|e| (StatusCode::UNAUTHORIZED, e.to_string()))?;

    // Re-read the user so a changed role lands in the new pair.
    let user = load_user(&state, claims.sub, StatusCode::UNAUTHORIZED).await?;
    Ok(Json(issue_tokens(&keys, user)?))
}

async fn load_user(
    state: &AppState,
    user_id: Uuid,
    missing: StatusCode,
) -> Result<User, (StatusCode, String)> {
    match state.users.find_by_id(user_id).await {
        Ok(Some(u)) => Ok(u),
        Ok(None) => {
            warn!(%user_id, "user not found");
            Err((missing, "User not found".into()))
        }
        Err(e) => {
            error!(error = %e, %user_id, "find_by_id failed");
            Err((StatusCode::INTERNAL_SERVER_ERROR, "Error fetching user".into()))
        }
    }
}

fn ensure_self(auth: &AuthUser, user_id: Uuid) -> Result<(), (StatusCode, String)> {
    if auth.id != user_id {
        warn!(caller = %auth.id, target = %user_id, "profile access denied");
        return Err((StatusCode::FORBIDDEN, "Access denied".into()));
    }
    Ok(())
}

#[instrument(skip(state))]
pub async fn get_me(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<PublicUser>, (StatusCode, String)> {
    let user = load_user(&state, auth.id, StatusCode::UNAUTHORIZED).await?;
    Ok(Json(user.into()))
}

#[instrument(skip(state))]
pub async fn get_profile(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiPath(user_id): ApiPath<Uuid>,
) -> Result<Json<PublicUser>, (StatusCode, String)> {
    ensure_self(&auth, user_id)?;
    let user = load_user(&state, user_id, StatusCode::NOT_FOUND).await?;
    Ok(Json(user.into()))
}

#[instrument(skip(state, payload))]
pub async fn update_profile(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiPath(user_id): ApiPath<Uuid>,
    ApiJson(payload): ApiJson<UpdateProfileRequest>,
) -> Result<Json<PublicUser>, (StatusCode, String)> {
    ensure_self(&auth, user_id)?;
    let name = payload.name.trim();
    if name.is_empty() {
        return Err((StatusCode::BAD_REQUEST, "Name is required".into()));
    }

    match state.users.update_name(user_id, name).await {
        Ok(Some(user)) => {
            info!(%user_id, "profile updated");
            Ok(Json(user.into()))
        }
        Ok(None) => Err((StatusCode::NOT_FOUND, "User not found".into())),
        Err(e) => {
            error!(error = %e, %user_id, "update_name failed");
            Err((StatusCode::INTERNAL_SERVER_ERROR, "Error updating profile".into()))
        }
    }
}

pub async fn user_dashboard(auth: AuthUser) -> Result<Json<DashboardResponse>, (StatusCode, String)> {
    auth.require_role(Role::User)?;
    Ok(Json(DashboardResponse {
        message: "Welcome to the User Dashboard!".into(),
    }))
}

pub async fn cinema_dashboard(
    auth: AuthUser,
) -> Result<Json<DashboardResponse>, (StatusCode, String)> {
    auth.require_role(Role::CinemaOwner)?;
    Ok(Json(DashboardResponse {
        message: "Welcome to the Cinema Owner Dashboard!".into(),
    }))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::http::StatusCode;
    use serde_json::json;

    use crate::app::build_app;
    use crate::auth::repo_types::Role;
    use crate::testutil::{
        bearer, fake_state, get_request, json_request, send, FakeNotifier, FakeQr, MemoryStore,
    };

    fn setup() -> (Arc<MemoryStore>, crate::state::AppState) {
        let store = Arc::new(MemoryStore::default());
        let state = fake_state(store.clone(), Arc::new(FakeQr::default()), Arc::new(FakeNotifier::default()));
        (store, state)
    }

    fn register_body(email: &str, role: &str) -> serde_json::Value {
        json!({ "name": "Asha", "email": email, "password": "popcorn-123", "role": role })
    }

    #[tokio::test]
    async fn register_then_duplicate_email_conflicts() {
        let (store, state) = setup();
        let app = build_app(state);

        let (status, body) = send(
            app.clone(),
            json_request("POST", "/api/v1/auth/register", None, register_body("Asha@Example.com", "User")),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["user"]["email"], "asha@example.com");
        assert_eq!(body["user"]["role"], "User");
        assert!(body["user"].get("password_hash").is_none());
        assert!(body["access_token"].is_string());

        let (status, _) = send(
            app,
            json_request("POST", "/api/v1/auth/register", None, register_body("asha@example.com", "User")),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(store.user_count(), 1);
    }

    #[tokio::test]
    async fn register_rejects_bad_input() {
        let (store, state) = setup();
        let app = build_app(state);

        let (status, _) = send(
            app.clone(),
            json_request("POST", "/api/v1/auth/register", None, register_body("not-an-email", "User")),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let mut short = register_body("ravi@example.com", "User");
        short["password"] = json!("short");
        let (status, _) = send(app, json_request("POST", "/api/v1/auth/register", None, short)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(store.user_count(), 0);
    }

    #[tokio::test]
    async fn register_without_role_is_a_validation_error() {
        let (store, state) = setup();
        let mut body = register_body("asha@example.com", "User");
        body.as_object_mut().unwrap().remove("role");

        let (status, body) = send(
            build_app(state),
            json_request("POST", "/api/v1/auth/register", None, body),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "VALIDATION_ERROR");
        assert_eq!(store.user_count(), 0);
    }

    #[tokio::test]
    async fn login_checks_password_and_role() {
        let (_, state) = setup();
        let app = build_app(state);

        let (status, _) = send(
            app.clone(),
            json_request("POST", "/api/v1/auth/register", None, register_body("owner@pvr.in", "Cinema Owner")),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);

        let login = |password: &str, role: &str| {
            json_request(
                "POST",
                "/api/v1/auth/login",
                None,
                json!({ "email": "owner@pvr.in", "password": password, "role": role }),
            )
        };

        let (status, body) = send(app.clone(), login("popcorn-123", "Cinema Owner")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["user"]["role"], "Cinema Owner");

        let (status, _) = send(app.clone(), login("popcorn-123", "User")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _) = send(app, login("wrong-password", "Cinema Owner")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn dashboards_are_role_gated() {
        let (store, state) = setup();
        let user = store.add_user("Asha", "asha@example.com", Role::User);
        let owner = store.add_user("Owner", "owner@pvr.in", Role::CinemaOwner);
        let (user_auth, owner_auth) = (bearer(&state, &user), bearer(&state, &owner));
        let app = build_app(state);

        let (status, _) = send(app.clone(), get_request("/api/v1/dashboard/user", Some(&user_auth))).await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = send(app.clone(), get_request("/api/v1/dashboard/cinema", Some(&user_auth))).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        let (status, _) = send(app.clone(), get_request("/api/v1/dashboard/cinema", Some(&owner_auth))).await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = send(app, get_request("/api/v1/dashboard/user", None)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn profile_is_self_only() {
        let (store, state) = setup();
        let asha = store.add_user("Asha", "asha@example.com", Role::User);
        let ravi = store.add_user("Ravi", "ravi@example.com", Role::User);
        let auth = bearer(&state, &asha);
        let app = build_app(state);

        let (status, body) = send(
            app.clone(),
            json_request("PUT", &format!("/api/v1/users/{}", asha.id), Some(&auth), json!({ "name": "Asha K" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["name"], "Asha K");

        let (status, _) = send(app.clone(), get_request(&format!("/api/v1/users/{}", ravi.id), Some(&auth))).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, body) = send(app, get_request("/api/v1/me", Some(&auth))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["email"], "asha@example.com");
    }
}
