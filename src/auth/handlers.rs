use crate::{
    auth::{
        auth::AuthUser,
        jwt::generate_access_token,
        password::{hash_password, verify_password},
    },
    config::Config,
    error::ApiError,
    model::{role::Role, user::User},
    models::{CreateUserReq, LoginReqDto, LoginResponse},
};
use actix_web::{HttpResponse, web};
use serde_json::json;
use sqlx::MySqlPool;
use tracing::{debug, error, info, instrument};

/// Inserts a new user with an argon2-hashed password.
async fn insert_user(
    username: &str,
    password: &str,
    role: Role,
    pool: &MySqlPool,
) -> Result<u64, ApiError> {
    let hashed = hash_password(password).map_err(|e| {
        error!(error = %e, "Password hashing failed");
        ApiError::Internal
    })?;

    let result = sqlx::query(r#"INSERT INTO users (username, password, role_id) VALUES (?, ?, ?)"#)
        .bind(username)
        .bind(hashed)
        .bind(role.id())
        .execute(pool)
        .await;

    match result {
        Ok(done) => Ok(done.last_insert_id()),
        Err(e) => {
            if let sqlx::Error::Database(db_err) = &e {
                if db_err.is_unique_violation() {
                    return Err(ApiError::Conflict("Username already exists".into()));
                }
            }

            error!(error = %e, "Failed to insert user");
            Err(ApiError::Internal)
        }
    }
}

/// Create a user account (admin only)
#[utoipa::path(
    post,
    path = "/api/v1/users",
    request_body = CreateUserReq,
    responses(
        (status = 201, description = "User created", body = Object, example = json!({
            "message": "User created", "id": 7
        })),
        (status = 400, description = "Bad request"),
        (status = 403, description = "Forbidden"),
        (status = 409, description = "Username already exists")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Auth"
)]
pub async fn create_user(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<CreateUserReq>,
) -> Result<HttpResponse, ApiError> {
    auth.require_admin()?;

    let username = payload.username.trim().to_lowercase();
    if username.is_empty() || payload.password.is_empty() {
        return Err(ApiError::BadRequest(
            "Username and password must not be empty".into(),
        ));
    }
    let role = Role::from_id(payload.role_id)
        .ok_or_else(|| ApiError::BadRequest("Unknown role_id".into()))?;

    let id = insert_user(&username, &payload.password, role, pool.get_ref()).await?;
    info!(user_id = id, role = %role, created_by = %auth.username, "User created");

    Ok(HttpResponse::Created().json(json!({
        "message": "User created",
        "id": id
    })))
}

/// Log in and receive a bearer token
#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginReqDto,
    responses(
        (status = 200, description = "Logged in", body = LoginResponse),
        (status = 400, description = "Username or password missing"),
        (status = 401, description = "Invalid credentials")
    ),
    tag = "Auth"
)]
#[instrument(
    name = "auth_login",
    skip(pool, config, user),
    fields(username = %user.username)
)]
pub async fn login(
    user: web::Json<LoginReqDto>,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> Result<HttpResponse, ApiError> {
    info!("Login request received");

    if user.username.trim().is_empty() || user.password.is_empty() {
        info!("Validation failed: empty username or password");
        return Err(ApiError::BadRequest("Username or password required".into()));
    }

    debug!("Fetching user from database");

    let db_user = sqlx::query_as::<_, User>(
        r#"
        SELECT id, username, password, role_id, is_active
        FROM users
        WHERE username = ?
        "#,
    )
    .bind(user.username.trim().to_lowercase())
    .fetch_optional(pool.get_ref())
    .await
    .map_err(|e| {
        error!(error = %e, "Database error while fetching user");
        ApiError::Internal
    })?;

    let db_user = match db_user {
        Some(u) if u.is_active => u,
        Some(_) => {
            info!("Invalid credentials: user disabled");
            return Err(ApiError::Unauthorized("Invalid credentials".into()));
        }
        None => {
            info!("Invalid credentials: user not found");
            return Err(ApiError::Unauthorized("Invalid credentials".into()));
        }
    };

    if let Err(e) = verify_password(&user.password, &db_user.password) {
        info!(error = %e, "Invalid credentials: password mismatch");
        return Err(ApiError::Unauthorized("Invalid credentials".into()));
    }

    let access_token = generate_access_token(
        db_user.id,
        db_user.username.clone(),
        db_user.role_id,
        &config.jwt_secret,
        config.access_token_ttl,
    )
    .map_err(|e| {
        error!(error = %e, "Failed to sign access token");
        ApiError::Internal
    })?;

    // Not fatal for the login itself.
    if let Err(e) = sqlx::query("UPDATE users SET last_login_at = NOW() WHERE id = ?")
        .bind(db_user.id)
        .execute(pool.get_ref())
        .await
    {
        error!(error = %e, "Failed to update last_login_at");
    }

    info!(user_id = db_user.id, "Login successful");

    Ok(HttpResponse::Ok().json(LoginResponse {
        access_token,
        token_type: "Bearer".to_string(),
        expires_in: config.access_token_ttl,
    }))
}

/// Creates the configured admin account when the users table is empty.
pub async fn bootstrap_admin(pool: &MySqlPool, config: &Config) -> anyhow::Result<()> {
    let Some((username, password)) = &config.bootstrap_admin else {
        return Ok(());
    };

    let existing: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
        .fetch_one(pool)
        .await?;
    if existing > 0 {
        debug!("Users present, skipping admin bootstrap");
        return Ok(());
    }

    insert_user(&username.to_lowercase(), password, Role::Admin, pool)
        .await
        .map_err(|e| anyhow::anyhow!("admin bootstrap failed: {e}"))?;
    info!(username = %username, "Bootstrap admin created");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{App, http::StatusCode, test};

    // Lazy pool: never connects unless a query runs.
    fn lazy_pool() -> MySqlPool {
        MySqlPool::connect_lazy("mysql://nobody@127.0.0.1:1/none").unwrap()
    }

    #[actix_web::test]
    async fn login_rejects_blank_credentials_before_touching_db() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(lazy_pool()))
                .app_data(web::Data::new(Config::for_tests()))
                .route("/auth/login", web::post().to(login)),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/auth/login")
            .set_json(json!({"username": "  ", "password": "x"}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn only_admin_creates_users() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(lazy_pool()))
                .wrap_fn(|req, srv| {
                    use actix_web::HttpMessage;
                    use actix_web::dev::Service;
                    req.extensions_mut().insert(AuthUser {
                        user_id: 2,
                        username: "manager".into(),
                        role: Role::Management,
                    });
                    srv.call(req)
                })
                .route("/users", web::post().to(create_user)),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/users")
            .set_json(json!({"username": "new", "password": "pw", "role_id": 3}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    }
}
