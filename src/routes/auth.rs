use rocket::form::{Form, FromForm};
use rocket::serde::json::Json;
use rocket::{get, post, put, State};
use tracing::{info, warn};

use crate::auth::{authenticate_user, create_access_token, hash_password, AuthenticatedUser};
use crate::config::Config;
use crate::db::DatabaseService;
use crate::error::ApiError;
use crate::models::{PasswordUpdate, Token, UserInfo};

/// OAuth2 password-flow form body.
#[derive(FromForm)]
pub struct LoginForm {
    username: String,
    password: String,
}

/// Exchange username/password for a bearer token
#[post("/token", data = "<form>")]
pub fn login(
    form: Form<LoginForm>,
    db: &State<DatabaseService>,
    config: &State<Config>,
) -> Result<Json<Token>, ApiError> {
    let user = match authenticate_user(db, &form.username, &form.password)? {
        Some(user) => user,
        None => {
            warn!(username = %form.username, "Rejected login attempt");
            return Err(ApiError::Unauthorized("Incorrect username or password".to_string()));
        }
    };

    db.update_last_login(&user.username)?;

    let access_token = create_access_token(
        &user.username,
        &config.jwt_secret_key,
        config.jwt_access_token_expire_minutes,
    )?;
    info!(username = %user.username, "Issued access token");

    Ok(Json(Token {
        access_token,
        token_type: "bearer".to_string(),
    }))
}

#[get("/me")]
pub fn read_me(user: AuthenticatedUser) -> Json<UserInfo> {
    Json(user.0.into())
}

#[put("/me", data = "<update>")]
pub fn update_password(
    update: Json<PasswordUpdate>,
    user: AuthenticatedUser,
    db: &State<DatabaseService>,
    config: &State<Config>,
) -> Result<Json<UserInfo>, ApiError> {
    if update.password.is_empty() {
        return Err(ApiError::Validation("password must not be empty".to_string()));
    }
    let hashed = hash_password(&update.password, config.password_hash_cost)?;
    let updated = db.update_user_password(&user.0.username, &hashed)?;
    Ok(Json(updated.into()))
}
