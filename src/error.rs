use rocket::http::{Header, Status};
use rocket::request::Request;
use rocket::response::{self, Responder, Response};
use rocket::serde::json::Json;
use serde::Serialize;
use thiserror::Error;
use tracing::error;

use crate::auth::AuthError;
use crate::db::DbError;

/// Errors returned to API callers as `{"detail": "..."}` with a matching status.
#[derive(Debug, Clone, Error)]
pub enum ApiError {
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Internal(String),
}

#[derive(Serialize)]
struct ErrorBody {
    detail: String,
}

impl ApiError {
    pub fn status(&self) -> Status {
        match self {
            ApiError::NotFound(_) => Status::NotFound,
            ApiError::Unauthorized(_) => Status::Unauthorized,
            ApiError::BadRequest(_) => Status::BadRequest,
            ApiError::Conflict(_) => Status::Conflict,
            ApiError::Validation(_) => Status::UnprocessableEntity,
            ApiError::Internal(_) => Status::InternalServerError,
        }
    }

    pub fn credentials() -> Self {
        ApiError::Unauthorized("Could not validate credentials".to_string())
    }
}

impl From<DbError> for ApiError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound(entity) => ApiError::NotFound(format!("{} not found", entity)),
            DbError::Conflict(message) => ApiError::Conflict(message),
            other => {
                error!("Database failure: {}", other);
                ApiError::Internal("Internal server error".to_string())
            }
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Db(e) => e.into(),
            AuthError::Token(_) => ApiError::credentials(),
            other => {
                error!("Authentication failure: {}", other);
                ApiError::Internal("Internal server error".to_string())
            }
        }
    }
}

impl<'r> Responder<'r, 'static> for ApiError {
    fn respond_to(self, req: &'r Request<'_>) -> response::Result<'static> {
        let status = self.status();
        let unauthorized = matches!(self, ApiError::Unauthorized(_));
        let body = Json(ErrorBody {
            detail: self.to_string(),
        });

        let mut response = Response::build_from(body.respond_to(req)?)
            .status(status)
            .finalize();
        if unauthorized {
            response.set_header(Header::new("WWW-Authenticate", "Bearer"));
        }
        Ok(response)
    }
}
