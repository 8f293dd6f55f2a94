//! Route handlers, one module per resource.

use rocket::form::{self, error::ErrorKind};

use crate::db::Page;
use crate::error::ApiError;

pub mod admin;
pub mod auth;
pub mod clients;
pub mod events;
pub mod messages;
pub mod subscriptions;
pub mod topics;

/// A typed query parameter. Unlike `Option<T>`, a value that fails to parse
/// is kept as an error rather than read as absent.
pub type Query<'r, T> = form::Result<'r, T>;

fn query_value<T>(name: &str, param: Query<'_, T>) -> Result<Option<T>, ApiError> {
    match param {
        Ok(value) => Ok(Some(value)),
        Err(errors) if errors.iter().all(|e| matches!(e.kind, ErrorKind::Missing)) => Ok(None),
        Err(errors) => Err(ApiError::Validation(format!("Invalid value for '{}': {}", name, errors))),
    }
}

/// Validates `skip`/`limit` query parameters before they reach a query.
pub fn page(skip: Query<'_, i64>, limit: Query<'_, i64>) -> Result<Page, ApiError> {
    let skip = query_value("skip", skip)?.unwrap_or(0);
    let limit = query_value("limit", limit)?.unwrap_or(Page::DEFAULT_LIMIT);

    if skip < 0 {
        return Err(ApiError::Validation("skip must be greater than or equal to 0".to_string()));
    }
    if !(1..=Page::MAX_LIMIT).contains(&limit) {
        return Err(ApiError::Validation(format!(
            "limit must be between 1 and {}",
            Page::MAX_LIMIT
        )));
    }
    Ok(Page::new(skip, limit))
}

/// Reads a boolean switch such as `active_only`; absent means `false`.
pub fn flag(name: &str, param: Query<'_, bool>) -> Result<bool, ApiError> {
    Ok(query_value(name, param)?.unwrap_or(false))
}

/// Parses an optional enum-valued query parameter, mapping bad input to a 422.
pub fn parse_filter<T>(raw: Option<&str>) -> Result<Option<T>, ApiError>
where
    T: std::str::FromStr<Err = String>,
{
    match raw {
        None | Some("") => Ok(None),
        Some(value) => value.parse::<T>().map(Some).map_err(ApiError::Validation),
    }
}
