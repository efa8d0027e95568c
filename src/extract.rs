use axum::{
    Json,
    extract::{FromRequest, FromRequestParts, Path, Query, Request},
    http::request::Parts,
};
use serde::de::DeserializeOwned;
use validator::Validate;

use crate::{error::AppError, repository::is_valid_id};

/// EntityId
///
/// A `{id}` path segment that has passed the identifier check. Being a parts
/// extractor it runs before any body extractor, so a malformed id is reported
/// ahead of schema errors and never reaches the store.
#[derive(Debug, Clone)]
pub struct EntityId(pub String);

impl<S> FromRequestParts<S> for EntityId
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(id) = Path::<String>::from_request_parts(parts, state)
            .await
            .map_err(|rejection| AppError::BadRequest(rejection.body_text()))?;

        if !is_valid_id(&id) {
            return Err(AppError::InvalidId(format!(
                "Invalid ID '{id}': expected a 24-character hexadecimal string"
            )));
        }
        Ok(EntityId(id))
    }
}

/// ValidJson
///
/// `Json<T>` followed by `T::validate()`. Both a rejected body (syntax, types,
/// missing fields) and failed rules are reported as 400.
#[derive(Debug)]
pub struct ValidJson<T>(pub T);

impl<S, T> FromRequest<S> for ValidJson<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Validate,
{
    type Rejection = AppError;

    async fn from_request(request: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(payload) = Json::<T>::from_request(request, state)
            .await
            .map_err(|rejection| AppError::BadRequest(rejection.body_text()))?;
        payload.validate()?;
        Ok(ValidJson(payload))
    }
}

/// Query-string counterpart of `ValidJson`.
#[derive(Debug)]
pub struct ValidQuery<T>(pub T);

impl<S, T> FromRequestParts<S> for ValidQuery<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Validate,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(params) = Query::<T>::from_request_parts(parts, state)
            .await
            .map_err(|rejection| AppError::BadRequest(rejection.body_text()))?;
        params.validate()?;
        Ok(ValidQuery(params))
    }
}
