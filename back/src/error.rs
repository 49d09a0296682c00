use std::collections::BTreeMap;

use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("the given data was invalid")]
    Validation(#[from] validator::ValidationErrors),

    #[error("{0}")]
    Body(#[from] JsonRejection),

    #[error("{0}")]
    Path(#[from] PathRejection),

    #[error("{0}")]
    Query(#[from] QueryRejection),

    #[error("Tag name already exists")]
    Conflict,

    #[error("database error: {0}")]
    Database(sqlx::Error),

    #[error("template error: {0}")]
    Template(#[from] minijinja::Error),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Body(rejection) => rejection.status(),
            Self::Path(rejection) => rejection.status(),
            Self::Query(rejection) => rejection.status(),
            Self::Conflict => StatusCode::CONFLICT,
            Self::Database(_) | Self::Template(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db) if db.is_unique_violation() => Self::Conflict,
            _ => Self::Database(err),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();

        let body = match &self {
            Self::Validation(errors) => json!({
                "detail": self.to_string(),
                "errors": field_errors(errors),
            }),
            Self::Database(_) | Self::Template(_) => {
                error!(error = %self, "request failed");
                json!({ "detail": "Internal server error" })
            }
            _ => json!({ "detail": self.to_string() }),
        };

        (status, Json(body)).into_response()
    }
}

fn field_errors(errors: &validator::ValidationErrors) -> BTreeMap<String, Vec<String>> {
    let mut fields = BTreeMap::new();

    for (field, field_errors) in errors.field_errors() {
        let messages = field_errors
            .iter()
            .map(|error| match &error.message {
                Some(message) => message.to_string(),
                None => format!("invalid value for `{field}`"),
            })
            .collect();

        fields.insert(field.to_string(), messages);
    }

    fields
}

#[cfg(test)]
mod tests {
    use http_body_util::BodyExt;
    use todo_api::v1::NewTag;
    use validator::Validate;

    use super::*;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn not_found_has_detail() {
        let response = ApiError::NotFound("Todo").into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(response).await["detail"], "Todo not found");
    }

    #[tokio::test]
    async fn validation_lists_fields() {
        let invalid = NewTag {
            name: String::new(),
        };
        let err = ApiError::from(invalid.validate().unwrap_err());

        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let body = body_json(response).await;
        assert_eq!(body["errors"]["name"][0], "name must be 1 to 30 characters");
    }

    #[tokio::test]
    async fn database_errors_hide_details() {
        let response = ApiError::from(sqlx::Error::RowNotFound).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_json(response).await["detail"], "Internal server error");
    }
}
