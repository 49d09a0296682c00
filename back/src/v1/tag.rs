use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    Json,
};
use todo_api::v1::{NewTag, Pagination, TagUpdate, TagWithTodos};
use tracing::info;

use super::{ApiPath, ApiQuery, ValidJson};
use crate::{error::ApiError, store, AppState};

const NOT_FOUND: ApiError = ApiError::NotFound("Tag");

pub async fn get_tags(
    State(state): State<Arc<AppState>>,
    ApiQuery(page): ApiQuery<Pagination>,
) -> Result<Json<Vec<TagWithTodos>>, ApiError> {
    let mut conn = state.db.acquire().await?;
    let tags = store::tag::list(&mut conn, page).await?;

    Ok(Json(tags))
}

pub async fn get_tag(
    State(state): State<Arc<AppState>>,
    ApiPath(id): ApiPath<i64>,
) -> Result<Json<TagWithTodos>, ApiError> {
    let mut conn = state.db.acquire().await?;
    let tag = store::tag::get_by_id(&mut conn, id)
        .await?
        .ok_or(NOT_FOUND)?;

    Ok(Json(tag))
}

pub async fn add_tag(
    State(state): State<Arc<AppState>>,
    ValidJson(new): ValidJson<NewTag>,
) -> Result<Json<TagWithTodos>, ApiError> {
    let mut tx = state.db.begin().await?;
    let tag = store::tag::create(&mut tx, new).await?;
    tx.commit().await?;

    info!(id = tag.tag.id, name = %tag.tag.name, "created tag");

    Ok(Json(tag))
}

pub async fn update_tag(
    State(state): State<Arc<AppState>>,
    ApiPath(id): ApiPath<i64>,
    ValidJson(update): ValidJson<TagUpdate>,
) -> Result<Json<TagWithTodos>, ApiError> {
    let mut tx = state.db.begin().await?;
    let tag = store::tag::update(&mut tx, id, update)
        .await?
        .ok_or(NOT_FOUND)?;
    tx.commit().await?;

    info!(id, name = %tag.tag.name, "updated tag");

    Ok(Json(tag))
}

pub async fn delete_tag(
    State(state): State<Arc<AppState>>,
    ApiPath(id): ApiPath<i64>,
) -> Result<StatusCode, ApiError> {
    let mut tx = state.db.begin().await?;
    store::tag::delete(&mut tx, id).await?.ok_or(NOT_FOUND)?;
    tx.commit().await?;

    info!(id, "deleted tag");

    Ok(StatusCode::OK)
}
