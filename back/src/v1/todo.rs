use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    Json,
};
use todo_api::v1::{NewTodo, Pagination, TodoUpdate, TodoWithTags};
use tracing::info;

use super::{ApiPath, ApiQuery, ValidJson};
use crate::{error::ApiError, store, AppState};

const NOT_FOUND: ApiError = ApiError::NotFound("Todo");

pub async fn get_todos(
    State(state): State<Arc<AppState>>,
    ApiQuery(page): ApiQuery<Pagination>,
) -> Result<Json<Vec<TodoWithTags>>, ApiError> {
    let mut conn = state.db.acquire().await?;
    let todos = store::todo::list(&mut conn, page).await?;

    Ok(Json(todos))
}

pub async fn get_todo(
    State(state): State<Arc<AppState>>,
    ApiPath(id): ApiPath<i64>,
) -> Result<Json<TodoWithTags>, ApiError> {
    let mut conn = state.db.acquire().await?;
    let todo = store::todo::get_by_id(&mut conn, id)
        .await?
        .ok_or(NOT_FOUND)?;

    Ok(Json(todo))
}

pub async fn add_todo(
    State(state): State<Arc<AppState>>,
    ValidJson(new): ValidJson<NewTodo>,
) -> Result<Json<TodoWithTags>, ApiError> {
    let mut tx = state.db.begin().await?;
    let todo = store::todo::create(&mut tx, new).await?;
    tx.commit().await?;

    info!(
        id = todo.todo.id,
        content = %todo.todo.content,
        "created todo"
    );

    Ok(Json(todo))
}

pub async fn update_todo(
    State(state): State<Arc<AppState>>,
    ApiPath(id): ApiPath<i64>,
    ValidJson(update): ValidJson<TodoUpdate>,
) -> Result<Json<TodoWithTags>, ApiError> {
    let mut tx = state.db.begin().await?;
    let todo = store::todo::update(&mut tx, id, update)
        .await?
        .ok_or(NOT_FOUND)?;
    tx.commit().await?;

    info!(
        id,
        content = %todo.todo.content,
        completed = todo.todo.completed,
        deadline = ?todo.todo.deadline,
        "updated todo"
    );

    Ok(Json(todo))
}

pub async fn delete_todo(
    State(state): State<Arc<AppState>>,
    ApiPath(id): ApiPath<i64>,
) -> Result<StatusCode, ApiError> {
    let mut tx = state.db.begin().await?;
    store::todo::delete(&mut tx, id).await?.ok_or(NOT_FOUND)?;
    tx.commit().await?;

    info!(id, "deleted todo");

    Ok(StatusCode::OK)
}

pub async fn attach_tag(
    State(state): State<Arc<AppState>>,
    ApiPath((id, tag_id)): ApiPath<(i64, i64)>,
) -> Result<Json<TodoWithTags>, ApiError> {
    let mut tx = state.db.begin().await?;
    let todo = store::todo::add_tag(&mut tx, id, tag_id)
        .await?
        .ok_or(ApiError::NotFound("Todo or tag"))?;
    tx.commit().await?;

    info!(id, tag_id, "attached tag");

    Ok(Json(todo))
}

pub async fn detach_tag(
    State(state): State<Arc<AppState>>,
    ApiPath((id, tag_id)): ApiPath<(i64, i64)>,
) -> Result<Json<TodoWithTags>, ApiError> {
    let mut tx = state.db.begin().await?;
    let todo = store::todo::remove_tag(&mut tx, id, tag_id)
        .await?
        .ok_or(ApiError::NotFound("Todo or tag"))?;
    tx.commit().await?;

    info!(id, tag_id, "detached tag");

    Ok(Json(todo))
}
