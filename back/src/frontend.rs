//! Server-rendered pages. They read through the same `store` functions as
//! the JSON API; all writes go through the API from `static/app.js`.

use std::sync::Arc;

use axum::{
    extract::{rejection::PathRejection, Path, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::get,
    Router,
};
use minijinja::{context, Value};
use serde::Serialize;
use todo_api::v1::Pagination;
use tracing::error;

use crate::{error::ApiError, store, AppState};

#[derive(Serialize)]
struct Component {
    name: &'static str,
    license: &'static str,
}

const COMPONENTS: &[Component] = &[
    Component { name: "axum", license: "MIT" },
    Component { name: "axum-server", license: "MIT" },
    Component { name: "chrono", license: "MIT OR Apache-2.0" },
    Component { name: "clap", license: "MIT OR Apache-2.0" },
    Component { name: "minijinja", license: "Apache-2.0" },
    Component { name: "ron", license: "MIT OR Apache-2.0" },
    Component { name: "serde", license: "MIT OR Apache-2.0" },
    Component { name: "sqlx", license: "MIT OR Apache-2.0" },
    Component { name: "SQLite", license: "Public Domain" },
    Component { name: "tokio", license: "MIT" },
    Component { name: "tower-http", license: "MIT" },
    Component { name: "tracing", license: "MIT" },
    Component { name: "validator", license: "MIT" },
];

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(index))
        .route("/todo/new", get(new_todo))
        .route("/todo/:id/edit", get(edit_todo))
        .route("/licenses", get(licenses))
}

async fn index(State(state): State<Arc<AppState>>) -> Result<Html<String>, PageError> {
    let mut conn = state.db.acquire().await?;
    let todos = store::todo::list(&mut conn, Pagination::default()).await?;
    let tags = store::tag::list(&mut conn, Pagination::default()).await?;

    render(
        &state,
        "index.html",
        "Todos",
        context! { todos => todos, tags => tags },
    )
}

async fn new_todo(State(state): State<Arc<AppState>>) -> Result<Html<String>, PageError> {
    render(&state, "todo_form.html", "New todo", context! {})
}

async fn edit_todo(
    State(state): State<Arc<AppState>>,
    id: Result<Path<i64>, PathRejection>,
) -> Result<Response, PageError> {
    let Path(id) = id.map_err(ApiError::from)?;
    let mut conn = state.db.acquire().await?;
    let Some(todo) = store::todo::get_by_id(&mut conn, id).await? else {
        let page = render(&state, "not_found.html", "Not found", context! {})?;
        return Ok((StatusCode::NOT_FOUND, page).into_response());
    };
    let tags = store::tag::list(&mut conn, Pagination::default()).await?;

    let page = render(
        &state,
        "todo_form.html",
        "Edit todo",
        context! { todo => todo, tags => tags },
    )?;

    Ok(page.into_response())
}

async fn licenses(State(state): State<Arc<AppState>>) -> Result<Html<String>, PageError> {
    render(
        &state,
        "licenses.html",
        "Licenses",
        context! { components => COMPONENTS },
    )
}

fn render(
    state: &AppState,
    name: &str,
    page_title: &str,
    page: Value,
) -> Result<Html<String>, PageError> {
    let common = context! {
        project_name => &state.config.project_name,
        api_prefix => &state.config.api_prefix,
        page_title => page_title,
    };
    let html = state
        .templates
        .render(name, context! { ..common, ..page })?;

    Ok(Html(html))
}

/// Failure while building a page; rendered as a bare HTML error page.
pub struct PageError(ApiError);

impl From<ApiError> for PageError {
    fn from(err: ApiError) -> Self {
        Self(err)
    }
}

impl From<sqlx::Error> for PageError {
    fn from(err: sqlx::Error) -> Self {
        Self(err.into())
    }
}

impl From<minijinja::Error> for PageError {
    fn from(err: minijinja::Error) -> Self {
        Self(err.into())
    }
}

impl IntoResponse for PageError {
    fn into_response(self) -> Response {
        let status = self.0.status();
        if status.is_server_error() {
            error!(error = %self.0, "failed to render page");
        }

        (status, Html(fallback_html(status))).into_response()
    }
}

fn fallback_html(status: StatusCode) -> String {
    let reason = status.canonical_reason().unwrap_or("Error");
    format!(
        r#"<!DOCTYPE html>
<html><head><title>{code} - {reason}</title></head>
<body><h1>{code} - {reason}</h1></body></html>"#,
        code = status.as_u16(),
    )
}
