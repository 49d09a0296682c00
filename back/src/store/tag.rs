use std::collections::HashMap;

use chrono::Utc;
use sqlx::{FromRow, SqliteConnection};
use todo_api::v1::{NewTag, Pagination, Tag, TagUpdate, TagWithTodos, Todo};

use super::touched;

#[derive(FromRow)]
struct TaggedTodo {
    tag_id: i64,
    #[sqlx(flatten)]
    todo: Todo,
}

/// Fails with a unique violation if the name is taken.
pub async fn create(conn: &mut SqliteConnection, new: NewTag) -> sqlx::Result<TagWithTodos> {
    let now = Utc::now();
    let id = sqlx::query("INSERT INTO tags (name, created_at, updated_at) VALUES (?, ?, ?)")
        .bind(&new.name)
        .bind(now)
        .bind(now)
        .execute(&mut *conn)
        .await?
        .last_insert_rowid();

    Ok(TagWithTodos {
        tag: Tag {
            id,
            name: new.name,
            created_at: now,
            updated_at: now,
        },
        todos: Vec::new(),
    })
}

pub async fn get_by_id(conn: &mut SqliteConnection, id: i64) -> sqlx::Result<Option<TagWithTodos>> {
    let Some(tag) = find(conn, id).await? else {
        return Ok(None);
    };
    let todos = todos_of(conn, id).await?;

    Ok(Some(TagWithTodos { tag, todos }))
}

pub async fn find_by_name(conn: &mut SqliteConnection, name: &str) -> sqlx::Result<Option<Tag>> {
    sqlx::query_as::<_, Tag>("SELECT id, name, created_at, updated_at FROM tags WHERE name = ?")
        .bind(name)
        .fetch_optional(&mut *conn)
        .await
}

pub async fn list(conn: &mut SqliteConnection, page: Pagination) -> sqlx::Result<Vec<TagWithTodos>> {
    let limit = i64::from(page.limit);
    let skip = i64::from(page.skip);

    let tags = sqlx::query_as::<_, Tag>(
        "SELECT id, name, created_at, updated_at FROM tags ORDER BY id LIMIT ? OFFSET ?",
    )
    .bind(limit)
    .bind(skip)
    .fetch_all(&mut *conn)
    .await?;

    let rows = sqlx::query_as::<_, TaggedTodo>(
        "SELECT todo_tags.tag_id AS tag_id, todo.id AS id, todo.content AS content, \
                todo.completed AS completed, todo.deadline AS deadline, \
                todo.created_at AS created_at, todo.updated_at AS updated_at \
         FROM todo_tags JOIN todo ON todo.id = todo_tags.todo_id \
         WHERE todo_tags.tag_id IN (SELECT id FROM tags ORDER BY id LIMIT ? OFFSET ?) \
         ORDER BY todo.id",
    )
    .bind(limit)
    .bind(skip)
    .fetch_all(&mut *conn)
    .await?;

    let mut todos: HashMap<i64, Vec<Todo>> = HashMap::new();
    for row in rows {
        todos.entry(row.tag_id).or_default().push(row.todo);
    }

    Ok(tags
        .into_iter()
        .map(|tag| TagWithTodos {
            todos: todos.remove(&tag.id).unwrap_or_default(),
            tag,
        })
        .collect())
}

pub async fn update(
    conn: &mut SqliteConnection,
    id: i64,
    update: TagUpdate,
) -> sqlx::Result<Option<TagWithTodos>> {
    let Some(mut tag) = find(conn, id).await? else {
        return Ok(None);
    };

    update.merge_into(&mut tag);
    tag.updated_at = touched(tag.updated_at);

    sqlx::query("UPDATE tags SET name = ?, updated_at = ? WHERE id = ?")
        .bind(&tag.name)
        .bind(tag.updated_at)
        .bind(id)
        .execute(&mut *conn)
        .await?;

    let todos = todos_of(conn, id).await?;

    Ok(Some(TagWithTodos { tag, todos }))
}

pub async fn delete(conn: &mut SqliteConnection, id: i64) -> sqlx::Result<Option<i64>> {
    let result = sqlx::query("DELETE FROM tags WHERE id = ?")
        .bind(id)
        .execute(&mut *conn)
        .await?;

    Ok((result.rows_affected() > 0).then_some(id))
}

pub(super) async fn exists(conn: &mut SqliteConnection, id: i64) -> sqlx::Result<bool> {
    let found: Option<i64> = sqlx::query_scalar("SELECT id FROM tags WHERE id = ?")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

    Ok(found.is_some())
}

async fn find(conn: &mut SqliteConnection, id: i64) -> sqlx::Result<Option<Tag>> {
    sqlx::query_as::<_, Tag>("SELECT id, name, created_at, updated_at FROM tags WHERE id = ?")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await
}

async fn todos_of(conn: &mut SqliteConnection, tag_id: i64) -> sqlx::Result<Vec<Todo>> {
    sqlx::query_as::<_, Todo>(
        "SELECT todo.id AS id, todo.content AS content, todo.completed AS completed, \
                todo.deadline AS deadline, todo.created_at AS created_at, \
                todo.updated_at AS updated_at \
         FROM todo_tags JOIN todo ON todo.id = todo_tags.todo_id \
         WHERE todo_tags.tag_id = ? ORDER BY todo.id",
    )
    .bind(tag_id)
    .fetch_all(&mut *conn)
    .await
}
