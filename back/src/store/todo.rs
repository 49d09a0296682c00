use std::collections::HashMap;

use chrono::Utc;
use sqlx::{FromRow, SqliteConnection};
use todo_api::v1::{NewTodo, Pagination, Tag, Todo, TodoUpdate, TodoWithTags};

use super::{tag, touched};

#[derive(FromRow)]
struct TaggedRow {
    todo_id: i64,
    #[sqlx(flatten)]
    tag: Tag,
}

pub async fn create(conn: &mut SqliteConnection, new: NewTodo) -> sqlx::Result<TodoWithTags> {
    let now = Utc::now();
    let id = sqlx::query(
        "INSERT INTO todo (content, completed, deadline, created_at, updated_at) \
         VALUES (?, FALSE, ?, ?, ?)",
    )
    .bind(&new.content)
    .bind(new.deadline)
    .bind(now)
    .bind(now)
    .execute(&mut *conn)
    .await?
    .last_insert_rowid();

    Ok(TodoWithTags {
        todo: Todo {
            id,
            content: new.content,
            completed: false,
            deadline: new.deadline,
            created_at: now,
            updated_at: now,
        },
        tags: Vec::new(),
    })
}

pub async fn get_by_id(conn: &mut SqliteConnection, id: i64) -> sqlx::Result<Option<TodoWithTags>> {
    let Some(todo) = find(conn, id).await? else {
        return Ok(None);
    };
    let tags = tags_of(conn, id).await?;

    Ok(Some(TodoWithTags { todo, tags }))
}

/// Todos in ascending id order, each with its tags.
pub async fn list(conn: &mut SqliteConnection, page: Pagination) -> sqlx::Result<Vec<TodoWithTags>> {
    let limit = i64::from(page.limit);
    let skip = i64::from(page.skip);

    let todos = sqlx::query_as::<_, Todo>(
        "SELECT id, content, completed, deadline, created_at, updated_at \
         FROM todo ORDER BY id LIMIT ? OFFSET ?",
    )
    .bind(limit)
    .bind(skip)
    .fetch_all(&mut *conn)
    .await?;

    let rows = sqlx::query_as::<_, TaggedRow>(
        "SELECT todo_tags.todo_id AS todo_id, tags.id AS id, tags.name AS name, \
                tags.created_at AS created_at, tags.updated_at AS updated_at \
         FROM todo_tags JOIN tags ON tags.id = todo_tags.tag_id \
         WHERE todo_tags.todo_id IN (SELECT id FROM todo ORDER BY id LIMIT ? OFFSET ?) \
         ORDER BY tags.id",
    )
    .bind(limit)
    .bind(skip)
    .fetch_all(&mut *conn)
    .await?;

    let mut tags: HashMap<i64, Vec<Tag>> = HashMap::new();
    for row in rows {
        tags.entry(row.todo_id).or_default().push(row.tag);
    }

    Ok(todos
        .into_iter()
        .map(|todo| TodoWithTags {
            tags: tags.remove(&todo.id).unwrap_or_default(),
            todo,
        })
        .collect())
}

pub async fn update(
    conn: &mut SqliteConnection,
    id: i64,
    update: TodoUpdate,
) -> sqlx::Result<Option<TodoWithTags>> {
    let Some(mut todo) = find(conn, id).await? else {
        return Ok(None);
    };

    update.merge_into(&mut todo);
    todo.updated_at = touched(todo.updated_at);

    sqlx::query(
        "UPDATE todo SET content = ?, completed = ?, deadline = ?, updated_at = ? WHERE id = ?",
    )
    .bind(&todo.content)
    .bind(todo.completed)
    .bind(todo.deadline)
    .bind(todo.updated_at)
    .bind(id)
    .execute(&mut *conn)
    .await?;

    let tags = tags_of(conn, id).await?;

    Ok(Some(TodoWithTags { todo, tags }))
}

/// Deletes the todo and, through the foreign key cascade, its join rows.
pub async fn delete(conn: &mut SqliteConnection, id: i64) -> sqlx::Result<Option<i64>> {
    let result = sqlx::query("DELETE FROM todo WHERE id = ?")
        .bind(id)
        .execute(&mut *conn)
        .await?;

    Ok((result.rows_affected() > 0).then_some(id))
}

/// Attaches a tag. Attaching an already attached tag changes nothing.
pub async fn add_tag(
    conn: &mut SqliteConnection,
    todo_id: i64,
    tag_id: i64,
) -> sqlx::Result<Option<TodoWithTags>> {
    let Some(mut todo) = find(conn, todo_id).await? else {
        return Ok(None);
    };
    if !tag::exists(conn, tag_id).await? {
        return Ok(None);
    }

    let inserted = sqlx::query("INSERT OR IGNORE INTO todo_tags (todo_id, tag_id) VALUES (?, ?)")
        .bind(todo_id)
        .bind(tag_id)
        .execute(&mut *conn)
        .await?
        .rows_affected();

    if inserted > 0 {
        touch(conn, &mut todo).await?;
    }

    let tags = tags_of(conn, todo_id).await?;

    Ok(Some(TodoWithTags { todo, tags }))
}

/// Detaches a tag. Detaching a tag that is not attached changes nothing.
pub async fn remove_tag(
    conn: &mut SqliteConnection,
    todo_id: i64,
    tag_id: i64,
) -> sqlx::Result<Option<TodoWithTags>> {
    let Some(mut todo) = find(conn, todo_id).await? else {
        return Ok(None);
    };
    if !tag::exists(conn, tag_id).await? {
        return Ok(None);
    }

    let removed = sqlx::query("DELETE FROM todo_tags WHERE todo_id = ? AND tag_id = ?")
        .bind(todo_id)
        .bind(tag_id)
        .execute(&mut *conn)
        .await?
        .rows_affected();

    if removed > 0 {
        touch(conn, &mut todo).await?;
    }

    let tags = tags_of(conn, todo_id).await?;

    Ok(Some(TodoWithTags { todo, tags }))
}

async fn find(conn: &mut SqliteConnection, id: i64) -> sqlx::Result<Option<Todo>> {
    sqlx::query_as::<_, Todo>(
        "SELECT id, content, completed, deadline, created_at, updated_at FROM todo WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(&mut *conn)
    .await
}

async fn tags_of(conn: &mut SqliteConnection, todo_id: i64) -> sqlx::Result<Vec<Tag>> {
    sqlx::query_as::<_, Tag>(
        "SELECT tags.id AS id, tags.name AS name, \
                tags.created_at AS created_at, tags.updated_at AS updated_at \
         FROM todo_tags JOIN tags ON tags.id = todo_tags.tag_id \
         WHERE todo_tags.todo_id = ? ORDER BY tags.id",
    )
    .bind(todo_id)
    .fetch_all(&mut *conn)
    .await
}

async fn touch(conn: &mut SqliteConnection, todo: &mut Todo) -> sqlx::Result<()> {
    todo.updated_at = touched(todo.updated_at);

    sqlx::query("UPDATE todo SET updated_at = ? WHERE id = ?")
        .bind(todo.updated_at)
        .bind(todo.id)
        .execute(&mut *conn)
        .await?;

    Ok(())
}
