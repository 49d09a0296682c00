use std::{collections::HashMap, fs, path::Path};

use chrono::NaiveDate;
use eyre::{eyre, WrapErr};
use serde::Deserialize;
use sqlx::SqlitePool;
use todo_api::v1::{NewTag, NewTodo, TodoUpdate};
use tracing::info;
use validator::Validate;

use crate::store;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SeedFile {
    pub tags: Vec<NewTag>,
    pub todos: Vec<SeedTodo>,
}

#[derive(Debug, Deserialize)]
pub struct SeedTodo {
    pub content: String,
    #[serde(default)]
    pub deadline: Option<NaiveDate>,
    #[serde(default)]
    pub completed: bool,
    /// Tag names, either from this file or already stored.
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct Summary {
    pub tags_created: usize,
    pub todos_created: usize,
}

pub async fn run(db: &SqlitePool, path: &Path) -> eyre::Result<()> {
    let file = fs::File::open(path).wrap_err_with(|| format!("failed to open {}", path.display()))?;
    let seed: SeedFile = ron::de::from_reader(file)
        .wrap_err_with(|| format!("failed to parse {}", path.display()))?;

    let summary = apply(db, seed).await?;

    info!(
        file = %path.display(),
        tags = summary.tags_created,
        todos = summary.todos_created,
        "seeded database"
    );

    Ok(())
}

/// Loads everything in one transaction; any failure leaves the store untouched.
pub async fn apply(db: &SqlitePool, seed: SeedFile) -> eyre::Result<Summary> {
    let mut tx = db.begin().await?;
    let mut summary = Summary::default();
    let mut tag_ids = HashMap::new();

    for new in seed.tags {
        new.validate()
            .wrap_err_with(|| format!("invalid tag `{}`", new.name))?;

        let tag = match store::tag::find_by_name(&mut tx, &new.name).await? {
            Some(tag) => tag,
            None => {
                summary.tags_created += 1;
                store::tag::create(&mut tx, new).await?.tag
            }
        };
        tag_ids.insert(tag.name, tag.id);
    }

    for entry in seed.todos {
        let new = NewTodo {
            content: entry.content,
            deadline: entry.deadline,
        };
        new.validate()
            .wrap_err_with(|| format!("invalid todo `{}`", new.content))?;

        let id = store::todo::create(&mut tx, new).await?.todo.id;
        summary.todos_created += 1;

        if entry.completed {
            let completion = TodoUpdate {
                completed: Some(true),
                ..Default::default()
            };
            store::todo::update(&mut tx, id, completion).await?;
        }

        for name in &entry.tags {
            let tag_id = match tag_ids.get(name) {
                Some(tag_id) => *tag_id,
                None => store::tag::find_by_name(&mut tx, name)
                    .await?
                    .map(|tag| tag.id)
                    .ok_or_else(|| eyre!("unknown tag `{name}`"))?,
            };
            store::todo::add_tag(&mut tx, id, tag_id).await?;
        }
    }

    tx.commit().await?;

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use todo_api::v1::Pagination;

    use super::*;
    use crate::test_support;

    const SEED: &str = r#"(
        tags: [(name: "home"), (name: "work")],
        todos: [
            (content: "buy milk", tags: ["home"]),
            (content: "ship release", deadline: Some("2025-01-31"), completed: true, tags: ["work", "home"]),
            (content: "stretch"),
        ],
    )"#;

    #[tokio::test]
    async fn seeds_tags_todos_and_links() {
        let pool = test_support::pool().await;
        let seed: SeedFile = ron::from_str(SEED).unwrap();

        let summary = apply(&pool, seed).await.unwrap();
        assert_eq!(
            summary,
            Summary {
                tags_created: 2,
                todos_created: 3,
            }
        );

        let mut conn = pool.acquire().await.unwrap();
        let todos = store::todo::list(&mut conn, Pagination::default()).await.unwrap();
        assert_eq!(todos.len(), 3);

        let release = &todos[1];
        assert_eq!(release.todo.content, "ship release");
        assert!(release.todo.completed);
        assert_eq!(release.todo.deadline, NaiveDate::from_ymd_opt(2025, 1, 31));
        let names: Vec<&str> = release.tags.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, ["home", "work"]);

        assert!(todos[2].tags.is_empty());
    }

    #[tokio::test]
    async fn existing_tags_are_reused() {
        let pool = test_support::pool().await;

        apply(&pool, ron::from_str(SEED).unwrap()).await.unwrap();
        let summary = apply(&pool, ron::from_str(SEED).unwrap()).await.unwrap();

        assert_eq!(summary.tags_created, 0);
        assert_eq!(summary.todos_created, 3);
    }

    #[tokio::test]
    async fn unknown_tag_rolls_back() {
        let pool = test_support::pool().await;
        let seed: SeedFile =
            ron::from_str(r#"(todos: [(content: "a"), (content: "b", tags: ["nope"])])"#).unwrap();

        let err = apply(&pool, seed).await.unwrap_err();
        assert!(err.to_string().contains("unknown tag `nope`"));

        let mut conn = pool.acquire().await.unwrap();
        let todos = store::todo::list(&mut conn, Pagination::default()).await.unwrap();
        assert!(todos.is_empty());
    }

    #[tokio::test]
    async fn invalid_entries_are_rejected() {
        let pool = test_support::pool().await;
        let seed = SeedFile {
            tags: Vec::new(),
            todos: vec![SeedTodo {
                content: "x".repeat(31),
                deadline: None,
                completed: false,
                tags: Vec::new(),
            }],
        };

        assert!(apply(&pool, seed).await.is_err());
    }
}
