use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};
use validator::Validate;

use super::{Tag, Todo};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct NewTodo {
    #[validate(length(min = 1, max = 30, message = "content must be 1 to 30 characters"))]
    pub content: String,
    #[serde(default)]
    pub deadline: Option<NaiveDate>,
}

/// Partial update of a todo; `None` leaves the stored field untouched.
///
/// `deadline` distinguishes a missing key (`None`) from an explicit
/// `null` (`Some(None)`), which clears the deadline.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct TodoUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 1, max = 30, message = "content must be 1 to 30 characters"))]
    pub content: Option<String>,
    #[serde(
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    pub deadline: Option<Option<NaiveDate>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed: Option<bool>,
}

impl TodoUpdate {
    pub fn merge_into(self, todo: &mut Todo) {
        if let Some(content) = self.content {
            todo.content = content;
        }
        if let Some(deadline) = self.deadline {
            todo.deadline = deadline;
        }
        if let Some(completed) = self.completed {
            todo.completed = completed;
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct NewTag {
    #[validate(length(min = 1, max = 30, message = "name must be 1 to 30 characters"))]
    pub name: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct TagUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 1, max = 30, message = "name must be 1 to 30 characters"))]
    pub name: Option<String>,
}

impl TagUpdate {
    pub fn merge_into(self, tag: &mut Tag) {
        if let Some(name) = self.name {
            tag.name = name;
        }
    }
}

// Only called when the key is present, so `null` becomes `Some(None)`.
fn present<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}
