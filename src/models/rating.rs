use serde::Serialize;

use crate::domain::{ModuleId, UserId};

/// A rating with its author's name and threaded replies.
#[derive(Debug, Clone, Serialize)]
pub struct Rating {
    pub id: i32,
    pub module_id: ModuleId,
    pub user_id: UserId,
    pub username: String,
    pub rating: i32,
    pub comment: Option<String>,
    pub helpful: i32,
    pub created_at: String,
    pub updated_at: String,
    pub replies: Vec<Reply>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Reply {
    pub id: i32,
    pub rating_id: i32,
    pub user_id: UserId,
    pub username: String,
    pub comment: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RatingSort {
    #[default]
    Recent,
    Helpful,
}
