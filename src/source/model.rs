use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Serialize, Debug)]
pub struct LoginReq<'a> {
    pub username: &'a str,
    pub password: &'a str,
}

#[derive(Deserialize, Debug)]
pub struct LoginResp {
    pub token: String,
}

#[derive(Deserialize, Debug)]
pub struct ProfileResp {
    pub username: String,
    #[serde(default)]
    pub media_count: u64,
    #[serde(default)]
    pub has_viewable_story: bool,
}

#[derive(Deserialize, Debug, Clone)]
pub struct WireMedia {
    pub url: String,
    pub kind: String,
}

#[derive(Deserialize, Debug, Clone)]
pub struct WirePost {
    pub id: String,
    pub taken_at: DateTime<Utc>,
    #[serde(default)]
    pub like_count: i64,
    #[serde(default)]
    pub comment_count: i64,
    #[serde(default)]
    pub caption: Option<String>,
    #[serde(default)]
    pub media: Vec<WireMedia>,
}

#[derive(Deserialize, Debug)]
pub struct PostsResp {
    pub items: Vec<WirePost>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct WireStory {
    pub id: String,
    pub url: String,
    pub kind: String,
    pub taken_at: DateTime<Utc>,
}

#[derive(Deserialize, Debug)]
pub struct StoriesResp {
    pub items: Vec<WireStory>,
}
