use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::deserialize_flexible_id;

/// One matched submission row, keyed by the dump record id.
///
/// `image_name` stays empty until the image pipeline downloads the linked
/// media and writes the file name back, joining on `id`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Submission {
    #[serde(deserialize_with = "deserialize_flexible_id")]
    pub id: String,
    pub created: NaiveDate,
    pub author: String,
    pub title: String,
    pub body: String,
    pub score: i64,
    pub num_comments: i64,
    pub subreddit: String,
    pub subreddit_id: String,
    pub image_url: String,
    pub image_name: Option<String>,
    pub matched_query: String,
}
