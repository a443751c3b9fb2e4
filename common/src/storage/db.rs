use std::ops::Deref;

use serde::Deserialize;
use surrealdb::{
    engine::any::{connect, Any},
    opt::auth::Root,
    Error, Surreal,
};
use tracing::info;

use crate::error::AppError;

use super::types::{deserialize_flexible_id, submission::Submission};

#[derive(Clone)]
pub struct SurrealDbClient {
    pub client: Surreal<Any>,
}

/// An `(id, image_url)` pair handed to the image download pipeline.
#[derive(Debug, Clone, Deserialize)]
pub struct ImageCandidate {
    #[serde(deserialize_with = "deserialize_flexible_id")]
    pub id: String,
    pub image_url: String,
}

/// Table name for one region: lowercased, with runs of anything outside
/// `[a-z0-9]` collapsed to `_`, so region names with spaces or punctuation
/// stay valid idents in interpolated statements.
pub fn region_table_name(region_name: &str) -> Result<String, AppError> {
    let mut table = String::with_capacity(region_name.len());
    for c in region_name.trim().chars() {
        if c.is_ascii_alphanumeric() {
            table.push(c.to_ascii_lowercase());
        } else if !table.is_empty() && !table.ends_with('_') {
            table.push('_');
        }
    }
    while table.ends_with('_') {
        table.pop();
    }

    if table.is_empty() {
        return Err(AppError::Validation(format!(
            "region name {region_name:?} yields no usable table name"
        )));
    }
    if table.starts_with(|c: char| c.is_ascii_digit()) {
        table.insert_str(0, "r_");
    }
    Ok(table)
}

impl SurrealDbClient {
    pub async fn new(
        address: &str,
        username: &str,
        password: &str,
        namespace: &str,
        database: &str,
    ) -> Result<Self, Error> {
        let db = connect(address).await?;

        // Sign in to database
        db.signin(Root { username, password }).await?;

        // Set namespace
        db.use_ns(namespace).use_db(database).await?;

        Ok(SurrealDbClient { client: db })
    }

    /// Idempotent per-region table provisioning; safe to call on every run.
    /// Record-id uniqueness gives the `id` primary key, so no extra index is
    /// needed.
    pub async fn ensure_region_table(&self, table: &str) -> Result<(), AppError> {
        self.client
            .query(format!("DEFINE TABLE IF NOT EXISTS {table} SCHEMALESS"))
            .await?
            .check()?;
        info!(table, "region table ready");
        Ok(())
    }

    /// Commits one batch as a single bulk insert. A duplicate record id makes
    /// the whole statement fail, which the caller treats as losing that batch.
    pub async fn insert_submissions(
        &self,
        table: &str,
        batch: Vec<Submission>,
    ) -> Result<usize, AppError> {
        let inserted: Vec<Submission> = self.client.insert(table).content(batch).await?;
        Ok(inserted.len())
    }

    pub async fn fetch_submissions(&self, table: &str) -> Result<Vec<Submission>, AppError> {
        Ok(self.client.select(table).await?)
    }

    /// Rows the image pipeline still wants to look at: every stored
    /// submission's id and source url.
    pub async fn image_candidates(&self, table: &str) -> Result<Vec<ImageCandidate>, AppError> {
        let mut response = self
            .client
            .query(format!("SELECT id, image_url FROM {table}"))
            .await?
            .check()?;
        Ok(response.take(0)?)
    }

    /// Records the downloaded file name for one submission; the image
    /// pipeline joins on `id` after the fact.
    pub async fn set_image_name(
        &self,
        table: &str,
        id: &str,
        image_name: &str,
    ) -> Result<(), AppError> {
        self.client
            .query(format!(
                "UPDATE type::thing('{table}', $id) SET image_name = $name"
            ))
            .bind(("id", id.to_owned()))
            .bind(("name", image_name.to_owned()))
            .await?
            .check()?;
        Ok(())
    }
}

impl Deref for SurrealDbClient {
    type Target = Surreal<Any>;

    fn deref(&self) -> &Self::Target {
        &self.client
    }
}

#[cfg(any(test, feature = "test-utils"))]
impl SurrealDbClient {
    /// Create an in-memory SurrealDB client for testing.
    pub async fn memory(namespace: &str, database: &str) -> Result<Self, Error> {
        let db = connect("mem://").await?;

        db.use_ns(namespace).use_db(database).await?;

        Ok(SurrealDbClient { client: db })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use uuid::Uuid;

    async fn memory_db() -> SurrealDbClient {
        SurrealDbClient::memory("test_ns", &Uuid::new_v4().to_string())
            .await
            .expect("Failed to start in-memory surrealdb")
    }

    fn submission(id: &str, matched_query: &str) -> Submission {
        Submission {
            id: id.to_string(),
            created: NaiveDate::from_ymd_opt(2023, 11, 14).expect("valid date"),
            author: "someone".to_string(),
            title: "Roma trip".to_string(),
            body: "first time in Roma".to_string(),
            score: 41,
            num_comments: 7,
            subreddit: "travel".to_string(),
            subreddit_id: "t5_2qh1q".to_string(),
            image_url: "https://i.redd.it/abc.jpg".to_string(),
            image_name: None,
            matched_query: matched_query.to_string(),
        }
    }

    #[test]
    fn table_names_are_sanitized() {
        assert_eq!(region_table_name("Italy").expect("valid"), "italy");
        assert_eq!(
            region_table_name("United States").expect("valid"),
            "united_states"
        );
        assert_eq!(
            region_table_name(" Bosnia & Herzegovina ").expect("valid"),
            "bosnia_herzegovina"
        );
        assert_eq!(region_table_name("1st Region").expect("valid"), "r_1st_region");
        assert!(region_table_name("???").is_err());
    }

    #[tokio::test]
    async fn ensure_region_table_is_idempotent() {
        let db = memory_db().await;

        db.ensure_region_table("italy")
            .await
            .expect("first provisioning should succeed");
        db.ensure_region_table("italy")
            .await
            .expect("second provisioning should be a no-op");
    }

    #[tokio::test]
    async fn inserted_submissions_read_back_identical() {
        let db = memory_db().await;
        db.ensure_region_table("italy").await.expect("table ready");

        let rows = vec![submission("a1", "roma"), submission("b2", "roma")];
        let inserted = db
            .insert_submissions("italy", rows.clone())
            .await
            .expect("batch should insert");
        assert_eq!(inserted, 2);

        let mut stored = db
            .fetch_submissions("italy")
            .await
            .expect("fetch should succeed");
        stored.sort_by(|a, b| a.id.cmp(&b.id));
        assert_eq!(stored, rows);
    }

    #[tokio::test]
    async fn duplicate_id_fails_the_batch() {
        let db = memory_db().await;
        db.ensure_region_table("italy").await.expect("table ready");

        db.insert_submissions("italy", vec![submission("a1", "roma")])
            .await
            .expect("first insert should succeed");

        let duplicate = db
            .insert_submissions("italy", vec![submission("a1", "milano")])
            .await;
        assert!(duplicate.is_err(), "duplicate id must surface as an error");

        let stored = db
            .fetch_submissions("italy")
            .await
            .expect("fetch should succeed");
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].matched_query, "roma");
    }

    #[tokio::test]
    async fn image_pipeline_interface_round_trips() {
        let db = memory_db().await;
        db.ensure_region_table("italy").await.expect("table ready");
        db.insert_submissions("italy", vec![submission("a1", "roma")])
            .await
            .expect("insert should succeed");

        let candidates = db
            .image_candidates("italy")
            .await
            .expect("candidate query should succeed");
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].id, "a1");
        assert_eq!(candidates[0].image_url, "https://i.redd.it/abc.jpg");

        db.set_image_name("italy", "a1", "a1.jpg")
            .await
            .expect("update should succeed");

        let stored = db
            .fetch_submissions("italy")
            .await
            .expect("fetch should succeed");
        assert_eq!(stored[0].image_name.as_deref(), Some("a1.jpg"));
    }
}
