use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Clone, Deserialize, Debug)]
pub struct AppConfig {
    pub surrealdb_address: String,
    pub surrealdb_username: String,
    pub surrealdb_password: String,
    pub surrealdb_namespace: String,
    pub surrealdb_database: String,
    #[serde(default = "default_dump_dir")]
    pub dump_dir: String,
    #[serde(default = "default_region_query_file")]
    pub region_query_file: String,
    #[serde(default = "default_insert_chunk_size")]
    pub insert_chunk_size: usize,
    #[serde(default = "default_decode_chunk_bytes")]
    pub decode_chunk_bytes: usize,
    #[serde(default = "default_decode_ceiling_bytes")]
    pub decode_ceiling_bytes: usize,
}

fn default_dump_dir() -> String {
    "./data".to_string()
}

fn default_region_query_file() -> String {
    "./data/region_query.csv".to_string()
}

fn default_insert_chunk_size() -> usize {
    1000
}

fn default_decode_chunk_bytes() -> usize {
    1 << 27
}

fn default_decode_ceiling_bytes() -> usize {
    1 << 30
}

pub fn get_config() -> Result<AppConfig, ConfigError> {
    let config = Config::builder()
        .add_source(File::with_name("config").required(false))
        .add_source(Environment::default())
        .build()?;

    config.try_deserialize()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_dump_layout() {
        let config: AppConfig = serde_json::from_value(serde_json::json!({
            "surrealdb_address": "ws://localhost:8000",
            "surrealdb_username": "root",
            "surrealdb_password": "root",
            "surrealdb_namespace": "dumps",
            "surrealdb_database": "submissions",
        }))
        .expect("minimal config should deserialize");

        assert_eq!(config.dump_dir, "./data");
        assert_eq!(config.insert_chunk_size, 1000);
        assert_eq!(config.decode_chunk_bytes, 1 << 27);
        assert_eq!(config.decode_ceiling_bytes, 1 << 30);
        assert!(config.decode_ceiling_bytes >= 2 * config.decode_chunk_bytes);
    }
}
