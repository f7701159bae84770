use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub server: ServerConfig,
    pub store: StoreConfig,
    pub limits: LimitsConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StoreConfig {
    pub endpoint: String,
    pub region: String,
    pub access_key_id: String,
    pub secret_access_key: String,
    pub path_style: bool,
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LimitsConfig {
    /// Combined file + folder cap for mixed delete/download requests.
    pub bulk_item_cap: usize,
    /// Cap for the flat multi-object zip download form.
    pub flat_key_cap: usize,
    /// Default presigned URL lifetime.
    pub presign_default_ttl_secs: u32,
    /// Bounded capacity of the archive byte channel, in chunks.
    pub archive_channel_capacity: usize,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Config {
            server: ServerConfig {
                host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: env::var("PORT")
                    .unwrap_or_else(|_| "8080".to_string())
                    .parse()?,
            },
            store: StoreConfig {
                endpoint: env::var("S3_ENDPOINT")
                    .unwrap_or_else(|_| "http://127.0.0.1:9000".to_string()),
                region: env::var("S3_REGION").unwrap_or_else(|_| "us-east-1".to_string()),
                access_key_id: env::var("S3_ACCESS_KEY_ID")
                    .unwrap_or_else(|_| "minioadmin".to_string()),
                secret_access_key: env::var("S3_SECRET_ACCESS_KEY")
                    .unwrap_or_else(|_| "minioadmin".to_string()),
                path_style: env::var("S3_PATH_STYLE")
                    .unwrap_or_else(|_| "true".to_string())
                    .parse()?,
                request_timeout_secs: env::var("S3_REQUEST_TIMEOUT_SECS")
                    .unwrap_or_else(|_| "60".to_string())
                    .parse()?,
            },
            limits: LimitsConfig {
                bulk_item_cap: env::var("BULK_ITEM_CAP")
                    .unwrap_or_else(|_| "50".to_string())
                    .parse()?,
                flat_key_cap: env::var("FLAT_KEY_CAP")
                    .unwrap_or_else(|_| "100".to_string())
                    .parse()?,
                presign_default_ttl_secs: env::var("PRESIGN_DEFAULT_TTL_SECS")
                    .unwrap_or_else(|_| "300".to_string())
                    .parse()?,
                archive_channel_capacity: env::var("ARCHIVE_CHANNEL_CAPACITY")
                    .unwrap_or_else(|_| "16".to_string())
                    .parse()?,
            },
        })
    }
}
