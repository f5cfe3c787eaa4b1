//! Security-adjacent settings for the HTTP surface.

use super::defaults::default_cors_origins;
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SecurityConfig {
    /// Comma-separated allowed CORS origins, or "*" for permissive.
    #[serde(default = "default_cors_origins")]
    pub cors_origins: String,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            cors_origins: default_cors_origins(),
        }
    }
}
