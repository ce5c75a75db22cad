use chrono::{DateTime, Utc};
use portcullis::Role;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub identity: String,
    pub secret: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    pub success: bool,
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub role: Role,
    pub identity: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetBlockedRequest {
    pub blocked: bool,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}
