use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SettingRecord {
    pub key: String,
    pub value: Vec<u8>,
    pub updated_at: String,
}
