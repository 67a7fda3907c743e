/// All database primary keys are PostgreSQL BIGSERIAL.
pub type DbId = i64;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Attribute values, populate specs, and filters cross the boundary as JSON.
pub type JsonMap = serde_json::Map<String, serde_json::Value>;
