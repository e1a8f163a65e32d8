use bson::{DateTime, oid::ObjectId};
use serde::{Deserialize, Serialize};

/// One answered question, persisted independently of the session record.
///
/// Keyed by `session_id` + 1-based `question_index`. Created once per
/// question, never mutated after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionResponse {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub session_id: String,
    pub question_index: u32,
    pub question: String,
    pub user_response: String,
    pub score: f64,
    #[serde(default)]
    pub feedback: String,
    #[serde(default)]
    pub time_taken_secs: i64,
    #[serde(default)]
    pub hints_used: u32,
    #[serde(default)]
    pub difficulty: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    pub created_at: DateTime,
}

impl QuestionResponse {
    pub const COLLECTION: &'static str = "question_responses";
}
