use bson::{DateTime, oid::ObjectId};
use serde::{Deserialize, Serialize};

/// One end-to-end interview attempt, from initialization to completion.
///
/// `session_id` is the external correlation key: the WebSocket protocol, the
/// question-response sub-records and the read-side API all address sessions
/// by it, never by `_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterviewSession {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub session_id: String,
    pub user_id: String,
    pub interview_type: InterviewMode,
    #[serde(default)]
    pub topics: Vec<String>,
    #[serde(default)]
    pub total_questions: u32,
    #[serde(default)]
    pub current_question_index: u32,
    #[serde(default)]
    pub completed_questions: u32,
    #[serde(default)]
    pub individual_scores: Vec<f64>,
    #[serde(default)]
    pub average_score: f64,
    pub start_time: DateTime,
    /// Null until a terminal transition occurs; set together with
    /// `completion_method`, exactly once.
    pub end_time: Option<DateTime>,
    #[serde(default)]
    pub duration_secs: i64,
    pub completion_method: Option<CompletionMethod>,
    /// Enriched recruiter-facing summary, written once at completion.
    pub final_results: Option<bson::Document>,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

impl InterviewSession {
    pub const COLLECTION: &'static str = "interviews";

    pub fn is_completed(&self) -> bool {
        self.completion_method.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterviewMode {
    Topics,
    Resume,
    Technical,
}

impl InterviewMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            InterviewMode::Topics => "topics",
            InterviewMode::Resume => "resume",
            InterviewMode::Technical => "technical",
        }
    }
}

/// How a session ended. Recorded at the terminal transition and never
/// overwritten afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionMethod {
    Automatic,
    ManuallyEnded,
    TimeoutCleanup,
    ForceStopped,
    Disconnected,
}

impl CompletionMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            CompletionMethod::Automatic => "automatic",
            CompletionMethod::ManuallyEnded => "manually_ended",
            CompletionMethod::TimeoutCleanup => "timeout_cleanup",
            CompletionMethod::ForceStopped => "force_stopped",
            CompletionMethod::Disconnected => "disconnected",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn completion_method_serializes_snake_case() {
        let json = serde_json::to_string(&CompletionMethod::ManuallyEnded).unwrap();
        assert_eq!(json, "\"manually_ended\"");
        let back: CompletionMethod = serde_json::from_str("\"force_stopped\"").unwrap();
        assert_eq!(back, CompletionMethod::ForceStopped);
    }

    #[test]
    fn mode_round_trips() {
        for mode in [
            InterviewMode::Topics,
            InterviewMode::Resume,
            InterviewMode::Technical,
        ] {
            let json = serde_json::to_string(&mode).unwrap();
            assert_eq!(json, format!("\"{}\"", mode.as_str()));
        }
    }
}
