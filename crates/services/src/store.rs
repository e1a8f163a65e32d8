use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::warn;

use intervue_db::models::{CompletionMethod, InterviewMode};

use crate::dao::base::DaoError;
use crate::dao::interview::InterviewDao;
use crate::dao::response::QuestionResponseDao;

/// Fields needed to create the initial session record.
#[derive(Debug, Clone)]
pub struct NewSession {
    pub session_id: String,
    pub user_id: String,
    pub interview_type: InterviewMode,
    pub topics: Vec<String>,
    pub total_questions: u32,
    pub start_time: DateTime<Utc>,
}

/// Fields needed to persist one answered question.
#[derive(Debug, Clone)]
pub struct NewQuestionResponse {
    pub session_id: String,
    /// 1-based, matching the read side.
    pub question_index: u32,
    pub question: String,
    pub user_response: String,
    pub score: f64,
    pub feedback: String,
    pub time_taken_secs: i64,
    pub hints_used: u32,
    pub difficulty: String,
    pub language: Option<String>,
}

/// The terminal write. Consistent across all four termination paths.
#[derive(Debug, Clone)]
pub struct CompletionWrite {
    pub session_id: String,
    pub end_time: DateTime<Utc>,
    pub duration_secs: i64,
    pub completed_questions: u32,
    pub average_score: f64,
    pub individual_scores: Vec<f64>,
    pub final_results: serde_json::Value,
    pub completion_method: CompletionMethod,
}

/// Persistence capability consumed by the session engine. Keyed entirely by
/// `session_id`/`user_id`; implementations must tolerate concurrent writes
/// to distinct sessions.
#[async_trait]
pub trait InterviewStore: Send + Sync {
    async fn create_session(&self, session: NewSession) -> Result<(), DaoError>;

    async fn session_exists(&self, session_id: &str) -> Result<bool, DaoError>;

    async fn update_progress(
        &self,
        session_id: &str,
        current_question_index: u32,
        completed_questions: u32,
        individual_scores: &[f64],
        average_score: f64,
    ) -> Result<(), DaoError>;

    async fn update_total_questions(&self, session_id: &str, total: u32) -> Result<(), DaoError>;

    async fn store_question_response(
        &self,
        response: NewQuestionResponse,
    ) -> Result<(), DaoError>;

    /// Conditional terminal write. Returns `true` when this call set the
    /// completion fields, `false` when the session was already completed (or
    /// has no record). At most one call per session ever returns `true`.
    async fn complete_session(&self, write: CompletionWrite) -> Result<bool, DaoError>;
}

/// MongoDB-backed store, composing the interview and question-response DAOs.
pub struct MongoInterviewStore {
    interviews: Arc<InterviewDao>,
    responses: Arc<QuestionResponseDao>,
}

impl MongoInterviewStore {
    pub fn new(interviews: Arc<InterviewDao>, responses: Arc<QuestionResponseDao>) -> Self {
        Self {
            interviews,
            responses,
        }
    }
}

#[async_trait]
impl InterviewStore for MongoInterviewStore {
    async fn create_session(&self, session: NewSession) -> Result<(), DaoError> {
        self.interviews
            .create(
                session.session_id,
                session.user_id,
                session.interview_type,
                session.topics,
                session.total_questions,
                bson::DateTime::from_chrono(session.start_time),
            )
            .await?;
        Ok(())
    }

    async fn session_exists(&self, session_id: &str) -> Result<bool, DaoError> {
        match self.interviews.find_by_session_id(session_id).await {
            Ok(_) => Ok(true),
            Err(DaoError::NotFound) => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn update_progress(
        &self,
        session_id: &str,
        current_question_index: u32,
        completed_questions: u32,
        individual_scores: &[f64],
        average_score: f64,
    ) -> Result<(), DaoError> {
        self.interviews
            .update_progress(
                session_id,
                current_question_index,
                completed_questions,
                individual_scores,
                average_score,
            )
            .await?;
        Ok(())
    }

    async fn update_total_questions(&self, session_id: &str, total: u32) -> Result<(), DaoError> {
        self.interviews
            .update_total_questions(session_id, total)
            .await?;
        Ok(())
    }

    async fn store_question_response(
        &self,
        response: NewQuestionResponse,
    ) -> Result<(), DaoError> {
        self.responses
            .store(
                response.session_id,
                response.question_index,
                response.question,
                response.user_response,
                response.score,
                response.feedback,
                response.time_taken_secs,
                response.hints_used,
                response.difficulty,
                response.language,
            )
            .await
    }

    async fn complete_session(&self, write: CompletionWrite) -> Result<bool, DaoError> {
        let final_results = bson::to_document(&write.final_results).unwrap_or_else(|e| {
            warn!(session_id = %write.session_id, %e, "final_results not representable as BSON, storing empty document");
            bson::Document::new()
        });

        self.interviews
            .complete(
                &write.session_id,
                bson::DateTime::from_chrono(write.end_time),
                write.duration_secs,
                write.completed_questions,
                write.average_score,
                &write.individual_scores,
                final_results,
                write.completion_method,
            )
            .await
    }
}
