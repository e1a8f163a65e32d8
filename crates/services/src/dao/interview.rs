use bson::{DateTime, doc};
use mongodb::Database;

use intervue_db::models::{CompletionMethod, InterviewMode, InterviewSession};

use super::base::{BaseDao, DaoError, DaoResult, PaginationParams};

pub struct InterviewDao {
    pub base: BaseDao<InterviewSession>,
}

impl InterviewDao {
    pub fn new(db: &Database) -> Self {
        Self {
            base: BaseDao::new(db, InterviewSession::COLLECTION),
        }
    }

    pub async fn create(
        &self,
        session_id: String,
        user_id: String,
        interview_type: InterviewMode,
        topics: Vec<String>,
        total_questions: u32,
        start_time: DateTime,
    ) -> DaoResult<InterviewSession> {
        let now = DateTime::now();
        let session = InterviewSession {
            id: None,
            session_id,
            user_id,
            interview_type,
            topics,
            total_questions,
            current_question_index: 0,
            completed_questions: 0,
            individual_scores: Vec::new(),
            average_score: 0.0,
            start_time,
            end_time: None,
            duration_secs: 0,
            completion_method: None,
            final_results: None,
            created_at: now,
            updated_at: now,
        };

        let id = self.base.insert_one(&session).await?;
        self.base.find_by_id(id).await
    }

    pub async fn find_by_session_id(&self, session_id: &str) -> DaoResult<InterviewSession> {
        self.base
            .find_one(doc! { "session_id": session_id })
            .await?
            .ok_or(DaoError::NotFound)
    }

    /// Best-effort mid-interview progress write. Callers treat failures as
    /// non-fatal.
    pub async fn update_progress(
        &self,
        session_id: &str,
        current_question_index: u32,
        completed_questions: u32,
        individual_scores: &[f64],
        average_score: f64,
    ) -> DaoResult<bool> {
        self.base
            .update_one(
                doc! { "session_id": session_id },
                doc! {
                    "$set": {
                        "current_question_index": current_question_index,
                        "completed_questions": completed_questions,
                        "individual_scores": individual_scores.to_vec(),
                        "average_score": average_score,
                        "updated_at": DateTime::now(),
                    }
                },
            )
            .await
    }

    pub async fn update_total_questions(&self, session_id: &str, total: u32) -> DaoResult<bool> {
        self.base
            .update_one(
                doc! { "session_id": session_id },
                doc! { "$set": { "total_questions": total, "updated_at": DateTime::now() } },
            )
            .await
    }

    /// Terminal write. The filter requires `completion_method` to still be
    /// unset, so whichever termination path runs first wins and every later
    /// attempt reports `false` without touching the record.
    pub async fn complete(
        &self,
        session_id: &str,
        end_time: DateTime,
        duration_secs: i64,
        completed_questions: u32,
        average_score: f64,
        individual_scores: &[f64],
        final_results: bson::Document,
        completion_method: CompletionMethod,
    ) -> DaoResult<bool> {
        self.base
            .update_one(
                doc! { "session_id": session_id, "completion_method": null },
                doc! {
                    "$set": {
                        "end_time": end_time,
                        "duration_secs": duration_secs,
                        "completed_questions": completed_questions,
                        "current_question_index": completed_questions,
                        "average_score": average_score,
                        "individual_scores": individual_scores.to_vec(),
                        "final_results": final_results,
                        "completion_method": completion_method.as_str(),
                        "updated_at": DateTime::now(),
                    }
                },
            )
            .await
    }

    pub async fn list_for_user(
        &self,
        user_id: &str,
        pagination: PaginationParams,
    ) -> DaoResult<Vec<InterviewSession>> {
        self.base
            .find_many(
                doc! { "user_id": user_id },
                doc! { "created_at": -1 },
                pagination,
            )
            .await
    }
}
