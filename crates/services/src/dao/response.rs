use bson::{DateTime, doc};
use mongodb::Database;

use intervue_db::models::QuestionResponse;

use super::base::{BaseDao, DaoResult, PaginationParams};

pub struct QuestionResponseDao {
    pub base: BaseDao<QuestionResponse>,
}

impl QuestionResponseDao {
    pub fn new(db: &Database) -> Self {
        Self {
            base: BaseDao::new(db, QuestionResponse::COLLECTION),
        }
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn store(
        &self,
        session_id: String,
        question_index: u32,
        question: String,
        user_response: String,
        score: f64,
        feedback: String,
        time_taken_secs: i64,
        hints_used: u32,
        difficulty: String,
        language: Option<String>,
    ) -> DaoResult<()> {
        let response = QuestionResponse {
            id: None,
            session_id,
            question_index,
            question,
            user_response,
            score,
            feedback,
            time_taken_secs,
            hints_used,
            difficulty,
            language,
            created_at: DateTime::now(),
        };

        self.base.insert_one(&response).await?;
        Ok(())
    }

    pub async fn list_for_session(&self, session_id: &str) -> DaoResult<Vec<QuestionResponse>> {
        self.base
            .find_many(
                doc! { "session_id": session_id },
                doc! { "question_index": 1 },
                PaginationParams {
                    offset: 0,
                    limit: 200,
                },
            )
            .await
    }
}
