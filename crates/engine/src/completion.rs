//! Completion coordinator: the single path through which a terminating
//! session — normal exhaustion, explicit end, forced stop or disconnect —
//! is enriched and persisted with consistent fields, exactly once.

use chrono::{DateTime, Utc};
use serde_json::json;
use tracing::{error, info, warn};

use intervue_db::models::{CompletionMethod, InterviewMode, Question};
use intervue_services::llm::LlmClient;
use intervue_services::store::{CompletionWrite, InterviewStore, NewSession};

use crate::enrich::{self, QaRound};

/// Everything the coordinator needs from a terminating session. Sessions
/// assemble this snapshot and then stop mutating themselves.
pub struct CompletionContext {
    pub session_id: String,
    pub user_id: String,
    pub mode: InterviewMode,
    pub topics: Vec<String>,
    pub total_questions: u32,
    pub start_time: DateTime<Utc>,
    pub scores: Vec<f64>,
    pub enrichment: EnrichmentInput,
}

pub enum EnrichmentInput {
    Conversational {
        conversation: Vec<QaRound>,
        resume_text: Option<String>,
    },
    Technical {
        questions: Vec<Question>,
    },
}

/// Enriches and persists the final record. Returns the `final_results`
/// payload (also sent to the client). Persistence failures are logged with
/// full context and never propagate: the client is told the interview ended
/// even when the durable write was lost.
///
/// Pass `llm: None` on paths where nobody is waiting for quality (e.g.
/// disconnect) to get the deterministic enrichment fallback without an LLM
/// round-trip.
pub async fn finalize(
    llm: Option<&dyn LlmClient>,
    store: &dyn InterviewStore,
    ctx: CompletionContext,
    method: CompletionMethod,
) -> serde_json::Value {
    let end_time = Utc::now();
    let duration_secs = (end_time - ctx.start_time).num_seconds().max(0);
    let completed_questions = ctx.scores.len() as u32;
    let average_score = if ctx.scores.is_empty() {
        0.0
    } else {
        ctx.scores.iter().sum::<f64>() / ctx.scores.len() as f64
    };

    let mut results = match &ctx.enrichment {
        EnrichmentInput::Conversational {
            conversation,
            resume_text,
        } => {
            let mut summary = enrich::enrich_resume_results(
                llm,
                conversation,
                &ctx.scores,
                average_score,
                duration_secs,
                resume_text.as_deref(),
            )
            .await;
            summary.evaluation_metadata.completion_method = method.as_str().to_string();
            serde_json::to_value(summary).unwrap_or_else(|_| json!({}))
        }
        EnrichmentInput::Technical { questions } => {
            let completed = &questions[..(ctx.scores.len().min(questions.len()))];
            let mut summary = enrich::enrich_technical_results(
                llm,
                completed,
                &ctx.scores,
                average_score,
                duration_secs,
                &ctx.topics,
            )
            .await;
            summary.evaluation_metadata.completion_method = method.as_str().to_string();
            serde_json::to_value(summary).unwrap_or_else(|_| json!({}))
        }
    };

    if let Some(map) = results.as_object_mut() {
        map.insert("session_id".to_string(), json!(&ctx.session_id));
        map.insert("topics".to_string(), json!(&ctx.topics));
        map.insert("total_questions".to_string(), json!(ctx.total_questions));
        map.insert(
            "completed_questions".to_string(),
            json!(completed_questions),
        );
        map.insert("average_score".to_string(), json!(average_score));
        map.insert("individual_scores".to_string(), json!(&ctx.scores));
        map.insert("duration_secs".to_string(), json!(duration_secs));
    }

    let write = CompletionWrite {
        session_id: ctx.session_id.clone(),
        end_time,
        duration_secs,
        completed_questions,
        average_score,
        individual_scores: ctx.scores.clone(),
        final_results: results.clone(),
        completion_method: method,
    };

    persist(store, &ctx, write).await;

    results
}

async fn persist(store: &dyn InterviewStore, ctx: &CompletionContext, write: CompletionWrite) {
    let session_id = write.session_id.clone();

    match store.complete_session(write.clone()).await {
        Ok(true) => {
            info!(
                %session_id,
                method = write.completion_method.as_str(),
                completed_questions = write.completed_questions,
                average_score = write.average_score,
                "Interview completion recorded"
            );
        }
        Ok(false) => {
            // Either a faster termination path already completed the session,
            // or the initial record was never created (e.g. a forced stop
            // before init finished). Only the latter gets a degraded write.
            match store.session_exists(&session_id).await {
                Ok(true) => {
                    info!(%session_id, "Session already completed, completion write is a no-op");
                }
                Ok(false) => {
                    warn!(%session_id, "No session record found, creating one for completion");
                    if let Err(e) = store
                        .create_session(NewSession {
                            session_id: session_id.clone(),
                            user_id: ctx.user_id.clone(),
                            interview_type: ctx.mode,
                            topics: ctx.topics.clone(),
                            total_questions: ctx.total_questions,
                            start_time: ctx.start_time,
                        })
                        .await
                    {
                        error!(%session_id, %e, "Degraded session create failed");
                        return;
                    }
                    match store.complete_session(write).await {
                        Ok(true) => info!(%session_id, "Degraded completion write succeeded"),
                        Ok(false) => warn!(%session_id, "Degraded completion write lost the race"),
                        Err(e) => {
                            error!(%session_id, %e, "Degraded completion write failed");
                        }
                    }
                }
                Err(e) => {
                    error!(%session_id, %e, "Could not verify session record for completion");
                }
            }
        }
        Err(e) => {
            // Log enough to reconstruct the record from logs; the client
            // still receives its termination message.
            error!(
                %session_id,
                %e,
                completed_questions = write.completed_questions,
                average_score = write.average_score,
                scores = ?write.individual_scores,
                "Interview completion write failed"
            );
        }
    }
}
