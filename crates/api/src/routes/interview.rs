use axum::{
    Json,
    extract::{Path, Query, State},
    http::header,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};

use intervue_db::models::{CompletionMethod, InterviewSession};
use intervue_services::dao::base::{DaoError, PaginationParams};

use crate::{error::ApiError, extractors::auth::AuthUser, state::AppState};

/// Read-side projection of one interview record, shaped for the frontend.
#[derive(Debug, Clone, Serialize)]
pub struct InterviewView {
    pub id: String,
    #[serde(rename = "type")]
    pub interview_type: String,
    pub date: String,
    /// Minutes, rounded; `duration_seconds` carries the precise value.
    pub duration: i64,
    pub duration_seconds: i64,
    pub score: f64,
    pub status: String,
    pub topics: Vec<String>,
    pub questions_completed: u32,
    pub total_questions: u32,
    pub completion_method: Option<String>,
    pub individual_scores: Vec<f64>,
    pub start_time: String,
    pub end_time: Option<String>,
    pub final_results: serde_json::Value,
}

/// Status shown in listings and used to exclude in-progress sessions from
/// analytics: completion method first, then the 70-point approval bar.
pub fn derive_status(session: &InterviewSession) -> &'static str {
    match session.completion_method {
        None => "in_progress",
        Some(CompletionMethod::ManuallyEnded) => "manually_ended",
        Some(CompletionMethod::TimeoutCleanup) => "timeout",
        Some(_) => {
            if session.average_score >= 70.0 {
                "approved"
            } else {
                "rejected"
            }
        }
    }
}

pub fn format_interview(session: &InterviewSession) -> InterviewView {
    let duration_seconds = session.duration_secs;

    InterviewView {
        id: session.session_id.clone(),
        interview_type: session.interview_type.as_str().to_string(),
        date: session.created_at.to_chrono().to_rfc3339(),
        duration: if duration_seconds > 0 {
            (duration_seconds as f64 / 60.0).round() as i64
        } else {
            0
        },
        duration_seconds,
        score: session.average_score,
        status: derive_status(session).to_string(),
        topics: session.topics.clone(),
        questions_completed: session.completed_questions,
        total_questions: session.total_questions,
        completion_method: session.completion_method.map(|m| m.as_str().to_string()),
        individual_scores: session.individual_scores.clone(),
        start_time: session.start_time.to_chrono().to_rfc3339(),
        end_time: session.end_time.map(|t| t.to_chrono().to_rfc3339()),
        final_results: session
            .final_results
            .as_ref()
            .and_then(|doc| serde_json::to_value(doc).ok())
            .unwrap_or_else(|| serde_json::json!({})),
    }
}

#[derive(Debug, Deserialize)]
pub struct ListParams {
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_limit() -> i64 {
    50
}

pub async fn list(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(params): Query<ListParams>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let sessions = state
        .interviews
        .list_for_user(
            &auth.user_id,
            PaginationParams {
                offset: 0,
                limit: params.limit.clamp(1, 1000),
            },
        )
        .await?;

    let interviews: Vec<InterviewView> = sessions.iter().map(format_interview).collect();
    let total = interviews.len();
    Ok(Json(serde_json::json!({
        "interviews": interviews,
        "total": total,
    })))
}

pub async fn details(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(session_id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let session = owned_session(&state, &auth, &session_id).await?;
    let responses = state.responses.list_for_session(&session_id).await?;

    Ok(Json(serde_json::json!({
        "interview": format_interview(&session),
        "questions": responses,
    })))
}

pub async fn stats_overview(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<serde_json::Value>, ApiError> {
    let interviews = all_formatted(&state, &auth).await?;

    let total = interviews.len();
    if total == 0 {
        return Ok(Json(serde_json::json!({
            "total": 0, "approved": 0, "rejected": 0,
            "manually_ended": 0, "timeout": 0, "average_score": 0,
            "average_duration": 0, "total_questions_answered": 0,
            "completion_rate": 0,
        })));
    }

    let count_status = |status: &str| interviews.iter().filter(|i| i.status == status).count();

    let scores: Vec<f64> = interviews
        .iter()
        .filter(|i| i.score > 0.0)
        .map(|i| i.score)
        .collect();
    let average_score = if scores.is_empty() {
        0.0
    } else {
        (scores.iter().sum::<f64>() / scores.len() as f64).round()
    };

    let durations: Vec<i64> = interviews
        .iter()
        .filter(|i| i.duration > 0)
        .map(|i| i.duration)
        .collect();
    let average_duration = if durations.is_empty() {
        0
    } else {
        durations.iter().sum::<i64>() / durations.len() as i64
    };

    let answered: u32 = interviews.iter().map(|i| i.questions_completed).sum();
    let expected: u32 = interviews.iter().map(|i| i.total_questions).sum();
    let completion_rate = if expected > 0 {
        (answered as f64 / expected as f64 * 100.0).round()
    } else {
        0.0
    };

    Ok(Json(serde_json::json!({
        "total": total,
        "approved": count_status("approved"),
        "rejected": count_status("rejected"),
        "manually_ended": count_status("manually_ended"),
        "timeout": count_status("timeout"),
        "average_score": average_score,
        "average_duration": average_duration,
        "total_questions_answered": answered,
        "completion_rate": completion_rate,
    })))
}

pub async fn performance(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<serde_json::Value>, ApiError> {
    let interviews = all_formatted(&state, &auth).await?;

    if interviews.is_empty() {
        return Ok(Json(serde_json::json!({
            "topic_performance": [],
            "score_distribution": {},
            "improvement_trend": [],
            "consistency_score": 0,
        })));
    }

    // Per-topic averages over scored interviews.
    let mut topic_scores: std::collections::HashMap<String, Vec<f64>> =
        std::collections::HashMap::new();
    for interview in &interviews {
        if interview.score > 0.0 {
            for topic in &interview.topics {
                topic_scores
                    .entry(topic.clone())
                    .or_default()
                    .push(interview.score);
            }
        }
    }

    let mut topic_performance: Vec<serde_json::Value> = topic_scores
        .iter()
        .map(|(topic, scores)| {
            let avg = scores.iter().sum::<f64>() / scores.len() as f64;
            serde_json::json!({
                "topic": topic,
                "average_score": avg.round(),
                "attempts": scores.len(),
                "max_score": scores.iter().cloned().fold(f64::MIN, f64::max),
                "min_score": scores.iter().cloned().fold(f64::MAX, f64::min),
            })
        })
        .collect();
    topic_performance.sort_by(|a, b| {
        b["average_score"]
            .as_f64()
            .unwrap_or(0.0)
            .total_cmp(&a["average_score"].as_f64().unwrap_or(0.0))
    });

    // Fixed 20-point score buckets.
    let mut buckets = [0u32; 5];
    for interview in &interviews {
        let idx = match interview.score {
            s if s <= 20.0 => 0,
            s if s <= 40.0 => 1,
            s if s <= 60.0 => 2,
            s if s <= 80.0 => 3,
            _ => 4,
        };
        buckets[idx] += 1;
    }
    let score_distribution = serde_json::json!({
        "0-20": buckets[0], "21-40": buckets[1], "41-60": buckets[2],
        "61-80": buckets[3], "81-100": buckets[4],
    });

    // Last ten interviews, oldest first.
    let mut by_date = interviews.clone();
    by_date.sort_by(|a, b| a.date.cmp(&b.date));
    let improvement_trend: Vec<serde_json::Value> = by_date
        .iter()
        .rev()
        .take(10)
        .rev()
        .enumerate()
        .map(|(idx, i)| {
            serde_json::json!({
                "date": i.date,
                "score": i.score,
                "interview_number": idx + 1,
            })
        })
        .collect();

    let scores: Vec<f64> = interviews
        .iter()
        .filter(|i| i.score > 0.0)
        .map(|i| i.score)
        .collect();
    let consistency_score = if scores.len() > 1 {
        let mean = scores.iter().sum::<f64>() / scores.len() as f64;
        let variance =
            scores.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / scores.len() as f64;
        (100.0 - variance.sqrt()).round().max(0.0)
    } else {
        100.0
    };

    Ok(Json(serde_json::json!({
        "topic_performance": topic_performance,
        "score_distribution": score_distribution,
        "improvement_trend": improvement_trend,
        "consistency_score": consistency_score,
    })))
}

#[derive(Debug, Deserialize)]
pub struct ExportParams {
    #[serde(default = "default_format")]
    pub format: String,
    pub status: Option<String>,
}

fn default_format() -> String {
    "csv".to_string()
}

pub async fn export(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(params): Query<ExportParams>,
) -> Result<Response, ApiError> {
    let mut interviews = all_formatted(&state, &auth).await?;
    if let Some(status) = &params.status {
        interviews.retain(|i| &i.status == status);
    }

    match params.format.as_str() {
        "csv" => {
            let mut writer = csv::Writer::from_writer(Vec::new());
            writer
                .write_record([
                    "id",
                    "type",
                    "date",
                    "duration",
                    "score",
                    "status",
                    "questions_completed",
                    "total_questions",
                    "completion_method",
                ])
                .map_err(|e| ApiError::Internal(e.to_string()))?;

            for i in &interviews {
                writer
                    .write_record([
                        i.id.clone(),
                        i.interview_type.clone(),
                        i.date.clone(),
                        i.duration.to_string(),
                        i.score.to_string(),
                        i.status.clone(),
                        i.questions_completed.to_string(),
                        i.total_questions.to_string(),
                        i.completion_method.clone().unwrap_or_default(),
                    ])
                    .map_err(|e| ApiError::Internal(e.to_string()))?;
            }

            let bytes = writer
                .into_inner()
                .map_err(|e| ApiError::Internal(e.to_string()))?;

            Ok((
                [
                    (header::CONTENT_TYPE, "text/csv".to_string()),
                    (
                        header::CONTENT_DISPOSITION,
                        "attachment; filename=interviews.csv".to_string(),
                    ),
                ],
                bytes,
            )
                .into_response())
        }
        "json" => Ok((
            [(
                header::CONTENT_DISPOSITION,
                "attachment; filename=interviews.json".to_string(),
            )],
            Json(serde_json::json!({ "interviews": interviews })),
        )
            .into_response()),
        other => Err(ApiError::BadRequest(format!(
            "Unsupported export format: {other}"
        ))),
    }
}

async fn all_formatted(state: &AppState, auth: &AuthUser) -> Result<Vec<InterviewView>, ApiError> {
    let sessions = state
        .interviews
        .list_for_user(
            &auth.user_id,
            PaginationParams {
                offset: 0,
                limit: 1000,
            },
        )
        .await?;
    Ok(sessions.iter().map(format_interview).collect())
}

async fn owned_session(
    state: &AppState,
    auth: &AuthUser,
    session_id: &str,
) -> Result<InterviewSession, ApiError> {
    let session = state
        .interviews
        .find_by_session_id(session_id)
        .await
        .map_err(|e| match e {
            DaoError::NotFound => ApiError::NotFound("Interview not found".to_string()),
            other => other.into(),
        })?;

    if session.user_id != auth.user_id {
        // Don't leak which session ids exist.
        return Err(ApiError::NotFound("Interview not found".to_string()));
    }

    Ok(session)
}
