use axum::{Json, extract::State};
use serde::Deserialize;
use tracing::warn;

use intervue_services::llm::{GenerationRequest, parse_llm_json};

use crate::{error::ApiError, extractors::auth::AuthUser, state::AppState};

use super::interview::InterviewView;

/// Aggregated candidate profile: stats, skill map, performance trend and a
/// strengths/improvements analysis (LLM-backed with a deterministic
/// fallback).
pub async fn get_profile(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<serde_json::Value>, ApiError> {
    let sessions = state
        .interviews
        .list_for_user(
            &auth.user_id,
            intervue_services::dao::base::PaginationParams {
                offset: 0,
                limit: 1000,
            },
        )
        .await?;
    let formatted: Vec<InterviewView> = sessions
        .iter()
        .map(super::interview::format_interview)
        .collect();

    let completed: Vec<&InterviewView> = formatted
        .iter()
        .filter(|i| i.status == "approved" || i.status == "rejected")
        .collect();

    if completed.is_empty() {
        return Ok(Json(empty_profile(&auth)));
    }

    let scores: Vec<f64> = completed
        .iter()
        .filter(|i| i.score > 0.0)
        .map(|i| i.score)
        .collect();
    let average_score = if scores.is_empty() {
        0.0
    } else {
        scores.iter().sum::<f64>() / scores.len() as f64
    };
    let highest_score = scores.iter().cloned().fold(0.0_f64, f64::max);
    let total_duration: i64 = completed.iter().map(|i| i.duration_seconds).sum();
    let total_questions: u32 = completed.iter().map(|i| i.questions_completed).sum();
    let expected_questions: u32 = completed.iter().map(|i| i.total_questions).sum();
    let completion_rate = if expected_questions > 0 {
        total_questions as f64 / expected_questions as f64 * 100.0
    } else {
        0.0
    };

    let skills = skill_map(&completed);
    let trend = performance_trend(&completed);

    // Recent scores, oldest first, for the trend chart.
    let mut by_date: Vec<&InterviewView> = completed.clone();
    by_date.sort_by(|a, b| a.date.cmp(&b.date));
    let recent: Vec<&InterviewView> = by_date.iter().rev().take(15).rev().cloned().collect();
    let recent_scores: Vec<f64> = recent.iter().map(|i| i.score).collect();
    let recent_dates: Vec<String> = recent.iter().map(|i| i.date.clone()).collect();

    let analysis = swot_analysis(
        &state,
        completed.len(),
        average_score,
        completion_rate,
        &trend,
        &skills,
    )
    .await;

    let trust_score = (completed.len() as f64 * 5.0
        + average_score * 0.3
        + completion_rate * 0.2
        + if trend == "improving" { 20.0 } else { 10.0 })
    .min(100.0)
    .round();

    let interview_list: Vec<&InterviewView> =
        by_date.iter().rev().take(50).cloned().collect();

    Ok(Json(serde_json::json!({
        "user": { "id": auth.user_id, "email": auth.email },
        "stats": {
            "total_interviews": completed.len(),
            "average_score": (average_score * 10.0).round() / 10.0,
            "highest_score": highest_score,
            "total_duration_hours": (total_duration as f64 / 3600.0 * 10.0).round() / 10.0,
            "total_questions": total_questions,
            "completion_rate": (completion_rate * 10.0).round() / 10.0,
        },
        "skills": skills,
        "performance": {
            "trend": trend,
            "recent_scores": recent_scores,
            "dates": recent_dates,
        },
        "interviews": interview_list,
        "strengths": &analysis.strengths,
        "improvements": &analysis.weaknesses,
        "swot_analysis": {
            "strengths": &analysis.strengths,
            "weaknesses": &analysis.weaknesses,
            "opportunities": &analysis.opportunities,
            "threats": &analysis.threats,
        },
        "trust_score": trust_score,
    })))
}

fn empty_profile(auth: &AuthUser) -> serde_json::Value {
    serde_json::json!({
        "user": { "id": &auth.user_id, "email": &auth.email },
        "stats": {
            "total_interviews": 0, "average_score": 0, "highest_score": 0,
            "total_duration_hours": 0, "total_questions": 0, "completion_rate": 0,
        },
        "skills": {
            "problem_solving": 0, "communication": 0, "code_quality": 0,
            "technical_depth": 0, "system_design": 0, "behavioral": 0,
        },
        "performance": { "trend": "stable", "recent_scores": [], "dates": [] },
        "interviews": [],
        "strengths": [],
        "improvements": [],
        "trust_score": 0,
    })
}

/// Weighted per-skill averages over the ten most recent completed
/// interviews. Weights mirror how strongly the overall score signals each
/// skill.
fn skill_map(completed: &[&InterviewView]) -> serde_json::Value {
    let mut by_date: Vec<&&InterviewView> = completed.iter().collect();
    by_date.sort_by(|a, b| b.date.cmp(&a.date));
    let recent: Vec<&&InterviewView> = by_date.into_iter().take(10).collect();

    if recent.is_empty() {
        return serde_json::json!({
            "problem_solving": 0, "communication": 0, "code_quality": 0,
            "technical_depth": 0, "system_design": 0, "behavioral": 0,
        });
    }

    let n = recent.len() as f64;
    let sum_weighted = |weight: f64| {
        let total: f64 = recent.iter().map(|i| i.score * weight).sum();
        (total / n * 10.0).round() / 10.0
    };

    serde_json::json!({
        "problem_solving": sum_weighted(1.0),
        "communication": sum_weighted(0.9),
        "code_quality": sum_weighted(0.85),
        "technical_depth": sum_weighted(0.95),
        "system_design": sum_weighted(0.8),
        "behavioral": sum_weighted(0.75),
    })
}

/// Compares the older and newer halves of the history; a 5-point average
/// swing either way counts as a trend.
fn performance_trend(completed: &[&InterviewView]) -> String {
    if completed.len() < 3 {
        return "stable".to_string();
    }

    let mut by_date: Vec<&&InterviewView> = completed.iter().collect();
    by_date.sort_by(|a, b| a.date.cmp(&b.date));

    let mid = by_date.len() / 2;
    let avg = |slice: &[&&InterviewView]| {
        if slice.is_empty() {
            0.0
        } else {
            slice.iter().map(|i| i.score).sum::<f64>() / slice.len() as f64
        }
    };
    let older = avg(&by_date[..mid]);
    let newer = avg(&by_date[mid..]);

    if newer > older + 5.0 {
        "improving".to_string()
    } else if newer < older - 5.0 {
        "declining".to_string()
    } else {
        "stable".to_string()
    }
}

#[derive(Debug, Deserialize)]
struct SwotAnalysis {
    #[serde(default)]
    strengths: Vec<String>,
    #[serde(default)]
    weaknesses: Vec<String>,
    #[serde(default)]
    opportunities: Vec<String>,
    #[serde(default)]
    threats: Vec<String>,
}

async fn swot_analysis(
    state: &AppState,
    total_interviews: usize,
    average_score: f64,
    completion_rate: f64,
    trend: &str,
    skills: &serde_json::Value,
) -> SwotAnalysis {
    if let Some(llm) = &state.llm {
        let prompt = format!(
            r#"You are an expert technical recruiter analyzing a candidate's interview performance data.

Overall Statistics:
- Total Interviews: {total_interviews}
- Average Score: {average_score:.1}%
- Completion Rate: {completion_rate:.1}%
- Performance Trend: {trend}

Skill Breakdown (0-100%):
{skills}

Provide a SWOT analysis as JSON with this structure (ONLY valid JSON, no markdown):
{{
  "strengths": ["strength 1", "strength 2"],
  "weaknesses": ["weakness 1", "weakness 2"],
  "opportunities": ["opportunity 1", "opportunity 2"],
  "threats": ["threat 1", "threat 2"]
}}

Be honest, specific, and actionable. Use the data points to support your analysis."#,
        );

        let request = GenerationRequest::new(prompt)
            .with_temperature(0.3)
            .with_max_tokens(1200);

        match llm.generate(request).await {
            Ok(raw) => match parse_llm_json::<SwotAnalysis>(&raw) {
                Ok(analysis) if !analysis.strengths.is_empty() => return analysis,
                Ok(_) => warn!("SWOT reply had no strengths, using deterministic analysis"),
                Err(e) => warn!(%e, "Unparseable SWOT reply, using deterministic analysis"),
            },
            Err(e) => warn!(%e, "SWOT LLM call failed, using deterministic analysis"),
        }
    }

    fallback_swot(average_score, completion_rate, trend)
}

fn fallback_swot(average_score: f64, completion_rate: f64, trend: &str) -> SwotAnalysis {
    let mut strengths = Vec::new();
    let mut weaknesses = Vec::new();

    if completion_rate >= 80.0 {
        strengths.push(format!("High completion rate ({completion_rate:.0}%)"));
    } else {
        weaknesses.push("Focus on completing more questions per interview".to_string());
    }
    if average_score >= 75.0 {
        strengths.push(format!(
            "Consistent high performance (avg {average_score:.0}%)"
        ));
    } else {
        weaknesses.push(format!(
            "Raise the average score (currently {average_score:.0}%)"
        ));
    }
    if trend == "improving" {
        strengths.push("Demonstrating continuous improvement".to_string());
    }

    if strengths.is_empty() {
        strengths = vec![
            "Active interview participant".to_string(),
            "Building technical interview experience".to_string(),
        ];
    }
    if weaknesses.is_empty() {
        weaknesses = vec!["Continue practicing to build consistency".to_string()];
    }

    SwotAnalysis {
        strengths,
        weaknesses,
        opportunities: vec![
            "Expand technical skill range".to_string(),
            "Seek real-world project experience".to_string(),
        ],
        threats: vec![
            "Rapidly evolving technology landscape".to_string(),
            "Competitive job market".to_string(),
        ],
    }
}
