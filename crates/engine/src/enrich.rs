//! Converts a completed session's raw scores and transcripts into the
//! structured, recruiter-facing summary persisted as `final_results`.
//!
//! Both enrichment functions are total: every required key is present in
//! the returned summary whether the LLM produced it, omitted it, or the
//! call failed outright, because callers persist the summary as the single
//! source of truth.

use serde::{Deserialize, Serialize};
use tracing::warn;

use intervue_db::models::Question;
use intervue_services::llm::{GenerationRequest, LlmClient, parse_llm_json};

const RESUME_RISK_FLAGS: &[&str] = &[
    "vague_explanations",
    "resume_overclaim",
    "shallow_examples",
    "low_impact_work",
];

const TECHNICAL_RISK_FLAGS: &[&str] = &[
    "over_reliance_on_hints",
    "weak_fundamentals",
    "copy_pattern_solutions",
    "poor_time_management",
];

/// One question/answer round, as fed to the enrichment prompt.
#[derive(Debug, Clone, Serialize)]
pub struct QaRound {
    pub question: String,
    pub answer: String,
    pub evaluation: String,
    /// 10-point scale in the prompt context.
    pub score: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResumeSummary {
    #[serde(default = "resume_type")]
    pub interview_type: String,
    #[serde(default)]
    pub interview_summary: ResumeInterviewSummary,
    #[serde(default = "default_strengths")]
    pub strengths: Vec<String>,
    #[serde(default = "default_improvements")]
    pub areas_for_improvement: Vec<String>,
    #[serde(default)]
    pub skill_signal_map: ResumeSkillMap,
    #[serde(default)]
    pub resume_alignment: ResumeAlignment,
    #[serde(default)]
    pub risk_flags: Vec<String>,
    #[serde(default)]
    pub evaluation_metadata: EvaluationMetadata,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResumeInterviewSummary {
    #[serde(default = "default_assessment")]
    pub overall_assessment: String,
    #[serde(default = "default_recommendation")]
    pub hire_recommendation: String,
    #[serde(default = "default_confidence")]
    pub confidence_level: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResumeSkillMap {
    #[serde(default = "mid_signal")]
    pub communication: u8,
    #[serde(default = "mid_signal")]
    pub clarity_of_thought: u8,
    #[serde(default = "mid_signal")]
    pub domain_knowledge: u8,
    #[serde(default = "mid_signal")]
    pub ownership: u8,
    #[serde(default = "mid_signal")]
    pub learning_ability: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResumeAlignment {
    #[serde(default)]
    pub verified_skills: Vec<String>,
    #[serde(default)]
    pub weak_or_unverified_skills: Vec<String>,
    #[serde(default = "default_confidence")]
    pub consistency_level: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TechnicalSummary {
    #[serde(default = "technical_type")]
    pub interview_type: String,
    #[serde(default)]
    pub interview_summary: TechnicalInterviewSummary,
    #[serde(default = "default_strengths")]
    pub strengths: Vec<String>,
    #[serde(default = "default_improvements")]
    pub areas_for_improvement: Vec<String>,
    #[serde(default)]
    pub technical_signal_breakdown: TechnicalSignalBreakdown,
    #[serde(default)]
    pub skill_signal_map: TechnicalSkillMap,
    #[serde(default)]
    pub risk_flags: Vec<String>,
    #[serde(default)]
    pub evaluation_metadata: EvaluationMetadata,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TechnicalInterviewSummary {
    #[serde(default = "default_assessment")]
    pub overall_assessment: String,
    #[serde(default = "default_quality")]
    pub problem_solving_quality: String,
    #[serde(default = "default_confidence")]
    pub coding_confidence: String,
    #[serde(default = "default_recommendation")]
    pub hire_recommendation: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TechnicalSignalBreakdown {
    #[serde(default = "default_trend")]
    pub correctness_trend: String,
    #[serde(default = "default_confidence")]
    pub hint_dependency: String,
    #[serde(default = "default_quality")]
    pub debugging_ability: String,
    #[serde(default = "default_quality")]
    pub optimization_awareness: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TechnicalSkillMap {
    #[serde(default = "mid_signal")]
    pub problem_solving: u8,
    #[serde(default = "mid_signal")]
    pub data_structures: u8,
    #[serde(default = "mid_signal")]
    pub algorithms: u8,
    #[serde(default = "mid_signal")]
    pub code_clarity: u8,
    #[serde(default = "mid_signal")]
    pub communication: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationMetadata {
    #[serde(default = "default_model")]
    pub evaluation_model: String,
    #[serde(default = "default_method")]
    pub scoring_method: String,
    #[serde(default = "default_completion")]
    pub completion_method: String,
    #[serde(default)]
    pub signals_used: Vec<String>,
}

fn resume_type() -> String {
    "resume".to_string()
}
fn technical_type() -> String {
    "technical".to_string()
}
fn default_assessment() -> String {
    "Assessment not available".to_string()
}
fn default_recommendation() -> String {
    "borderline".to_string()
}
fn default_confidence() -> String {
    "medium".to_string()
}
fn default_quality() -> String {
    "average".to_string()
}
fn default_trend() -> String {
    "consistent".to_string()
}
fn default_model() -> String {
    "llm".to_string()
}
fn default_method() -> String {
    "rubric_v1".to_string()
}
fn default_completion() -> String {
    "automatic".to_string()
}
fn mid_signal() -> u8 {
    5
}
fn default_strengths() -> Vec<String> {
    vec![
        "Communication skills".to_string(),
        "Technical knowledge".to_string(),
    ]
}
fn default_improvements() -> Vec<String> {
    vec!["Provide more specific examples".to_string()]
}

impl Default for ResumeInterviewSummary {
    fn default() -> Self {
        Self {
            overall_assessment: default_assessment(),
            hire_recommendation: default_recommendation(),
            confidence_level: default_confidence(),
        }
    }
}

impl Default for ResumeSkillMap {
    fn default() -> Self {
        Self {
            communication: 5,
            clarity_of_thought: 5,
            domain_knowledge: 5,
            ownership: 5,
            learning_ability: 5,
        }
    }
}

impl Default for ResumeAlignment {
    fn default() -> Self {
        Self {
            verified_skills: Vec::new(),
            weak_or_unverified_skills: Vec::new(),
            consistency_level: default_confidence(),
        }
    }
}

impl Default for TechnicalInterviewSummary {
    fn default() -> Self {
        Self {
            overall_assessment: default_assessment(),
            problem_solving_quality: default_quality(),
            coding_confidence: default_confidence(),
            hire_recommendation: default_recommendation(),
        }
    }
}

impl Default for TechnicalSignalBreakdown {
    fn default() -> Self {
        Self {
            correctness_trend: default_trend(),
            hint_dependency: default_confidence(),
            debugging_ability: default_quality(),
            optimization_awareness: default_quality(),
        }
    }
}

impl Default for TechnicalSkillMap {
    fn default() -> Self {
        Self {
            problem_solving: 5,
            data_structures: 5,
            algorithms: 5,
            code_clarity: 5,
            communication: 5,
        }
    }
}

impl Default for EvaluationMetadata {
    fn default() -> Self {
        Self {
            evaluation_model: default_model(),
            scoring_method: default_method(),
            completion_method: default_completion(),
            signals_used: Vec::new(),
        }
    }
}

/// Enriches a conversational (resume/topics) interview. Never fails.
pub async fn enrich_resume_results(
    llm: Option<&dyn LlmClient>,
    conversation: &[QaRound],
    individual_scores: &[f64],
    average_score: f64,
    duration_secs: i64,
    resume_text: Option<&str>,
) -> ResumeSummary {
    if let Some(llm) = llm {
        let prompt = resume_prompt(
            conversation,
            individual_scores,
            average_score,
            duration_secs,
            resume_text,
        );
        let request = GenerationRequest::new(prompt)
            .with_temperature(0.3)
            .with_max_tokens(2000);

        match llm.generate(request).await {
            Ok(raw) => match parse_llm_json::<ResumeSummary>(&raw) {
                Ok(mut summary) => {
                    summary.interview_type = resume_type();
                    clamp_resume_signals(&mut summary.skill_signal_map);
                    summary
                        .risk_flags
                        .retain(|flag| RESUME_RISK_FLAGS.contains(&flag.as_str()));
                    return summary;
                }
                Err(e) => warn!(%e, "Unparseable resume enrichment reply, using fallback"),
            },
            Err(e) => warn!(%e, "Resume enrichment LLM call failed, using fallback"),
        }
    }

    fallback_resume_summary(conversation.len(), average_score)
}

/// Enriches a technical interview. Never fails.
pub async fn enrich_technical_results(
    llm: Option<&dyn LlmClient>,
    questions: &[Question],
    scores: &[f64],
    average_score: f64,
    duration_secs: i64,
    topics: &[String],
) -> TechnicalSummary {
    if let Some(llm) = llm {
        let prompt = technical_prompt(questions, scores, average_score, duration_secs, topics);
        let request = GenerationRequest::new(prompt)
            .with_temperature(0.3)
            .with_max_tokens(2000);

        match llm.generate(request).await {
            Ok(raw) => match parse_llm_json::<TechnicalSummary>(&raw) {
                Ok(mut summary) => {
                    summary.interview_type = technical_type();
                    clamp_technical_signals(&mut summary.skill_signal_map);
                    summary
                        .risk_flags
                        .retain(|flag| TECHNICAL_RISK_FLAGS.contains(&flag.as_str()));
                    return summary;
                }
                Err(e) => warn!(%e, "Unparseable technical enrichment reply, using fallback"),
            },
            Err(e) => warn!(%e, "Technical enrichment LLM call failed, using fallback"),
        }
    }

    fallback_technical_summary(questions.len(), average_score, topics)
}

/// Deterministic summary synthesized purely from the numeric average.
pub fn fallback_resume_summary(questions_answered: usize, average_score: f64) -> ResumeSummary {
    ResumeSummary {
        interview_type: resume_type(),
        interview_summary: ResumeInterviewSummary {
            overall_assessment: format!(
                "Resume interview completed with {questions_answered} questions answered. \
                 Average score: {average_score:.1}/100."
            ),
            hire_recommendation: recommendation_for(average_score),
            confidence_level: default_confidence(),
        },
        strengths: vec![
            "Completed interview".to_string(),
            "Provided responses".to_string(),
        ],
        areas_for_improvement: vec!["Detailed evaluation requires LLM".to_string()],
        skill_signal_map: ResumeSkillMap {
            communication: signal_for(average_score),
            clarity_of_thought: signal_for(average_score),
            domain_knowledge: signal_for(average_score),
            ownership: signal_for(average_score),
            learning_ability: signal_for(average_score),
        },
        resume_alignment: ResumeAlignment::default(),
        risk_flags: Vec::new(),
        evaluation_metadata: EvaluationMetadata {
            evaluation_model: "fallback".to_string(),
            scoring_method: default_method(),
            completion_method: default_completion(),
            signals_used: vec!["question_scores".to_string()],
        },
    }
}

pub fn fallback_technical_summary(
    questions_answered: usize,
    average_score: f64,
    topics: &[String],
) -> TechnicalSummary {
    TechnicalSummary {
        interview_type: technical_type(),
        interview_summary: TechnicalInterviewSummary {
            overall_assessment: format!(
                "Technical interview on {} completed with {questions_answered} questions. \
                 Average score: {average_score:.1}/100.",
                topics.join(", ")
            ),
            problem_solving_quality: if average_score >= 75.0 {
                "strong"
            } else if average_score >= 50.0 {
                "average"
            } else {
                "weak"
            }
            .to_string(),
            coding_confidence: if average_score >= 75.0 {
                "high"
            } else if average_score >= 50.0 {
                "medium"
            } else {
                "low"
            }
            .to_string(),
            hire_recommendation: recommendation_for(average_score),
        },
        strengths: vec![
            "Completed coding interview".to_string(),
            "Submitted solutions".to_string(),
        ],
        areas_for_improvement: vec!["Detailed evaluation requires LLM".to_string()],
        technical_signal_breakdown: TechnicalSignalBreakdown::default(),
        skill_signal_map: TechnicalSkillMap {
            problem_solving: signal_for(average_score),
            data_structures: signal_for(average_score),
            algorithms: signal_for(average_score),
            code_clarity: signal_for(average_score),
            communication: signal_for(average_score),
        },
        risk_flags: Vec::new(),
        evaluation_metadata: EvaluationMetadata {
            evaluation_model: "fallback".to_string(),
            scoring_method: default_method(),
            completion_method: default_completion(),
            signals_used: vec![
                "question_scores".to_string(),
                "code_submission".to_string(),
            ],
        },
    }
}

fn recommendation_for(average_score: f64) -> String {
    if average_score >= 70.0 {
        "yes"
    } else if average_score >= 50.0 {
        "borderline"
    } else {
        "no"
    }
    .to_string()
}

fn signal_for(average_score: f64) -> u8 {
    (average_score / 10.0).clamp(0.0, 10.0) as u8
}

fn clamp_resume_signals(map: &mut ResumeSkillMap) {
    for v in [
        &mut map.communication,
        &mut map.clarity_of_thought,
        &mut map.domain_knowledge,
        &mut map.ownership,
        &mut map.learning_ability,
    ] {
        *v = (*v).min(10);
    }
}

fn clamp_technical_signals(map: &mut TechnicalSkillMap) {
    for v in [
        &mut map.problem_solving,
        &mut map.data_structures,
        &mut map.algorithms,
        &mut map.code_clarity,
        &mut map.communication,
    ] {
        *v = (*v).min(10);
    }
}

fn resume_prompt(
    conversation: &[QaRound],
    individual_scores: &[f64],
    average_score: f64,
    duration_secs: i64,
    resume_text: Option<&str>,
) -> String {
    let mut conversation_text = String::new();
    for (i, round) in conversation.iter().enumerate() {
        conversation_text.push_str(&format!(
            "\n--- Round {} ---\nQuestion: {}\nCandidate Response: {}\nEvaluation: {}\nScore: {}/10\n",
            i + 1,
            round.question,
            round.answer,
            round.evaluation,
            round.score,
        ));
    }

    let resume_context = resume_text
        .map(|text| {
            let snippet: String = text.chars().take(1000).collect();
            format!("Resume Context: {snippet}")
        })
        .unwrap_or_default();

    format!(
        r#"You are an expert technical recruiter analyzing a resume-based interview. Generate a comprehensive, structured evaluation in JSON format.

INTERVIEW DATA:
Duration: {duration_secs} seconds
Average Score: {average_score:.1}/100
Individual Scores: {individual_scores:?}
Total Questions: {total}

{conversation_text}

{resume_context}

Generate a JSON response with this EXACT structure (no additional text, ONLY valid JSON):

{{
  "interview_type": "resume",
  "interview_summary": {{
    "overall_assessment": "2-3 sentence summary of candidate performance",
    "hire_recommendation": "strong_yes|yes|borderline|no",
    "confidence_level": "low|medium|high"
  }},
  "strengths": ["Specific strength 1", "Specific strength 2"],
  "areas_for_improvement": ["Specific area 1", "Specific area 2"],
  "skill_signal_map": {{
    "communication": 7,
    "clarity_of_thought": 8,
    "domain_knowledge": 6,
    "ownership": 7,
    "learning_ability": 8
  }},
  "resume_alignment": {{
    "verified_skills": ["skill1", "skill2"],
    "weak_or_unverified_skills": ["skill3"],
    "consistency_level": "high|medium|low"
  }},
  "risk_flags": ["ONLY include if observed: vague_explanations, resume_overclaim, shallow_examples, low_impact_work"],
  "evaluation_metadata": {{
    "evaluation_model": "llm",
    "scoring_method": "rubric_v1",
    "completion_method": "automatic",
    "signals_used": ["question_scores", "feedback_text", "time_taken"]
  }}
}}

IMPORTANT:
- skill_signal_map values must be 0-10 integers
- hire_recommendation must be one of: strong_yes, yes, borderline, no
- Only include risk_flags that were actually observed
- Return ONLY valid JSON, no markdown formatting or explanatory text"#,
        total = conversation.len(),
    )
}

fn technical_prompt(
    questions: &[Question],
    scores: &[f64],
    average_score: f64,
    duration_secs: i64,
    topics: &[String],
) -> String {
    let mut summary = format!(
        "Topics: {}\nDuration: {duration_secs} seconds\nAverage Score: {average_score:.1}/100\nTotal Questions: {}\n",
        topics.join(", "),
        questions.len(),
    );

    for (i, (question, score)) in questions.iter().zip(scores.iter()).enumerate() {
        let text: String = question.text.chars().take(200).collect();
        summary.push_str(&format!(
            "\n--- Question {} ---\nQuestion: {}\nDifficulty: {}\nScore: {}/100\n",
            i + 1,
            text,
            question.difficulty.as_str(),
            score,
        ));
    }

    format!(
        r#"You are an expert technical interviewer analyzing a coding interview. Generate a comprehensive, structured evaluation in JSON format.

INTERVIEW DATA:
{summary}

Generate a JSON response with this EXACT structure (no additional text, ONLY valid JSON):

{{
  "interview_type": "technical",
  "interview_summary": {{
    "overall_assessment": "2-3 sentence summary of technical performance",
    "problem_solving_quality": "strong|average|weak",
    "coding_confidence": "low|medium|high",
    "hire_recommendation": "strong_yes|yes|borderline|no"
  }},
  "strengths": ["Specific technical strength 1", "Specific technical strength 2"],
  "areas_for_improvement": ["Specific area 1", "Specific area 2"],
  "technical_signal_breakdown": {{
    "correctness_trend": "improving|consistent|declining",
    "hint_dependency": "low|medium|high",
    "debugging_ability": "strong|average|weak",
    "optimization_awareness": "strong|average|weak"
  }},
  "skill_signal_map": {{
    "problem_solving": 7,
    "data_structures": 8,
    "algorithms": 6,
    "code_clarity": 7,
    "communication": 8
  }},
  "risk_flags": ["ONLY include if observed: over_reliance_on_hints, weak_fundamentals, copy_pattern_solutions, poor_time_management"],
  "evaluation_metadata": {{
    "evaluation_model": "llm",
    "scoring_method": "rubric_v1",
    "completion_method": "automatic",
    "signals_used": ["question_scores", "code_submission", "hints_used", "time_taken"]
  }}
}}

IMPORTANT:
- skill_signal_map values must be 0-10 integers
- hire_recommendation must be one of: strong_yes, yes, borderline, no
- Only include risk_flags that were actually observed
- Return ONLY valid JSON, no markdown formatting or explanatory text"#,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fallback_summary_has_every_required_key() {
        // Total-ness with no LLM at all.
        let summary = enrich_resume_results(None, &[], &[], 0.0, 0, None).await;
        let value = serde_json::to_value(&summary).unwrap();
        for key in [
            "interview_type",
            "interview_summary",
            "strengths",
            "areas_for_improvement",
            "skill_signal_map",
            "resume_alignment",
            "risk_flags",
            "evaluation_metadata",
        ] {
            assert!(value.get(key).is_some(), "missing {key}");
        }
        assert_eq!(value["interview_summary"]["hire_recommendation"], "no");
    }

    #[test]
    fn partial_llm_reply_is_backfilled() {
        // Only some fields present: defaults fill the rest.
        let summary: ResumeSummary = parse_llm_json(
            r#"{"strengths": ["Clear communicator"], "skill_signal_map": {"communication": 9}}"#,
        )
        .unwrap();
        assert_eq!(summary.strengths, vec!["Clear communicator"]);
        assert_eq!(summary.skill_signal_map.communication, 9);
        assert_eq!(summary.skill_signal_map.ownership, 5);
        assert_eq!(summary.interview_summary.hire_recommendation, "borderline");
    }

    #[test]
    fn recommendation_thresholds() {
        assert_eq!(recommendation_for(85.0), "yes");
        assert_eq!(recommendation_for(70.0), "yes");
        assert_eq!(recommendation_for(55.0), "borderline");
        assert_eq!(recommendation_for(30.0), "no");
    }

    #[test]
    fn signal_scales_average_into_zero_to_ten() {
        assert_eq!(signal_for(0.0), 0);
        assert_eq!(signal_for(55.0), 5);
        assert_eq!(signal_for(100.0), 10);
        assert_eq!(signal_for(1000.0), 10);
    }

    #[tokio::test]
    async fn technical_fallback_grades_quality_bands() {
        let topics = vec!["Graphs".to_string()];
        let strong = fallback_technical_summary(4, 80.0, &topics);
        assert_eq!(strong.interview_summary.problem_solving_quality, "strong");
        assert_eq!(strong.interview_summary.coding_confidence, "high");

        let weak = fallback_technical_summary(1, 20.0, &topics);
        assert_eq!(weak.interview_summary.problem_solving_quality, "weak");
        assert_eq!(weak.interview_summary.hire_recommendation, "no");
    }
}
