//! Code submission evaluation: boilerplate short-circuit, LLM correctness
//! classification, deterministic deductions.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use intervue_db::models::Question;
use intervue_services::llm::{GenerationRequest, LlmClient, parse_llm_json};

/// Code fragments that only appear in unmodified starter templates.
const BOILERPLATE_MARKERS: &[&str] = &[
    "# Write your solution here",
    "// Write your solution here",
    "Your code here",
    "pass\n\nif __name__",
    "function solution() {\n    // Your code here\n}",
    "public void solution() {\n        \n    }",
    "void solution() {\n        \n    }",
];

const MIN_MEANINGFUL_LINES: usize = 5;

/// The LLM's (or fallback heuristic's) classification of a submission's
/// logical correctness, used as the scoring base.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CorrectnessTier {
    FullyCorrect,
    MostlyCorrect,
    PartiallyCorrect,
    Incorrect,
}

impl CorrectnessTier {
    pub fn base_score(&self) -> u32 {
        match self {
            CorrectnessTier::FullyCorrect => 100,
            CorrectnessTier::MostlyCorrect => 75,
            CorrectnessTier::PartiallyCorrect => 60,
            CorrectnessTier::Incorrect => 30,
        }
    }

    /// A passing attempt is never zeroed out by deductions; a genuine
    /// attempt never drops below 30.
    pub fn score_floor(&self) -> u32 {
        match self {
            CorrectnessTier::FullyCorrect | CorrectnessTier::MostlyCorrect => 60,
            CorrectnessTier::PartiallyCorrect | CorrectnessTier::Incorrect => 30,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CorrectnessTier::FullyCorrect => "fully_correct",
            CorrectnessTier::MostlyCorrect => "mostly_correct",
            CorrectnessTier::PartiallyCorrect => "partially_correct",
            CorrectnessTier::Incorrect => "incorrect",
        }
    }
}

/// Per-question interaction counts feeding the deduction formula.
#[derive(Debug, Clone, Copy, Default)]
pub struct SubmissionSignals {
    pub hints_used: u32,
    pub discussion_turns: u32,
    pub clarification_questions: u32,
    pub approach_discussed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationDetail {
    pub technical_correctness: String,
    pub feedback: String,
    #[serde(default)]
    pub correctness_reason: String,
    #[serde(default)]
    pub edge_cases_handled: Vec<String>,
    #[serde(default)]
    pub areas_for_improvement: Vec<String>,
    #[serde(default)]
    pub final_score: u32,
    #[serde(default)]
    pub base_score: u32,
    #[serde(default)]
    pub deductions: u32,
}

#[derive(Debug, Deserialize)]
struct LlmEvaluationReply {
    technical_correctness: String,
    #[serde(default)]
    feedback: String,
    #[serde(default)]
    correctness_reason: String,
    #[serde(default)]
    edge_cases_handled: Vec<String>,
    #[serde(default)]
    areas_for_improvement: Vec<String>,
}

/// Evaluates a technical-mode code submission. Total: every failure path
/// resolves to a deterministic score.
pub async fn evaluate_submission(
    llm: Option<&dyn LlmClient>,
    question: &Question,
    code: &str,
    language: &str,
    time_spent_ms: u64,
    signals: SubmissionSignals,
) -> (u32, EvaluationDetail) {
    // Boilerplate short-circuits before any LLM call.
    if is_boilerplate(code) {
        debug!("Boilerplate submission, scoring 0 without evaluation");
        return (0, boilerplate_detail());
    }

    let tier = match classify_with_llm(llm, question, code, language, time_spent_ms, &signals)
        .await
    {
        Some((tier, reply)) => {
            let (score, deductions) = apply_deductions(tier, &signals);
            let detail = EvaluationDetail {
                technical_correctness: tier.as_str().to_string(),
                feedback: reply.feedback,
                correctness_reason: reply.correctness_reason,
                edge_cases_handled: reply.edge_cases_handled,
                areas_for_improvement: reply.areas_for_improvement,
                final_score: score,
                base_score: tier.base_score(),
                deductions,
            };
            return (score, detail);
        }
        None => heuristic_tier(code),
    };

    // Fallback path: heuristic tier, then the same deduction formula.
    let (score, deductions) = apply_deductions(tier, &signals);
    let detail = EvaluationDetail {
        technical_correctness: tier.as_str().to_string(),
        feedback: format!(
            "Heuristic evaluation (LLM unavailable): solution classified {}.",
            tier.as_str()
        ),
        correctness_reason: "Static code-shape heuristics".to_string(),
        edge_cases_handled: Vec::new(),
        areas_for_improvement: Vec::new(),
        final_score: score,
        base_score: tier.base_score(),
        deductions,
    };
    (score, detail)
}

/// Base score minus deterministic deductions, clamped to the tier's floor.
///
/// - −10 per hint used
/// - −5 per discussion turn, only when the solution is not fully correct
/// - −5 per clarification question beyond the first 2
pub fn apply_deductions(tier: CorrectnessTier, signals: &SubmissionSignals) -> (u32, u32) {
    let mut deductions = signals.hints_used * 10;

    if tier != CorrectnessTier::FullyCorrect {
        deductions += signals.discussion_turns * 5;
    }

    if signals.clarification_questions > 2 {
        deductions += (signals.clarification_questions - 2) * 5;
    }

    let score = tier
        .base_score()
        .saturating_sub(deductions)
        .clamp(tier.score_floor(), 100);

    (score, deductions)
}

/// A submission is boilerplate when it carries an unmodified template marker
/// or has fewer than 5 meaningful lines once comments and `pass`-only lines
/// are stripped.
pub fn is_boilerplate(code: &str) -> bool {
    for marker in BOILERPLATE_MARKERS {
        if code.contains(marker) {
            debug!(marker, "Template marker found");
            return true;
        }
    }

    let meaningful_lines = code
        .trim()
        .lines()
        .filter(|line| {
            let t = line.trim();
            !t.is_empty() && !t.starts_with('#') && !t.starts_with("//") && t != "pass"
        })
        .count();

    meaningful_lines < MIN_MEANINGFUL_LINES
}

fn boilerplate_detail() -> EvaluationDetail {
    EvaluationDetail {
        technical_correctness: "no_attempt".to_string(),
        feedback: "No solution submitted. The code is unchanged from the template. \
                   Please implement a solution to the problem."
            .to_string(),
        correctness_reason: "Code contains only boilerplate/template without any implementation"
            .to_string(),
        edge_cases_handled: Vec::new(),
        areas_for_improvement: vec![
            "Implement the solution".to_string(),
            "Follow the problem requirements".to_string(),
        ],
        final_score: 0,
        base_score: 0,
        deductions: 0,
    }
}

async fn classify_with_llm(
    llm: Option<&dyn LlmClient>,
    question: &Question,
    code: &str,
    language: &str,
    time_spent_ms: u64,
    signals: &SubmissionSignals,
) -> Option<(CorrectnessTier, LlmEvaluationReply)> {
    let llm = llm?;

    let prompt = format!(
        r#"Evaluate this code submission and respond with ONLY valid JSON (no markdown, no extra text).

Question: {question}
Candidate's Code ({language}):
{code}

Interview Context:
- Time spent: {time:.1}s
- Hints used: {hints}
- Discussion turns: {discussion}
- Clarification questions: {clarifications}
- Approach discussed: {approach}

You must classify the technical correctness into ONE of these levels:

1. "fully_correct": Logic is sound, handles edge cases, implementation is correct
2. "mostly_correct": Core logic correct but has minor bugs, syntax issues, or missed 1-2 edge cases
3. "partially_correct": A real attempt with some correct ideas but significant gaps
4. "incorrect": Wrong approach, fundamentally broken logic, or doesn't solve the problem

DO NOT assign a numerical score. Only evaluate the correctness level and provide feedback.

Respond exactly like this:
{{
    "technical_correctness": "fully_correct",
    "feedback": "Brief overall assessment of the solution",
    "correctness_reason": "Why this correctness level was assigned",
    "edge_cases_handled": ["edge case 1", "edge case 2"],
    "areas_for_improvement": ["improvement 1", "improvement 2"]
}}"#,
        question = question.text,
        language = language,
        code = code,
        time = time_spent_ms as f64 / 1000.0,
        hints = signals.hints_used,
        discussion = signals.discussion_turns,
        clarifications = signals.clarification_questions,
        approach = signals.approach_discussed,
    );

    let request = GenerationRequest::new(prompt)
        .with_system(
            "You are a technical interviewer. Always respond with valid JSON only. \
             Never use markdown formatting.",
        )
        .with_temperature(0.2)
        .with_max_tokens(400);

    let raw = match llm.generate(request).await {
        Ok(raw) => raw,
        Err(e) => {
            warn!(%e, "Code evaluation LLM call failed, falling back to heuristics");
            return None;
        }
    };

    let reply: LlmEvaluationReply = match parse_llm_json(&raw) {
        Ok(reply) => reply,
        Err(e) => {
            warn!(%e, "Unparseable evaluation reply, falling back to heuristics");
            return None;
        }
    };

    let tier = match reply.technical_correctness.as_str() {
        "fully_correct" => CorrectnessTier::FullyCorrect,
        "mostly_correct" => CorrectnessTier::MostlyCorrect,
        "partially_correct" => CorrectnessTier::PartiallyCorrect,
        "incorrect" => CorrectnessTier::Incorrect,
        other => {
            warn!(tier = other, "Unknown correctness tier, treating as partially_correct");
            CorrectnessTier::PartiallyCorrect
        }
    };

    Some((tier, reply))
}

/// Static code-shape estimate used when the LLM classification is
/// unavailable: function definition + control flow + minimum length.
fn heuristic_tier(code: &str) -> CorrectnessTier {
    let lower = code.to_lowercase();
    let has_function = code.contains("def ")
        || code.contains("function ")
        || code.contains("class ")
        || code.contains("fn ");
    let has_logic = ["if", "else", "for", "while", "return"]
        .iter()
        .any(|kw| lower.contains(kw));
    let has_structure = code.trim().len() > 50;

    if has_function && has_logic && has_structure {
        CorrectnessTier::MostlyCorrect
    } else if has_function || (has_logic && has_structure) {
        CorrectnessTier::PartiallyCorrect
    } else {
        CorrectnessTier::Incorrect
    }
}
