//! Question generation: LLM-backed with canned per-topic fallbacks, plus
//! batch building with duplicate rejection for technical sessions.

use std::collections::HashSet;
use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, warn};

use intervue_config::InterviewSettings;
use intervue_db::models::{Difficulty, Question, TestCase};
use intervue_services::llm::{GenerationRequest, LlmClient, parse_llm_json};

/// Two questions sharing more than this word-overlap ratio are considered
/// duplicates within a batch.
pub const DUPLICATE_THRESHOLD: f64 = 0.8;

const DELAY_BETWEEN_QUESTIONS: Duration = Duration::from_millis(300);
const DELAY_BEFORE_RETRY: Duration = Duration::from_millis(500);

#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("llm call failed: {0}")]
    Llm(#[from] intervue_services::llm::LlmError),
    #[error("reply was not a usable question: {0}")]
    BadReply(String),
}

#[derive(Debug, Deserialize)]
struct LlmQuestionReply {
    question: String,
    difficulty: Option<Difficulty>,
    #[serde(default)]
    topics: Vec<String>,
    #[serde(default)]
    hints: Vec<String>,
    #[serde(default)]
    test_cases: Vec<TestCase>,
    #[serde(default)]
    evaluation_criteria: Vec<String>,
}

/// Generates one question. Pure with respect to session state.
///
/// With no LLM configured this returns the canned per-topic question
/// directly; with an LLM it requests a JSON-shaped reply and treats a
/// missing/empty `question` field as a generation failure for the caller's
/// retry logic.
pub async fn generate_question(
    llm: Option<&dyn LlmClient>,
    topics: &[String],
    difficulty: Difficulty,
) -> Result<Question, GenerationError> {
    let Some(llm) = llm else {
        debug!("LLM unavailable, using canned question");
        return Ok(fallback_question(topics, difficulty));
    };

    let request = GenerationRequest::new(question_prompt(topics, difficulty))
        .with_system(
            "You are a technical interviewer. Always respond with valid JSON only. \
             Never use markdown formatting or extra text.",
        )
        .with_temperature(0.2)
        .with_max_tokens(800);

    let raw = llm.generate(request).await?;
    let reply: LlmQuestionReply =
        parse_llm_json(&raw).map_err(|e| GenerationError::BadReply(e.to_string()))?;

    if reply.question.trim().is_empty() {
        return Err(GenerationError::BadReply(
            "empty question text".to_string(),
        ));
    }

    Ok(Question {
        text: reply.question,
        difficulty: reply.difficulty.unwrap_or(difficulty),
        topics: if reply.topics.is_empty() {
            topics.to_vec()
        } else {
            reply.topics
        },
        hints: if reply.hints.is_empty() {
            default_hints()
        } else {
            reply.hints
        },
        test_cases: if reply.test_cases.is_empty() {
            default_test_cases()
        } else {
            reply.test_cases
        },
        evaluation_criteria: if reply.evaluation_criteria.is_empty() {
            default_criteria()
        } else {
            reply.evaluation_criteria
        },
    })
}

/// Builds the up-front question set for a technical session: one question
/// per difficulty step, duplicates regenerated within a bounded number of
/// attempts, a uniquely-worded fallback substituted when retries run dry.
pub async fn build_question_set(
    llm: Option<&dyn LlmClient>,
    topics: &[String],
    settings: &InterviewSettings,
) -> Vec<Question> {
    let mut questions: Vec<Question> = Vec::with_capacity(settings.question_count);
    let mut accepted_texts: Vec<String> = Vec::with_capacity(settings.question_count);

    for (number, difficulty) in Difficulty::PROGRESSION
        .iter()
        .cycle()
        .take(settings.question_count)
        .enumerate()
    {
        if number > 0 {
            // Spacing between generations to stay under provider rate limits.
            tokio::time::sleep(DELAY_BETWEEN_QUESTIONS).await;
        }

        let question =
            generate_unique(llm, topics, *difficulty, number, &accepted_texts, settings).await;
        accepted_texts.push(question.text.clone());
        questions.push(question);
    }

    debug!(
        count = questions.len(),
        difficulties = ?questions.iter().map(|q| q.difficulty).collect::<Vec<_>>(),
        "Question set generated"
    );
    questions
}

async fn generate_unique(
    llm: Option<&dyn LlmClient>,
    topics: &[String],
    difficulty: Difficulty,
    number: usize,
    accepted_texts: &[String],
    settings: &InterviewSettings,
) -> Question {
    for attempt in 0..settings.dedup_retries.max(1) {
        match generate_with_retries(llm, topics, difficulty, settings.generation_retries).await {
            Ok(question) => {
                let duplicate_of = accepted_texts
                    .iter()
                    .map(|t| similarity(t, &question.text))
                    .fold(0.0_f64, f64::max);

                if duplicate_of <= DUPLICATE_THRESHOLD {
                    return question;
                }
                warn!(
                    number,
                    attempt,
                    similarity = duplicate_of,
                    "Duplicate question detected, regenerating"
                );
                tokio::time::sleep(DELAY_BEFORE_RETRY).await;
            }
            Err(e) => {
                warn!(number, %e, "Question generation failed after retries, using fallback");
                break;
            }
        }
    }

    numbered_fallback(topics, difficulty, number + 1)
}

async fn generate_with_retries(
    llm: Option<&dyn LlmClient>,
    topics: &[String],
    difficulty: Difficulty,
    retries: usize,
) -> Result<Question, GenerationError> {
    let mut last_err = None;
    for attempt in 0..=retries {
        if attempt > 0 {
            tokio::time::sleep(DELAY_BEFORE_RETRY).await;
        }
        match generate_question(llm, topics, difficulty).await {
            Ok(question) => return Ok(question),
            Err(e) => {
                warn!(attempt, %e, "Question generation attempt failed");
                last_err = Some(e);
            }
        }
    }
    Err(last_err.expect("at least one attempt ran"))
}

/// Word-set overlap ratio in [0, 1]: shared words over the larger word set.
pub fn similarity(a: &str, b: &str) -> f64 {
    let words_a: HashSet<String> = a.to_lowercase().split_whitespace().map(String::from).collect();
    let words_b: HashSet<String> = b.to_lowercase().split_whitespace().map(String::from).collect();

    if words_a.is_empty() || words_b.is_empty() {
        return 0.0;
    }

    let overlap = words_a.intersection(&words_b).count();
    overlap as f64 / words_a.len().max(words_b.len()) as f64
}

fn question_prompt(topics: &[String], difficulty: Difficulty) -> String {
    let topics_str = topics.join(", ");
    format!(
        r#"Generate a SPECIFIC, DETAILED coding interview question as a JSON object.

Topics: {topics_str}
Difficulty: {difficulty}

CRITICAL REQUIREMENTS:
1. The question MUST be specific and detailed - NOT vague like "solve a problem related to X"
2. Include concrete examples with sample inputs and expected outputs
3. Clearly state what the function should do
4. For graph problems: specify directed/undirected, weighted/unweighted, what to return
5. For array problems: specify constraints, what to find/return
6. For string problems: specify exact requirements

BAD EXAMPLE (too vague): "Write a function to solve a hard problem related to Graphs"
GOOD EXAMPLE: "Given a directed weighted graph as an adjacency list, implement Dijkstra's algorithm to find the shortest path from a source node to all other nodes. Return a map from each node to its shortest distance."

Format your response exactly like this (no extra text, no markdown):

{{
    "question": "A SPECIFIC problem with clear requirements, constraints, and examples. Include sample input/output.",
    "difficulty": "{difficulty}",
    "topics": {topics_json},
    "hints": ["Helpful hint 1", "Helpful hint 2", "Helpful hint 3"],
    "test_cases": [{{"input": "sample input", "output": "expected output", "explanation": "test description"}}],
    "evaluation_criteria": ["Problem understanding and approach discussion", "Code correctness and implementation quality"]
}}"#,
        topics_str = topics_str,
        difficulty = difficulty.as_str(),
        topics_json = serde_json::to_string(topics).unwrap_or_else(|_| "[]".to_string()),
    )
}

/// Fixed per-topic questions used whenever the generation capability is
/// down. Keyed on the first requested topic; a generic prompt otherwise.
pub fn fallback_question(topics: &[String], difficulty: Difficulty) -> Question {
    let topic = topics.first().map(String::as_str).unwrap_or("Data Structures");

    let text = match topic {
        "Arrays" => "Given an array of integers, find the maximum sum of a contiguous subarray. Implement a solution and explain your approach.",
        "Strings" => "Given a string, find the longest substring without repeating characters. Explain your approach and implement the solution.",
        "Linked Lists" => "Reverse a singly linked list. Explain your approach, handle edge cases, and implement the solution.",
        "Trees" => "Given a binary tree, find its maximum depth. Explain your approach and implement the solution.",
        "Graphs" => "Given a directed graph, implement a function to detect if there is a cycle. Explain your approach using DFS or a similar algorithm.",
        "Dynamic Programming" => "Given an array of integers, find the length of the longest increasing subsequence. Explain your approach and implement the solution.",
        "Sorting" => "Implement merge sort. Explain the approach, time complexity, and implement the solution.",
        "Binary Search" => "Given a sorted array and a target value, implement binary search to find the index of the target. Explain edge cases.",
        other => {
            return Question {
                text: format!(
                    "Given a problem involving {other}, implement an efficient solution. \
                     Start by explaining your approach, discuss time/space complexity, then write the code."
                ),
                difficulty,
                topics: topics.to_vec(),
                hints: default_hints(),
                test_cases: default_test_cases(),
                evaluation_criteria: default_criteria(),
            };
        }
    };

    Question {
        text: text.to_string(),
        difficulty,
        topics: topics.to_vec(),
        hints: default_hints(),
        test_cases: default_test_cases(),
        evaluation_criteria: default_criteria(),
    }
}

/// Fallback with the question number and a difficulty-specific requirement
/// worked into the text, so two substituted fallbacks in the same batch
/// stay below the duplicate threshold.
fn numbered_fallback(topics: &[String], difficulty: Difficulty, number: usize) -> Question {
    let requirement = match difficulty {
        Difficulty::Easy => "Focus on a clean, correct implementation and walk through one example by hand.",
        Difficulty::Medium => "Aim for better than brute-force time complexity and state the complexity you achieve.",
        Difficulty::Hard => "Optimize both time and space, justify the trade-offs, and cover tricky edge cases.",
        Difficulty::VeryHard => "Design for very large inputs, argue correctness, and prove the complexity bounds.",
    };

    Question {
        text: format!(
            "Question {number}: Write a {}-level function related to {}. {requirement}",
            difficulty.as_str(),
            topics.join(", "),
        ),
        difficulty,
        topics: topics.to_vec(),
        hints: vec![
            "Think step by step".to_string(),
            "Consider edge cases".to_string(),
            "What's the time complexity?".to_string(),
        ],
        test_cases: default_test_cases(),
        evaluation_criteria: default_criteria(),
    }
}

fn default_hints() -> Vec<String> {
    vec![
        "Think about the data structures you need".to_string(),
        "Consider the time complexity".to_string(),
        "Don't forget edge cases".to_string(),
    ]
}

fn default_test_cases() -> Vec<TestCase> {
    vec![TestCase {
        input: "example".to_string(),
        output: "result".to_string(),
        explanation: "basic test case".to_string(),
    }]
}

fn default_criteria() -> Vec<String> {
    vec![
        "Problem approach".to_string(),
        "Code implementation".to_string(),
        "Edge cases".to_string(),
    ]
}

/// Generates a contextual hint for the current question. Total: falls back
/// to the question's pre-generated hint ladder, then to generic progressive
/// hints.
pub async fn generate_hint(
    llm: Option<&dyn LlmClient>,
    question: &Question,
    current_code: &str,
    language: &str,
    hints_already_used: u32,
) -> String {
    if let Some(llm) = llm {
        let prompt = format!(
            r#"You are helping a candidate in a technical interview. They've asked for a hint.

Question: {question}
Topics: {topics}
Hints used so far: {hints}

Current Code ({language}):
{code}

Provide a helpful but not overly revealing hint. The hint should:
- Guide them toward the right direction without giving away the solution
- Become more specific if they've used multiple hints already

Keep the hint to 1-2 sentences."#,
            question = question.text,
            topics = question.topics.join(", "),
            hints = hints_already_used,
            language = language,
            code = current_code,
        );

        let request = GenerationRequest::new(prompt)
            .with_temperature(0.6)
            .with_max_tokens(200);

        match llm.generate(request).await {
            Ok(hint) if !hint.trim().is_empty() => return hint.trim().to_string(),
            Ok(_) => warn!("Empty hint reply, using hint ladder"),
            Err(e) => warn!(%e, "Hint generation failed, using hint ladder"),
        }
    }

    hint_ladder(question, hints_already_used)
}

fn hint_ladder(question: &Question, hints_already_used: u32) -> String {
    if let Some(hint) = question.hints.get(hints_already_used as usize) {
        return hint.clone();
    }
    if let Some(last) = question.hints.last() {
        return last.clone();
    }

    match hints_already_used {
        0 => "Think about what data structure would be most efficient for this problem.",
        1 => "Consider the time complexity of your current approach. Can it be optimized?",
        _ => "Focus on the core algorithm. Try writing pseudocode first, then implement step by step.",
    }
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn similarity_of_identical_texts_is_one() {
        assert!((similarity("reverse a linked list", "reverse a linked list") - 1.0).abs() < 1e-9);
    }

    #[test]
    fn similarity_of_disjoint_texts_is_zero() {
        assert_eq!(similarity("reverse a list", "graph cycle detection"), 0.0);
    }

    #[test]
    fn similarity_handles_empty_input() {
        assert_eq!(similarity("", "anything"), 0.0);
    }

    #[test]
    fn similarity_is_symmetric_for_subset_overlap() {
        let a = "find the maximum depth of a binary tree";
        let b = "find the maximum depth of a binary tree quickly and explain it";
        let s1 = similarity(a, b);
        let s2 = similarity(b, a);
        assert!((s1 - s2).abs() < 1e-9);
        assert!(s1 > 0.5 && s1 < 1.0);
    }

    #[test]
    fn fallback_question_is_topic_specific() {
        let q = fallback_question(&["Graphs".to_string()], Difficulty::Hard);
        assert!(q.text.contains("cycle"));
        assert_eq!(q.difficulty, Difficulty::Hard);
        assert!(!q.hints.is_empty());
    }

    #[test]
    fn fallback_question_has_generic_variant() {
        let q = fallback_question(&["Bit Manipulation".to_string()], Difficulty::Easy);
        assert!(q.text.contains("Bit Manipulation"));
    }

    #[test]
    fn hint_ladder_walks_question_hints_then_sticks_to_last() {
        let q = fallback_question(&["Trees".to_string()], Difficulty::Medium);
        assert_eq!(hint_ladder(&q, 0), q.hints[0]);
        assert_eq!(hint_ladder(&q, 2), q.hints[2]);
        assert_eq!(hint_ladder(&q, 9), q.hints[2]);
    }

    #[tokio::test]
    async fn no_llm_yields_canned_question() {
        let q = generate_question(None, &["Arrays".to_string()], Difficulty::Medium)
            .await
            .unwrap();
        assert!(q.text.contains("contiguous subarray"));
    }
}
