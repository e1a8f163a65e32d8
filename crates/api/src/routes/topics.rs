use axum::Json;

/// Subject tags offered by the frontend's topic picker. Kept in sync with
/// the question generator's canned fallback table.
pub const TOPIC_OPTIONS: &[&str] = &[
    "Arrays",
    "Strings",
    "Linked Lists",
    "Trees",
    "Graphs",
    "Dynamic Programming",
    "Sorting",
    "Binary Search",
];

pub async fn list() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "topics": TOPIC_OPTIONS }))
}
