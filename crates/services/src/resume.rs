use dashmap::DashMap;
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum ResumeError {
    #[error("failed to extract text: {0}")]
    Extraction(String),
    #[error("extracted text is empty")]
    EmptyText,
}

/// Opaque document-to-text capability for uploaded resumes.
pub trait TextExtractor: Send + Sync {
    fn extract_text(&self, bytes: &[u8]) -> Result<String, ResumeError>;
}

/// Treats the upload as UTF-8 text (plain-text and markdown resumes).
/// Binary formats plug in behind the same trait at construction time.
pub struct Utf8TextExtractor;

impl TextExtractor for Utf8TextExtractor {
    fn extract_text(&self, bytes: &[u8]) -> Result<String, ResumeError> {
        let text = String::from_utf8(bytes.to_vec())
            .map_err(|e| ResumeError::Extraction(e.to_string()))?;
        if text.trim().is_empty() {
            return Err(ResumeError::EmptyText);
        }
        Ok(text)
    }
}

/// In-memory store of extracted resume texts, keyed by the `resume_id`
/// handed back to the frontend. Uploads are referenced by at most one
/// interview session shortly after upload, so process-local storage is the
/// intended durability level.
#[derive(Default)]
pub struct ResumeStore {
    texts: DashMap<String, String>,
}

impl ResumeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, text: String) -> String {
        let resume_id = Uuid::new_v4().to_string();
        self.texts.insert(resume_id.clone(), text);
        resume_id
    }

    pub fn get(&self, resume_id: &str) -> Option<String> {
        self.texts.get(resume_id).map(|entry| entry.value().clone())
    }
}
