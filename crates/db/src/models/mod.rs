mod interview;
mod question;
mod response;

pub use interview::{CompletionMethod, InterviewMode, InterviewSession};
pub use question::{Difficulty, Question, TestCase};
pub use response::QuestionResponse;
