//! Questions tailored to a résumé and a job description.

mod extract;
mod fallback;
mod flow;
mod llm;

pub use extract::{ensure_pdf, extract_text, ResumeDocument, PDF_MIME_TYPE};
pub use fallback::fallback_questions;
pub use flow::{
    generate_questions, GeneratedQuestions, QuestionSource, SaveState, TailoredFlow,
    TailoredQuestion, UploadedResume,
};
pub use llm::{
    parse_question_list, question_prompt, OpenAiClient, TextGenerator, OPENAI_MODEL,
    SYSTEM_PROMPT,
};
