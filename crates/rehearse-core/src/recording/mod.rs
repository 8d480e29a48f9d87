//! Practice recording: question bank, capture device seam, and the submit flow.

mod device;
mod flow;
mod questions;

pub use device::{Capture, MediaDevice, Recording, RECORDING_MIME_TYPE};
pub use flow::{RecordingFlow, RecordingStage};
pub use questions::{random_question, QuestionType, BEHAVIORAL_QUESTIONS, TECHNICAL_QUESTIONS};
