//! Sample questions used when generation is unavailable.

/// Ten fixed questions, lightly personalized by keyword checks.
///
/// Pure and deterministic: the same inputs always give the same list.
pub fn fallback_questions(resume_text: &str, job_description: &str) -> Vec<String> {
    let focus = if resume_text.contains("React") {
        "React development"
    } else {
        "web development"
    };
    let style = if job_description.contains("team") {
        "teamwork"
    } else {
        "independent work"
    };

    vec![
        format!("Tell me about your experience with {focus}."),
        format!("The job requires {style}. How do you approach this?"),
        "Describe a challenging project you worked on and how you overcame obstacles.".to_string(),
        "How do you stay updated with the latest technologies in your field?".to_string(),
        "Describe your experience with agile development methodologies.".to_string(),
        "How do you handle tight deadlines and prioritize tasks?".to_string(),
        "What is your approach to debugging and troubleshooting issues?".to_string(),
        "Tell me about a time you had to learn a new technology quickly.".to_string(),
        "How do you handle feedback and criticism?".to_string(),
        "What are your career goals for the next 3-5 years?".to_string(),
    ]
}
