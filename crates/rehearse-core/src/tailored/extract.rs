//! Résumé intake: PDF validation and text extraction.

use crate::error::{Error, Result};
use crate::util::sanitize_file_name;

pub const PDF_MIME_TYPE: &str = "application/pdf";

const PDF_MAGIC: &[u8] = b"%PDF";

/// A validated résumé with its extracted text.
#[derive(Clone, PartialEq, Eq)]
pub struct ResumeDocument {
    pub file_name: String,
    pub bytes: Vec<u8>,
    pub text: String,
}

impl std::fmt::Debug for ResumeDocument {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("ResumeDocument")
            .field("file_name", &self.file_name)
            .field("bytes", &self.bytes.len())
            .field("text_chars", &self.text.chars().count())
            .finish()
    }
}

impl ResumeDocument {
    /// Validate the upload and extract its text.
    pub fn from_upload(
        file_name: impl Into<String>,
        content_type: Option<&str>,
        bytes: Vec<u8>,
    ) -> Result<Self> {
        let file_name = file_name.into();
        ensure_pdf(&file_name, content_type, &bytes)?;
        let text = extract_text(&bytes)?;
        Ok(Self {
            file_name,
            bytes,
            text,
        })
    }

    /// Object name used in storage: `<uuid>_<sanitized name>`.
    pub fn storage_name(&self, unique: &str) -> String {
        format!("{unique}_{}", sanitize_file_name(&self.file_name))
    }
}

/// Reject anything that is not a PDF by name, declared type, or content.
pub fn ensure_pdf(file_name: &str, content_type: Option<&str>, bytes: &[u8]) -> Result<()> {
    let declared_pdf = content_type.map_or_else(
        || {
            std::path::Path::new(file_name)
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"))
        },
        |content_type| {
            content_type
                .split(';')
                .next()
                .is_some_and(|mime| mime.trim().eq_ignore_ascii_case(PDF_MIME_TYPE))
        },
    );
    if !declared_pdf || !bytes.starts_with(PDF_MAGIC) {
        return Err(Error::InvalidInput("Please upload a PDF file only.".to_string()));
    }
    Ok(())
}

/// Extract readable text from PDF bytes.
pub fn extract_text(bytes: &[u8]) -> Result<String> {
    let text = pdf_extract::extract_text_from_mem(bytes)
        .map_err(|error| Error::InvalidInput(format!("Failed to extract text from PDF: {error}")))?;
    let text = text
        .lines()
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join("\n");
    let text = text.trim().to_string();
    if text.is_empty() {
        return Err(Error::InvalidInput(
            "The PDF contains no extractable text.".to_string(),
        ));
    }
    tracing::debug!("Extracted {} characters of résumé text", text.len());
    Ok(text)
}
