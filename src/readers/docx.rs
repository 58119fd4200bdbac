//! DOCX text extraction.

use anyhow::{Result, anyhow};
use docx_lite::extract_text_from_bytes;

/// Extract raw paragraph text from DOCX bytes.
pub fn docx_text(bytes: &[u8]) -> Result<String> {
    extract_text_from_bytes(bytes).map_err(|e| anyhow!("Cannot extract text from DOCX: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::readers::fixtures;

    #[test]
    fn paragraphs_are_extracted() {
        let text = docx_text(&fixtures::docx(&["First paragraph", "Second paragraph"])).unwrap();
        assert!(text.contains("First paragraph"), "{text}");
        assert!(text.contains("Second paragraph"), "{text}");
        let first = text.find("First").unwrap();
        let second = text.find("Second").unwrap();
        assert!(first < second);
    }

    #[test]
    fn non_zip_input_is_rejected() {
        let err = docx_text(b"plain text pretending").unwrap_err();
        assert!(err.to_string().starts_with("Cannot extract text from DOCX"));
    }
}
