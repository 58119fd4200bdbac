use anyhow::{Context, Result};

/// Extract the text layer of a PDF held in memory.
pub fn pdf_text(bytes: &[u8]) -> Result<String> {
    pdf_extract::extract_text_from_mem(bytes).context(
        "Cannot extract text from PDF. The file may be corrupted, encrypted, or contain only images.",
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::readers::fixtures;

    #[test]
    fn text_layer_is_extracted() {
        let text = pdf_text(&fixtures::pdf("Hello PDF")).unwrap();
        assert!(text.contains("Hello"), "{text:?}");
    }

    #[test]
    fn garbage_is_rejected() {
        let err = pdf_text(b"%PDF-1.4\nnot really").unwrap_err();
        assert!(err.to_string().starts_with("Cannot extract text from PDF"));
    }
}
