use anyhow::{Context, Result, bail};
use base64::Engine;
use chardetng::EncodingDetector;
use encoding_rs::{Encoding, UTF_16BE, UTF_16LE};

/// Decode bytes to string with auto-detected encoding.
/// Tries UTF-8 first (fast path), then uses chardetng for detection.
pub fn decode_bytes(bytes: &[u8]) -> String {
    // Fast path: valid UTF-8
    if let Ok(s) = std::str::from_utf8(bytes) {
        return s.to_string();
    }

    let mut detector = EncodingDetector::new();
    detector.feed(bytes, true);
    let encoding = detector.guess(None, true);

    let (decoded, _, _) = encoding.decode(bytes);
    decoded.into_owned()
}

/// Text encoding requested by a caller for reads and writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextEncoding {
    /// Nothing requested: UTF-8, falling back to charset detection.
    Auto,
    Utf8,
    Base64,
    Named(&'static Encoding),
}

impl TextEncoding {
    pub fn parse(label: Option<&str>) -> Result<Self> {
        let Some(label) = label.map(str::trim).filter(|l| !l.is_empty()) else {
            return Ok(Self::Auto);
        };
        match label.to_ascii_lowercase().as_str() {
            "utf8" | "utf-8" => Ok(Self::Utf8),
            "base64" => Ok(Self::Base64),
            other => match Encoding::for_label(other.as_bytes()) {
                Some(enc) if enc == encoding_rs::UTF_8 => Ok(Self::Utf8),
                Some(enc) => Ok(Self::Named(enc)),
                None => bail!("Unsupported encoding '{label}'"),
            },
        }
    }

    /// Name echoed back in responses.
    pub fn name(self) -> String {
        match self {
            Self::Auto | Self::Utf8 => "utf8".to_string(),
            Self::Base64 => "base64".to_string(),
            Self::Named(enc) => enc.name().to_ascii_lowercase(),
        }
    }

    pub fn decode(self, bytes: &[u8]) -> String {
        match self {
            Self::Auto => decode_bytes(bytes),
            Self::Utf8 => String::from_utf8_lossy(bytes).into_owned(),
            Self::Base64 => base64::engine::general_purpose::STANDARD.encode(bytes),
            Self::Named(enc) => enc.decode_without_bom_handling(bytes).0.into_owned(),
        }
    }

    pub fn encode(self, text: &str) -> Result<Vec<u8>> {
        match self {
            Self::Auto | Self::Utf8 => Ok(text.as_bytes().to_vec()),
            Self::Base64 => base64::engine::general_purpose::STANDARD
                .decode(text.trim().as_bytes())
                .context("Content is not valid base64"),
            // encoding_rs only encodes UTF-16 as UTF-8, so do it by hand.
            Self::Named(enc) if enc == UTF_16LE => {
                Ok(text.encode_utf16().flat_map(u16::to_le_bytes).collect())
            }
            Self::Named(enc) if enc == UTF_16BE => {
                Ok(text.encode_utf16().flat_map(u16::to_be_bytes).collect())
            }
            Self::Named(enc) => {
                let (bytes, _, had_errors) = enc.encode(text);
                if had_errors {
                    bail!("Content cannot be represented in {}", enc.name());
                }
                Ok(bytes.into_owned())
            }
        }
    }
}
