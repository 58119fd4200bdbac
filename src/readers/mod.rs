//! Opaque decoders for binary document formats.

pub mod docx;
pub mod pdf;
pub mod sheet;
