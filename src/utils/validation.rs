use anyhow::{Result, anyhow};
use chrono::Utc;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use rand::Rng;
use std::path::Path;

/// The only file extension accepted by the upload store (compared case-insensitively)
pub const IFC_EXTENSION: &str = "ifc";

/// Longest identifier accepted by the retrieval endpoint
pub const MAX_IDENTIFIER_LEN: usize = 255;

/// Characters left untouched when a stored name is placed in a URL path segment
const PATH_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC.remove(b'.').remove(b'_').remove(b'-');

#[derive(Debug, Clone)]
pub struct ValidationError {
    pub code: &'static str,
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for ValidationError {}

/// Checks that the client-supplied file name carries an `.ifc` extension
pub fn validate_extension(filename: &str) -> Result<()> {
    let ext = Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("");

    if ext.eq_ignore_ascii_case(IFC_EXTENSION) {
        return Ok(());
    }

    Err(anyhow!(ValidationError {
        code: "INVALID_EXTENSION",
        message: format!("'{}' is not an IFC file", filename),
    }))
}

fn is_identifier_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-' | ' ')
}

/// Reduces an uploaded file name to something safe to embed in a stored name.
///
/// Only the final path component is kept and every character outside the
/// identifier alphabet becomes `_`, so the generated name always passes
/// [`validate_identifier`].
pub fn sanitize_original_name(filename: &str) -> String {
    let name = filename
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or("")
        .trim();

    if filename.contains("..") || filename.contains('/') || filename.contains('\\') {
        tracing::warn!("Path components stripped from uploaded name: {}", filename);
    }

    let sanitized: String = name
        .chars()
        .map(|c| if is_identifier_char(c) { c } else { '_' })
        .collect();

    let mut sanitized = sanitized.trim_start_matches('.').to_string();
    while sanitized.contains("..") {
        sanitized = sanitized.replace("..", ".");
    }

    // Leave room for the "<millis>-<random>-" prefix
    let budget = MAX_IDENTIFIER_LEN - 32;
    if sanitized.len() > budget {
        // ASCII only at this point, so any index is a char boundary
        sanitized[sanitized.len() - budget..].to_string()
    } else if sanitized.is_empty() {
        "model.ifc".to_string()
    } else {
        sanitized
    }
}

/// Builds the on-disk name `<unix-millis>-<random>-<original>` for a new upload
pub fn generate_stored_name(original_name: &str) -> String {
    let millis = Utc::now().timestamp_millis();
    let suffix: u32 = rand::thread_rng().gen_range(0..1_000_000_000);
    format!("{}-{}-{}", millis, suffix, sanitize_original_name(original_name))
}

/// Validates an opaque retrieval identifier before it is joined to the storage root
pub fn validate_identifier(id: &str) -> Result<()> {
    let reject = |message: &str| {
        Err(anyhow!(ValidationError {
            code: "INVALID_IDENTIFIER",
            message: message.to_string(),
        }))
    };

    if id.is_empty() || id.len() > MAX_IDENTIFIER_LEN {
        return reject("identifier length out of range");
    }
    if id.starts_with('.') || id.contains("..") {
        return reject("identifier must not reference parent or hidden entries");
    }
    if !id.chars().all(is_identifier_char) {
        return reject("identifier contains forbidden characters");
    }

    Ok(())
}

/// Relative URL under which a stored file is served
pub fn retrieval_url(stored_name: &str) -> String {
    format!(
        "/api/files/{}",
        utf8_percent_encode(stored_name, PATH_SEGMENT)
    )
}
