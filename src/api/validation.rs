use time::PrimitiveDateTime;

use crate::api::errors::ApiError;
use crate::core::time::parse_rfc3339_utc;
use crate::services::extraction::DocumentFormat;

/// Resolves the upload's format and checks it against the configured allow-list.
pub(crate) fn validate_document_upload(
    filename: &str,
    allowed_extensions: &[String],
) -> Result<DocumentFormat, ApiError> {
    let format = DocumentFormat::from_filename(filename)
        .map_err(|_| ApiError::BadRequest(format!("Unsupported file type: '{filename}'")))?;

    if !allowed_extensions.iter().any(|allowed| allowed == format.as_str()) {
        return Err(ApiError::BadRequest(format!(
            "File extension '{}' is not allowed",
            format.as_str()
        )));
    }

    Ok(format)
}

pub(crate) fn parse_timestamp_filter(
    field: &str,
    value: Option<&str>,
) -> Result<Option<PrimitiveDateTime>, ApiError> {
    match value.map(str::trim).filter(|raw| !raw.is_empty()) {
        None => Ok(None),
        Some(raw) => parse_rfc3339_utc(raw).map(Some).ok_or_else(|| {
            ApiError::BadRequest(format!("{field} must be an RFC 3339 timestamp"))
        }),
    }
}
