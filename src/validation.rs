use crate::error::ApiError;

pub const MAX_UPLOAD_BYTES: usize = 1024 * 1024;

pub fn validate_upload(body: &[u8]) -> Result<&[u8], ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        Err(ApiError::BadRequest("Uploaded CSV is empty".into()))
    } else if body.len() > MAX_UPLOAD_BYTES {
        Err(ApiError::BadRequest("Uploaded CSV must be at most 1 MiB".into()))
    } else {
        Ok(body)
    }
}
