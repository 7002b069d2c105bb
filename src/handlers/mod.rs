pub mod connection;
pub mod share;
pub mod sync;

/// Upload MIME allow-list: document and image types only.
pub const ALLOWED_UPLOAD_MIME: &[&str] = &[
    "application/pdf",
    "application/msword",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    "application/vnd.ms-excel",
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
    "text/csv",
    "text/plain",
    "image/png",
    "image/jpeg",
    "image/webp",
    "image/heic",
];

pub fn is_allowed_upload_mime(mime: &str) -> bool {
    // Strip any parameters ("text/csv; charset=utf-8").
    let essence = mime.split(';').next().unwrap_or(mime).trim();
    ALLOWED_UPLOAD_MIME
        .iter()
        .any(|allowed| allowed.eq_ignore_ascii_case(essence))
}
