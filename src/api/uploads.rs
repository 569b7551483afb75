use axum::extract::Multipart;

use crate::error::AppError;

pub struct UploadedFile {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

/// Collects the file parts of a multipart body. When `field` is given only
/// parts with that name are kept. Each part is capped at `max_bytes`.
pub async fn read_files(
    multipart: &mut Multipart,
    field: Option<&str>,
    max_bytes: usize,
) -> Result<Vec<UploadedFile>, AppError> {
    let mut files = Vec::new();

    while let Some(part) = multipart.next_field().await? {
        if let Some(field) = field {
            if part.name() != Some(field) {
                continue;
            }
        }

        let Some(file_name) = part.file_name().map(str::to_string) else {
            continue;
        };
        let bytes = part.bytes().await?;

        if bytes.len() > max_bytes {
            return Err(AppError::Validation(format!(
                "File {} exceeds the {} byte limit",
                file_name, max_bytes
            )));
        }

        files.push(UploadedFile {
            file_name,
            bytes: bytes.to_vec(),
        });
    }

    if files.is_empty() {
        return Err(AppError::Validation("File was not uploaded".to_string()));
    }

    Ok(files)
}
