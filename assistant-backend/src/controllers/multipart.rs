//! Multipart form reading shared by the upload endpoints

use actix_multipart::Multipart;
use actix_web::HttpResponse;
use futures_util::StreamExt;
use serde_json::json;
use std::collections::HashMap;

/// Text fields are small; anything larger is rejected
const MAX_TEXT_FIELD_SIZE: usize = 64 * 1024;

pub struct UploadedFile {
    pub filename: Option<String>,
    pub content_type: Option<String>,
    pub data: Vec<u8>,
}

#[derive(Default)]
pub struct UploadForm {
    pub file: Option<UploadedFile>,
    pub fields: HashMap<String, String>,
}

impl UploadForm {
    /// Non-empty text field value
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .get(name)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }
}

fn bad_request(message: String) -> HttpResponse {
    HttpResponse::BadRequest().json(json!({ "error": message }))
}

/// Read the whole form. The part named `file_field` is kept as the upload,
/// every other part is read as a text field.
pub async fn read_form(
    mut payload: Multipart,
    file_field: &str,
    max_file_size: usize,
) -> Result<UploadForm, HttpResponse> {
    let mut form = UploadForm::default();

    while let Some(item) = payload.next().await {
        let mut field = item.map_err(|e| bad_request(format!("Failed to process multipart: {}", e)))?;
        let field_name = field.name().to_string();
        let is_file = field_name == file_field;
        let limit = if is_file { max_file_size } else { MAX_TEXT_FIELD_SIZE };

        let filename = field
            .content_disposition()
            .get_filename()
            .map(|s| s.to_string());
        let content_type = field.content_type().map(|ct| ct.to_string());

        let mut data: Vec<u8> = Vec::new();
        while let Some(chunk) = field.next().await {
            let chunk = chunk.map_err(|e| bad_request(format!("Failed to read field '{}': {}", field_name, e)))?;
            data.extend_from_slice(&chunk);
            if data.len() > limit {
                return Err(HttpResponse::PayloadTooLarge().json(json!({
                    "error": format!("Field '{}' exceeds the {} byte limit", field_name, limit)
                })));
            }
        }

        if is_file {
            form.file = Some(UploadedFile {
                filename,
                content_type,
                data,
            });
        } else {
            form.fields
                .insert(field_name, String::from_utf8_lossy(&data).into_owned());
        }
    }

    Ok(form)
}
