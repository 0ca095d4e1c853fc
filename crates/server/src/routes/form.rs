//! Multipart form collection.

use std::collections::HashMap;

use axum::extract::Multipart;
use axum::extract::multipart::MultipartError;
use serde::de::DeserializeOwned;

use crate::error::AppError;
use crate::services::Upload;
use crate::storage::extension_of;

/// A submitted file part.
#[derive(Debug)]
pub struct FilePart {
    pub file_name: Option<String>,
    pub bytes: Vec<u8>,
}

impl FilePart {
    /// Convert to an upload, falling back to `default_ext` when the file
    /// name has no usable extension.
    pub fn into_upload(self, default_ext: &str) -> Upload {
        let extension = self
            .file_name
            .as_deref()
            .and_then(extension_of)
            .unwrap_or_else(|| default_ext.to_owned());
        Upload {
            bytes: self.bytes,
            extension,
        }
    }
}

/// Text fields and files of a multipart body, keyed by field name.
///
/// A repeated field keeps its last value.
#[derive(Debug, Default)]
pub struct Form {
    fields: HashMap<String, String>,
    files: HashMap<String, FilePart>,
}

impl Form {
    /// Read every part of the body.
    ///
    /// Parts with a file name are files; everything else is text. Empty file
    /// parts are dropped.
    ///
    /// # Errors
    ///
    /// Returns 400 for a malformed body.
    pub async fn collect(mut multipart: Multipart) -> Result<Self, AppError> {
        let mut form = Self::default();
        while let Some(field) = multipart.next_field().await.map_err(bad_multipart)? {
            let Some(name) = field.name().map(str::to_owned) else {
                continue;
            };
            if let Some(file_name) = field.file_name().map(str::to_owned) {
                let bytes = field.bytes().await.map_err(bad_multipart)?;
                if !bytes.is_empty() {
                    form.files.insert(
                        name,
                        FilePart {
                            file_name: Some(file_name),
                            bytes: bytes.to_vec(),
                        },
                    );
                }
            } else {
                let value = field.text().await.map_err(bad_multipart)?;
                form.fields.insert(name, value);
            }
        }
        Ok(form)
    }

    /// Take a text field.
    pub fn text(&mut self, name: &str) -> Option<String> {
        self.fields.remove(name)
    }

    /// Take a file.
    pub fn file(&mut self, name: &str) -> Option<FilePart> {
        self.files.remove(name)
    }

    /// Parse a text field holding a JSON array; missing or blank is empty.
    ///
    /// # Errors
    ///
    /// Returns 400 if the field is not valid JSON for `T`.
    pub fn json_list<T: DeserializeOwned>(&mut self, name: &str) -> Result<Vec<T>, AppError> {
        match self.text(name).filter(|raw| !raw.trim().is_empty()) {
            Some(raw) => serde_json::from_str(&raw)
                .map_err(|_| AppError::BadRequest(format!("{name} must be a JSON array"))),
            None => Ok(Vec::new()),
        }
    }
}

fn bad_multipart(err: MultipartError) -> AppError {
    AppError::BadRequest(format!("Invalid multipart body: {}", err.body_text()))
}
