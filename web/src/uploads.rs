use std::{collections::HashMap, io::ErrorKind, path::Path};

use axum::{body::Bytes, extract::Multipart};
use newsroom_config::{Config, UploadsConfig};
use uuid::Uuid;

use crate::error::Error;

/// Image types accepted for profile pictures and article images.
pub const SUPPORTED_MIMES: [&str; 6] = [
    "image/png",
    "image/jpg",
    "image/jpeg",
    "image/svg+xml",
    "image/webp",
    "image/gif",
];

/// Shown when a user has no profile image yet.
pub const PLACEHOLDER_AVATAR: &str = "https://cdn-icons-png.flaticon.com/512/4140/4140048.png";

/// A file field read from a multipart body.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Bytes,
}

impl ImageUpload {
    /// Checks size and type. The error is the message shown to the client.
    pub fn validate(&self, config: &UploadsConfig) -> Result<(), String> {
        if self.bytes.len() > config.max_size_bytes {
            return Err(format!(
                "Image size must be less than {} MB",
                config.max_size_bytes / (1024 * 1024)
            ));
        }

        let supported = self
            .content_type
            .as_deref()
            .and_then(|ct| ct.parse::<mime::Mime>().ok())
            .is_some_and(|mime| SUPPORTED_MIMES.contains(&mime.essence_str()));

        if !supported {
            return Err("Image must be type of png,jpg,jpeg,svg,webp,gif....".to_string());
        }

        if self.extension().is_none() {
            return Err("Invalid image file name".to_string());
        }

        Ok(())
    }

    fn extension(&self) -> Option<&str> {
        self.file_name
            .rsplit_once('.')
            .map(|(_, ext)| ext)
            .filter(|ext| !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()))
    }

    /// Validates the image and writes it under a fresh random name. Returns that name.
    pub async fn store(&self, config: &UploadsConfig, field: &'static str) -> Result<String, Error> {
        self.validate(config)
            .map_err(|message| Error::invalid(field, message))?;

        let ext = self.extension().unwrap_or("bin");
        let name = format!("{}.{}", Uuid::new_v4(), ext);

        tokio::fs::create_dir_all(&config.path).await?;
        tokio::fs::write(Path::new(&config.path).join(&name), &self.bytes).await?;

        tracing::debug!(file = %name, bytes = self.bytes.len(), "image stored");

        Ok(name)
    }
}

/// Deletes a stored image. A file that is already gone is not an error.
pub async fn remove_image(config: &UploadsConfig, name: &str) -> Result<(), Error> {
    // stored names never contain a path separator
    if name.is_empty() || name.contains(['/', '\\']) {
        return Ok(());
    }

    match tokio::fs::remove_file(Path::new(&config.path).join(name)).await {
        Ok(()) => {
            tracing::debug!(file = %name, "image removed");
            Ok(())
        }
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// Public URL of a stored image.
pub fn image_url(config: &Config, name: &str) -> String {
    format!("{}/images/{}", config.app.url.trim_end_matches('/'), name)
}

/// Text and file fields of a multipart body, by field name.
#[derive(Debug, Default)]
pub struct MultipartForm {
    pub texts: HashMap<String, String>,
    pub files: HashMap<String, ImageUpload>,
}

impl MultipartForm {
    pub async fn read(mut multipart: Multipart) -> Result<Self, Error> {
        let mut form = MultipartForm::default();

        while let Some(field) = multipart.next_field().await? {
            let Some(name) = field.name().map(str::to_string) else {
                continue;
            };

            match field.file_name().map(str::to_string) {
                Some(file_name) => {
                    let content_type = field.content_type().map(str::to_string);
                    let bytes = field.bytes().await?;
                    // browsers send an empty part for an untouched file input
                    if !bytes.is_empty() {
                        form.files.insert(
                            name,
                            ImageUpload {
                                file_name,
                                content_type,
                                bytes,
                            },
                        );
                    }
                }
                None => {
                    form.texts.insert(name, field.text().await?);
                }
            }
        }

        Ok(form)
    }

    pub fn text(&mut self, name: &str) -> String {
        self.texts.remove(name).unwrap_or_default()
    }

    pub fn file(&mut self, name: &str) -> Option<ImageUpload> {
        self.files.remove(name)
    }
}
