use actix_multipart::{Field, Multipart};
use actix_web::web::Bytes;
use futures_util::StreamExt;

use crate::{errors::AppError, settings::UploadSettings};

#[derive(Debug, Clone, Copy)]
pub struct PartLimits {
    pub max_field_size: usize,
    pub max_parts: usize,
}

impl From<&UploadSettings> for PartLimits {
    fn from(settings: &UploadSettings) -> Self {
        PartLimits {
            max_field_size: settings.max_field_size,
            max_parts: settings.max_parts,
        }
    }
}

/// One part of a multipart body, in arrival order.
#[derive(Debug)]
pub enum Part {
    Field { name: String, value: String },
    File(FilePart),
}

/// A file part whose bytes have not been read yet.
pub struct FilePart {
    pub field_name: String,
    pub filename: String,
    pub content_type: Option<String>,
    field: Field,
}

impl FilePart {
    pub async fn chunk(&mut self) -> Result<Option<Bytes>, AppError> {
        self.field.next().await.transpose().map_err(AppError::from)
    }

    /// Reads and discards the remaining bytes, returning how many there were.
    pub async fn drain(mut self) -> Result<u64, AppError> {
        let mut skipped = 0u64;
        while let Some(chunk) = self.chunk().await? {
            skipped += chunk.len() as u64;
        }
        Ok(skipped)
    }

    /// True when the declared content type is an image, or nothing was declared.
    pub fn declares_image(&self) -> bool {
        self.content_type
            .as_deref()
            .is_none_or(|ct| ct.starts_with("image/"))
    }
}

impl std::fmt::Debug for FilePart {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FilePart")
            .field("field_name", &self.field_name)
            .field("filename", &self.filename)
            .field("content_type", &self.content_type)
            .finish()
    }
}

/// Splits a multipart body into text fields and file parts without buffering files.
/// After the end of the body, or after a failure, `next_part` keeps returning `Ok(None)`.
pub struct Demultiplexer {
    inner: Multipart,
    limits: PartLimits,
    parts_seen: usize,
    finished: bool,
}

impl Demultiplexer {
    pub fn new(inner: Multipart, limits: PartLimits) -> Self {
        Demultiplexer {
            inner,
            limits,
            parts_seen: 0,
            finished: false,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub async fn next_part(&mut self) -> Result<Option<Part>, AppError> {
        if self.finished {
            return Ok(None);
        }
        let result = self.read_part().await;
        if !matches!(result, Ok(Some(_))) {
            self.finished = true;
        }
        result
    }

    async fn read_part(&mut self) -> Result<Option<Part>, AppError> {
        let Some(item) = self.inner.next().await else {
            return Ok(None);
        };
        let mut field = item?;

        self.parts_seen += 1;
        if self.parts_seen > self.limits.max_parts {
            return Err(AppError::BadRequest(format!(
                "Too many parts in upload (limit {})",
                self.limits.max_parts
            )));
        }

        let name = field
            .name()
            .map(str::to_string)
            .ok_or_else(|| AppError::BadRequest("Upload part is missing a field name".into()))?;
        let filename = field
            .content_disposition()
            .and_then(|cd| cd.get_filename())
            .map(str::to_string);

        match filename {
            Some(filename) => {
                let content_type = field.content_type().map(|ct| ct.essence_str().to_string());
                Ok(Some(Part::File(FilePart {
                    field_name: name,
                    filename,
                    content_type,
                    field,
                })))
            }
            None => {
                let value = read_value(&mut field, &name, self.limits.max_field_size).await?;
                Ok(Some(Part::Field { name, value }))
            }
        }
    }
}

async fn read_value(field: &mut Field, name: &str, limit: usize) -> Result<String, AppError> {
    let mut buf = Vec::new();
    while let Some(chunk) = field.next().await {
        let chunk = chunk?;
        if buf.len() + chunk.len() > limit {
            return Err(AppError::invalid(name, format!("Value exceeds {} bytes", limit)));
        }
        buf.extend_from_slice(&chunk);
    }
    String::from_utf8(buf).map_err(|_| AppError::invalid(name, "Value must be valid UTF-8"))
}
