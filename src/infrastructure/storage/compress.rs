use std::{
    fmt,
    fs::File,
    io::{BufWriter, Write},
    path::{Path, PathBuf},
    time::Duration,
};

use async_trait::async_trait;
use derive_more::Display;
use image::{
    codecs::{
        jpeg::JpegEncoder,
        png::{CompressionType, FilterType as PngFilter, PngEncoder},
    },
    imageops::FilterType,
    DynamicImage, ImageReader,
};
use tokio::fs;

use super::{paths::ImageExtension, provisioner::ensure_dir};
use crate::settings::UploadSettings;

#[derive(Debug, Display)]
pub enum CompressionError {
    #[display("I/O error: {_0}")]
    Io(String),

    #[display("could not decode {}: {message}", path.display())]
    Decode { path: PathBuf, message: String },

    #[display("could not encode {}: {message}", path.display())]
    Encode { path: PathBuf, message: String },

    #[display("compression worker failed: {_0}")]
    Worker(String),

    #[display("compression timed out after {}", humantime::format_duration(*_0))]
    TimedOut(Duration),
}

impl std::error::Error for CompressionError {}

/// The image files of one directory, matched by extension in any case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourcePattern {
    dir: PathBuf,
}

impl SourcePattern {
    pub fn images(dir: impl Into<PathBuf>) -> Self {
        SourcePattern { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Hidden files (staging slots) never match.
    pub fn matches(&self, path: &Path) -> bool {
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            return false;
        };
        !name.starts_with('.') && ImageExtension::from_filename(name).is_some()
    }

    async fn files(&self) -> Result<Vec<PathBuf>, CompressionError> {
        let mut entries = fs::read_dir(&self.dir)
            .await
            .map_err(|e| CompressionError::Io(format!("{}: {}", self.dir.display(), e)))?;

        let mut files = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| CompressionError::Io(e.to_string()))?
        {
            let is_file = entry.file_type().await.map(|t| t.is_file()).unwrap_or(false);
            if is_file && self.matches(&entry.path()) {
                files.push(entry.path());
            }
        }
        files.sort();
        Ok(files)
    }
}

impl fmt::Display for SourcePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/*.{{jpg,jpeg,png}}", self.dir.display())
    }
}

/// Produces compressed copies of the images matched by `source` inside `destination`,
/// keeping file names. Returns how many files were written.
#[async_trait]
pub trait ImageCompressor: Send + Sync {
    async fn compress(
        &self,
        source: &SourcePattern,
        destination: &Path,
    ) -> Result<usize, CompressionError>;
}

/// Bounds a compressor call by `limit`.
pub async fn compress_within<C>(
    compressor: &C,
    source: &SourcePattern,
    destination: &Path,
    limit: Duration,
) -> Result<usize, CompressionError>
where
    C: ImageCompressor + ?Sized,
{
    tokio::time::timeout(limit, compressor.compress(source, destination))
        .await
        .map_err(|_| CompressionError::TimedOut(limit))?
}

/// Re-encodes with the `image` crate on the blocking pool.
#[derive(Debug, Clone)]
pub struct ImageCrateCompressor {
    jpeg_quality: u8,
    max_dimension: u32,
}

impl ImageCrateCompressor {
    pub fn new(jpeg_quality: u8, max_dimension: u32) -> Self {
        ImageCrateCompressor {
            jpeg_quality: jpeg_quality.clamp(1, 100),
            max_dimension,
        }
    }

    pub fn from_settings(settings: &UploadSettings) -> Self {
        Self::new(settings.jpeg_quality, settings.max_dimension)
    }
}

#[async_trait]
impl ImageCompressor for ImageCrateCompressor {
    async fn compress(
        &self,
        source: &SourcePattern,
        destination: &Path,
    ) -> Result<usize, CompressionError> {
        let files = source.files().await?;
        if files.is_empty() {
            return Ok(0);
        }

        ensure_dir(destination)
            .await
            .map_err(|e| CompressionError::Io(e.to_string()))?;

        let mut written = 0;
        for file in files {
            let Some(name) = file.file_name().map(|n| n.to_owned()) else {
                continue;
            };
            let output = destination.join(&name);
            let partial = destination.join(format!(".{}.partial", name.to_string_lossy()));
            let (quality, max_dimension) = (self.jpeg_quality, self.max_dimension);

            let task_partial = partial.clone();
            let encoded = tokio::task::spawn_blocking(move || {
                reencode(&file, &task_partial, quality, max_dimension)
            })
            .await
            .map_err(|e| CompressionError::Worker(e.to_string()))?;

            if let Err(e) = encoded {
                let _ = fs::remove_file(&partial).await;
                return Err(e);
            }

            fs::rename(&partial, &output)
                .await
                .map_err(|e| CompressionError::Io(format!("{}: {}", output.display(), e)))?;
            written += 1;
        }

        Ok(written)
    }
}

fn reencode(
    source: &Path,
    output: &Path,
    jpeg_quality: u8,
    max_dimension: u32,
) -> Result<(), CompressionError> {
    let decode_err = |message: String| CompressionError::Decode {
        path: source.to_path_buf(),
        message,
    };
    let encode_err = |message: String| CompressionError::Encode {
        path: output.to_path_buf(),
        message,
    };

    let img = ImageReader::open(source)
        .map_err(|e| decode_err(e.to_string()))?
        .with_guessed_format()
        .map_err(|e| decode_err(e.to_string()))?
        .decode()
        .map_err(|e| decode_err(e.to_string()))?;

    let img = if img.width() > max_dimension || img.height() > max_dimension {
        img.resize(max_dimension, max_dimension, FilterType::Lanczos3)
    } else {
        img
    };

    let is_jpeg = source
        .extension()
        .and_then(|e| e.to_str())
        .and_then(ImageExtension::parse)
        .is_some_and(|ext| ext.is_jpeg());

    let file = File::create(output).map_err(|e| encode_err(e.to_string()))?;
    let mut writer = BufWriter::new(file);

    if is_jpeg {
        let encoder = JpegEncoder::new_with_quality(&mut writer, jpeg_quality);
        DynamicImage::ImageRgb8(img.to_rgb8())
            .write_with_encoder(encoder)
            .map_err(|e| encode_err(e.to_string()))?;
    } else {
        let encoder = PngEncoder::new_with_quality(&mut writer, CompressionType::Best, PngFilter::Adaptive);
        img.write_with_encoder(encoder)
            .map_err(|e| encode_err(e.to_string()))?;
    }

    writer.flush().map_err(|e| encode_err(e.to_string()))
}
