use std::{
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use chrono::Utc;
use tokio::{fs, io::AsyncWriteExt};
use uuid::Uuid;

use crate::{
    entities::upload::{FilePlacement, UploadSession},
    errors::AppError,
    interfaces::multipart::{Demultiplexer, FilePart, Part},
    settings::UploadSettings,
    storage::{
        compress::compress_within,
        provisioner::{ensure_dir, relocate, remove_dir_logged, remove_file_logged},
        ImageCompressor, ImageExtension, ImageTarget, SourcePattern, StorageError, UploadPaths,
    },
};

const SNIFF_LEN: usize = 64;

/// Where an accepted file is streamed to while the request is still being read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Staging {
    /// The final path. Used when the resource is new and its directory belongs to this upload.
    Final(ImageTarget),
    /// A hidden file in the final directory, renamed into place after the resource is saved.
    Beside(ImageTarget),
    /// A slot in the temp directory, for uploads whose destination arrives as form fields.
    Temporary,
}

/// Which file parts an upload accepts and where they go.
#[derive(Debug, Clone, Copy)]
pub struct Intake {
    field: Option<&'static str>,
    staging: Staging,
}

impl Intake {
    /// Accepts the file sent under the `photo` field.
    pub fn photo(staging: Staging) -> Self {
        Intake { field: Some("photo"), staging }
    }

    /// Accepts the first file regardless of its field name.
    pub fn any_field(staging: Staging) -> Self {
        Intake { field: None, staging }
    }

    fn accepts(&self, field_name: &str) -> bool {
        self.field.is_none_or(|f| f == field_name)
    }
}

/// Streams uploads to disk, moves them into place and cleans up after failed sessions.
pub struct UploadPipeline<C>
where
    C: ImageCompressor,
{
    paths: UploadPaths,
    compressor: Arc<C>,
    max_file_size: u64,
    compression_timeout: Duration,
}

impl<C> Clone for UploadPipeline<C>
where
    C: ImageCompressor,
{
    fn clone(&self) -> Self {
        UploadPipeline {
            paths: self.paths.clone(),
            compressor: Arc::clone(&self.compressor),
            max_file_size: self.max_file_size,
            compression_timeout: self.compression_timeout,
        }
    }
}

impl<C> UploadPipeline<C>
where
    C: ImageCompressor,
{
    pub fn new(paths: UploadPaths, compressor: Arc<C>, settings: &UploadSettings) -> Self {
        UploadPipeline {
            paths,
            compressor,
            max_file_size: settings.max_file_size,
            compression_timeout: settings.compression_timeout(),
        }
    }

    pub fn paths(&self) -> &UploadPaths {
        &self.paths
    }

    /// Creates the resource directory and the image directory, remembering what was new.
    pub async fn provision(&self, session: &mut UploadSession, target: &ImageTarget) -> Result<(), AppError> {
        for dir in [self.paths.owned_dir(target), self.paths.dir(target)] {
            let outcome = ensure_dir(&dir).await?;
            session.record_provisioned(dir, outcome);
        }
        Ok(())
    }

    /// Reads the whole body, collecting fields and storing at most one accepted file.
    pub async fn receive(
        &self,
        demux: &mut Demultiplexer,
        session: &mut UploadSession,
        intake: Intake,
    ) -> Result<(), AppError> {
        while let Some(part) = demux.next_part().await? {
            match part {
                Part::Field { name, value } => session.fields.insert(name, value),
                Part::File(file) if file.filename.is_empty() || !intake.accepts(&file.field_name) => {
                    let field_name = file.field_name.clone();
                    let skipped = file.drain().await?;
                    tracing::debug!("Skipped file part '{}' ({} bytes)", field_name, skipped);
                }
                Part::File(file) if session.placement.is_some() => {
                    let filename = file.filename.clone();
                    let skipped = file.drain().await?;
                    tracing::warn!("Ignoring extra uploaded file '{}' ({} bytes)", filename, skipped);
                }
                Part::File(file) => {
                    let placement = self.store(session, file, intake.staging).await?;
                    tracing::debug!(
                        "Received '{}' ({} bytes) into {}",
                        placement.original_filename,
                        placement.size,
                        placement.path.display()
                    );
                    session.placement = Some(placement);
                }
            }
        }
        session.finish_receiving()
    }

    async fn store(
        &self,
        session: &mut UploadSession,
        mut file: FilePart,
        staging: Staging,
    ) -> Result<FilePlacement, AppError> {
        let extension = ImageExtension::from_filename(&file.filename).ok_or_else(|| {
            AppError::invalid(&file.field_name, "Please upload a jpg, jpeg or png image")
        })?;
        if !file.declares_image() {
            return Err(AppError::invalid(&file.field_name, "Please upload an image file"));
        }

        let destination = match staging {
            Staging::Final(target) => self.paths.file(&target, &extension),
            Staging::Beside(target) => {
                self.provision(session, &target).await?;
                self.paths.staging_file(&target, Uuid::new_v4())
            }
            Staging::Temporary => {
                ensure_dir(self.paths.tmp_dir()).await?;
                self.paths.temp_file(Uuid::new_v4(), &extension)
            }
        };

        session.record_written(destination.clone());
        match self.write(&mut file, &destination).await {
            Ok(size) => Ok(FilePlacement {
                path: destination,
                original_filename: file.filename,
                extension,
                size,
            }),
            Err(e) => {
                remove_file_logged(&destination).await;
                session.forget_written(&destination);
                Err(e)
            }
        }
    }

    async fn write(&self, file: &mut FilePart, destination: &Path) -> Result<u64, AppError> {
        let mut out = fs::File::create(destination)
            .await
            .map_err(|e| StorageError::io("create", destination, e))?;

        let mut size = 0u64;
        let mut head = Vec::with_capacity(SNIFF_LEN);

        while let Some(chunk) = file.chunk().await? {
            size += chunk.len() as u64;
            if size > self.max_file_size {
                return Err(AppError::invalid(
                    &file.field_name,
                    format!("Please upload an image less than {} bytes", self.max_file_size),
                ));
            }
            if head.len() < SNIFF_LEN {
                let take = (SNIFF_LEN - head.len()).min(chunk.len());
                head.extend_from_slice(&chunk[..take]);
            }
            out.write_all(&chunk)
                .await
                .map_err(|e| StorageError::io("write", destination, e))?;
        }
        out.flush()
            .await
            .map_err(|e| StorageError::io("flush", destination, e))?;

        if size == 0 {
            return Err(AppError::invalid(&file.field_name, "Uploaded file is empty"));
        }
        if !infer::is_image(&head) {
            return Err(AppError::invalid(&file.field_name, "Uploaded file is not an image"));
        }
        Ok(size)
    }

    /// Name the accepted file will have once it is in place, e.g. `photo.PNG`.
    pub fn planned_name(session: &UploadSession, target: &ImageTarget) -> Option<String> {
        session
            .placement
            .as_ref()
            .map(|p| UploadPaths::file_name(target, &p.extension))
    }

    /// Moves a temporary file into a hidden slot of the target directory, so the final path
    /// is left alone until the resource is saved.
    pub async fn stage(&self, session: &mut UploadSession, target: &ImageTarget) -> Result<(), AppError> {
        if session.placement.is_none() {
            return Ok(());
        }
        self.move_placement(session, self.paths.staging_file(target, Uuid::new_v4()))
            .await
    }

    /// Moves a staged or temporary file to its final path. No-op for files already there.
    pub async fn promote(&self, session: &mut UploadSession, target: &ImageTarget) -> Result<(), AppError> {
        let Some(placement) = session.placement.as_ref() else {
            return Ok(());
        };
        let destination = self.paths.file(target, &placement.extension);
        self.move_placement(session, destination).await
    }

    async fn move_placement(&self, session: &mut UploadSession, destination: PathBuf) -> Result<(), AppError> {
        let Some(placement) = session.placement.as_mut() else {
            return Ok(());
        };
        if placement.path == destination {
            return Ok(());
        }

        let from = placement.path.clone();
        relocate(&from, &destination).await?;
        placement.path = destination.clone();

        session.forget_written(&from);
        session.record_written(destination);
        Ok(())
    }

    /// Deletes a previous image (and its compressed copy) that the new one did not overwrite.
    pub async fn discard_superseded(&self, target: &ImageTarget, previous: Option<&str>, current: &str) {
        let Some(previous) = previous.map(strip_cache_token) else {
            return;
        };
        if previous == current || previous.is_empty() || previous.contains(['/', '\\']) {
            return;
        }
        let dir = self.paths.dir(target);
        if remove_file_logged(&dir.join(previous)).await {
            tracing::info!("Removed superseded image {}", dir.join(previous).display());
        }
        remove_file_logged(&self.paths.compress_dir(target).join(previous)).await;
    }

    /// Produces compressed copies of the target's images. Failures are logged and swallowed.
    pub async fn compress(&self, target: &ImageTarget) {
        let source = SourcePattern::images(self.paths.dir(target));
        let destination = self.paths.compress_dir(target);

        match compress_within(&*self.compressor, &source, &destination, self.compression_timeout).await {
            Ok(count) => tracing::info!("Compressed {} image(s) from {}", count, source),
            Err(e) => tracing::warn!("Image compression for {} failed, keeping originals only: {}", source, e),
        }
    }

    /// Undoes a failed session: directories it created go away entirely, otherwise only the
    /// files it wrote. Errors are logged.
    pub async fn rollback(&self, session: &mut UploadSession) {
        session.mark_failed();

        let created: Vec<_> = session.created_dirs().map(Path::to_path_buf).collect();
        for dir in &created {
            if remove_dir_logged(dir).await {
                tracing::info!("Rolled back directory {}", dir.display());
            }
        }
        for file in session.written_files() {
            if created.iter().any(|dir| file.starts_with(dir)) {
                continue;
            }
            if remove_file_logged(file).await {
                tracing::info!("Rolled back file {}", file.display());
            }
        }
    }

    /// Removes everything stored for a deleted resource.
    pub async fn remove_resource_dir(&self, dir: &Path) {
        if remove_dir_logged(dir).await {
            tracing::info!("Removed upload directory {}", dir.display());
        }
    }
}

/// `photo.png?1700000000000` -> `photo.png`
pub fn strip_cache_token(value: &str) -> &str {
    value.split('?').next().unwrap_or(value)
}

/// Appends a `?{epoch-millis}` token so clients refetch a replaced image.
pub fn cache_busted(name: &str) -> String {
    format!("{}?{}", name, Utc::now().timestamp_millis())
}
