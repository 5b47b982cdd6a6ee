use std::{fmt, path::{Path, PathBuf}};

use uuid::Uuid;

use crate::settings::UploadSettings;

const ALLOWED_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

/// What an uploaded image belongs to. Every location below is a pure function of this value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageTarget {
    ProgramPhoto { program: Uuid },
    TopicPhoto { program: Uuid, topic: Uuid },
    RecordImage { program: Uuid, topic: Uuid, record: Uuid },
}

impl ImageTarget {
    /// File stem the image is stored under.
    pub fn stem(&self) -> &'static str {
        match self {
            ImageTarget::ProgramPhoto { .. } | ImageTarget::TopicPhoto { .. } => "photo",
            ImageTarget::RecordImage { .. } => "image",
        }
    }

    pub fn program(&self) -> Uuid {
        match *self {
            ImageTarget::ProgramPhoto { program }
            | ImageTarget::TopicPhoto { program, .. }
            | ImageTarget::RecordImage { program, .. } => program,
        }
    }

    fn segments(&self) -> Vec<String> {
        match *self {
            ImageTarget::ProgramPhoto { program } => {
                vec!["programs".into(), program.to_string(), "photo".into()]
            }
            ImageTarget::TopicPhoto { program, topic } => vec![
                "programs".into(),
                program.to_string(),
                "topics".into(),
                topic.to_string(),
                "photo".into(),
            ],
            ImageTarget::RecordImage { program, topic, record } => vec![
                "programs".into(),
                program.to_string(),
                "topics".into(),
                topic.to_string(),
                "contents".into(),
                record.to_string(),
            ],
        }
    }

    /// Number of leading segments that name the directory owned by the resource.
    fn owned_depth(&self) -> usize {
        match self {
            ImageTarget::ProgramPhoto { .. } => 2,
            ImageTarget::TopicPhoto { .. } => 4,
            ImageTarget::RecordImage { .. } => 6,
        }
    }
}

/// An allowed image extension, kept in the case it was uploaded with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageExtension(String);

impl ImageExtension {
    /// Extracts the extension of an uploaded filename. `None` when it is missing or not an
    /// allowed image type.
    pub fn from_filename(filename: &str) -> Option<Self> {
        let name = Path::new(filename).file_name()?.to_str()?;
        let (stem, ext) = name.rsplit_once('.')?;
        if stem.is_empty() {
            return None;
        }
        Self::parse(ext)
    }

    pub fn parse(ext: &str) -> Option<Self> {
        let lowered = ext.to_ascii_lowercase();
        ALLOWED_EXTENSIONS
            .contains(&lowered.as_str())
            .then(|| ImageExtension(ext.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_jpeg(&self) -> bool {
        matches!(self.0.to_ascii_lowercase().as_str(), "jpg" | "jpeg")
    }

    pub fn is_allowed(ext: &str) -> bool {
        ALLOWED_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str())
    }
}

impl fmt::Display for ImageExtension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Resolves upload locations below an injected root directory.
#[derive(Debug, Clone)]
pub struct UploadPaths {
    root: PathBuf,
    tmp_dir: PathBuf,
    public_prefix: String,
}

impl UploadPaths {
    pub fn new(root: impl Into<PathBuf>, tmp_dir: impl Into<PathBuf>, public_prefix: &str) -> Self {
        UploadPaths {
            root: root.into(),
            tmp_dir: tmp_dir.into(),
            public_prefix: public_prefix.trim_end_matches('/').to_string(),
        }
    }

    pub fn from_settings(settings: &UploadSettings) -> Self {
        Self::new(&settings.root, &settings.tmp_dir, &settings.public_prefix)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn tmp_dir(&self) -> &Path {
        &self.tmp_dir
    }

    pub fn program_dir(&self, program: Uuid) -> PathBuf {
        self.root.join("programs").join(program.to_string())
    }

    pub fn topic_dir(&self, program: Uuid, topic: Uuid) -> PathBuf {
        self.program_dir(program).join("topics").join(topic.to_string())
    }

    /// Directory the image file lives in.
    pub fn dir(&self, target: &ImageTarget) -> PathBuf {
        target
            .segments()
            .iter()
            .fold(self.root.clone(), |path, segment| path.join(segment))
    }

    /// Directory that belongs to the resource as a whole and goes away with it.
    pub fn owned_dir(&self, target: &ImageTarget) -> PathBuf {
        target
            .segments()
            .iter()
            .take(target.owned_depth())
            .fold(self.root.clone(), |path, segment| path.join(segment))
    }

    pub fn compress_dir(&self, target: &ImageTarget) -> PathBuf {
        self.dir(target).join("compress")
    }

    pub fn file_name(target: &ImageTarget, ext: &ImageExtension) -> String {
        format!("{}.{}", target.stem(), ext)
    }

    pub fn file(&self, target: &ImageTarget, ext: &ImageExtension) -> PathBuf {
        self.dir(target).join(Self::file_name(target, ext))
    }

    /// Hidden file next to the final image that an update streams into before it is renamed.
    pub fn staging_file(&self, target: &ImageTarget, slot: Uuid) -> PathBuf {
        self.dir(target).join(format!(".{slot}.partial"))
    }

    /// Holding slot for files whose destination is not known while they stream in.
    pub fn temp_file(&self, slot: Uuid, ext: &ImageExtension) -> PathBuf {
        self.tmp_dir.join(format!("{slot}.{ext}"))
    }

    /// Public URL of the compressed variant, e.g. `/uploads/programs/{p}/photo/compress/photo.png`.
    pub fn compressed_url(&self, target: &ImageTarget, file_name: &str) -> String {
        format!(
            "{}/{}/compress/{}",
            self.public_prefix,
            target.segments().join("/"),
            file_name
        )
    }
}
