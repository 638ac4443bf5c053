use image::{codecs::jpeg::JpegEncoder, imageops::FilterType};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::{
    config::AppConfig,
    storage::{PutOptions, StorageError, StorageState},
};

const MIB: usize = 1024 * 1024;

/// Longest side of a compressed image.
pub const MAX_IMAGE_DIMENSION: u32 = 1080;
/// JPEG quality used when re-encoding (0.8 on a 0..1 scale).
pub const COMPRESSED_QUALITY: u8 = 80;
/// Format of every compressed image.
pub const COMPRESSED_CONTENT_TYPE: &str = "image/jpeg";
const COMPRESSED_EXTENSION: &str = "jpg";

const CACHE_CONTROL: &str = "max-age=3600";
const RANDOM_SUFFIX_LEN: usize = 6;
const BASE36: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

const IMAGE_TYPES: &[&str] = &[
    "image/jpeg",
    "image/png",
    "image/gif",
    "image/webp",
    "image/avif",
];

const VIDEO_TYPES: &[&str] = &["video/mp4", "video/webm", "video/ogg", "video/quicktime"];

const DOCUMENT_TYPES: &[&str] = &[
    "application/pdf",
    "application/msword",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    "application/vnd.ms-powerpoint",
    "application/vnd.openxmlformats-officedocument.presentationml.presentation",
    "application/vnd.ms-excel",
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
    "text/plain",
];

/// MediaKind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
    Document,
}

impl MediaKind {
    pub fn allowed_types(self) -> &'static [&'static str] {
        match self {
            MediaKind::Image => IMAGE_TYPES,
            MediaKind::Video => VIDEO_TYPES,
            MediaKind::Document => DOCUMENT_TYPES,
        }
    }

    /// Size ceiling in bytes. For images it is the compression threshold, not a hard limit.
    pub fn max_bytes(self) -> usize {
        match self {
            MediaKind::Image => MIB,
            MediaKind::Video => 100 * MIB,
            MediaKind::Document => 50 * MIB,
        }
    }

    pub fn key_prefix(self) -> &'static str {
        match self {
            MediaKind::Image => "resume",
            MediaKind::Video => "video",
            MediaKind::Document => "file",
        }
    }

    pub fn default_extension(self) -> &'static str {
        match self {
            MediaKind::Image => "jpg",
            MediaKind::Video => "mp4",
            MediaKind::Document => "pdf",
        }
    }
}

/// SourceFile
///
/// An upload as received: raw bytes, the client-declared MIME type and the original name.
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub bytes: Vec<u8>,
    pub content_type: String,
    pub original_name: String,
}

impl SourceFile {
    pub fn new(bytes: Vec<u8>, content_type: &str, original_name: &str) -> Self {
        Self {
            bytes,
            content_type: content_type.to_string(),
            original_name: original_name.to_string(),
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// UploadError
#[derive(Debug, Error)]
pub enum UploadError {
    #[error("unsupported {kind:?} type '{content_type}'")]
    UnsupportedType {
        kind: MediaKind,
        content_type: String,
    },
    #[error("file of {size} bytes exceeds the {limit} byte limit")]
    TooLarge { size: usize, limit: usize },
    #[error("image compression failed: {0}")]
    CompressionFailed(String),
    #[error("storage key '{0}' already exists")]
    StoreConflict(String),
    #[error(transparent)]
    Store(StorageError),
}

impl UploadError {
    /// Rejections raised before any I/O.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            UploadError::UnsupportedType { .. } | UploadError::TooLarge { .. }
        )
    }
}

impl From<StorageError> for UploadError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::Conflict { key, .. } => UploadError::StoreConflict(key),
            other => UploadError::Store(other),
        }
    }
}

/// Uploaded
///
/// A stored, immutable media asset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Uploaded {
    pub url: String,
    pub key: String,
    pub content_type: String,
    /// Original display name; only set for documents.
    pub name: Option<String>,
}

/// Buckets
#[derive(Debug, Clone)]
pub struct Buckets {
    pub image: String,
    pub video: String,
    pub document: String,
}

impl Buckets {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            image: config.image_bucket.clone(),
            video: config.video_bucket.clone(),
            document: config.document_bucket.clone(),
        }
    }

    pub fn for_kind(&self, kind: MediaKind) -> &str {
        match kind {
            MediaKind::Image => &self.image,
            MediaKind::Video => &self.video,
            MediaKind::Document => &self.document,
        }
    }

    pub fn all(&self) -> [&str; 3] {
        [&self.image, &self.video, &self.document]
    }
}

/// MediaPipeline
///
/// Validate, optionally compress, name, store, resolve the public URL. It never touches
/// records; callers attach the returned URL in a separate step, so a failed upload cannot
/// damage anything already persisted.
#[derive(Clone)]
pub struct MediaPipeline {
    storage: StorageState,
    buckets: Buckets,
}

impl MediaPipeline {
    pub fn new(storage: StorageState, buckets: Buckets) -> Self {
        Self { storage, buckets }
    }

    pub fn buckets(&self) -> &Buckets {
        &self.buckets
    }

    pub async fn upload(&self, kind: MediaKind, file: SourceFile) -> Result<Uploaded, UploadError> {
        validate_type(kind, &file)?;

        let display_name = file.original_name.clone();
        let mut payload = file;
        if payload.len() > kind.max_bytes() {
            match kind {
                MediaKind::Image => {
                    let original_size = payload.len();
                    payload = tokio::task::spawn_blocking(move || compress_image(payload))
                        .await
                        .map_err(|e| UploadError::CompressionFailed(e.to_string()))??;
                    tracing::debug!(
                        original_size,
                        compressed_size = payload.len(),
                        "image compressed"
                    );
                }
                _ => {
                    return Err(UploadError::TooLarge {
                        size: payload.len(),
                        limit: kind.max_bytes(),
                    });
                }
            }
        }

        let key = derive_name(kind, &payload.original_name, chrono::Utc::now().timestamp_millis());
        let bucket = self.buckets.for_kind(kind);
        let options = PutOptions {
            content_type: payload.content_type.clone(),
            cache_control: CACHE_CONTROL.to_string(),
            upsert: false,
        };

        let path = self
            .storage
            .put_object(bucket, &key, payload.bytes, &options)
            .await
            .inspect_err(|e| tracing::error!("upload to {}/{} failed: {}", bucket, key, e))?;

        let url = self.storage.public_url(bucket, &path);
        tracing::info!(?kind, bucket, key = %path, "media stored");

        Ok(Uploaded {
            url,
            key: path,
            content_type: options.content_type,
            name: (kind == MediaKind::Document).then_some(display_name),
        })
    }
}

fn validate_type(kind: MediaKind, file: &SourceFile) -> Result<(), UploadError> {
    if kind.allowed_types().contains(&file.content_type.as_str()) {
        Ok(())
    } else {
        Err(UploadError::UnsupportedType {
            kind,
            content_type: file.content_type.clone(),
        })
    }
}

/// scaled_dimensions
///
/// Shrinks `(width, height)` so the larger side is at most `max`, preserving the aspect ratio.
/// Never enlarges.
pub fn scaled_dimensions(width: u32, height: u32, max: u32) -> (u32, u32) {
    let scale = |side: u32, long: u32| -> u32 {
        ((u64::from(side) * u64::from(max)) / u64::from(long)).max(1) as u32
    };

    if width > height && width > max {
        (max, scale(height, width))
    } else if height > max {
        (scale(width, height), max)
    } else {
        (width, height)
    }
}

/// Decode, downscale to [`MAX_IMAGE_DIMENSION`], re-encode as JPEG. The result replaces the
/// working payload, renamed to the new extension.
fn compress_image(file: SourceFile) -> Result<SourceFile, UploadError> {
    let decoded = image::load_from_memory(&file.bytes)
        .map_err(|e| UploadError::CompressionFailed(format!("decode: {}", e)))?;

    let (width, height) = scaled_dimensions(decoded.width(), decoded.height(), MAX_IMAGE_DIMENSION);
    let resized = if (width, height) == (decoded.width(), decoded.height()) {
        decoded
    } else {
        decoded.resize_exact(width, height, FilterType::Triangle)
    };

    let rgb = resized.to_rgb8();
    let mut bytes = Vec::new();
    JpegEncoder::new_with_quality(&mut bytes, COMPRESSED_QUALITY)
        .encode_image(&rgb)
        .map_err(|e| UploadError::CompressionFailed(format!("encode: {}", e)))?;

    Ok(SourceFile {
        bytes,
        content_type: COMPRESSED_CONTENT_TYPE.to_string(),
        original_name: replace_extension(&file.original_name, COMPRESSED_EXTENSION),
    })
}

fn replace_extension(name: &str, extension: &str) -> String {
    let stem = match name.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => name,
    };
    format!("{}.{}", stem, extension)
}

/// Lowercased ASCII-alphanumeric extension of `name`, if it has a usable one.
fn storage_extension(name: &str) -> Option<String> {
    let (stem, ext) = name.rsplit_once('.')?;
    if stem.is_empty() {
        return None;
    }
    let ext: String = ext
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_lowercase())
        .collect();
    (!ext.is_empty()).then_some(ext)
}

fn random_base36(len: usize) -> String {
    let mut entropy = Uuid::new_v4().as_u128();
    (0..len)
        .map(|_| {
            let digit = (entropy % 36) as usize;
            entropy /= 36;
            BASE36[digit] as char
        })
        .collect()
}

/// derive_name
///
/// `{prefix}_{unix_millis}_{6 base36 chars}.{ext}`: only `[a-z0-9_.]`, so it is safe as a
/// storage key whatever the client named the file.
/// The extension follows the payload actually stored, not the upload: a compressed image is
/// named with `.jpg` whatever it was called.
pub fn derive_name(kind: MediaKind, original_name: &str, unix_millis: i64) -> String {
    let extension =
        storage_extension(original_name).unwrap_or_else(|| kind.default_extension().to_string());
    format!(
        "{}_{}_{}.{}",
        kind.key_prefix(),
        unix_millis,
        random_base36(RANDOM_SUFFIX_LEN),
        extension
    )
}
