//! Ordered photo collection with a designated main (cover) image.
//!
//! Invariants, checked after every operation in tests:
//! - non-empty: `main_index < len`
//! - empty: `main_index == 0`
//! - the main index follows the same image through reorders and through
//!   removals of other images; removing the main image falls back to the
//!   first remaining one.

use std::fmt;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

pub mod preview;

pub use preview::{InMemoryPreviewAllocator, PreviewAllocator, PreviewHandle};

pub const DEFAULT_MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;
pub const DEFAULT_IMAGE_CAPACITY: usize = 20;

pub const ACCEPTED_MEDIA_TYPES: &[&str] = &["image/jpeg", "image/png", "image/webp", "image/gif"];

/// Raw image file picked by the user
#[derive(Clone, PartialEq, Eq)]
pub struct ImageFile {
    name: String,
    media_type: String,
    data: Arc<[u8]>,
}

impl ImageFile {
    pub fn new(name: impl Into<String>, media_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            media_type: media_type.into(),
            data: data.into(),
        }
    }

    /// Read a file from disk, guessing its media type from the extension
    pub async fn from_path(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let data = tokio::fs::read(path).await?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "image".to_string());
        let media_type = media_type_for(&name).unwrap_or("application/octet-stream");
        Ok(Self::new(name, media_type, data))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn media_type(&self) -> &str {
        &self.media_type
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }
}

impl fmt::Debug for ImageFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageFile")
            .field("name", &self.name)
            .field("media_type", &self.media_type)
            .field("size", &self.data.len())
            .finish()
    }
}

pub fn media_type_for(file_name: &str) -> Option<&'static str> {
    let ext = file_name.rsplit_once('.')?.1.to_ascii_lowercase();
    match ext.as_str() {
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        "webp" => Some("image/webp"),
        "gif" => Some("image/gif"),
        _ => None,
    }
}

/// Identity of an image within one collection, stable across reorders
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ImageId(u64);

#[derive(Debug)]
pub struct ImageItem {
    id: ImageId,
    file: ImageFile,
    preview: PreviewHandle,
}

impl ImageItem {
    pub fn id(&self) -> ImageId {
        self.id
    }

    pub fn file(&self) -> &ImageFile {
        &self.file
    }

    pub fn preview_url(&self) -> &str {
        self.preview.url()
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ImageRejection {
    #[error("{size} bytes exceeds the maximum of {max} bytes")]
    TooLarge { size: usize, max: usize },
    #[error("unsupported file type {0:?}")]
    UnsupportedType(String),
    #[error("the listing already holds the maximum of {capacity} photos")]
    CapacityExceeded { capacity: usize },
    #[error("preview could not be created: {0}")]
    PreviewUnavailable(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedImage {
    pub name: String,
    pub reason: ImageRejection,
}

/// Outcome of one `add` batch
#[derive(Debug, Default)]
pub struct AddReport {
    pub added: Vec<ImageId>,
    pub rejected: Vec<RejectedImage>,
}

impl AddReport {
    pub fn is_clean(&self) -> bool {
        self.rejected.is_empty()
    }
}

#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
#[error("image index {index} is out of bounds for {len} images")]
pub struct ImageIndexError {
    pub index: usize,
    pub len: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageLimits {
    pub max_bytes: usize,
    pub capacity: usize,
}

impl Default for ImageLimits {
    fn default() -> Self {
        Self {
            max_bytes: DEFAULT_MAX_IMAGE_BYTES,
            capacity: DEFAULT_IMAGE_CAPACITY,
        }
    }
}

/// Owns the ordered photos and their preview handles.
///
/// Previews are acquired on `add` and released when an item is removed,
/// when the collection is cleared, and when the manager is dropped.
pub struct ImageCollectionManager {
    items: Vec<ImageItem>,
    main_index: usize,
    limits: ImageLimits,
    previews: Arc<dyn PreviewAllocator>,
    next_id: u64,
}

impl ImageCollectionManager {
    pub fn new(limits: ImageLimits, previews: Arc<dyn PreviewAllocator>) -> Self {
        Self {
            items: Vec::new(),
            main_index: 0,
            limits,
            previews,
            next_id: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn main_index(&self) -> usize {
        self.main_index
    }

    pub fn items(&self) -> &[ImageItem] {
        &self.items
    }

    pub fn main(&self) -> Option<&ImageItem> {
        self.items.get(self.main_index)
    }

    pub fn limits(&self) -> ImageLimits {
        self.limits
    }

    fn check(&self, file: &ImageFile) -> Result<(), ImageRejection> {
        if !ACCEPTED_MEDIA_TYPES.contains(&file.media_type()) {
            return Err(ImageRejection::UnsupportedType(file.media_type().to_string()));
        }
        if file.size() > self.limits.max_bytes {
            return Err(ImageRejection::TooLarge {
                size: file.size(),
                max: self.limits.max_bytes,
            });
        }
        if self.items.len() >= self.limits.capacity {
            return Err(ImageRejection::CapacityExceeded {
                capacity: self.limits.capacity,
            });
        }
        Ok(())
    }

    /// Append every acceptable file; report each rejected one with its reason
    pub fn add(&mut self, files: impl IntoIterator<Item = ImageFile>) -> AddReport {
        let mut report = AddReport::default();

        for file in files {
            let accepted = self.check(&file).and_then(|_| {
                PreviewHandle::acquire(&self.previews, &file)
                    .map_err(|e| ImageRejection::PreviewUnavailable(e.to_string()))
            });

            match accepted {
                Ok(preview) => {
                    let id = ImageId(self.next_id);
                    self.next_id += 1;
                    debug!("Added image {} ({} bytes)", file.name(), file.size());
                    self.items.push(ImageItem { id, file, preview });
                    report.added.push(id);
                }
                Err(reason) => {
                    warn!("Rejected image {}: {}", file.name(), reason);
                    report.rejected.push(RejectedImage {
                        name: file.name().to_string(),
                        reason,
                    });
                }
            }
        }

        if !report.added.is_empty() {
            info!(
                "📷 {} image(s) added, {} rejected, {} total",
                report.added.len(),
                report.rejected.len(),
                self.items.len()
            );
        }
        report
    }

    fn bounds(&self, index: usize) -> Result<(), ImageIndexError> {
        if index < self.items.len() {
            Ok(())
        } else {
            Err(ImageIndexError {
                index,
                len: self.items.len(),
            })
        }
    }

    /// Remove the image at `index`, releasing its preview
    pub fn remove(&mut self, index: usize) -> Result<ImageFile, ImageIndexError> {
        self.bounds(index)?;
        let ImageItem { file, preview, .. } = self.items.remove(index);
        drop(preview);

        if index == self.main_index {
            self.main_index = 0;
        } else if index < self.main_index {
            self.main_index -= 1;
        }

        debug!("Removed image {}, main is now {}", file.name(), self.main_index);
        Ok(file)
    }

    pub fn set_main(&mut self, index: usize) -> Result<(), ImageIndexError> {
        self.bounds(index)?;
        self.main_index = index;
        Ok(())
    }

    /// Move the image at `from` to `to`, shifting the images in between
    pub fn reorder(&mut self, from: usize, to: usize) -> Result<(), ImageIndexError> {
        self.bounds(from)?;
        self.bounds(to)?;
        if from == to {
            return Ok(());
        }

        let item = self.items.remove(from);
        self.items.insert(to, item);

        let main = self.main_index;
        self.main_index = if from == main {
            to
        } else if from < main && main <= to {
            main - 1
        } else if to <= main && main < from {
            main + 1
        } else {
            main
        };
        Ok(())
    }

    /// Files in upload order: the main image first, the rest in collection order
    pub fn ordered_files(&self) -> Vec<ImageFile> {
        let mut files = Vec::with_capacity(self.items.len());
        if let Some(main) = self.main() {
            files.push(main.file.clone());
        }
        files.extend(
            self.items
                .iter()
                .enumerate()
                .filter(|(i, _)| *i != self.main_index)
                .map(|(_, item)| item.file.clone()),
        );
        files
    }

    /// Drop every image and release every preview
    pub fn clear(&mut self) {
        self.items.clear();
        self.main_index = 0;
    }
}

impl fmt::Debug for ImageCollectionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageCollectionManager")
            .field("items", &self.items)
            .field("main_index", &self.main_index)
            .field("limits", &self.limits)
            .finish()
    }
}
