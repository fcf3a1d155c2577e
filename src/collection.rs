//! Ordered set of image resources with current/last navigation state.
//!
//! Navigation wraps: `next` on the last image goes to the first and `prev` on
//! the first goes to the last. On an empty collection every navigation call
//! is a no-op returning `None`.

use std::path::{Path, PathBuf};

use crate::decoder::{ImageDecoder, is_image_file};
use crate::image::{ImageId, IvImage};

#[derive(Debug, Default)]
pub struct ImageCollection {
    images: Vec<IvImage>,
    current: Option<usize>,
    last: Option<usize>,
}

impl ImageCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    /// Append an image for `path`, reading its header when `getspec`.
    ///
    /// A header failure is recorded on the image, which still joins the
    /// collection so it can be inspected and retried.
    pub fn add(
        &mut self,
        path: impl Into<PathBuf>,
        decoder: &dyn ImageDecoder,
        getspec: bool,
    ) -> ImageId {
        let mut image = IvImage::new(path);
        if getspec {
            if let Err(e) = image.init_spec(decoder, false) {
                log::debug!("Header of {:?} unavailable: {}", image.path(), e);
            }
        }
        let id = image.id();
        log::info!("🖼️ Added {} as {}", image.name(), id);
        self.images.push(image);
        id
    }

    /// Index of the current image.
    pub fn current_index(&self) -> Option<usize> {
        self.current
    }

    /// Index of the image shown before the current one.
    pub fn last_index(&self) -> Option<usize> {
        self.last
    }

    pub fn current(&self) -> Option<&IvImage> {
        self.current.and_then(|i| self.images.get(i))
    }

    pub fn current_mut(&mut self) -> Option<&mut IvImage> {
        self.current.and_then(|i| self.images.get_mut(i))
    }

    pub fn get(&self, index: usize) -> Option<&IvImage> {
        self.images.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut IvImage> {
        self.images.get_mut(index)
    }

    /// Position of the image with `id`.
    pub fn find(&self, id: ImageId) -> Option<usize> {
        self.images.iter().position(|img| img.id() == id)
    }

    /// Make `index` current, remembering the previous one for toggling.
    ///
    /// Returns `false` (and changes nothing) when out of range.
    pub fn select(&mut self, index: usize) -> bool {
        if index >= self.images.len() {
            log::warn!(
                "Cannot select image {}: collection has {}",
                index,
                self.images.len()
            );
            return false;
        }
        if self.current != Some(index) {
            self.last = self.current;
            self.current = Some(index);
        }
        true
    }

    /// Select the next image, wrapping to the first.
    pub fn next(&mut self) -> Option<usize> {
        let len = self.images.len();
        if len == 0 {
            return None;
        }
        let index = self.current.map_or(0, |i| (i + 1) % len);
        self.select(index);
        Some(index)
    }

    /// Select the previous image, wrapping to the last.
    pub fn prev(&mut self) -> Option<usize> {
        let len = self.images.len();
        if len == 0 {
            return None;
        }
        let index = match self.current {
            Some(0) | None => len - 1,
            Some(i) => i - 1,
        };
        self.select(index);
        Some(index)
    }

    /// Swap back to the previously shown image.
    pub fn toggle_last(&mut self) -> Option<usize> {
        let last = self.last.filter(|&i| i < self.images.len())?;
        self.select(last);
        Some(last)
    }

    /// Evict the image at `index`, releasing its buffers.
    pub fn remove(&mut self, index: usize) -> Option<IvImage> {
        if index >= self.images.len() {
            return None;
        }
        let mut image = self.images.remove(index);
        image.cancel_decode();

        let fix = |slot: Option<usize>| match slot {
            Some(i) if i == index => None,
            Some(i) if i > index => Some(i - 1),
            other => other,
        };
        let was_current = self.current == Some(index);
        self.current = fix(self.current);
        self.last = fix(self.last);

        if was_current && !self.images.is_empty() {
            // Show the neighbour that slid into place, or the new last image
            self.current = Some(index.min(self.images.len() - 1));
            if self.last == self.current {
                self.last = None;
            }
        }
        log::info!("🖼️ Closed {}", image.name());
        Some(image)
    }

    /// Evict the current image.
    pub fn close_current(&mut self) -> Option<IvImage> {
        let index = self.current?;
        self.remove(index)
    }
}

/// Expand command-line paths: files are kept as given, directories
/// contribute their image files in sorted order.
pub fn collect_image_paths(paths: &[PathBuf]) -> Vec<PathBuf> {
    let mut out = Vec::new();
    for path in paths {
        if path.is_dir() {
            match images_in_folder(path) {
                Ok(found) => out.extend(found),
                Err(e) => log::warn!("Cannot read folder {:?}: {}", path, e),
            }
        } else {
            out.push(path.clone());
        }
    }
    out
}

fn images_in_folder(folder: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut paths: Vec<PathBuf> = std::fs::read_dir(folder)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && is_image_file(path))
        .collect();
    paths.sort();
    Ok(paths)
}
