//! Shared helpers for integration tests.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use iv::error::{IvError, Result};
use iv::{ImageDecoder, ImageSpec, SampleFormat};

/// Decoder serving generated greyscale ramps, one entry per subimage size.
#[derive(Default)]
pub struct RampDecoder {
    files: Mutex<HashMap<PathBuf, Vec<(u32, u32)>>>,
    reads: AtomicUsize,
}

impl RampDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_files(names: &[&str], width: u32, height: u32) -> Self {
        let decoder = Self::new();
        for name in names {
            decoder.add(name, &[(width, height)]);
        }
        decoder
    }

    pub fn add(&self, path: impl Into<PathBuf>, subimages: &[(u32, u32)]) {
        self.files
            .lock()
            .unwrap()
            .insert(path.into(), subimages.to_vec());
    }

    pub fn read_calls(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

impl ImageDecoder for RampDecoder {
    fn id(&self) -> &'static str {
        "ramp"
    }

    fn open(&self, path: &Path, subimage: u32) -> Result<ImageSpec> {
        let files = self.files.lock().unwrap();
        let subimages = files.get(path).ok_or_else(|| IvError::file_not_found(path))?;
        let &(width, height) = subimages
            .get(subimage as usize)
            .ok_or_else(|| IvError::invalid_state(format!("no subimage {}", subimage)))?;

        let mut spec = ImageSpec::new(width, height, 1, SampleFormat::U8);
        spec.subimage = subimage;
        spec.nsubimages = subimages.len() as u32;
        spec.format_name = "ramp".to_string();
        Ok(spec)
    }

    fn read_pixels(
        &self,
        _path: &Path,
        spec: &ImageSpec,
        buf: &mut [u8],
        progress: &mut dyn FnMut(f32) -> bool,
    ) -> Result<()> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        for (i, v) in buf.iter_mut().enumerate() {
            *v = (i % 256) as u8;
        }
        if !progress(1.0) {
            return Err(IvError::Cancelled);
        }
        debug_assert_eq!(buf.len(), spec.image_bytes());
        Ok(())
    }
}
