//! Replays still images as a camera feed.
//!
//! Accepts a directory (every image inside, sorted by file name) or a single
//! image file. Frames cycle forever until the source is stopped.

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};

use super::{FrameSource, SourceStats};
use crate::frame::Frame;

const IMAGE_EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "webp"];

pub struct ImageDirSource {
    root: PathBuf,
    name: String,
    files: Vec<PathBuf>,
    cursor: usize,
    frame_count: u64,
    connected: bool,
    last_error: Option<String>,
}

impl ImageDirSource {
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            name: root.display().to_string(),
            files: Vec::new(),
            cursor: 0,
            frame_count: 0,
            connected: false,
            last_error: None,
        }
    }

    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }
}

fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

fn list_images(root: &Path) -> Result<Vec<PathBuf>> {
    if root.is_file() {
        return Ok(vec![root.to_path_buf()]);
    }
    let entries =
        std::fs::read_dir(root).with_context(|| format!("read image directory {}", root.display()))?;
    let mut files = Vec::new();
    for entry in entries {
        let path = entry.context("read directory entry")?.path();
        if path.is_file() && has_image_extension(&path) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

impl FrameSource for ImageDirSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn connect(&mut self) -> Result<()> {
        let files = list_images(&self.root)?;
        if files.is_empty() {
            return Err(anyhow!("no images found in {}", self.root.display()));
        }
        log::info!(
            "ImageDirSource: connected to {} ({} images)",
            self.name,
            files.len()
        );
        self.files = files;
        self.cursor = 0;
        self.connected = true;
        self.last_error = None;
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        if !self.connected || self.files.is_empty() {
            return Ok(None);
        }
        let path = self.files[self.cursor].clone();
        self.cursor = (self.cursor + 1) % self.files.len();

        let image = image::open(&path).map_err(|err| {
            self.last_error = Some(err.to_string());
            anyhow::Error::new(err).context(format!("decode {}", path.display()))
        })?;
        self.last_error = None;
        self.frame_count += 1;
        Ok(Some(Frame::from_image(&image, self.frame_count)))
    }

    fn is_healthy(&self) -> bool {
        self.connected && self.last_error.is_none()
    }

    fn stop(&mut self) {
        self.connected = false;
    }

    fn stats(&self) -> SourceStats {
        SourceStats {
            frames_captured: self.frame_count,
            source: self.name.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    #[test]
    fn cycles_through_sorted_images() -> Result<()> {
        let dir = tempfile::tempdir()?;
        RgbImage::from_pixel(4, 2, Rgb([1, 2, 3])).save(dir.path().join("b.png"))?;
        RgbImage::from_pixel(6, 3, Rgb([4, 5, 6])).save(dir.path().join("a.png"))?;
        std::fs::write(dir.path().join("notes.txt"), b"ignored")?;

        let mut source = ImageDirSource::new(dir.path());
        source.connect()?;
        assert_eq!(source.files().len(), 2);

        let sizes: Vec<_> = (0..3)
            .map(|_| source.next_frame().unwrap().unwrap().size())
            .map(|s| (s.width, s.height))
            .collect();
        assert_eq!(sizes, vec![(6, 3), (4, 2), (6, 3)]);
        Ok(())
    }

    #[test]
    fn empty_directory_fails_to_connect() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let mut source = ImageDirSource::new(dir.path());
        assert!(source.connect().is_err());
        Ok(())
    }
}
