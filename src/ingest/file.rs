//! Local frame sources.
//!
//! `FileSource` reads still images from a local directory in name order, or
//! generates synthetic scenes for `stub://` paths. Remote URL schemes are
//! rejected.

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};

use super::FrameSource;
use crate::frame::Frame;

const SYNTHETIC_WIDTH: u32 = 640;
const SYNTHETIC_HEIGHT: u32 = 480;
const SYNTHETIC_OBJECT: u32 = 60;

/// Configuration for a local file source.
#[derive(Clone, Debug)]
pub struct FileConfig {
    /// Image directory, single image file, or `stub://<name>`.
    pub path: String,
    /// Stop after this many frames. `None` means until the source runs dry.
    pub max_frames: Option<u64>,
    /// Restart a directory from its first image when exhausted.
    pub repeat: bool,
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            path: String::new(),
            max_frames: None,
            repeat: false,
        }
    }
}

/// Statistics for a file source.
#[derive(Clone, Debug)]
pub struct FileStats {
    pub frames_captured: u64,
    pub path: String,
}

pub struct FileSource {
    config: FileConfig,
    backend: FileBackend,
    frames_captured: u64,
}

enum FileBackend {
    Synthetic(SyntheticScene),
    Images(ImageSequence),
}

impl FileSource {
    pub fn new(config: FileConfig) -> Result<Self> {
        if !is_local_file_path(&config.path) {
            return Err(anyhow!(
                "frame source only supports local paths and stub:// (got '{}')",
                config.path
            ));
        }
        let backend = if config.path.starts_with("stub://") {
            FileBackend::Synthetic(SyntheticScene::default())
        } else {
            FileBackend::Images(ImageSequence::open(Path::new(&config.path), config.repeat)?)
        };
        log::info!("frame source: {}", config.path);
        Ok(Self {
            config,
            backend,
            frames_captured: 0,
        })
    }

    pub fn stats(&self) -> FileStats {
        FileStats {
            frames_captured: self.frames_captured,
            path: self.config.path.clone(),
        }
    }
}

impl FrameSource for FileSource {
    fn next_frame(&mut self) -> Result<Option<Frame>> {
        if self
            .config
            .max_frames
            .is_some_and(|max| self.frames_captured >= max)
        {
            return Ok(None);
        }
        let frame = match &mut self.backend {
            FileBackend::Synthetic(scene) => Some(scene.next_frame()),
            FileBackend::Images(images) => images.next_frame()?,
        };
        if frame.is_some() {
            self.frames_captured += 1;
        }
        Ok(frame)
    }
}

/// Light table with one dark square drifting left to right.
#[derive(Default)]
struct SyntheticScene {
    tick: u32,
}

impl SyntheticScene {
    fn next_frame(&mut self) -> Frame {
        let mut frame = Frame::solid(SYNTHETIC_WIDTH, SYNTHETIC_HEIGHT, [200, 200, 200]);
        let span = SYNTHETIC_WIDTH - SYNTHETIC_OBJECT;
        let x = (self.tick * 8) % span;
        let y = (SYNTHETIC_HEIGHT - SYNTHETIC_OBJECT) / 2;
        frame.fill_rect(x, y, SYNTHETIC_OBJECT, SYNTHETIC_OBJECT, [10, 10, 10]);
        self.tick = self.tick.wrapping_add(1);
        frame
    }
}

struct ImageSequence {
    paths: Vec<PathBuf>,
    next: usize,
    repeat: bool,
}

impl ImageSequence {
    fn open(path: &Path, repeat: bool) -> Result<Self> {
        let paths = if path.is_dir() {
            let mut paths = Vec::new();
            for entry in std::fs::read_dir(path)
                .with_context(|| format!("read frame directory {}", path.display()))?
            {
                let entry = entry?;
                let candidate = entry.path();
                if candidate.is_file() && is_image_file(&candidate) {
                    paths.push(candidate);
                }
            }
            paths.sort();
            paths
        } else if path.is_file() {
            vec![path.to_path_buf()]
        } else {
            return Err(anyhow!("frame path {} does not exist", path.display()));
        };
        if paths.is_empty() {
            return Err(anyhow!("no images found in {}", path.display()));
        }
        Ok(Self {
            paths,
            next: 0,
            repeat,
        })
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        if self.next >= self.paths.len() {
            if !self.repeat {
                return Ok(None);
            }
            self.next = 0;
        }
        let path = &self.paths[self.next];
        self.next += 1;
        let image = image::open(path)
            .with_context(|| format!("decode frame {}", path.display()))?
            .to_rgb8();
        Ok(Some(Frame::from(image)))
    }
}

fn is_image_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| matches!(ext.to_ascii_lowercase().as_str(), "png" | "jpg" | "jpeg"))
        .unwrap_or(false)
}

fn is_local_file_path(path: &str) -> bool {
    if path.trim().is_empty() {
        return false;
    }
    if path.starts_with("stub://") {
        return true;
    }
    !path.contains("://")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(path: &str) -> FileConfig {
        FileConfig {
            path: path.to_string(),
            ..FileConfig::default()
        }
    }

    #[test]
    fn rejects_remote_urls() {
        assert!(FileSource::new(config("rtsp://camera/stream")).is_err());
        assert!(FileSource::new(config("http://example.com/a.png")).is_err());
        assert!(FileSource::new(config("  ")).is_err());
    }

    #[test]
    fn stub_frames_contain_a_dark_object() {
        let mut source = FileSource::new(FileConfig {
            max_frames: Some(2),
            ..config("stub://scene")
        })
        .unwrap();
        let frame = source.next_frame().unwrap().unwrap();
        assert_eq!((frame.width(), frame.height()), (640, 480));
        assert_eq!(frame.image().get_pixel(30, 240).0, [10, 10, 10]);
        assert!(source.next_frame().unwrap().is_some());
        assert!(source.next_frame().unwrap().is_none());
        assert_eq!(source.stats().frames_captured, 2);
    }

    #[test]
    fn reads_directory_in_name_order() {
        let dir = tempfile::tempdir().unwrap();
        Frame::solid(4, 3, [0, 0, 255])
            .into_image()
            .save(dir.path().join("b.png"))
            .unwrap();
        Frame::solid(4, 3, [255, 0, 0])
            .into_image()
            .save(dir.path().join("a.png"))
            .unwrap();
        std::fs::write(dir.path().join("notes.txt"), "skip").unwrap();

        let mut source = FileSource::new(config(dir.path().to_str().unwrap())).unwrap();
        let first = source.next_frame().unwrap().unwrap();
        assert_eq!(first.image().get_pixel(0, 0).0, [255, 0, 0]);
        let second = source.next_frame().unwrap().unwrap();
        assert_eq!(second.image().get_pixel(0, 0).0, [0, 0, 255]);
        assert!(source.next_frame().unwrap().is_none());
    }

    #[test]
    fn empty_directory_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(FileSource::new(config(dir.path().to_str().unwrap())).is_err());
    }
}
