//! Blocking frame sources

use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};
use std::time::Duration;
use tokio::process::Command;
use tokio::runtime::Handle;
use tracing::{debug, info, warn};

use crate::{CameraError, Frame};

/// Blocking camera driver capability.
///
/// `grab` performs one fresh acquisition. It runs on the blocking pool, so
/// it may take as long as the exposure needs; [`crate::FrameCapture`]
/// enforces the deadline.
pub trait FrameSource: Send {
    fn grab(&mut self) -> Result<Frame, CameraError>;
}

impl<T: FrameSource + ?Sized> FrameSource for Box<T> {
    fn grab(&mut self) -> Result<Frame, CameraError> {
        (**self).grab()
    }
}

/// Runs an external still-capture program and decodes the image it writes
/// to stdout, e.g. `libcamera-still -n -t 1 -o - --width 1280 --height 720`.
///
/// A program still running after `timeout` is killed, so a hung camera
/// stack releases the source before the next cycle.
pub struct CommandSource {
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl CommandSource {
    pub fn new(program: impl Into<String>, args: Vec<String>, timeout: Duration) -> Self {
        let program = program.into();
        info!("Using still-capture command: {} {}", program, args.join(" "));
        Self {
            program,
            args,
            timeout,
        }
    }

    async fn run(&self) -> Result<Output, CameraError> {
        let child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| CameraError::Open(format!("{}: {}", self.program, e)))?;

        match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => Ok(output),
            Ok(Err(e)) => Err(CameraError::Stream(format!("{}: {}", self.program, e))),
            Err(_) => {
                warn!(
                    "{} still running after {}ms, killing it",
                    self.program,
                    self.timeout.as_millis()
                );
                Err(CameraError::Stream(format!(
                    "{} timed out after {}ms",
                    self.program,
                    self.timeout.as_millis()
                )))
            }
        }
    }
}

impl FrameSource for CommandSource {
    fn grab(&mut self) -> Result<Frame, CameraError> {
        // Runs on the blocking pool; the child is driven by the owning runtime
        let handle = Handle::try_current()
            .map_err(|e| CameraError::Open(format!("{}: {}", self.program, e)))?;
        let output = handle.block_on(self.run())?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(CameraError::Stream(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                stderr.trim()
            )));
        }

        if output.stdout.is_empty() {
            return Err(CameraError::Stream(format!("{} produced no image", self.program)));
        }

        debug!("Still capture returned {} bytes", output.stdout.len());
        Ok(Frame::decode(&output.stdout)?)
    }
}

/// Replays image files from a directory in name order, wrapping around
pub struct DirectorySource {
    files: Vec<PathBuf>,
    next: usize,
}

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp"];

impl DirectorySource {
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, CameraError> {
        let dir = dir.as_ref();
        let entries = std::fs::read_dir(dir)
            .map_err(|e| CameraError::Open(format!("{}: {}", dir.display(), e)))?;

        let mut files: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| {
                path.extension()
                    .and_then(|ext| ext.to_str())
                    .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
                    .unwrap_or(false)
            })
            .collect();
        files.sort();

        if files.is_empty() {
            return Err(CameraError::Open(format!(
                "no images found in {}",
                dir.display()
            )));
        }

        info!("Replaying {} images from {}", files.len(), dir.display());
        Ok(Self { files, next: 0 })
    }
}

impl FrameSource for DirectorySource {
    fn grab(&mut self) -> Result<Frame, CameraError> {
        let path = &self.files[self.next];
        self.next = (self.next + 1) % self.files.len();

        debug!("Loading frame from {}", path.display());
        let img = image::open(path)?;
        Ok(Frame::from_image(img))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    #[test]
    fn test_directory_source_cycles_in_name_order() {
        let dir = tempfile::tempdir().unwrap();
        RgbImage::from_pixel(2, 2, Rgb([255, 0, 0]))
            .save(dir.path().join("a.png"))
            .unwrap();
        RgbImage::from_pixel(2, 2, Rgb([0, 0, 255]))
            .save(dir.path().join("b.png"))
            .unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let mut source = DirectorySource::open(dir.path()).unwrap();
        assert_eq!(source.grab().unwrap().get_pixel(0, 0), Some([255, 0, 0]));
        assert_eq!(source.grab().unwrap().get_pixel(0, 0), Some([0, 0, 255]));
        assert_eq!(source.grab().unwrap().get_pixel(0, 0), Some([255, 0, 0]));
    }

    #[test]
    fn test_empty_directory_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(DirectorySource::open(dir.path()), Err(CameraError::Open(_))));
    }

    async fn grab_blocking(mut source: CommandSource) -> Result<Frame, CameraError> {
        tokio::task::spawn_blocking(move || source.grab()).await.unwrap()
    }

    #[tokio::test]
    async fn test_missing_program_is_open_error() {
        let source = CommandSource::new(
            "/nonexistent/still-capture",
            vec![],
            Duration::from_secs(1),
        );
        assert!(matches!(grab_blocking(source).await, Err(CameraError::Open(_))));
    }

    #[test]
    fn test_grab_outside_runtime_is_open_error() {
        let mut source = CommandSource::new("true", vec![], Duration::from_secs(1));
        assert!(matches!(source.grab(), Err(CameraError::Open(_))));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_command_image_is_decoded() {
        let dir = tempfile::tempdir().unwrap();
        let still = dir.path().join("still.png");
        RgbImage::from_pixel(3, 2, Rgb([0, 255, 0])).save(&still).unwrap();

        let source = CommandSource::new(
            "cat",
            vec![still.display().to_string()],
            Duration::from_secs(5),
        );
        let frame = grab_blocking(source).await.unwrap();
        assert_eq!((frame.width, frame.height), (3, 2));
        assert_eq!(frame.get_pixel(0, 0), Some([0, 255, 0]));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_failed_command_reports_stderr() {
        let source = CommandSource::new(
            "sh",
            vec!["-c".into(), "echo no camera >&2; exit 1".into()],
            Duration::from_secs(5),
        );
        match grab_blocking(source).await {
            Err(CameraError::Stream(message)) => assert!(message.contains("no camera")),
            other => panic!("expected stream error, got {:?}", other.map(|f| f.sequence)),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_hung_command_is_killed_at_deadline() {
        let source = CommandSource::new(
            "sh",
            vec!["-c".into(), "sleep 5".into()],
            Duration::from_millis(100),
        );
        let started = std::time::Instant::now();
        assert!(matches!(grab_blocking(source).await, Err(CameraError::Stream(_))));
        assert!(started.elapsed() < Duration::from_secs(3));
    }
}
