//! Capture devices for the terminal.
//!
//! A terminal has no camera API, so a take comes either from an existing
//! file or from an external recorder process (ffmpeg, gstreamer, ...) that
//! writes to a temporary file until it is told to stop.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};

use rehearse_core::recording::{Capture, MediaDevice, Recording, RECORDING_MIME_TYPE};
use rehearse_core::{Error, Result};
use tokio::io::AsyncWriteExt;
use tokio::process::{Child, Command};

use crate::error::CliError;

const OUTPUT_PLACEHOLDER: &str = "{output}";
const RECORDER_STOP_TIMEOUT: Duration = Duration::from_secs(10);

/// Replays a recording that already exists on disk.
#[derive(Clone, Debug)]
pub struct FileCaptureDevice {
    path: PathBuf,
}

impl FileCaptureDevice {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

pub struct FileCapture {
    path: PathBuf,
    mime_type: String,
}

impl MediaDevice for FileCaptureDevice {
    type Capture = FileCapture;

    async fn open(&self) -> Result<FileCapture> {
        let metadata = tokio::fs::metadata(&self.path).await.map_err(|error| {
            Error::Device(format!("{}: {error}", self.path.display()))
        })?;
        if !metadata.is_file() {
            return Err(Error::Device(format!(
                "{} is not a file",
                self.path.display()
            )));
        }
        let mime_type = video_mime_type(&self.path)?;
        Ok(FileCapture {
            path: self.path.clone(),
            mime_type,
        })
    }
}

impl Capture for FileCapture {
    async fn finish(self) -> Result<Recording> {
        let bytes = read_take(&self.path).await?;
        Ok(Recording {
            bytes,
            mime_type: self.mime_type,
            duration: Duration::ZERO,
        })
    }
}

/// The take's MIME type from its extension. Only video files are accepted.
fn video_mime_type(path: &Path) -> Result<String> {
    match mime_guess::from_path(path).first() {
        Some(mime) if mime.type_() == mime_guess::mime::VIDEO => Ok(mime.essence_str().to_string()),
        Some(mime) => Err(Error::Device(format!(
            "{} is not a video file ({mime})",
            path.display()
        ))),
        None => Err(Error::Device(format!(
            "{} has no recognizable video extension",
            path.display()
        ))),
    }
}

/// Runs a recorder command that writes to `{output}`.
///
/// Stopping writes `q` to the recorder's stdin and closes it, which ends an
/// ffmpeg capture cleanly; a recorder that ignores both is killed after a
/// timeout. The command runs in its own process group so everything the
/// shell started is stopped with it.
#[derive(Clone, Debug)]
pub struct CommandCaptureDevice {
    template: String,
    output_dir: PathBuf,
}

impl CommandCaptureDevice {
    pub fn new(template: impl Into<String>) -> std::result::Result<Self, CliError> {
        Self::with_output_dir(template, std::env::temp_dir())
    }

    pub fn with_output_dir(
        template: impl Into<String>,
        output_dir: impl Into<PathBuf>,
    ) -> std::result::Result<Self, CliError> {
        let template = template.into();
        if template.trim().is_empty() {
            return Err(CliError::InvalidArgument(
                "Recorder command cannot be empty".to_string(),
            ));
        }
        if !template.contains(OUTPUT_PLACEHOLDER) {
            return Err(CliError::InvalidArgument(format!(
                "Recorder command must contain {OUTPUT_PLACEHOLDER}"
            )));
        }
        Ok(Self {
            template,
            output_dir: output_dir.into(),
        })
    }

    fn command_line(&self, output: &Path) -> String {
        self.template
            .replace(OUTPUT_PLACEHOLDER, &quote_path(output))
    }
}

pub struct CommandCapture {
    child: Option<Child>,
    group: Option<u32>,
    output: PathBuf,
    started: Instant,
}

impl MediaDevice for CommandCaptureDevice {
    type Capture = CommandCapture;

    async fn open(&self) -> Result<CommandCapture> {
        let output = self
            .output_dir
            .join(format!("rehearse-{}.webm", uuid::Uuid::now_v7()));
        let command_line = self.command_line(&output);
        tracing::debug!("Starting recorder: {}", command_line);

        let mut command = shell(&command_line);
        command
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true);
        #[cfg(unix)]
        command.process_group(0);
        let child = command
            .spawn()
            .map_err(|error| Error::Device(format!("failed to start recorder: {error}")))?;

        Ok(CommandCapture {
            group: child.id(),
            child: Some(child),
            output,
            started: Instant::now(),
        })
    }
}

impl Capture for CommandCapture {
    async fn finish(mut self) -> Result<Recording> {
        let duration = self.started.elapsed();
        if let Some(mut child) = self.child.take() {
            if let Some(mut stdin) = child.stdin.take() {
                // The recorder may already have exited and closed its end.
                let _ = stdin.write_all(b"q\n").await;
                let _ = stdin.shutdown().await;
            }
            match tokio::time::timeout(RECORDER_STOP_TIMEOUT, child.wait()).await {
                Ok(Ok(status)) if !status.success() => {
                    tracing::warn!("Recorder exited with {}", status);
                }
                Ok(Ok(_)) => {}
                Ok(Err(error)) => return Err(Error::Device(error.to_string())),
                Err(_) => {
                    tracing::warn!("Recorder did not stop in time; killing it");
                    self.stop_group();
                    child.kill().await.map_err(|error| Error::Device(error.to_string()))?;
                }
            }
        }
        // Anything the shell left running in the background goes too.
        self.stop_group();

        let bytes = read_take(&self.output).await?;
        Ok(Recording {
            bytes,
            mime_type: RECORDING_MIME_TYPE.to_string(),
            duration,
        })
    }
}

impl CommandCapture {
    fn stop_group(&mut self) {
        if let Some(group) = self.group.take() {
            kill_process_group(group);
        }
    }
}

impl Drop for CommandCapture {
    fn drop(&mut self) {
        // The shell itself is also killed by `kill_on_drop`.
        self.stop_group();
        let _ = std::fs::remove_file(&self.output);
    }
}

async fn read_take(path: &Path) -> Result<Vec<u8>> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|error| Error::Device(format!("{}: {error}", path.display())))?;
    if bytes.is_empty() {
        return Err(Error::Device(format!(
            "{} contains no recording",
            path.display()
        )));
    }
    Ok(bytes)
}

#[cfg(not(windows))]
fn shell(command_line: &str) -> Command {
    let mut command = Command::new("sh");
    command.arg("-c").arg(command_line);
    command
}

#[cfg(windows)]
fn shell(command_line: &str) -> Command {
    let mut command = Command::new("cmd");
    command.arg("/C").arg(command_line);
    command
}

#[cfg(unix)]
#[allow(unsafe_code)]
fn kill_process_group(group: u32) {
    let Ok(group) = libc::pid_t::try_from(group) else {
        return;
    };
    // SAFETY: kill(2) takes no pointers; a negative pid addresses the group
    // created at spawn, whose id is the shell's pid.
    let result = unsafe { libc::kill(-group, libc::SIGKILL) };
    if result != 0 {
        tracing::debug!(
            "Recorder group {} already gone: {}",
            group,
            std::io::Error::last_os_error()
        );
    }
}

#[cfg(windows)]
fn kill_process_group(pid: u32) {
    let result = std::process::Command::new("taskkill")
        .args(["/PID", &pid.to_string(), "/T", "/F"])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status();
    if let Err(error) = result {
        tracing::debug!("taskkill for recorder {} failed: {}", pid, error);
    }
}

#[cfg(not(windows))]
fn quote_path(path: &Path) -> String {
    format!("'{}'", path.display().to_string().replace('\'', "'\\''"))
}

#[cfg(windows)]
fn quote_path(path: &Path) -> String {
    format!("\"{}\"", path.display())
}
