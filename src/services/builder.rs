use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tempfile::TempDir;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::Command;

use crate::models::package::PackageOptions;
use crate::models::progress::ProgressEvent;

/// File the build command must write its package to, relative to its
/// working directory.
pub const OUTPUT_FILE_NAME: &str = "package.zip";

/// Progress callback handed to a single build call. It may borrow from the
/// caller for the duration of that call.
pub type ProgressFn<'a> = dyn Fn(ProgressEvent) + Send + Sync + 'a;

/// A package artifact on local disk. If the artifact lives in a temporary
/// working directory, the directory is removed when this value drops.
#[derive(Debug)]
pub struct BuiltPackage {
    path: PathBuf,
    _workdir: Option<TempDir>,
}

impl BuiltPackage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            _workdir: None,
        }
    }

    fn in_workdir(path: PathBuf, workdir: TempDir) -> Self {
        Self {
            path,
            _workdir: Some(workdir),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Produces a packaged app from build options.
///
/// One build per call. `progress` is only valid for the duration of the call.
#[async_trait]
pub trait PackageBuilder: Send + Sync {
    async fn build(
        &self,
        options: &PackageOptions,
        progress: &ProgressFn<'_>,
    ) -> Result<BuiltPackage, BuildError>;
}

/// Builds packages by running an external command.
///
/// The command runs in a fresh temporary directory with the options as JSON
/// on stdin and `PACKAGE_OUTPUT` pointing at the file it must produce. Each
/// stdout line is reported as an info progress event, each stderr line as a
/// warning.
pub struct CommandPackageBuilder {
    program: String,
    args: Vec<String>,
}

impl CommandPackageBuilder {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Parse a whitespace-separated command line such as `node build.js --zip`.
    pub fn from_command_line(command: &str) -> Result<Self, BuildError> {
        let mut parts = command.split_whitespace().map(str::to_string);
        let program = parts.next().ok_or(BuildError::NotConfigured)?;
        Ok(Self::new(program, parts.collect()))
    }
}

#[async_trait]
impl PackageBuilder for CommandPackageBuilder {
    async fn build(
        &self,
        options: &PackageOptions,
        progress: &ProgressFn<'_>,
    ) -> Result<BuiltPackage, BuildError> {
        let workdir = tempfile::Builder::new()
            .prefix("pwabuilder-cloudapk-")
            .tempdir()?;
        let output = workdir.path().join(OUTPUT_FILE_NAME);
        let input = serde_json::to_vec(options)?;

        tracing::debug!(program = %self.program, workdir = %workdir.path().display(), "Starting build command");
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .current_dir(workdir.path())
            .env("PACKAGE_OUTPUT", &output)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let mut stdin = child.stdin.take().ok_or(BuildError::MissingPipe("stdin"))?;
        let writer = tokio::spawn(async move {
            let result = stdin.write_all(&input).await;
            drop(stdin);
            result
        });

        let stdout = child.stdout.take().ok_or(BuildError::MissingPipe("stdout"))?;
        let stderr = child.stderr.take().ok_or(BuildError::MissingPipe("stderr"))?;
        let mut stdout = BufReader::new(stdout).split(b'\n');
        let mut stderr = BufReader::new(stderr).split(b'\n');
        let mut stdout_done = false;
        let mut stderr_done = false;
        let mut last_error_line = None;

        while !(stdout_done && stderr_done) {
            tokio::select! {
                line = stdout.next_segment(), if !stdout_done => match line? {
                    Some(line) => progress(ProgressEvent::info(decode_line(&line))),
                    None => stdout_done = true,
                },
                line = stderr.next_segment(), if !stderr_done => match line? {
                    Some(line) => {
                        let line = decode_line(&line);
                        progress(ProgressEvent::warn(line.clone()));
                        last_error_line = Some(line);
                    }
                    None => stderr_done = true,
                },
            }
        }

        let status = child.wait().await?;
        if let Ok(Err(e)) = writer.await {
            // The command may legitimately exit without reading its input.
            tracing::debug!(error = %e, "Build command did not consume options");
        }

        if !status.success() {
            return Err(BuildError::CommandFailed {
                code: status.code(),
                last_line: last_error_line.unwrap_or_default(),
            });
        }

        if !tokio::fs::try_exists(&output).await? {
            return Err(BuildError::MissingArtifact(output));
        }

        Ok(BuiltPackage::in_workdir(output, workdir))
    }
}

/// Build tools do not always emit UTF-8; progress lines are advisory, so
/// invalid bytes are replaced rather than failing the build.
fn decode_line(line: &[u8]) -> String {
    let line = line.strip_suffix(b"\r").unwrap_or(line);
    String::from_utf8_lossy(line).into_owned()
}

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("No build command configured")]
    NotConfigured,

    #[error("Build command exited with code {code:?}: {last_line}")]
    CommandFailed { code: Option<i32>, last_line: String },

    #[error("Build command produced no artifact at {0}")]
    MissingArtifact(PathBuf),

    #[error("Build command {0} was not captured")]
    MissingPipe(&'static str),

    #[error("Build failed: {0}")]
    Other(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}
