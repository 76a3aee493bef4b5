use super::{AcquiredManifest, AcquisitionError, ManifestAcquirer};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::debug;

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Runs `DepotDownloader -manifest-only` for one published file at a time.
pub struct DepotDownloader {
    executable: PathBuf,
    app_id: String,
}

impl DepotDownloader {
    pub fn new(executable: impl Into<PathBuf>, app_id: impl Into<String>) -> Self {
        Self {
            executable: executable.into(),
            app_id: app_id.into(),
        }
    }

    pub fn executable(&self) -> &Path {
        &self.executable
    }

    fn command(&self, workshop_id: &str) -> Command {
        let mut cmd = Command::new(&self.executable);
        cmd.args([
            "-app",
            self.app_id.as_str(),
            "-pubfile",
            workshop_id,
            "-manifest-only",
        ])
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
        if let Some(dir) = self.executable.parent() {
            if !dir.as_os_str().is_empty() {
                cmd.current_dir(dir);
            }
        }
        cmd
    }
}

impl ManifestAcquirer for DepotDownloader {
    fn ensure_available(&self) -> Result<(), AcquisitionError> {
        if self.executable.is_file() {
            Ok(())
        } else {
            Err(AcquisitionError::Unavailable(format!(
                "DepotDownloader not found at {}",
                self.executable.display()
            )))
        }
    }

    fn acquire(
        &self,
        workshop_id: &str,
        timeout: Duration,
    ) -> Result<AcquiredManifest, AcquisitionError> {
        let mut child = self.command(workshop_id).spawn()?;
        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        wait_with_deadline(&mut child, timeout)?;

        let mut output = join_output(stdout);
        output.push_str(&join_output(stderr));
        debug!("DepotDownloader output for {}: {} bytes", workshop_id, output.len());
        classify_output(&output)
    }
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> Option<JoinHandle<String>> {
    pipe.map(|mut reader| {
        thread::spawn(move || {
            let mut buf = Vec::new();
            let _ = reader.read_to_end(&mut buf);
            String::from_utf8_lossy(&buf).into_owned()
        })
    })
}

fn join_output(handle: Option<JoinHandle<String>>) -> String {
    handle.and_then(|h| h.join().ok()).unwrap_or_default()
}

fn wait_with_deadline(child: &mut Child, timeout: Duration) -> Result<(), AcquisitionError> {
    let started = Instant::now();
    loop {
        if child.try_wait()?.is_some() {
            return Ok(());
        }
        if started.elapsed() >= timeout {
            let _ = child.kill();
            let _ = child.wait();
            return Err(AcquisitionError::Timeout(timeout));
        }
        thread::sleep(POLL_INTERVAL);
    }
}

/// Maps the tool's combined stdout/stderr to an outcome.
pub(crate) fn classify_output(output: &str) -> Result<AcquiredManifest, AcquisitionError> {
    let lower = output.to_lowercase();
    if output.contains("No subscription") || lower.contains("not subscribed") {
        return Err(AcquisitionError::NotSubscribed);
    }
    if output.contains("Login") && output.contains("FAILED") {
        return Err(AcquisitionError::LoginFailed);
    }
    if lower.contains("manifest") {
        Ok(AcquiredManifest::default())
    } else {
        Err(AcquisitionError::NoOutput)
    }
}
