//! DOCX (and friends) to PDF through a headless LibreOffice.
//!
//! One subprocess per call, argument list only, output captured, bounded by
//! the configured timeout. Nothing is retried.

use std::collections::HashMap;
use std::ffi::OsString;
use std::io::ErrorKind as IoErrorKind;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use serde::Serialize;
use tempfile::TempDir;
use tokio::process::Command;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use utoipa::ToSchema;

use crate::config::ConverterConfig;
use crate::error::{ConvertError, FailureReason};
use crate::metrics::ConversionMetrics;
use crate::workspace::{discard_partial, resolve_output_directory};

/// Input formats LibreOffice reliably imports headlessly.
pub const SUPPORTED_EXTENSIONS: &[&str] = &[
    "docx", "doc", "odt", "rtf", "txt", "html", "htm", "xlsx", "xls", "ods", "pptx", "ppt", "odp",
];

#[derive(Debug, Clone)]
pub struct ConversionRequest {
    pub source_path: PathBuf,
    pub output_directory: Option<PathBuf>,
}

impl ConversionRequest {
    pub fn new(source_path: impl Into<PathBuf>) -> Self {
        Self {
            source_path: source_path.into(),
            output_directory: None,
        }
    }

    pub fn with_output_directory(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_directory = Some(dir.into());
        self
    }

    /// Check the source before anything is spawned.
    pub fn validate(&self) -> Result<(), ConvertError> {
        let source = &self.source_path;
        if !source.exists() {
            return Err(ConvertError::invalid(format!(
                "input file not found: {}",
                source.display()
            )));
        }
        if !source.is_file() {
            return Err(ConvertError::invalid(format!(
                "input path is not a file: {}",
                source.display()
            )));
        }

        let extension = source
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        if !SUPPORTED_EXTENSIONS.contains(&extension.as_str()) {
            return Err(ConvertError::invalid(format!(
                "unsupported input format '{}' for {} (supported: {})",
                extension,
                source.display(),
                SUPPORTED_EXTENSIONS.join(", ")
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ConversionResult {
    #[schema(value_type = String)]
    pub output_path: PathBuf,
    pub success: bool,
    pub message: String,
}

/// Output paths currently being produced, one lock per path.
#[derive(Default)]
struct TargetLocks {
    held: Mutex<HashMap<PathBuf, Arc<AsyncMutex<()>>>>,
}

impl TargetLocks {
    async fn acquire(self: &Arc<Self>, target: &Path) -> TargetGuard {
        let lock = {
            let mut held = self.held.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(held.entry(target.to_path_buf()).or_default())
        };
        TargetGuard {
            guard: Some(lock.lock_owned().await),
            locks: Arc::clone(self),
            target: target.to_path_buf(),
        }
    }
}

struct TargetGuard {
    guard: Option<OwnedMutexGuard<()>>,
    locks: Arc<TargetLocks>,
    target: PathBuf,
}

impl Drop for TargetGuard {
    fn drop(&mut self) {
        self.guard.take();
        let mut held = self.locks.held.lock().unwrap_or_else(PoisonError::into_inner);
        // Only the map still refers to the lock: nobody is waiting on it.
        if held
            .get(&self.target)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            held.remove(&self.target);
        }
    }
}

/// Handle on the external converter. Cheap to clone.
#[derive(Clone)]
pub struct Converter {
    config: Arc<ConverterConfig>,
    metrics: ConversionMetrics,
    targets: Arc<TargetLocks>,
}

impl Converter {
    pub fn new(config: ConverterConfig) -> Self {
        Self::with_metrics(config, ConversionMetrics::new())
    }

    pub fn with_metrics(config: ConverterConfig, metrics: ConversionMetrics) -> Self {
        Self {
            config: Arc::new(config),
            metrics,
            targets: Arc::default(),
        }
    }

    pub fn config(&self) -> &ConverterConfig {
        &self.config
    }

    /// Convert `request.source_path` to PDF.
    pub async fn convert(&self, request: &ConversionRequest) -> Result<ConversionResult, ConvertError> {
        request.validate()?;

        let output_dir = resolve_output_directory(
            request.output_directory.as_deref(),
            &self.config.work_root,
        )?;
        let source = std::fs::canonicalize(&request.source_path).map_err(|err| {
            ConvertError::invalid(format!(
                "input file {} is not readable: {}",
                request.source_path.display(),
                err
            ))
        })?;
        let expected = expected_output(&source, &output_dir)?;

        // Conversions sharing an output path take turns; the second one
        // replaces the first one's PDF once the first has returned.
        let _target = self.targets.acquire(&expected).await;

        // A leftover from an earlier run must not pass for fresh output.
        discard_partial(&expected);

        let started = Instant::now();
        let outcome = self.run(&source, &output_dir, &expected).await;
        let elapsed = started.elapsed();

        match &outcome {
            Ok(_) => {
                self.metrics.observe("success", elapsed);
                log::info!(
                    "Converted {} -> {} in {:.2}s",
                    source.display(),
                    expected.display(),
                    elapsed.as_secs_f64()
                );
            }
            Err(err) => {
                discard_partial(&expected);
                let label = if err.is_timeout() { "timeout" } else { "failure" };
                self.metrics.observe(label, elapsed);
                log::error!("Conversion of {} failed: {}", source.display(), err);
            }
        }

        outcome.map(|output_path| ConversionResult {
            output_path,
            success: true,
            message: "Conversion successful".to_string(),
        })
    }

    async fn run(
        &self,
        source: &Path,
        output_dir: &Path,
        expected: &Path,
    ) -> Result<PathBuf, ConvertError> {
        // Dropped at the end of the call, removing the throwaway profile.
        let profile = if self.config.isolate_profile {
            Some(TempDir::new().map_err(|err| ConvertError::io("create LibreOffice profile", err))?)
        } else {
            None
        };

        let args = conversion_args(source, output_dir, profile.as_ref().map(TempDir::path));
        log::debug!(
            "Running {} {:?}",
            self.config.libreoffice_path.display(),
            args
        );

        let mut command = Command::new(&self.config.libreoffice_path);
        command
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = match tokio::time::timeout(self.config.timeout, command.output()).await {
            Err(_) => {
                return Err(ConvertError::ConversionFailed {
                    reason: FailureReason::TimedOut(self.config.timeout),
                    diagnostics: String::new(),
                })
            }
            Ok(Err(err)) if err.kind() == IoErrorKind::NotFound => {
                return Err(ConvertError::missing_binary(&self.config.libreoffice_path))
            }
            Ok(Err(err)) => {
                return Err(ConvertError::io(
                    format!("spawn {}", self.config.libreoffice_path.display()),
                    err,
                ))
            }
            Ok(Ok(output)) => output,
        };

        let diagnostics = collect_diagnostics(&output.stdout, &output.stderr);

        if !output.status.success() {
            return Err(ConvertError::ConversionFailed {
                reason: FailureReason::ExitStatus(output.status.code()),
                diagnostics,
            });
        }

        if !expected.is_file() {
            return Err(ConvertError::ConversionFailed {
                reason: FailureReason::MissingOutput(expected.to_path_buf()),
                diagnostics,
            });
        }

        Ok(expected.to_path_buf())
    }

    /// Run `<binary> --version` to make sure the tool is installed.
    pub async fn check_environment(&self) -> Result<String, ConvertError> {
        let mut command = Command::new(&self.config.libreoffice_path);
        command
            .arg("--version")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = match tokio::time::timeout(self.config.timeout, command.output()).await {
            Err(_) => {
                return Err(ConvertError::Environment(format!(
                    "'{} --version' did not answer within {}s",
                    self.config.libreoffice_path.display(),
                    self.config.timeout.as_secs()
                )))
            }
            Ok(Err(err)) if err.kind() == IoErrorKind::NotFound => {
                return Err(ConvertError::missing_binary(&self.config.libreoffice_path))
            }
            Ok(Err(err)) => {
                return Err(ConvertError::Environment(format!(
                    "cannot execute {}: {}",
                    self.config.libreoffice_path.display(),
                    err
                )))
            }
            Ok(Ok(output)) => output,
        };

        if !output.status.success() {
            return Err(ConvertError::Environment(format!(
                "'{} --version' failed: {}",
                self.config.libreoffice_path.display(),
                collect_diagnostics(&output.stdout, &output.stderr)
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

/// Argument list handed to `soffice`. Never joined into a shell string.
pub fn conversion_args(source: &Path, output_dir: &Path, profile: Option<&Path>) -> Vec<OsString> {
    let mut args = Vec::with_capacity(7);
    if let Some(profile) = profile {
        args.push(OsString::from(format!(
            "-env:UserInstallation={}",
            file_url(profile)
        )));
    }
    args.push(OsString::from("--headless"));
    args.push(OsString::from("--convert-to"));
    args.push(OsString::from("pdf"));
    args.push(OsString::from("--outdir"));
    args.push(output_dir.as_os_str().to_os_string());
    args.push(source.as_os_str().to_os_string());
    args
}

/// LibreOffice names its output after the source stem.
pub fn expected_output(source: &Path, output_dir: &Path) -> Result<PathBuf, ConvertError> {
    let stem = source.file_stem().ok_or_else(|| {
        ConvertError::invalid(format!("input path has no file name: {}", source.display()))
    })?;
    let mut name = stem.to_os_string();
    name.push(".pdf");
    Ok(output_dir.join(name))
}

fn file_url(path: &Path) -> String {
    let raw = path.to_string_lossy().replace('\\', "/");
    let encoded = raw.replace('%', "%25").replace(' ', "%20");
    if encoded.starts_with('/') {
        format!("file://{encoded}")
    } else {
        format!("file:///{encoded}")
    }
}

fn collect_diagnostics(stdout: &[u8], stderr: &[u8]) -> String {
    let stderr = String::from_utf8_lossy(stderr);
    let stdout = String::from_utf8_lossy(stdout);
    match (stderr.trim(), stdout.trim()) {
        ("", out) => out.to_string(),
        (err, "") => err.to_string(),
        (err, out) => format!("{err}\n{out}"),
    }
}
