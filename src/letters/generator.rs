use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use tempfile::TempDir;

use super::naming::LetterNaming;
use super::{BatchReport, FormLetterBatch, OutputFormat, RecipientEntry, RecipientOutcome};
use crate::config::{IntermediatePolicy, LetterConfig, MissingFieldPolicy};
use crate::converter::{ConversionRequest, Converter};
use crate::docx::{extract_placeholders, DocxTemplate, TemplateError};
use crate::error::{ConvertError, ErrorKind};
use crate::workspace::{discard_partial, resolve_output_directory};

const TEMPLATE_EXTENSIONS: &[&str] = &["docx", "dotx"];

/// Where each recipient's files go for one batch.
struct BatchTargets {
    output_dir: PathBuf,
    /// Holds discarded intermediates; removed when the batch ends.
    scratch: Option<TempDir>,
    naming: LetterNaming,
    format: OutputFormat,
    /// Field names the template expects.
    fields: BTreeSet<String>,
}

impl BatchTargets {
    fn docx_dir(&self) -> &Path {
        self.scratch
            .as_ref()
            .map(TempDir::path)
            .unwrap_or(&self.output_dir)
    }
}

#[derive(Clone)]
pub struct FormLetterGenerator {
    converter: Converter,
    config: Arc<LetterConfig>,
}

impl FormLetterGenerator {
    pub fn new(converter: Converter, config: LetterConfig) -> Self {
        Self {
            converter,
            config: Arc::new(config),
        }
    }

    /// Render one document per recipient and, for PDF output, convert it.
    ///
    /// Fails as a whole only when the batch itself is unusable. Problems with
    /// individual recipients are reported in their outcomes.
    pub async fn generate(&self, batch: FormLetterBatch) -> Result<BatchReport, ConvertError> {
        let template = Arc::new(load_template(&batch.template_path)?);
        if batch.recipients.is_empty() {
            return Err(ConvertError::invalid("at least one recipient is required"));
        }

        let work_root = &self.converter.config().work_root;
        let output_dir = resolve_output_directory(batch.output_directory.as_deref(), work_root)?;

        let scratch = match (batch.output_format, self.config.intermediate_policy) {
            (OutputFormat::Pdf, IntermediatePolicy::Discard) => {
                std::fs::create_dir_all(work_root)
                    .map_err(|err| ConvertError::io(format!("create {}", work_root.display()), err))?;
                Some(
                    tempfile::Builder::new()
                        .prefix("letters-")
                        .tempdir_in(work_root)
                        .map_err(|err| ConvertError::io("create scratch directory", err))?,
                )
            }
            _ => None,
        };

        let targets = BatchTargets {
            output_dir: output_dir.clone(),
            scratch,
            naming: LetterNaming::for_batch(batch.recipients.len()),
            format: batch.output_format,
            fields: extract_placeholders(&template),
        };

        log::info!(
            "Generating {} form letter(s) from {} into {} as {}",
            batch.recipients.len(),
            batch.template_path.display(),
            output_dir.display(),
            batch.output_format
        );

        let outcomes: Vec<RecipientOutcome> = stream::iter(batch.recipients.into_iter().enumerate())
            .map(|(index, entry)| self.process(&template, &targets, index, entry))
            .buffered(self.config.max_parallel.max(1))
            .collect()
            .await;

        let report = BatchReport {
            output_directory: output_dir,
            output_format: batch.output_format,
            outcomes,
        };

        if report.all_succeeded() {
            log::info!("{}", report.summary());
        } else {
            log::warn!("{}", report.summary());
        }
        Ok(report)
    }

    async fn process(
        &self,
        template: &Arc<DocxTemplate>,
        targets: &BatchTargets,
        index: usize,
        entry: RecipientEntry,
    ) -> RecipientOutcome {
        let recipient = match entry {
            Ok(recipient) => recipient,
            Err(errors) => {
                log::warn!("Skipping recipient {}: {}", index, errors);
                return RecipientOutcome::failed(index, ErrorKind::InvalidInput, errors.to_message());
            }
        };

        let stem = targets.naming.stem(index, recipient.display_name());
        let fields = recipient.fields().clone();

        if self.config.missing_field_policy == MissingFieldPolicy::Fail {
            let missing: Vec<String> = targets
                .fields
                .iter()
                .filter(|name| !fields.contains_key(*name))
                .cloned()
                .collect();
            if !missing.is_empty() {
                return failed(index, TemplateError::MissingFields(missing).into());
            }
        }

        match targets.format {
            OutputFormat::Docx => {
                let path = targets.output_dir.join(format!("{stem}.docx"));
                match self.render(template, fields, &path).await {
                    Ok(()) => RecipientOutcome::succeeded(index, path, None),
                    Err(err) => failed(index, err),
                }
            }
            OutputFormat::Pdf => {
                let docx = targets.docx_dir().join(format!("{stem}.docx"));
                if let Err(err) = self.render(template, fields, &docx).await {
                    return failed(index, err);
                }

                let request = ConversionRequest::new(&docx).with_output_directory(&targets.output_dir);
                let converted = self.converter.convert(&request).await;

                let keep = targets.scratch.is_none();
                match converted {
                    Ok(result) => {
                        if !keep {
                            discard_partial(&docx);
                        }
                        RecipientOutcome::succeeded(index, result.output_path, keep.then_some(docx))
                    }
                    Err(err) => {
                        discard_partial(&docx);
                        failed(index, err)
                    }
                }
            }
        }
    }

    async fn render(
        &self,
        template: &Arc<DocxTemplate>,
        fields: BTreeMap<String, String>,
        path: &Path,
    ) -> Result<(), ConvertError> {
        let template = Arc::clone(template);
        let policy: MissingFieldPolicy = self.config.missing_field_policy;
        let target = path.to_path_buf();

        tokio::task::spawn_blocking(move || template.render_to(&fields, policy, &target))
            .await
            .map_err(|err| {
                ConvertError::io(
                    "render letter",
                    std::io::Error::new(std::io::ErrorKind::Other, err),
                )
            })?
            .map_err(ConvertError::from)
    }
}

fn failed(index: usize, err: ConvertError) -> RecipientOutcome {
    log::warn!("Recipient {} failed: {}", index, err);
    let message = match &err {
        ConvertError::Template(inner @ TemplateError::MissingFields(_)) => inner.to_string(),
        other => other.to_string(),
    };
    RecipientOutcome::failed(index, err.kind(), message)
}

fn load_template(path: &Path) -> Result<DocxTemplate, ConvertError> {
    if !path.is_file() {
        return Err(ConvertError::invalid(format!(
            "template file not found: {}",
            path.display()
        )));
    }
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    if !TEMPLATE_EXTENSIONS.contains(&extension.as_str()) {
        return Err(ConvertError::invalid(format!(
            "template must be a .docx file: {}",
            path.display()
        )));
    }
    let template = DocxTemplate::open(path)?;
    log::debug!(
        "Template {} expects fields {:?}",
        path.display(),
        extract_placeholders(&template)
    );
    Ok(template)
}
