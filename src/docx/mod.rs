//! DOCX templates.
//!
//! A template is loaded once into memory and never modified. Rendering copies
//! every package entry into a new archive, rewriting only the text-bearing
//! parts that contain placeholders.

pub mod xml;

use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::io::{Cursor, Read, Seek, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::config::MissingFieldPolicy;

const MAIN_PART: &str = "word/document.xml";

/// Largest decompressed size accepted for a single package entry.
pub const MAX_PART_BYTES: u64 = 64 * 1024 * 1024;
/// Largest decompressed size accepted for a whole package.
pub const MAX_PACKAGE_BYTES: u64 = 256 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("not a DOCX package: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("part {part} is not valid XML: {source}")]
    Xml {
        part: String,
        #[source]
        source: roxmltree::Error,
    },
    #[error("{part} exceeds the {limit} byte limit once decompressed")]
    TooLarge { part: String, limit: u64 },
    #[error("part {0} is not UTF-8 encoded")]
    Encoding(String),
    #[error("not a DOCX package: missing {0}")]
    MissingPart(&'static str),
    #[error("recipient has no value for {}", .0.join(", "))]
    MissingFields(Vec<String>),
    #[error("failed to write document: {0}")]
    Write(#[from] std::io::Error),
}

#[derive(Debug, Clone)]
struct PackageEntry {
    name: String,
    data: Vec<u8>,
    compression: CompressionMethod,
    is_dir: bool,
}

/// Parts of a word-processing package that carry body text.
pub fn is_text_part(name: &str) -> bool {
    if name == MAIN_PART || name == "word/footnotes.xml" || name == "word/endnotes.xml" {
        return true;
    }
    let Some(file) = name.strip_prefix("word/") else {
        return false;
    };
    !file.contains('/')
        && file.ends_with(".xml")
        && (file.starts_with("header") || file.starts_with("footer"))
}

/// Decompression bounds applied while a package is read.
#[derive(Debug, Clone, Copy)]
struct PackageLimits {
    part: u64,
    package: u64,
}

impl Default for PackageLimits {
    fn default() -> Self {
        Self {
            part: MAX_PART_BYTES,
            package: MAX_PACKAGE_BYTES,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DocxTemplate {
    entries: Vec<PackageEntry>,
    placeholders: BTreeSet<String>,
}

impl DocxTemplate {
    pub fn open(path: &Path) -> Result<Self, TemplateError> {
        let file = File::open(path).map_err(|source| TemplateError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_reader(file, PackageLimits::default())
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, TemplateError> {
        Self::from_reader(Cursor::new(bytes), PackageLimits::default())
    }

    fn from_reader<R: Read + Seek>(reader: R, limits: PackageLimits) -> Result<Self, TemplateError> {
        let mut archive = ZipArchive::new(reader)?;
        let mut entries = Vec::with_capacity(archive.len());
        let mut total: u64 = 0;

        for index in 0..archive.len() {
            let mut file = archive.by_index(index)?;
            let name = file.name().to_string();

            // Sizes in the archive index are untrusted; they only allow an early reject.
            let part_limit = limits.part.min(limits.package - total);
            if file.size() > part_limit {
                return Err(too_large(name, file.size(), limits));
            }

            let mut data = Vec::new();
            (&mut file)
                .take(part_limit + 1)
                .read_to_end(&mut data)
                .map_err(zip::result::ZipError::from)?;
            let read = data.len() as u64;
            if read > part_limit {
                return Err(too_large(name, read, limits));
            }
            total += read;

            entries.push(PackageEntry {
                name,
                compression: file.compression(),
                is_dir: file.is_dir(),
                data,
            });
        }

        if !entries.iter().any(|e| e.name == MAIN_PART) {
            return Err(TemplateError::MissingPart(MAIN_PART));
        }

        let mut template = Self {
            entries,
            placeholders: BTreeSet::new(),
        };
        let texts = template.paragraphs()?;
        template.placeholders = xml::placeholders_in(&texts).into_iter().collect();
        Ok(template)
    }

    /// Every field name referenced by the template.
    pub fn placeholders(&self) -> &BTreeSet<String> {
        &self.placeholders
    }

    /// Placeholders that `values` does not provide.
    pub fn missing_fields(&self, values: &BTreeMap<String, String>) -> Vec<String> {
        self.placeholders
            .iter()
            .filter(|name| !values.contains_key(*name))
            .cloned()
            .collect()
    }

    /// Paragraph texts of the body, then headers, footers and notes, in
    /// package order.
    pub fn paragraphs(&self) -> Result<Vec<String>, TemplateError> {
        let mut out = Vec::new();
        for entry in self.text_parts() {
            let content = part_str(entry)?;
            out.extend(xml::paragraph_texts(content).map_err(|source| TemplateError::Xml {
                part: entry.name.clone(),
                source,
            })?);
        }
        Ok(out)
    }

    fn text_parts(&self) -> impl Iterator<Item = &PackageEntry> {
        let main = self.entries.iter().filter(|e| e.name == MAIN_PART);
        let others = self
            .entries
            .iter()
            .filter(|e| e.name != MAIN_PART && !e.is_dir && is_text_part(&e.name));
        main.chain(others)
    }

    /// Produce a new package with `values` substituted.
    pub fn render(
        &self,
        values: &BTreeMap<String, String>,
        policy: MissingFieldPolicy,
    ) -> Result<Vec<u8>, TemplateError> {
        if policy == MissingFieldPolicy::Fail {
            let missing = self.missing_fields(values);
            if !missing.is_empty() {
                return Err(TemplateError::MissingFields(missing));
            }
        }

        let resolve = |name: &str| match values.get(name) {
            Some(value) => Some(value.clone()),
            None if policy == MissingFieldPolicy::Blank => Some(String::new()),
            None => None,
        };

        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        for entry in &self.entries {
            let options = SimpleFileOptions::default().compression_method(match entry.compression {
                CompressionMethod::Stored => CompressionMethod::Stored,
                _ => CompressionMethod::Deflated,
            });

            if entry.is_dir {
                writer.add_directory(entry.name.as_str(), options)?;
                continue;
            }

            writer.start_file(entry.name.as_str(), options)?;
            if is_text_part(&entry.name) {
                let content = part_str(entry)?;
                let rewritten = xml::substitute(content, &resolve).map_err(|source| {
                    TemplateError::Xml {
                        part: entry.name.clone(),
                        source,
                    }
                })?;
                match rewritten {
                    Some(text) => writer.write_all(text.as_bytes())?,
                    None => writer.write_all(&entry.data)?,
                }
            } else {
                writer.write_all(&entry.data)?;
            }
        }

        Ok(writer.finish()?.into_inner())
    }

    /// Render and write to `path`. A failed write leaves no file behind.
    pub fn render_to(
        &self,
        values: &BTreeMap<String, String>,
        policy: MissingFieldPolicy,
        path: &Path,
    ) -> Result<(), TemplateError> {
        let bytes = self.render(values, policy)?;
        if let Err(err) = std::fs::write(path, &bytes) {
            crate::workspace::discard_partial(path);
            return Err(TemplateError::Write(err));
        }
        Ok(())
    }
}

/// Field names a template expects, found across every text-bearing part.
pub fn extract_placeholders(template: &DocxTemplate) -> BTreeSet<String> {
    template.placeholders().clone()
}

fn too_large(part: String, size: u64, limits: PackageLimits) -> TemplateError {
    if size > limits.part {
        TemplateError::TooLarge {
            part,
            limit: limits.part,
        }
    } else {
        TemplateError::TooLarge {
            part: "package".to_string(),
            limit: limits.package,
        }
    }
}

fn part_str(entry: &PackageEntry) -> Result<&str, TemplateError> {
    std::str::from_utf8(&entry.data).map_err(|_| TemplateError::Encoding(entry.name.clone()))
}
