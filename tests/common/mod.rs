#![allow(dead_code)]

use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use libreoffice_mcp_server::config::AppConfig;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

const WML_NS: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";

/// Stands in for `soffice`: honours `--outdir`, takes the last argument as
/// the input and writes `<outdir>/<stem>.pdf`. Inputs whose name contains
/// "corrupt" or whose content contains CORRUPT fail with a diagnostic.
const FAKE_SOFFICE: &str = r#"#!/bin/sh
outdir=""
input=""
while [ $# -gt 0 ]; do
  case "$1" in
    --version) echo "LibreOffice 7.6.4.1 (fake)"; exit 0 ;;
    --outdir) outdir="$2"; shift 2 ;;
    *) input="$1"; shift ;;
  esac
done
name=$(basename "$input")
case "$name" in
  *corrupt*) echo "Error: source file could not be loaded" >&2; exit 1 ;;
esac
if grep -q CORRUPT "$input" 2>/dev/null; then
  echo "Error: source file could not be loaded" >&2
  exit 1
fi
stem="${name%.*}"
printf '%%PDF-1.4\n' > "$outdir/$stem.pdf"
cat "$input" >> "$outdir/$stem.pdf"
echo "convert $input -> $outdir/$stem.pdf using filter : writer_pdf_Export"
"#;

const SLOW_SOFFICE: &str = "#!/bin/sh\nsleep 5\n";

const SILENT_SOFFICE: &str = "#!/bin/sh\necho \"nothing to do\"\nexit 0\n";

#[cfg(unix)]
fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join(name);
    std::fs::write(&path, body).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

#[cfg(unix)]
pub fn fake_soffice(dir: &Path) -> PathBuf {
    write_script(dir, "soffice", FAKE_SOFFICE)
}

#[cfg(unix)]
pub fn slow_soffice(dir: &Path) -> PathBuf {
    write_script(dir, "soffice-slow", SLOW_SOFFICE)
}

#[cfg(unix)]
pub fn silent_soffice(dir: &Path) -> PathBuf {
    write_script(dir, "soffice-silent", SILENT_SOFFICE)
}

/// Configuration rooted in `dir` that runs `soffice`.
pub fn test_config(dir: &Path, soffice: &Path) -> AppConfig {
    let mut config = AppConfig::default();
    config.converter.libreoffice_path = soffice.to_path_buf();
    config.converter.work_root = dir.join("work");
    config.converter.timeout = Duration::from_secs(20);
    config
}

fn paragraph(text: &str) -> String {
    format!(r#"<w:p><w:r><w:t xml:space="preserve">{text}</w:t></w:r></w:p>"#)
}

/// DOCX package whose body is the given raw WordprocessingML.
pub fn docx_with_body(body: &str) -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default();

    writer.start_file("[Content_Types].xml", options).unwrap();
    writer
        .write_all(
            br#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/></Types>"#,
        )
        .unwrap();

    writer.start_file("_rels/.rels", options).unwrap();
    writer
        .write_all(
            br#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="word/document.xml"/></Relationships>"#,
        )
        .unwrap();

    writer.start_file("word/document.xml", options).unwrap();
    writer
        .write_all(
            format!(
                r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><w:document xmlns:w="{WML_NS}"><w:body>{body}<w:sectPr/></w:body></w:document>"#
            )
            .as_bytes(),
        )
        .unwrap();

    writer.start_file("word/header1.xml", options).unwrap();
    writer
        .write_all(
            format!(
                r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><w:hdr xmlns:w="{WML_NS}">{}</w:hdr>"#,
                paragraph("Ref: {{name}}")
            )
            .as_bytes(),
        )
        .unwrap();

    writer.finish().unwrap().into_inner()
}

/// DOCX with one paragraph per entry.
pub fn docx_with_paragraphs(paragraphs: &[&str]) -> Vec<u8> {
    let body: String = paragraphs.iter().map(|p| paragraph(p)).collect();
    docx_with_body(&body)
}

/// The classic form letter: greeting, split-run placeholder and a table.
pub fn letter_template() -> Vec<u8> {
    let body = [
        paragraph("Dear {{name}},"),
        r#"<w:p><w:r><w:rPr><w:b/></w:rPr><w:t>We will visit {{ci</w:t></w:r><w:r><w:t>ty}} soon.</w:t></w:r></w:p>"#.to_string(),
        format!(
            "<w:tbl><w:tr><w:tc>{}</w:tc><w:tc>{}</w:tc></w:tr></w:tbl>",
            paragraph("City"),
            paragraph("{{city}}")
        ),
    ]
    .concat();
    docx_with_body(&body)
}

pub fn write_file(dir: &Path, name: &str, data: &[u8]) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, data).unwrap();
    path
}

/// Sorted file names in a directory.
pub fn file_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

/// `multipart/form-data` body; each part is (name, filename, bytes).
pub fn multipart_body(parts: &[(&str, Option<&str>, &[u8])]) -> (String, Vec<u8>) {
    let boundary = "----libreoffice-mcp-test-boundary";
    let mut body = Vec::new();
    for (name, filename, data) in parts {
        body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
        match filename {
            Some(filename) => body.extend_from_slice(
                format!(
                    "Content-Disposition: form-data; name=\"{name}\"; filename=\"{filename}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
                )
                .as_bytes(),
            ),
            None => body.extend_from_slice(
                format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n").as_bytes(),
            ),
        }
        body.extend_from_slice(data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());
    (format!("multipart/form-data; boundary={boundary}"), body)
}
