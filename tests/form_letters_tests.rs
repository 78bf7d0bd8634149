#![cfg(unix)]

mod common;

use std::path::Path;

use serde_json::{json, Value};

use libreoffice_mcp_server::config::{AppConfig, IntermediatePolicy, MissingFieldPolicy};
use libreoffice_mcp_server::converter::Converter;
use libreoffice_mcp_server::docx::{extract_placeholders, DocxTemplate};
use libreoffice_mcp_server::error::ErrorKind;
use libreoffice_mcp_server::letters::{
    parse_recipients, FormLetterBatch, FormLetterGenerator, OutputFormat, RecipientStatus,
};

use common::{fake_soffice, file_names, letter_template, test_config, write_file};

fn generator(config: AppConfig) -> FormLetterGenerator {
    FormLetterGenerator::new(Converter::new(config.converter), config.letters)
}

fn setup() -> (tempfile::TempDir, AppConfig, std::path::PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path(), &fake_soffice(dir.path()));
    let template = write_file(dir.path(), "letter.docx", &letter_template());
    (dir, config, template)
}

fn batch(template: &Path, recipients: &[Value], out: &Path) -> FormLetterBatch {
    FormLetterBatch::new(template, parse_recipients(recipients)).with_output_directory(out)
}

fn paragraphs(path: &Path) -> Vec<String> {
    DocxTemplate::open(path).unwrap().paragraphs().unwrap()
}

#[tokio::test]
async fn docx_letters_substitute_everywhere() {
    let (dir, config, template) = setup();
    let out = dir.path().join("letters");

    let report = generator(config)
        .generate(
            batch(&template, &[json!({"name": "John Doe", "city": "Anytown"})], &out)
                .with_format(OutputFormat::Docx),
        )
        .await
        .unwrap();

    assert!(report.all_succeeded());
    let path = report.outcomes[0].output_path.clone().unwrap();
    assert_eq!(path.file_name().unwrap(), "letter-001-john-doe.docx");

    let texts = paragraphs(&path);
    assert!(texts.contains(&"Dear John Doe,".to_string()));
    assert!(texts.contains(&"We will visit Anytown soon.".to_string()));
    assert!(texts.contains(&"Anytown".to_string()));
    assert!(texts.contains(&"Ref: John Doe".to_string()));
    assert!(texts.iter().all(|t| !t.contains("{{")));
}

#[tokio::test]
async fn pdf_letters_discard_intermediates_by_default() {
    let (dir, config, template) = setup();
    let out = dir.path().join("letters");
    let recipients = [
        json!({"name": "John Doe", "city": "Anytown"}),
        json!({"name": "Jane Roe", "city": "Elsewhere"}),
    ];

    let report = generator(config)
        .generate(batch(&template, &recipients, &out))
        .await
        .unwrap();

    assert_eq!(report.succeeded(), 2);
    assert_eq!(
        file_names(&out),
        vec!["letter-001-john-doe.pdf", "letter-002-jane-roe.pdf"]
    );
    assert!(report.outcomes.iter().all(|o| o.intermediate_path.is_none()));

    // Scratch directories are gone once the batch returns.
    let work = dir.path().join("work");
    let leftovers: Vec<String> = file_names(&work)
        .into_iter()
        .filter(|name| name.starts_with("letters-"))
        .collect();
    assert!(leftovers.is_empty(), "left behind: {leftovers:?}");
}

#[tokio::test]
async fn kept_intermediates_sit_next_to_the_pdf() {
    let (dir, mut config, template) = setup();
    config.letters.intermediate_policy = IntermediatePolicy::Keep;
    let out = dir.path().join("letters");

    let report = generator(config)
        .generate(batch(
            &template,
            &[json!({"name": "John Doe", "city": "Anytown"})],
            &out,
        ))
        .await
        .unwrap();

    let outcome = &report.outcomes[0];
    let docx = outcome.intermediate_path.clone().unwrap();
    assert_eq!(docx.parent(), outcome.output_path.as_ref().unwrap().parent());
    assert!(paragraphs(&docx).contains(&"Dear John Doe,".to_string()));
    assert_eq!(
        file_names(&out),
        vec!["letter-001-john-doe.docx", "letter-001-john-doe.pdf"]
    );
}

#[tokio::test]
async fn malformed_recipient_fails_alone() {
    let (dir, config, template) = setup();
    let out = dir.path().join("letters");
    let recipients = [
        json!({"name": "John Doe", "city": "Anytown"}),
        json!(["not", "an", "object"]),
        json!({"name": "Jane Roe", "city": "Elsewhere"}),
    ];

    let report = generator(config)
        .generate(batch(&template, &recipients, &out))
        .await
        .unwrap();

    assert!(report.is_partial_failure());
    let bad = &report.outcomes[1];
    assert_eq!(bad.status, RecipientStatus::Failed);
    assert_eq!(bad.error_kind, Some(ErrorKind::InvalidInput));
    assert!(bad.error.as_deref().unwrap().contains("recipients[1]"));
    assert!(bad.output_path.is_none());

    assert_eq!(
        file_names(&out),
        vec!["letter-001-john-doe.pdf", "letter-003-jane-roe.pdf"]
    );
}

#[tokio::test]
async fn identical_names_get_distinct_files() {
    let (dir, config, template) = setup();
    let out = dir.path().join("letters");
    let recipients: Vec<Value> = (0..50)
        .map(|_| json!({"name": "Same Name", "city": "Anytown"}))
        .collect();

    let report = generator(config)
        .generate(batch(&template, &recipients, &out).with_format(OutputFormat::Docx))
        .await
        .unwrap();

    assert_eq!(report.succeeded(), 50);
    let names = file_names(&out);
    assert_eq!(names.len(), 50);
    assert_eq!(names[0], "letter-001-same-name.docx");
    assert_eq!(names[49], "letter-050-same-name.docx");
}

#[tokio::test]
async fn missing_field_fails_by_default() {
    let (dir, config, template) = setup();
    let out = dir.path().join("letters");

    let report = generator(config)
        .generate(
            batch(&template, &[json!({"name": "John Doe"})], &out).with_format(OutputFormat::Docx),
        )
        .await
        .unwrap();

    let outcome = &report.outcomes[0];
    assert_eq!(outcome.error_kind, Some(ErrorKind::InvalidInput));
    assert_eq!(outcome.error.as_deref(), Some("recipient has no value for city"));
    assert!(file_names(&out).is_empty());
}

#[tokio::test]
async fn missing_field_blank_and_literal_policies() {
    for (policy, expected) in [
        (MissingFieldPolicy::Blank, "We will visit  soon."),
        (MissingFieldPolicy::Literal, "We will visit {{city}} soon."),
    ] {
        let (dir, mut config, template) = setup();
        config.letters.missing_field_policy = policy;
        let out = dir.path().join("letters");

        let report = generator(config)
            .generate(
                batch(&template, &[json!({"name": "John Doe"})], &out)
                    .with_format(OutputFormat::Docx),
            )
            .await
            .unwrap();

        assert!(report.all_succeeded(), "{policy} should succeed");
        let texts = paragraphs(report.outcomes[0].output_path.as_ref().unwrap());
        assert!(texts.contains(&expected.to_string()), "{policy}: {texts:?}");
        assert!(texts.contains(&"Dear John Doe,".to_string()));
    }
}

#[tokio::test]
async fn conversion_failure_leaves_no_files() {
    let (dir, config, template) = setup();
    let out = dir.path().join("letters");
    let recipients = [
        json!({"name": "John Doe", "city": "Anytown"}),
        json!({"name": "Corrupt Record", "city": "Nowhere"}),
    ];

    let report = generator(config)
        .generate(batch(&template, &recipients, &out))
        .await
        .unwrap();

    let failed = &report.outcomes[1];
    assert_eq!(failed.error_kind, Some(ErrorKind::ConversionFailed));
    assert!(failed.error.as_deref().unwrap().contains("could not be loaded"));
    assert_eq!(file_names(&out), vec!["letter-001-john-doe.pdf"]);
    assert!(report.summary().contains("1 of 2"));
}

#[tokio::test]
async fn kept_intermediate_is_removed_when_conversion_fails() {
    let (dir, mut config, template) = setup();
    config.letters.intermediate_policy = IntermediatePolicy::Keep;
    let out = dir.path().join("letters");

    let report = generator(config)
        .generate(batch(
            &template,
            &[json!({"name": "Corrupt Record", "city": "Nowhere"})],
            &out,
        ))
        .await
        .unwrap();

    assert_eq!(report.failed(), 1);
    assert!(file_names(&out).is_empty());
}

#[tokio::test]
async fn unusable_batches_fail_as_a_whole() {
    let (dir, config, template) = setup();
    let generator = generator(config);
    let out = dir.path().join("letters");
    let one = [json!({"name": "John Doe", "city": "Anytown"})];

    let missing = generator
        .generate(batch(&dir.path().join("absent.docx"), &one, &out))
        .await
        .unwrap_err();
    assert_eq!(missing.kind(), ErrorKind::InvalidInput);

    let empty = generator
        .generate(batch(&template, &[], &out))
        .await
        .unwrap_err();
    assert_eq!(empty.kind(), ErrorKind::InvalidInput);
    assert!(empty.to_string().contains("at least one recipient"));

    let not_zip = write_file(dir.path(), "fake.docx", b"plain text pretending");
    let corrupt = generator
        .generate(batch(&not_zip, &one, &out))
        .await
        .unwrap_err();
    assert_eq!(corrupt.kind(), ErrorKind::InvalidInput);

    let wrong_type = write_file(dir.path(), "letter.odt", &letter_template());
    let rejected = generator
        .generate(batch(&wrong_type, &one, &out))
        .await
        .unwrap_err();
    assert_eq!(rejected.kind(), ErrorKind::InvalidInput);
}

#[tokio::test]
async fn outcomes_keep_input_order_under_parallelism() {
    let (dir, mut config, template) = setup();
    config.letters.max_parallel = 4;
    let out = dir.path().join("letters");
    let recipients: Vec<Value> = (0..12)
        .map(|i| json!({"name": format!("Person {i}"), "city": format!("City {i}")}))
        .collect();

    let report = generator(config)
        .generate(batch(&template, &recipients, &out))
        .await
        .unwrap();

    for (i, outcome) in report.outcomes.iter().enumerate() {
        assert_eq!(outcome.index, i);
        let name = outcome.output_path.as_ref().unwrap().file_name().unwrap();
        assert_eq!(
            name.to_string_lossy(),
            format!("letter-{:03}-person-{i}.pdf", i + 1)
        );
    }
}

#[tokio::test]
async fn default_output_directory_is_created_under_work_root() {
    let (dir, config, template) = setup();
    let work_root = dir.path().join("work");

    let report = generator(config)
        .generate(
            FormLetterBatch::new(
                &template,
                parse_recipients(&[json!({"name": "John Doe", "city": "Anytown"})]),
            )
            .with_format(OutputFormat::Docx),
        )
        .await
        .unwrap();

    assert!(report
        .output_directory
        .starts_with(std::fs::canonicalize(work_root).unwrap()));
    assert!(report.output_paths()[0].is_file());
}

#[test]
fn letter_template_fields_include_the_header() {
    let template = DocxTemplate::from_bytes(&letter_template()).unwrap();
    let fields: Vec<String> = extract_placeholders(&template).into_iter().collect();
    assert_eq!(fields, vec!["city", "name"]);
}

#[tokio::test]
async fn missing_fields_are_reported_together() {
    let (dir, config, template) = setup();
    let out = dir.path().join("letters");

    let report = generator(config)
        .generate(
            batch(&template, &[json!({"greeting": "Hi"})], &out).with_format(OutputFormat::Docx),
        )
        .await
        .unwrap();

    let outcome = &report.outcomes[0];
    assert_eq!(outcome.error_kind, Some(ErrorKind::InvalidInput));
    assert_eq!(outcome.error.as_deref(), Some("recipient has no value for city, name"));
    assert!(file_names(&out).is_empty());
}
