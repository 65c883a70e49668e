/*!
 * Batches driven from the configuration
 */

use std::fs;
use std::path::Path;

use textskel::app_config::Config;
use textskel::file_utils::FileManager;
use textskel::pipeline::{FilterRegistry, ItemStatus, NoProgress, StepRegistry};
use textskel::{BatchItem, PipelineDriver, PipelineError, RawDocument};

use crate::common::{self, SAMPLE_PO};

fn driver_for(steps: &[&str], configure: impl FnOnce(&mut Config)) -> PipelineDriver {
    let mut config = Config::default();
    config.pipeline.steps = steps.iter().map(|s| s.to_string()).collect();
    configure(&mut config);
    PipelineDriver::from_config(&config, &FilterRegistry::new(), &StepRegistry::new()).unwrap()
}

fn file_item(path: &Path, input_root: &Path, output_dir: &Path) -> BatchItem {
    let output = FileManager::generate_output_path(path, input_root, output_dir);
    BatchItem::new(RawDocument::from_file(path, "UTF-8", common::en()))
        .with_output(output)
        .with_target_locale(common::fr())
}

#[test]
fn test_driver_folderBatch_shouldMirrorTreeAndIsolateFailures() {
    common::init_logging();
    let dir = common::create_temp_dir().unwrap();
    let input_root = dir.path().join("in");
    let output_dir = dir.path().join("out");
    common::create_test_file(&input_root, "a.po", "msgid \"Yes\"\nmsgstr \"Oui\"\n").unwrap();
    common::create_test_file(&input_root, "nested/b.txt", "line one\n\nline two\n").unwrap();
    common::create_test_file(&input_root, "nested/c.po", "msgid \"Broken\n").unwrap();
    common::create_test_file(&input_root, "d.txt", "last\n").unwrap();

    let files = FileManager::find_files(&input_root, &FilterRegistry::new().extensions()).unwrap();
    let items = files.iter().map(|f| file_item(f, &input_root, &output_dir)).collect();
    let report = driver_for(&["raw-to-events", "events-writer"], |_| {})
        .process_batch(items, &mut NoProgress)
        .unwrap();

    assert_eq!(report.items.len(), 4);
    assert_eq!(report.succeeded(), 3);
    assert_eq!(report.failed(), 1);
    let failure = report.failures()[0];
    assert!(failure.document.ends_with("c.po"));
    assert!(!failure.error.is_batch_fatal());

    assert_eq!(fs::read_to_string(output_dir.join("a.po")).unwrap(), "msgid \"Yes\"\nmsgstr \"Oui\"\n");
    assert_eq!(
        fs::read_to_string(output_dir.join("nested").join("b.txt")).unwrap(),
        "line one\n\nline two\n"
    );
    assert_eq!(fs::read_to_string(output_dir.join("d.txt")).unwrap(), "last\n");
    assert!(!output_dir.join("nested").join("c.po").exists());
}

#[test]
fn test_driver_unknownExtension_shouldFailOnlyThatItem() {
    let dir = common::create_temp_dir().unwrap();
    let items = vec![
        BatchItem::new(RawDocument::from_text("a.docx", "binary", common::en())).with_output(dir.path().join("a.docx")),
        BatchItem::new(RawDocument::from_text("b.po", SAMPLE_PO, common::en()))
            .with_output(dir.path().join("b.po"))
            .with_target_locale(common::fr()),
    ];

    let report = driver_for(&["raw-to-events", "events-writer"], |_| {})
        .process_batch(items, &mut NoProgress)
        .unwrap();

    match &report.items[0].status {
        ItemStatus::Failed(failure) => assert!(matches!(failure.error, PipelineError::BadStepInput(_))),
        other => panic!("unexpected status: {:?}", other),
    }
    assert!(report.items[1].status.is_success());
}

#[test]
fn test_driver_bomRemoval_shouldRewriteRawBytes() {
    let dir = common::create_temp_dir().unwrap();
    let mut bytes = vec![0xEF, 0xBB, 0xBF];
    bytes.extend_from_slice(b"text\n");
    let items = vec![
        BatchItem::new(RawDocument::from_bytes("a.txt", bytes, "UTF-8", common::en()))
            .with_output(dir.path().join("a.txt")),
    ];

    let report = driver_for(&["bom-conversion", "events-writer"], |config| config.bom.remove = true)
        .process_batch(items, &mut NoProgress)
        .unwrap();

    assert_eq!(report.succeeded(), 1);
    assert_eq!(fs::read(dir.path().join("a.txt")).unwrap(), b"text\n");
}

#[test]
fn test_driver_lineBreakConversion_thenExtraction_shouldWriteCrlf() {
    let dir = common::create_temp_dir().unwrap();
    let items = vec![
        BatchItem::new(RawDocument::from_text("a.txt", "one\ntwo\rthree\r\n", common::en()))
            .with_output(dir.path().join("a.txt")),
    ];

    driver_for(&["linebreak-conversion", "raw-to-events", "events-writer"], |config| {
        config.linebreak.line_break = "crlf".to_string()
    })
    .process_batch(items, &mut NoProgress)
    .unwrap();

    assert_eq!(
        fs::read_to_string(dir.path().join("a.txt")).unwrap(),
        "one\r\ntwo\r\nthree\r\n"
    );
}

#[test]
fn test_driver_unknownFilterId_shouldStopBatch() {
    let dir = common::create_temp_dir().unwrap();
    let items = vec![
        BatchItem::new(RawDocument::from_text("a.txt", "x\n", common::en()).with_filter("okf_html"))
            .with_output(dir.path().join("a.txt")),
    ];

    let result = driver_for(&["raw-to-events", "events-writer"], |_| {}).process_batch(items, &mut NoProgress);

    assert!(matches!(result, Err(PipelineError::UnknownComponent(_))));
}
