/*!
 * Tests for file and folder utilities
 */

use std::fs;

use anyhow::Result;
use textskel::file_utils::FileManager;

use crate::common;

#[test]
fn test_fileManager_findFiles_shouldOnlyReturnSupportedFiles() -> Result<()> {
    let dir = common::create_temp_dir()?;
    common::create_test_file(dir.path(), "a.po", "")?;
    common::create_test_file(dir.path(), "nested/b.txt", "")?;
    common::create_test_file(dir.path(), "nested/c.pot", "")?;
    common::create_test_file(dir.path(), "d.json", "")?;

    let files = FileManager::find_files(dir.path(), &["po", "pot", "txt"])?;

    let names: Vec<String> = files
        .iter()
        .map(|f| f.strip_prefix(dir.path()).unwrap().to_string_lossy().replace('\\', "/"))
        .collect();
    assert_eq!(names, vec!["a.po", "nested/b.txt", "nested/c.pot"]);
    Ok(())
}

#[test]
fn test_fileManager_generateOutputPath_shouldMirrorInputTree() -> Result<()> {
    let dir = common::create_temp_dir()?;
    let input = common::create_test_file(dir.path(), "in/nested/b.txt", "x")?;

    let output = FileManager::generate_output_path(&input, dir.path().join("in"), dir.path().join("out"));

    assert_eq!(output, dir.path().join("out").join("nested").join("b.txt"));
    Ok(())
}

#[test]
fn test_fileManager_appendToLogFile_shouldAppendTimestampedLines() -> Result<()> {
    let dir = common::create_temp_dir()?;
    let log_path = dir.path().join("logs").join("issues.log");

    FileManager::append_to_log_file(&log_path, "first")?;
    FileManager::append_to_log_file(&log_path, "second")?;

    let content = fs::read_to_string(&log_path)?;
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].starts_with('[') && lines[0].ends_with("] first"));
    assert!(lines[1].ends_with("] second"));
    Ok(())
}
