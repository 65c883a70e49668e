/*!
 * Common test utilities for the textskel test suite
 */

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Result;
use tempfile::TempDir;
use textskel::LocaleId;

/// Sample PO document with a header, a fuzzy entry and a plural entry
pub const SAMPLE_PO: &str = "# Sample catalog\n\
msgid \"\"\n\
msgstr \"\"\n\
\"Content-Type: text/plain; charset=UTF-8\\n\"\n\
\n\
#: app.c:12\n\
msgid \"Hello world\"\n\
msgstr \"Bonjour le monde\"\n\
\n\
#, fuzzy\n\
msgid \"Open file. Save file.\"\n\
msgstr \"\"\n\
\n\
msgid \"One item\"\n\
msgid_plural \"%d items\"\n\
msgstr[0] \"Un article\"\n\
msgstr[1] \"%d articles\"\n";

/// Routes library logs to the test output; safe to call from every test
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Creates a temporary directory for test files
pub fn create_temp_dir() -> Result<TempDir> {
    Ok(TempDir::new()?)
}

/// Creates a test file with the given content in the specified directory
pub fn create_test_file(dir: &Path, filename: &str, content: &str) -> Result<PathBuf> {
    let file_path = dir.join(filename);
    if let Some(parent) = file_path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(&file_path, content)?;
    Ok(file_path)
}

pub fn en() -> LocaleId {
    LocaleId::new("en").unwrap()
}

pub fn fr() -> LocaleId {
    LocaleId::new("fr").unwrap()
}
