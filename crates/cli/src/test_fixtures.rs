//! Shared helpers for CLI tests.

use std::fs;
use std::path::PathBuf;

use hyperwallet_common::key_set::{load, select_key, Key};
use tempfile::TempDir;

/// Path of a JWK set fixture shipped with the common crate.
pub fn key_set_path(name: &str) -> String {
    format!(
        "{}/../common/resources/test/{name}",
        env!("CARGO_MANIFEST_DIR")
    )
}

pub fn fixture_key(set_name: &str, alg: &str) -> Key {
    let text = load(&key_set_path(set_name)).expect("fixture key set should load");
    select_key(&text, alg).expect("fixture key set should contain the algorithm")
}

pub fn write_file(dir: &TempDir, name: &str, content: &str) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, content).expect("should write test file");
    path
}

/// Writes a config with encryption between fixture key sets 1.
pub fn create_test_config(dir: &TempDir) -> PathBuf {
    write_file(
        dir,
        "test-config.toml",
        &format!(
            r#"
[api]
server = "https://api.sandbox.hyperwallet.com"
username = "test-user"
password = "test-pass"

[encryption]
client_private_key_set_location = "{}"
hyperwallet_key_set_location = "{}"
"#,
            key_set_path("private-jwkset1"),
            key_set_path("public-jwkset1"),
        ),
    )
}
