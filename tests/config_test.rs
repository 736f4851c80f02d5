//! Tests for configuration loading and validation.

use rescene::config::{load_config, load_config_or_default, Config};
use rescene_srs::MissingTrackPolicy;
use std::fs;
use std::path::PathBuf;
use tempfile::tempdir;

#[test]
fn test_default_config() {
    let config = Config::default();
    assert_eq!(config.output.dir, PathBuf::from("."));
    assert!(!config.output.overwrite);
    assert!(!config.rar.skip_validation);
    assert!(config.rar.verify_sfv);
    assert_eq!(config.sample.missing_tracks, MissingTrackPolicy::ZeroFill);
    assert!(config.sample.verify);
}

#[test]
fn test_load_full_config() {
    let temp = tempdir().unwrap();
    let path = temp.path().join("rescene.toml");
    fs::write(
        &path,
        r#"
[output]
dir = "/srv/rebuilt"
overwrite = true

[rar]
skip_validation = true
verify_sfv = false

[sample]
missing_tracks = "fail"
verify = false
"#,
    )
    .unwrap();

    let config = load_config(&path).unwrap();
    assert_eq!(config.output.dir, PathBuf::from("/srv/rebuilt"));
    assert!(config.output.overwrite);
    assert!(config.rar.skip_validation);
    assert!(!config.rar.verify_sfv);
    assert_eq!(config.sample.missing_tracks, MissingTrackPolicy::Fail);
    assert!(!config.sample.verify);
}

#[test]
fn test_partial_config_keeps_defaults() {
    let temp = tempdir().unwrap();
    let path = temp.path().join("rescene.toml");
    fs::write(&path, "[sample]\nmissing_tracks = \"zero-fill\"\n").unwrap();

    let config = load_config(&path).unwrap();
    assert_eq!(config.output.dir, PathBuf::from("."));
    assert!(config.rar.verify_sfv);
    assert!(config.sample.verify);
    assert_eq!(config.sample.missing_tracks, MissingTrackPolicy::ZeroFill);
}

#[test]
fn test_empty_output_dir_rejected() {
    let temp = tempdir().unwrap();
    let path = temp.path().join("rescene.toml");
    fs::write(&path, "[output]\ndir = \"\"\n").unwrap();

    let err = load_config(&path).unwrap_err();
    assert!(err.to_string().contains("cannot be empty"));
}

#[test]
fn test_output_dir_that_is_a_file_rejected() {
    let temp = tempdir().unwrap();
    let file = temp.path().join("not-a-dir");
    fs::write(&file, b"").unwrap();
    let path = temp.path().join("rescene.toml");
    fs::write(
        &path,
        format!("[output]\ndir = {:?}\n", file.to_str().unwrap()),
    )
    .unwrap();

    let err = load_config(&path).unwrap_err();
    assert!(err.to_string().contains("is a file"));
}

#[test]
fn test_unknown_policy_rejected() {
    let temp = tempdir().unwrap();
    let path = temp.path().join("rescene.toml");
    fs::write(&path, "[sample]\nmissing_tracks = \"guess\"\n").unwrap();

    let err = load_config(&path).unwrap_err();
    assert!(err.to_string().contains("Failed to parse config file"));
}

#[test]
fn test_invalid_toml_rejected() {
    let temp = tempdir().unwrap();
    let path = temp.path().join("rescene.toml");
    fs::write(&path, "[output\ndir = ").unwrap();

    assert!(load_config(&path).is_err());
}

#[test]
fn test_missing_explicit_config_is_an_error() {
    let temp = tempdir().unwrap();
    let path = temp.path().join("missing.toml");

    let err = load_config_or_default(Some(&path)).unwrap_err();
    assert!(err.to_string().contains("Failed to read config file"));
}
