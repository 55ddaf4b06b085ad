use std::fs;
use std::sync::Mutex;

use folio_config::{
    ConfigGuardRailError, ConfigLoadError, ConfigLoader, ConfigWarning,
    LibraryConfig, ScannerConfig, ScannerConfigSource,
};
use folio_model::LibraryType;
use once_cell::sync::Lazy;
use tempfile::tempdir;

static ENV_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

fn clear_env() {
    for key in ["FOLIO_SCAN_CONFIG_PATH", "FOLIO_SCAN_CONFIG_JSON"] {
        unsafe { std::env::remove_var(key) };
    }
}

#[test]
fn loads_explicit_toml_file_and_warns_about_missing_roots() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("folio.toml");
    fs::write(
        &path,
        r#"
        archive_timeout_ms = 5000

        [[libraries]]
        id = "0192b7a4-51c1-7f3e-9d1c-3a2b1c0d9e8f"
        name = "Comics"
        type = "comic"
        roots = ["/definitely/not/here"]
        "#,
    )
    .expect("write config");

    let load = ConfigLoader::new().with_path(&path).load().expect("load");
    assert_eq!(load.source, ScannerConfigSource::File(path));
    assert_eq!(load.config.libraries[0].library_type, LibraryType::Comic);
    assert!(load.warnings.iter().any(|warning| matches!(
        warning,
        ConfigWarning::MissingRoot { library, .. } if library == "Comics"
    )));
}

#[test]
fn missing_explicit_file_is_an_error() {
    let dir = tempdir().expect("tempdir");
    let err = ConfigLoader::new()
        .with_path(dir.path().join("nope.toml"))
        .load()
        .unwrap_err();
    assert!(matches!(err, ConfigLoadError::Missing(_)));
}

#[test]
fn inline_json_from_env_is_validated() {
    let _guard = ENV_LOCK.lock().unwrap_or_else(|poison| poison.into_inner());
    clear_env();
    unsafe {
        std::env::set_var(
            "FOLIO_SCAN_CONFIG_JSON",
            r#"{"max_parallel_files": 0}"#,
        )
    };

    let err = ConfigLoader::new().load().unwrap_err();
    clear_env();

    match err {
        ConfigLoadError::Invalid { source, .. } => assert_eq!(
            source,
            ConfigGuardRailError::ZeroLimit {
                field: "max_parallel_files"
            }
        ),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn rejects_duplicate_library_ids_and_bad_globs() {
    let dir = tempdir().expect("tempdir");
    let library = LibraryConfig::new(
        "Manga",
        LibraryType::Manga,
        vec![dir.path().to_path_buf()],
    );

    let mut config = ScannerConfig {
        libraries: vec![library.clone(), library.clone()],
        ..ScannerConfig::default()
    };
    assert!(matches!(
        config.validate(),
        Err(ConfigGuardRailError::DuplicateLibraryId { .. })
    ));

    config.libraries = vec![library.with_excludes(["**/[broken"])];
    assert!(matches!(
        config.validate(),
        Err(ConfigGuardRailError::InvalidExclude { .. })
    ));
}
