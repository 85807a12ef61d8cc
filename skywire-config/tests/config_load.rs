use serial_test::serial;
use skywire_config::{DEFAULT_PDS_HOST, SettingsError, SkywireConfigLoader};
use std::{fs, path::PathBuf};
use tempfile::TempDir;

/// Helper to write a YAML file in a temp dir and return its path.
fn write_yaml(tmp: &TempDir, name: &str, yaml: &str) -> PathBuf {
    let p = tmp.path().join(name);
    fs::write(&p, yaml).expect("write yaml");
    p
}

const CLEAN_ENV: [(&str, Option<&str>); 6] = [
    ("BLUESKY_HANDLE", None),
    ("BLUESKY_PASSWORD", None),
    ("PDSHOST", None),
    ("SKYWIRE_PDS_HOST", None),
    ("SKYWIRE_PAGE_SIZE", None),
    ("SKYWIRE_BATCH_SIZE", None),
];

#[test]
#[serial]
fn defaults_without_any_source() {
    temp_env::with_vars(CLEAN_ENV, || {
        let cfg = SkywireConfigLoader::new().load().expect("defaults load");
        assert_eq!(cfg.pds_host, DEFAULT_PDS_HOST);
        assert_eq!(cfg.page_size, 100);
        assert_eq!(cfg.batch_size, 25);
        assert!(cfg.include_pins);
        assert!(cfg.identifier.is_none());
        assert!(matches!(
            cfg.credentials(),
            Err(SettingsError::MissingCredentials)
        ));
    });
}

#[test]
#[serial]
fn file_then_env_then_legacy() {
    let tmp = TempDir::new().unwrap();
    let file_yaml = r#"
pds_host: "https://from-file.example"
identifier: "file.handle"
password: "${SKYWIRE_TEST_SECRET}"
page_size: 40
batch_size: 10
"#;
    let p = write_yaml(&tmp, "skywire.yaml", file_yaml);

    temp_env::with_vars(
        [
            ("BLUESKY_HANDLE", Some("legacy.handle")),
            ("BLUESKY_PASSWORD", None),
            ("PDSHOST", None),
            ("SKYWIRE_PDS_HOST", Some("https://from-env.example/")),
            ("SKYWIRE_PAGE_SIZE", Some("50")),
            ("SKYWIRE_BATCH_SIZE", None),
            ("SKYWIRE_TEST_SECRET", Some("s3cret")),
        ],
        || {
            let cfg = SkywireConfigLoader::new()
                .with_file(&p)
                .load()
                .expect("load layered config");

            // env beats file, trailing slash trimmed
            assert_eq!(cfg.pds_host, "https://from-env.example");
            assert_eq!(cfg.page_size, 50);
            // file value survives when nothing overrides it
            assert_eq!(cfg.batch_size, 10);
            // legacy variable beats the file
            assert_eq!(cfg.identifier.as_deref(), Some("legacy.handle"));
            // placeholder expanded
            assert_eq!(cfg.password.as_deref(), Some("s3cret"));
        },
    );
}

#[test]
#[serial]
fn legacy_pdshost_overrides_everything() {
    temp_env::with_vars(
        [
            ("BLUESKY_HANDLE", None),
            ("BLUESKY_PASSWORD", None),
            ("PDSHOST", Some("https://legacy.example")),
            ("SKYWIRE_PDS_HOST", Some("https://from-env.example")),
            ("SKYWIRE_PAGE_SIZE", None),
            ("SKYWIRE_BATCH_SIZE", None),
        ],
        || {
            let cfg = SkywireConfigLoader::new().load().unwrap();
            assert_eq!(cfg.pds_host, "https://legacy.example");

            let cfg = SkywireConfigLoader::new().without_legacy_env().load().unwrap();
            assert_eq!(cfg.pds_host, "https://from-env.example");
        },
    );
}

#[test]
#[serial]
fn missing_optional_file_is_ignored_but_required_file_fails() {
    temp_env::with_vars(CLEAN_ENV, || {
        let tmp = TempDir::new().unwrap();
        let missing = tmp.path().join("nope.yaml");

        let cfg = SkywireConfigLoader::new()
            .with_optional_file(&missing)
            .load()
            .expect("optional file may be absent");
        assert_eq!(cfg.page_size, 100);

        let err = SkywireConfigLoader::new().with_file(&missing).load();
        assert!(matches!(err, Err(SettingsError::Load(_))));
    });
}

#[test]
#[serial]
fn zero_batch_size_is_rejected() {
    temp_env::with_vars(CLEAN_ENV, || {
        let err = SkywireConfigLoader::new()
            .with_yaml_str("batch_size: 0")
            .load();
        assert!(matches!(err, Err(SettingsError::Invalid(_))));
    });
}

#[test]
#[serial]
fn environment_secrets_are_taken_verbatim() {
    temp_env::with_vars(
        [
            ("BLUESKY_HANDLE", Some("$SKYWIRE_TEST_NAME.test")),
            ("BLUESKY_PASSWORD", Some("pa$SKYWIRE_TEST_PWx")),
            ("PDSHOST", Some("https://${SKYWIRE_TEST_NAME}.example")),
            ("SKYWIRE_PDS_HOST", None),
            ("SKYWIRE_PAGE_SIZE", None),
            ("SKYWIRE_BATCH_SIZE", None),
            ("SKYWIRE_TEST_PWx", Some("EXPANDED")),
            ("SKYWIRE_TEST_NAME", Some("EXPANDED")),
        ],
        || {
            let cfg = SkywireConfigLoader::new().load().unwrap();
            assert_eq!(
                cfg.credentials().unwrap(),
                ("$SKYWIRE_TEST_NAME.test", "pa$SKYWIRE_TEST_PWx")
            );
            assert_eq!(cfg.pds_host, "https://${SKYWIRE_TEST_NAME}.example");
        },
    );
}
