//! Loading cache configuration from YAML files.

use std::io::Write;

use mlp_cache::config::CacheConfig;
use mlp_cache::Error;

#[test]
fn test_yaml_file() {
    let mut file = tempfile::NamedTempFile::new().expect("temp file");
    writeln!(file, "default_group: translations\nlocal_capacity: 50\nglobal_groups: [site_relations]").expect("write");

    let cfg = CacheConfig::from_yaml_file(file.path()).expect("valid config");
    assert_eq!(cfg.default_group, "translations");
    assert_eq!(cfg.local_capacity, 50);
    assert_eq!(cfg.global_groups, vec!["site_relations"]);
    assert_eq!(cfg.default_ttl_secs, 0);
}

#[test]
fn test_malformed_yaml_names_the_file() {
    let mut file = tempfile::NamedTempFile::new().expect("temp file");
    writeln!(file, "local_capacity: [not, a, number]").expect("write");

    let err = CacheConfig::from_yaml_file(file.path()).expect_err("should reject");
    assert!(matches!(err, Error::Configuration { .. }));
    let ctx = err.context().expect("context");
    assert_eq!(ctx.field_path.as_deref(), Some(file.path().display().to_string().as_str()));
}

#[test]
fn test_missing_file_is_io_error() {
    let err = CacheConfig::from_yaml_file("/nonexistent/mlp-cache.yaml").expect_err("missing");
    assert!(matches!(err, Error::Io(_)));
}
