use std::io::Write;
use std::time::Duration;
use studentbox::{BlockStyle, Paragraphs, PrintPolicy, SupervisionConfig};

#[test]
fn load_partial_config_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"{{
            "prefix": ["When calling fib(10):", "Careful with recursion."],
            "print_prefix": "Output:",
            "print_policy": "denied",
            "timeout_seconds": 0.5,
            "block_style": "indented"
        }}"#
    )
    .unwrap();

    let config = SupervisionConfig::load_from_file(file.path()).unwrap();
    assert_eq!(
        config.prefix,
        Paragraphs::from(["When calling fib(10):", "Careful with recursion."])
    );
    assert_eq!(config.print_prefix, Paragraphs::from("Output:"));
    assert_eq!(config.print_policy, PrintPolicy::Denied);
    assert_eq!(config.timeout(), Duration::from_millis(500));
    assert_eq!(config.block_style, BlockStyle::Indented);
    // Untouched fields keep their defaults
    assert!(config.friendly);
    assert_eq!(
        config.exception_prefix,
        SupervisionConfig::default().exception_prefix
    );
}

#[test]
fn invalid_timeout_is_rejected() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, r#"{{"timeout_seconds": 0}}"#).unwrap();
    assert!(SupervisionConfig::load_from_file(file.path()).is_err());
}

#[test]
fn malformed_json_is_rejected() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, "{{ not json").unwrap();
    assert!(SupervisionConfig::load_from_file(file.path()).is_err());
}

#[test]
fn missing_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    assert!(SupervisionConfig::load_from_file(dir.path().join("absent.json")).is_err());
}

#[test]
fn config_round_trips_through_json() {
    let config = SupervisionConfig::new()
        .with_prefix("When calling f:")
        .with_print_policy(Some(false))
        .with_print_expect("55");
    let json = serde_json::to_string(&config).unwrap();
    assert_eq!(SupervisionConfig::from_json(&json).unwrap(), config);
}
