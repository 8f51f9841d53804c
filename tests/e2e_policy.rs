mod common;

use std::sync::Arc;

use aws_guardrail::{
    ConfigError, ConfigLoader, Guard, GuardSettings, PolicyConfig, PolicyStore, ValidationError,
};

use common::policy_file;

fn guard_with_document(path: &std::path::Path) -> Guard {
    let loader = ConfigLoader::new(Some(path.to_path_buf()));
    Guard::new(Arc::new(PolicyStore::new(loader)), GuardSettings::default())
}

#[test]
fn test_override_document_changes_verdicts() {
    let file = policy_file(
        ".toml",
        r#"
[dangerous_commands]
s3 = ["aws s3 rb"]

[[regex_rules.s3]]
pattern = "--recursive"
description = "Recursive operation"
error_message = "recursive S3 operations are not allowed"
"#,
    );
    let guard = guard_with_document(file.path());

    assert!(matches!(
        guard.validate("aws s3 rb s3://bucket"),
        Err(ValidationError::DangerousCommandBlocked { .. })
    ));
    match guard.validate("aws s3 cp s3://a s3://b --recursive") {
        Err(ValidationError::RegexViolation { message, .. }) => {
            assert_eq!(message, "recursive S3 operations are not allowed");
        }
        other => panic!("unexpected verdict: {:?}", other),
    }
    assert!(guard.validate("aws s3 ls").is_ok());
    // services absent from the document keep the built-in lists
    assert!(guard.validate("aws iam create-user --user-name x").is_err());
}

#[test]
fn test_reload_picks_up_edited_document() {
    let file = policy_file(".toml", "[dangerous_commands]\ns3 = [\"aws s3 ls\"]\n");
    let guard = guard_with_document(file.path());
    assert!(guard.validate("aws s3 ls").is_err());

    std::fs::write(file.path(), "[dangerous_commands]\ns3 = []\n").unwrap();
    guard.reload_policy().unwrap();
    assert!(guard.validate("aws s3 ls").is_ok());
}

#[test]
fn test_failed_reload_keeps_active_policy() {
    let file = policy_file(".toml", "[dangerous_commands]\ns3 = [\"aws s3 ls\"]\n");
    let guard = guard_with_document(file.path());
    let before = guard.policy();

    std::fs::write(file.path(), "[dangerous_commands\nbroken").unwrap();
    let err = guard.reload_policy().unwrap_err();
    assert!(matches!(err, ConfigError::Parse { .. }));

    assert_eq!(guard.policy().summary(), before.summary());
    assert!(guard.validate("aws s3 ls").is_err());
}

#[test]
fn test_invalid_regex_rejected_on_reload() {
    let file = policy_file(".json", r#"{"dangerous_commands": {}}"#);
    let guard = guard_with_document(file.path());

    std::fs::write(
        file.path(),
        r#"{"regex_rules": {"general": [{"pattern": "([", "description": "broken"}]}}"#,
    )
    .unwrap();
    assert!(matches!(
        guard.reload_policy(),
        Err(ConfigError::InvalidRegex { .. })
    ));
}

#[test]
fn test_malformed_initial_document_falls_back_to_builtin() {
    let file = policy_file(".toml", "this is not toml = = =");
    let guard = guard_with_document(file.path());
    assert_eq!(guard.policy().summary(), PolicyConfig::builtin().summary());
}

#[test]
fn test_snapshot_outlives_reload() {
    let file = policy_file(".toml", "[dangerous_commands]\ns3 = [\"aws s3 ls\"]\n");
    let guard = guard_with_document(file.path());
    let held = guard.policy();

    std::fs::write(file.path(), "[dangerous_commands]\ns3 = []\n").unwrap();
    guard.reload_policy().unwrap();

    assert_eq!(held.dangerous_commands("s3"), ["aws s3 ls"]);
    assert!(guard.policy().dangerous_commands("s3").is_empty());
}

#[test]
fn test_non_utf8_document_keeps_active_policy() {
    let file = policy_file(".toml", "[dangerous_commands]\ns3 = [\"aws s3 ls\"]\n");
    let guard = guard_with_document(file.path());

    std::fs::write(file.path(), b"[dangerous_commands]\ns3 = [\"\xff\"]\n").unwrap();
    assert!(matches!(
        guard.reload_policy(),
        Err(ConfigError::Parse { .. })
    ));
    assert_eq!(guard.policy().dangerous_commands("s3"), ["aws s3 ls"]);
}

#[test]
fn test_case_colliding_keys_are_rejected_every_time() {
    let file = policy_file(".json", r#"{"dangerous_commands": {}}"#);
    let guard = guard_with_document(file.path());

    std::fs::write(
        file.path(),
        r#"{"dangerous_commands": {"IAM": [], "iam": ["aws iam tag-user"]}}"#,
    )
    .unwrap();
    for _ in 0..50 {
        assert!(matches!(
            guard.reload_policy(),
            Err(ConfigError::DuplicateKey { .. })
        ));
    }
    assert!(guard.validate("aws iam tag-user --user-name x").is_ok());
}
