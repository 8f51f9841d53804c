#![allow(dead_code)]

use std::io::Write;
use std::sync::Arc;

use aws_guardrail::{
    CommandClassifier, ConfigLoader, Guard, GuardSettings, PolicyStore, ValidationMode,
};
use tempfile::NamedTempFile;

/// Store with only the built-in policy.
pub fn builtin_store() -> Arc<PolicyStore> {
    Arc::new(PolicyStore::new(ConfigLoader::builtin_only()))
}

/// Guard that treats `program` as the cloud CLI, so execution can be tested
/// with ordinary system utilities instead of a real `aws` binary.
pub fn guard_for(program: &str, settings: GuardSettings) -> Guard {
    let classifier = CommandClassifier::new(builtin_store()).with_program(program);
    Guard::with_classifier(classifier, settings)
}

pub fn strict_guard_for(program: &str) -> Guard {
    guard_for(program, GuardSettings::default())
}

pub fn strict_aws_guard() -> Guard {
    Guard::new(builtin_store(), GuardSettings::default())
}

pub fn permissive_aws_guard() -> Guard {
    Guard::new(
        builtin_store(),
        GuardSettings {
            mode: ValidationMode::Permissive,
            ..GuardSettings::default()
        },
    )
}

/// Write a policy document to a temp file with the given extension.
pub fn policy_file(suffix: &str, content: &str) -> NamedTempFile {
    let mut file = tempfile::Builder::new()
        .suffix(suffix)
        .tempfile()
        .expect("create temp file");
    file.write_all(content.as_bytes())
        .expect("write policy document");
    file
}
