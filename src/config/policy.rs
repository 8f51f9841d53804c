use std::collections::{BTreeMap, HashMap};

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ValidationError};

/// Key for entries that apply to every service.
pub const GENERAL_KEY: &str = "general";

/// A pattern rule checked before the prefix tables.
#[derive(Debug, Clone)]
pub struct RegexRule {
    pub pattern: Regex,
    pub description: String,
    pub error_message: String,
}

impl RegexRule {
    pub fn new(
        pattern: &str,
        description: impl Into<String>,
        error_message: Option<String>,
    ) -> Result<Self, regex::Error> {
        let regex = Regex::new(pattern)?;
        let error_message = error_message
            .unwrap_or_else(|| format!("command matches restricted pattern: {}", pattern));
        Ok(Self {
            pattern: regex,
            description: description.into(),
            error_message,
        })
    }

    /// Search (not full-match) the command for this rule's pattern.
    pub fn is_match(&self, command: &str) -> bool {
        self.pattern.is_match(command)
    }
}

/// Regex rule as written in an override document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegexRuleSpec {
    pub pattern: String,
    pub description: String,
    #[serde(default)]
    pub error_message: Option<String>,
}

/// Operator-supplied override document.
///
/// Each list present here replaces the built-in list for the same key in full.
/// Keys that are absent keep their built-in lists.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PolicyOverrides {
    #[serde(default)]
    pub dangerous_commands: HashMap<String, Vec<String>>,

    #[serde(default)]
    pub safe_patterns: HashMap<String, Vec<String>>,

    #[serde(default)]
    pub regex_rules: HashMap<String, Vec<RegexRuleSpec>>,
}

/// Immutable security policy snapshot.
#[derive(Debug, Clone, Default)]
pub struct PolicyConfig {
    dangerous_commands: HashMap<String, Vec<String>>,
    safe_patterns: HashMap<String, Vec<String>>,
    regex_rules: HashMap<String, Vec<RegexRule>>,
}

/// Entry counts for a snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PolicySummary {
    pub dangerous_services: usize,
    pub dangerous_prefixes: usize,
    pub safe_keys: usize,
    pub safe_patterns: usize,
    pub regex_keys: usize,
    pub regex_rules: usize,
}

impl PolicyConfig {
    pub fn new(
        dangerous_commands: HashMap<String, Vec<String>>,
        safe_patterns: HashMap<String, Vec<String>>,
        regex_rules: HashMap<String, Vec<RegexRule>>,
    ) -> Self {
        Self {
            dangerous_commands,
            safe_patterns,
            regex_rules,
        }
    }

    /// Build a new snapshot from `self` with whole-list replacement per key.
    pub fn with_overrides(&self, overrides: PolicyOverrides) -> Result<Self, ConfigError> {
        let mut next = self.clone();

        let dangerous = fold_keys("dangerous_commands", overrides.dangerous_commands)?;
        let safe = fold_keys("safe_patterns", overrides.safe_patterns)?;
        let regex = fold_keys("regex_rules", overrides.regex_rules)?;

        next.dangerous_commands.extend(dangerous);
        next.safe_patterns.extend(safe);

        for (key, specs) in regex {
            let mut rules = Vec::with_capacity(specs.len());
            for spec in specs {
                let rule = RegexRule::new(&spec.pattern, spec.description, spec.error_message)
                    .map_err(|source| ConfigError::InvalidRegex {
                        key: key.clone(),
                        pattern: spec.pattern.clone(),
                        source,
                    })?;
                rules.push(rule);
            }
            next.regex_rules.insert(key, rules);
        }

        Ok(next)
    }

    pub fn dangerous_commands(&self, service: &str) -> &[String] {
        self.dangerous_commands
            .get(service)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn safe_patterns(&self, key: &str) -> &[String] {
        self.safe_patterns
            .get(key)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn regex_rules(&self, key: &str) -> &[RegexRule] {
        self.regex_rules
            .get(key)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn summary(&self) -> PolicySummary {
        PolicySummary {
            dangerous_services: self.dangerous_commands.len(),
            dangerous_prefixes: self.dangerous_commands.values().map(Vec::len).sum(),
            safe_keys: self.safe_patterns.len(),
            safe_patterns: self.safe_patterns.values().map(Vec::len).sum(),
            regex_keys: self.regex_rules.len(),
            regex_rules: self.regex_rules.values().map(Vec::len).sum(),
        }
    }

    /// Run the strict classification algorithm against this snapshot.
    ///
    /// `program` is the recognized CLI name (normally `aws`). Regex rules search
    /// the raw command; prefix tables are matched against the normalized form
    /// (single-spaced tokens, lower-cased program and service).
    pub fn check(&self, command: &str, program: &str) -> Result<(), ValidationError> {
        let tokens =
            shell_words::split(command).map_err(|e| ValidationError::MalformedCommand {
                reason: e.to_string(),
            })?;

        let Some(first) = tokens.first() else {
            return Err(ValidationError::MalformedCommand {
                reason: "no tokens".to_string(),
            });
        };

        if !first.eq_ignore_ascii_case(program) {
            return Err(ValidationError::NotRecognizedCommand {
                expected: program.to_string(),
                found: first.clone(),
            });
        }

        let Some(service) = tokens.get(1) else {
            return Err(ValidationError::MissingService {
                program: program.to_string(),
            });
        };
        let service = service.to_lowercase();

        let normalized = normalize(program, &service, &tokens[2..]);

        // the dequoted form is what gets spawned, so quoting must not hide a match
        for key in [GENERAL_KEY, service.as_str()] {
            if let Some(rule) = self
                .regex_rules(key)
                .iter()
                .find(|r| r.is_match(command) || r.is_match(&normalized))
            {
                return Err(ValidationError::RegexViolation {
                    description: rule.description.clone(),
                    message: rule.error_message.clone(),
                });
            }
        }

        let Some(prefix) = self
            .dangerous_commands(&service)
            .iter()
            .find(|prefix| normalized.starts_with(prefix.as_str()))
        else {
            return Ok(());
        };

        if self.is_safe(&service, &normalized) {
            return Ok(());
        }

        Err(ValidationError::DangerousCommandBlocked {
            prefix: prefix.clone(),
        })
    }

    fn is_safe(&self, service: &str, normalized: &str) -> bool {
        self.safe_patterns(service)
            .iter()
            .any(|p| normalized.starts_with(p.as_str()))
            || self
                .safe_patterns(GENERAL_KEY)
                .iter()
                .any(|p| normalized.contains(p.as_str()))
    }
}

/// Lower-case the keys of one override section, rejecting keys that only
/// differ by case. The result is ordered so merging is deterministic.
fn fold_keys<V>(
    section: &'static str,
    entries: HashMap<String, V>,
) -> Result<BTreeMap<String, V>, ConfigError> {
    let mut folded = BTreeMap::new();
    for (key, value) in entries {
        let lowered = key.to_lowercase();
        if folded.insert(lowered, value).is_some() {
            return Err(ConfigError::DuplicateKey { section, key });
        }
    }
    Ok(folded)
}

fn normalize(program: &str, service: &str, rest: &[String]) -> String {
    let mut normalized = format!("{} {}", program.to_lowercase(), service);
    for token in rest {
        normalized.push(' ');
        normalized.push_str(token);
    }
    normalized
}
