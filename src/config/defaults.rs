//! Built-in policy tables.
//!
//! Dangerous prefixes cover principal creation and permission grants, removal
//! of authentication controls, secret and key destruction, audit tampering,
//! network exposure, and storage public access. Each guarded service gets safe
//! overrides for its read-only verbs.

use std::collections::HashMap;

use super::policy::{GENERAL_KEY, PolicyConfig, RegexRule};

const DANGEROUS_COMMANDS: &[(&str, &[&str])] = &[
    (
        "iam",
        &[
            "aws iam create-user",
            "aws iam create-role",
            "aws iam create-group",
            "aws iam create-access-key",
            "aws iam create-login-profile",
            "aws iam update-login-profile",
            "aws iam create-policy",
            "aws iam create-policy-version",
            "aws iam put-user-policy",
            "aws iam put-role-policy",
            "aws iam put-group-policy",
            "aws iam attach-user-policy",
            "aws iam attach-role-policy",
            "aws iam attach-group-policy",
            "aws iam add-user-to-group",
            "aws iam update-assume-role-policy",
            "aws iam create-service-linked-role",
            "aws iam deactivate-mfa-device",
            "aws iam delete-virtual-mfa-device",
            "aws iam delete-account-password-policy",
            "aws iam update-account-password-policy",
            "aws iam delete-user",
            "aws iam delete-role",
            "aws iam delete-policy",
        ],
    ),
    (
        "sts",
        &["aws sts assume-role", "aws sts get-federation-token"],
    ),
    (
        "organizations",
        &[
            "aws organizations leave-organization",
            "aws organizations remove-account-from-organization",
            "aws organizations detach-policy",
            "aws organizations delete-policy",
        ],
    ),
    (
        "secretsmanager",
        &[
            "aws secretsmanager put-secret-value",
            "aws secretsmanager update-secret",
            "aws secretsmanager delete-secret",
            "aws secretsmanager put-resource-policy",
            "aws secretsmanager remove-regions-from-replication",
            "aws secretsmanager rotate-secret",
        ],
    ),
    (
        "kms",
        &[
            "aws kms disable-key",
            "aws kms disable-key-rotation",
            "aws kms schedule-key-deletion",
            "aws kms delete-alias",
            "aws kms delete-imported-key-material",
            "aws kms put-key-policy",
            "aws kms create-grant",
            "aws kms retire-grant",
            "aws kms revoke-grant",
        ],
    ),
    (
        "ssm",
        &[
            "aws ssm put-parameter",
            "aws ssm delete-parameter",
            "aws ssm delete-parameters",
            "aws ssm send-command",
        ],
    ),
    (
        "cloudtrail",
        &[
            "aws cloudtrail delete-trail",
            "aws cloudtrail stop-logging",
            "aws cloudtrail update-trail",
            "aws cloudtrail put-event-selectors",
            "aws cloudtrail put-insight-selectors",
        ],
    ),
    (
        "config",
        &[
            "aws config delete-configuration-recorder",
            "aws config stop-configuration-recorder",
            "aws config delete-delivery-channel",
            "aws config delete-config-rule",
        ],
    ),
    (
        "guardduty",
        &[
            "aws guardduty delete-detector",
            "aws guardduty update-detector",
            "aws guardduty disassociate-from-master-account",
            "aws guardduty disassociate-from-administrator-account",
            "aws guardduty create-ip-set",
            "aws guardduty delete-ip-set",
        ],
    ),
    (
        "securityhub",
        &[
            "aws securityhub disable-security-hub",
            "aws securityhub disable-import-findings-for-product",
            "aws securityhub delete-members",
        ],
    ),
    (
        "logs",
        &[
            "aws logs delete-log-group",
            "aws logs delete-log-stream",
            "aws logs put-retention-policy",
            "aws logs delete-subscription-filter",
        ],
    ),
    (
        "ec2",
        &[
            "aws ec2 authorize-security-group-ingress",
            "aws ec2 authorize-security-group-egress",
            "aws ec2 revoke-security-group-ingress",
            "aws ec2 revoke-security-group-egress",
            "aws ec2 modify-instance-attribute",
            "aws ec2 modify-image-attribute",
            "aws ec2 modify-snapshot-attribute",
            "aws ec2 create-key-pair",
            "aws ec2 import-key-pair",
            "aws ec2 delete-flow-logs",
            "aws ec2 create-internet-gateway",
            "aws ec2 attach-internet-gateway",
            "aws ec2 terminate-instances",
        ],
    ),
    (
        "s3api",
        &[
            "aws s3api put-bucket-policy",
            "aws s3api delete-bucket-policy",
            "aws s3api put-bucket-acl",
            "aws s3api put-object-acl",
            "aws s3api put-public-access-block",
            "aws s3api delete-public-access-block",
            "aws s3api put-bucket-website",
            "aws s3api put-bucket-cors",
            "aws s3api put-bucket-logging",
            "aws s3api put-bucket-versioning",
            "aws s3api delete-bucket",
        ],
    ),
    ("s3", &["aws s3 rb", "aws s3 rm", "aws s3 website"]),
    (
        "lambda",
        &[
            "aws lambda add-permission",
            "aws lambda create-function-url-config",
            "aws lambda update-function-url-config",
            "aws lambda update-function-code",
        ],
    ),
];

const SAFE_PATTERNS: &[(&str, &[&str])] = &[
    (GENERAL_KEY, &["--help", "--version", "--dry-run"]),
    (
        "iam",
        &[
            "aws iam get-",
            "aws iam list-",
            "aws iam generate-credential-report",
            "aws iam generate-service-last-accessed-details",
            "aws iam simulate-",
        ],
    ),
    ("sts", &["aws sts get-caller-identity", "aws sts decode-"]),
    (
        "organizations",
        &["aws organizations describe-", "aws organizations list-"],
    ),
    (
        "secretsmanager",
        &[
            "aws secretsmanager describe-",
            "aws secretsmanager list-",
            "aws secretsmanager get-resource-policy",
        ],
    ),
    (
        "kms",
        &[
            "aws kms describe-",
            "aws kms list-",
            "aws kms get-key-policy",
            "aws kms get-key-rotation-status",
        ],
    ),
    ("ssm", &["aws ssm describe-", "aws ssm list-", "aws ssm get-"]),
    (
        "cloudtrail",
        &[
            "aws cloudtrail describe-",
            "aws cloudtrail get-",
            "aws cloudtrail list-",
            "aws cloudtrail lookup-events",
        ],
    ),
    ("config", &["aws config describe-", "aws config get-", "aws config list-"]),
    ("guardduty", &["aws guardduty get-", "aws guardduty list-"]),
    (
        "securityhub",
        &[
            "aws securityhub describe-",
            "aws securityhub get-",
            "aws securityhub list-",
        ],
    ),
    (
        "logs",
        &["aws logs describe-", "aws logs get-", "aws logs filter-log-events"],
    ),
    ("ec2", &["aws ec2 describe-", "aws ec2 get-"]),
    (
        "s3api",
        &["aws s3api get-", "aws s3api list-", "aws s3api head-"],
    ),
    ("s3", &["aws s3 ls"]),
    ("lambda", &["aws lambda get-", "aws lambda list-"]),
];

/// Ports other than 80 and 443: any range, or a single 1-5 digit number.
const NON_WEB_PORT: &str =
    r"(?:\d+-\d+|\d|[1-79]\d|8[1-9]|[1-35-9]\d\d|4[0-35-9]\d|44[0-24-9]|\d{4,5})(?:\s|$)";

const WORLD_CIDR: &str = r"--cidr(?:-ipv6)?[\s=]+(?:0\.0\.0\.0/0|::/0)";

fn regex_rules() -> Vec<(&'static str, Vec<RegexRule>)> {
    let world_ingress = format!(
        r"(?i)authorize-security-group-ingress\b.*(?:{cidr}.*--port[\s=]+{port}|--port[\s=]+{port}.*{cidr})",
        cidr = WORLD_CIDR,
        port = NON_WEB_PORT,
    );

    vec![
        (
            GENERAL_KEY,
            vec![
                rule(
                    r"\b(?:AKIA|ASIA)[0-9A-Z]{16}\b",
                    "Credential in command",
                    "Access key IDs must not be passed on the command line; use a configured profile",
                ),
                rule(
                    r"(?i)--profile[\s=]+['\x22]?root\b",
                    "Root profile usage",
                    "Commands must not run under the root account profile",
                ),
                rule(
                    r"(?i)--no-verify-ssl\b",
                    "TLS verification disabled",
                    "Disabling certificate verification is not permitted",
                ),
                rule(
                    r"(?i)--endpoint-url[\s=]+['\x22]?http://",
                    "Plaintext endpoint",
                    "Endpoints must use HTTPS",
                ),
            ],
        ),
        (
            "ec2",
            vec![
                rule(
                    &world_ingress,
                    "Non-web port opened to the world",
                    "Opening ports other than 80/443 to 0.0.0.0/0 or ::/0 is not permitted",
                ),
                rule(
                    r"(?i)authorize-security-group-ingress\b.*--protocol[\s=]+(?:-1|all)\b",
                    "All traffic ingress",
                    "Ingress rules allowing all protocols are not permitted",
                ),
                rule(
                    r"(?i)authorize-security-group-ingress\b.*--ip-permissions\b.*(?:0\.0\.0\.0/0|::/0)",
                    "World-open ingress permissions",
                    "IP permission sets that include 0.0.0.0/0 or ::/0 must be applied manually",
                ),
            ],
        ),
        (
            "s3api",
            vec![
                rule(
                    r"(?i)--acl[\s=]+['\x22]?(?:public-read|public-read-write|authenticated-read)\b",
                    "Public ACL",
                    "Granting public ACLs on buckets or objects is not permitted",
                ),
                rule(
                    r#"(?i)put-bucket-policy\b.*"Principal"\s*:\s*(?:"\*"|\{\s*"AWS"\s*:\s*"\*")"#,
                    "Public bucket policy",
                    "Bucket policies granting access to any principal are not permitted",
                ),
            ],
        ),
        (
            "s3",
            vec![rule(
                r"(?i)--acl[\s=]+['\x22]?(?:public-read|public-read-write)\b",
                "Public ACL",
                "Uploading objects with public ACLs is not permitted",
            )],
        ),
        (
            "iam",
            vec![
                rule(
                    r"(?i)attach-(?:user|role|group)-policy\b.*arn:aws:iam::aws:policy/AdministratorAccess\b",
                    "Administrator grant",
                    "Attaching AdministratorAccess is not permitted",
                ),
                rule(
                    r#"(?i)"Action"\s*:\s*"\*".*"Resource"\s*:\s*"\*"|"Resource"\s*:\s*"\*".*"Action"\s*:\s*"\*""#,
                    "Wildcard policy document",
                    "Inline policies granting '*' on '*' are not permitted",
                ),
            ],
        ),
        (
            "lambda",
            vec![rule(
                r"(?i)add-permission\b.*--principal[\s=]+['\x22]?\*",
                "Public function invocation",
                "Granting invoke permission to any principal is not permitted",
            )],
        ),
    ]
}

fn rule(pattern: &str, description: &str, message: &str) -> RegexRule {
    RegexRule::new(pattern, description, Some(message.to_string()))
        .expect("built-in regex rule must compile")
}

fn table(entries: &[(&str, &[&str])]) -> HashMap<String, Vec<String>> {
    entries
        .iter()
        .map(|(key, items)| {
            (
                key.to_string(),
                items.iter().map(|s| s.to_string()).collect(),
            )
        })
        .collect()
}

impl PolicyConfig {
    /// The compiled-in policy used when no override document is configured.
    pub fn builtin() -> Self {
        let rules = regex_rules()
            .into_iter()
            .map(|(key, rules)| (key.to_string(), rules))
            .collect();
        PolicyConfig::new(table(DANGEROUS_COMMANDS), table(SAFE_PATTERNS), rules)
    }
}
