//! Pipe-aware splitting of a command line.
//!
//! A single scanner backs both [`split`] and [`contains_pipe`] so the two can
//! never disagree about where a pipeline boundary is.

/// Result of scanning a command line for unquoted pipes
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipeScan {
    /// Trimmed segments in order
    pub segments: Vec<String>,
    /// Number of unquoted, unescaped `|` characters seen
    pub delimiters: usize,
}

/// Scan `command` once, left to right.
///
/// A backslash escapes exactly one following character; both are kept in the
/// segment so later tokenization still sees the escape. `'` toggles only
/// outside double quotes and `"` only outside single quotes. A `|` outside
/// quotes and not escaped ends the current segment. A trailing segment is
/// kept only if non-empty after trimming.
pub fn scan(command: &str) -> PipeScan {
    let mut segments = Vec::new();
    let mut delimiters = 0;
    let mut current = String::new();
    let mut in_single = false;
    let mut in_double = false;
    let mut escaped = false;

    for ch in command.chars() {
        if escaped {
            current.push(ch);
            escaped = false;
            continue;
        }

        match ch {
            '\\' => {
                escaped = true;
                current.push(ch);
            }
            '\'' if !in_double => {
                in_single = !in_single;
                current.push(ch);
            }
            '"' if !in_single => {
                in_double = !in_double;
                current.push(ch);
            }
            '|' if !in_single && !in_double => {
                delimiters += 1;
                segments.push(current.trim().to_string());
                current.clear();
            }
            _ => current.push(ch),
        }
    }

    let tail = current.trim();
    if !tail.is_empty() {
        segments.push(tail.to_string());
    }

    PipeScan {
        segments,
        delimiters,
    }
}

/// Split a pipeline into trimmed command segments.
pub fn split(command: &str) -> Vec<String> {
    scan(command).segments
}

/// Whether `command` contains an unquoted, unescaped pipe.
pub fn contains_pipe(command: &str) -> bool {
    scan(command).delimiters > 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_simple_pipeline() {
        assert_eq!(
            split("aws s3api list-buckets | grep prod"),
            vec!["aws s3api list-buckets", "grep prod"]
        );
        assert!(contains_pipe("aws s3api list-buckets | grep prod"));
    }

    #[test]
    fn multiple_segments_are_trimmed() {
        assert_eq!(
            split("  aws ec2 describe-instances|jq '.Reservations'  |  wc -l "),
            vec!["aws ec2 describe-instances", "jq '.Reservations'", "wc -l"]
        );
    }

    #[test]
    fn quoted_pipes_are_literal() {
        for command in [
            "aws logs filter-log-events --filter-pattern 'ERROR | WARN'",
            r#"aws logs filter-log-events --filter-pattern "ERROR | WARN""#,
            r#"aws s3 ls --query "a'|'b""#,
            r#"aws s3 ls --query 'a"|"b'"#,
        ] {
            assert!(!contains_pipe(command), "{}", command);
            assert_eq!(split(command), vec![command.trim().to_string()]);
        }
    }

    #[test]
    fn escaped_pipe_is_literal() {
        let command = r"aws s3 ls s3://bucket/a\|b";
        assert!(!contains_pipe(command));
        assert_eq!(split(command), vec![command]);
    }

    #[test]
    fn escaped_quote_does_not_open_quote() {
        assert_eq!(
            split(r#"aws s3 ls \" | grep x"#),
            vec![r#"aws s3 ls \""#, "grep x"]
        );
    }

    #[test]
    fn trailing_empty_segment_is_dropped() {
        let scan = scan("aws s3 ls |   ");
        assert_eq!(scan.segments, vec!["aws s3 ls"]);
        assert_eq!(scan.delimiters, 1);
    }

    #[test]
    fn inner_empty_segment_is_kept() {
        assert_eq!(split("aws s3 ls || wc -l"), vec!["aws s3 ls", "", "wc -l"]);
    }

    #[test]
    fn empty_input() {
        assert!(split("").is_empty());
        assert!(split("   ").is_empty());
        assert!(!contains_pipe(""));
    }

    #[test]
    fn rejoined_segments_reproduce_pipeline() {
        let command = "aws iam list-users   |   grep  alice |sort";
        let joined = split(command).join(" | ");
        assert_eq!(joined, "aws iam list-users | grep  alice | sort");
    }
}
