//! Utilities that may appear after the first segment of a pipeline.
//!
//! Only bare program names are accepted; a path such as `/bin/grep` is never
//! treated as a member.

/// Programs allowed in pipe segments 1..N.
pub const AUXILIARY_COMMANDS: &[&str] = &[
    // file inspection and copying
    "ls", "cat", "cp", "mv", "mkdir", "touch", "pwd", "file", "stat", "du", "basename",
    "dirname", "realpath", "readlink",
    // text processing
    "grep", "egrep", "fgrep", "sed", "awk", "cut", "sort", "uniq", "wc", "head", "tail", "tr",
    "find", "column", "paste", "join", "fold", "fmt", "nl", "rev", "tac", "comm", "diff",
    "base64", "jq", "tee",
    // system information
    "ps", "top", "free", "uptime", "df", "date", "whoami", "id", "hostname", "uname", "nproc",
    "vmstat",
    // networking
    "ping", "dig", "nslookup", "host", "traceroute", "curl", "wget", "ssh", "scp",
    // archives and compression
    "tar", "gzip", "gunzip", "zip", "unzip", "bzip2", "bunzip2", "xz", "unxz", "zcat",
];

/// Destructive or command-spawning utilities deliberately kept out of
/// [`AUXILIARY_COMMANDS`].
pub const EXCLUDED_COMMANDS: &[&str] = &[
    "rm", "rmdir", "shred", "unlink", "chmod", "chown", "chgrp", "dd", "truncate", "xargs",
    "env", "sh", "bash", "zsh", "sudo", "eval", "exec",
];

/// Whether `program` may run as a pipe segment after the first.
pub fn is_auxiliary(program: &str) -> bool {
    AUXILIARY_COMMANDS.contains(&program)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_tools_allowed() {
        for program in ["grep", "jq", "wc", "sort", "head", "tee", "tar"] {
            assert!(is_auxiliary(program), "{}", program);
        }
    }

    // rm/chmod/chown are excluded on purpose: a pipeline fed by the cloud CLI
    // should not be able to delete files or change their permissions.
    #[test]
    fn destructive_file_tools_excluded() {
        for program in ["rm", "chmod", "chown", "rmdir", "shred", "dd"] {
            assert!(!is_auxiliary(program), "{}", program);
        }
    }

    #[test]
    fn lists_are_disjoint() {
        for program in EXCLUDED_COMMANDS {
            assert!(!AUXILIARY_COMMANDS.contains(program), "{}", program);
        }
    }

    #[test]
    fn paths_and_case_variants_rejected() {
        assert!(!is_auxiliary("/bin/grep"));
        assert!(!is_auxiliary("./grep"));
        assert!(!is_auxiliary("GREP"));
        assert!(!is_auxiliary(""));
    }

    #[test]
    fn no_duplicates() {
        let mut sorted = AUXILIARY_COMMANDS.to_vec();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(sorted.len(), AUXILIARY_COMMANDS.len());
    }
}
