//! Path manipulation utilities for changeport

use crate::error::Result;
use glob::Pattern;
use regex::Regex;

/// Match a path against a glob pattern
pub fn glob_match(pattern: &str, path: &str) -> Result<bool> {
    let pattern = Pattern::new(pattern)?;
    Ok(pattern.matches(path))
}

/// True if `path` matches any of `patterns`. An empty list matches everything.
pub fn matches_any(patterns: &[Pattern], path: &str) -> bool {
    patterns.is_empty() || patterns.iter().any(|p| p.matches(path))
}

/// Compile a list of glob patterns.
pub fn compile_globs(patterns: &[String]) -> Result<Vec<Pattern>> {
    patterns
        .iter()
        .map(|p| Pattern::new(p).map_err(Into::into))
        .collect()
}

/// Apply a compiled regex rename with capture groups
///
/// The `replacement` can reference capture groups using $1, $2, etc.
/// Returns the new path if the pattern matches, None if it doesn't match.
pub fn regex_rename(regex: &Regex, replacement: &str, path: &str) -> Option<String> {
    let captures = regex.captures(path)?;
    let mut result = String::new();
    let mut chars = replacement.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' {
            if let Some(digit) = chars.peek().and_then(|c| c.to_digit(10)) {
                chars.next();
                if let Some(capture) = captures.get(digit as usize) {
                    result.push_str(capture.as_str());
                }
                continue;
            }
        }
        result.push(ch);
    }

    Some(result)
}

/// Encode a URL into a filesystem-safe directory name
///
/// This converts URL characters that are problematic for filesystems
/// into safe alternatives. Different inputs may encode to the same
/// string; callers needing uniqueness must add a digest.
pub fn encode_url_path(url: &str) -> String {
    url.chars()
        .map(|c| match c {
            '/' | '\\' => '-',
            c if c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_' => c,
            _ => '_',
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_glob_match() {
        assert!(glob_match("*.rs", "main.rs").unwrap());
        assert!(glob_match("src/*.rs", "src/main.rs").unwrap());
        assert!(!glob_match("*.rs", "main.js").unwrap());
        assert!(glob_match("**/*.rs", "src/path.rs").unwrap());
    }

    #[test]
    fn test_matches_any() {
        let globs = compile_globs(&["docs/**".to_string(), "*.md".to_string()]).unwrap();
        assert!(matches_any(&globs, "docs/guide/intro.txt"));
        assert!(matches_any(&globs, "README.md"));
        assert!(!matches_any(&globs, "src/lib.rs"));
        assert!(matches_any(&[], "anything"));
    }

    #[test]
    fn test_regex_rename() {
        let re = Regex::new(r"(\w+)\.rs").unwrap();
        assert_eq!(
            regex_rename(&re, "$1_backup.rs", "main.rs"),
            Some("main_backup.rs".to_string())
        );

        let re = Regex::new(r"(\w+)\.js").unwrap();
        assert_eq!(regex_rename(&re, "$1_backup.js", "main.rs"), None);

        let re = Regex::new(r"(\w+)/(\w+)\.rs").unwrap();
        assert_eq!(
            regex_rename(&re, "$2_$1.rs", "src/main.rs"),
            Some("main_src.rs".to_string())
        );
    }

    #[test]
    fn test_regex_rename_keeps_literal_dollar() {
        let re = Regex::new(r"^price/(.*)$").unwrap();
        assert_eq!(
            regex_rename(&re, "cost$/$1", "price/list"),
            Some("cost$/list".to_string())
        );
    }

    #[test]
    fn test_encode_url_path() {
        assert_eq!(
            encode_url_path("github.com/user/repo.git"),
            "github.com-user-repo.git"
        );
        assert_eq!(encode_url_path("host:8080/a b"), "host_8080-a_b");
    }
}
