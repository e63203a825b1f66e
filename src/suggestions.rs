//! # Error Suggestions
//!
//! Helpers that turn errors into messages telling users what went wrong AND
//! how to fix it.
//!
//! ```rust,ignore
//! use changeport::suggestions;
//!
//! // Instead of:
//! anyhow::bail!("Configuration file not found: {}", path.display());
//!
//! // Use:
//! return Err(suggestions::config_not_found(path));
//! ```

use std::path::Path;

use crate::error::Error;

/// Every tag a workflow file accepts, for typo suggestions.
const KNOWN_TAGS: &[&str] = &[
    "git", "folder", "gerrit", "exclude", "include", "move", "replace", "fail", "skip", "allow",
    "single", "batch",
];

/// Error for a workflow file that does not exist.
pub fn config_not_found(path: &Path) -> anyhow::Error {
    anyhow::anyhow!(
        "Configuration file not found: {path}\n\n\
         hint: Create a changeport.yaml file describing the workflow\n\
         hint: Use -c/--config to specify a different path\n\
         hint: Set CHANGEPORT_CONFIG environment variable",
        path = path.display()
    )
}

/// Wrap a workflow loading error, adding a "did you mean" hint when the
/// file uses an unknown tag.
pub fn workflow_error(path: &Path, error: Error) -> anyhow::Error {
    let did_you_mean = match &error {
        Error::ConfigParse { message, .. } => unknown_variant(message)
            .and_then(|tag| find_similar(tag, KNOWN_TAGS))
            .map(|s| format!("\nhint: Did you mean '{s}'?"))
            .unwrap_or_default(),
        _ => String::new(),
    };
    anyhow::anyhow!(
        "Invalid workflow {path}: {error}{did_you_mean}",
        path = path.display()
    )
}

/// Pull `x` out of serde's "unknown variant `x`, expected ..." message.
fn unknown_variant(message: &str) -> Option<&str> {
    let rest = message.split("unknown variant `").nth(1)?;
    rest.split('`').next()
}

/// Closest candidate within an edit distance of 2.
fn find_similar<'a>(input: &str, candidates: &[&'a str]) -> Option<&'a str> {
    candidates
        .iter()
        .filter_map(|&candidate| {
            let distance = edit_distance(input, candidate);
            if distance <= 2 && distance < input.len() {
                Some((candidate, distance))
            } else {
                None
            }
        })
        .min_by_key(|(_, distance)| *distance)
        .map(|(candidate, _)| candidate)
}

/// Levenshtein distance.
fn edit_distance(a: &str, b: &str) -> usize {
    let a_chars: Vec<char> = a.chars().collect();
    let b_chars: Vec<char> = b.chars().collect();

    if a_chars.is_empty() {
        return b_chars.len();
    }
    if b_chars.is_empty() {
        return a_chars.len();
    }

    let mut previous: Vec<usize> = (0..=b_chars.len()).collect();
    for (i, ca) in a_chars.iter().enumerate() {
        let mut current = vec![i + 1; b_chars.len() + 1];
        for (j, cb) in b_chars.iter().enumerate() {
            let cost = usize::from(ca != cb);
            current[j + 1] = (previous[j + 1] + 1)
                .min(current[j] + 1)
                .min(previous[j] + cost);
        }
        previous = current;
    }
    previous[b_chars.len()]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_not_found_includes_hints() {
        let message = config_not_found(Path::new("/work/changeport.yaml")).to_string();

        assert!(message.contains("Configuration file not found"));
        assert!(message.contains("/work/changeport.yaml"));
        assert!(message.contains("-c/--config"));
        assert!(message.contains("CHANGEPORT_CONFIG"));
    }

    #[test]
    fn test_workflow_error_suggests_similar_tag() {
        let error = crate::config::parse(
            "origin:\n  folder:\n    path: a\ndestination:\n  folder:\n    path: b\ntransformations:\n  - mvoe:\n      from: a\n      to: b\n",
        )
        .unwrap_err();
        let message = workflow_error(Path::new("changeport.yaml"), error).to_string();

        assert!(message.contains("changeport.yaml"));
        assert!(message.contains("Did you mean 'move'?"), "{}", message);
    }

    #[test]
    fn test_workflow_error_without_typo() {
        let error = Error::Validation {
            message: "nope".to_string(),
        };
        let message = workflow_error(Path::new("w.yaml"), error).to_string();
        assert!(!message.contains("Did you mean"));
    }

    #[test]
    fn test_unknown_variant() {
        assert_eq!(
            unknown_variant("unknown variant `foldr`, expected `git` or `folder`"),
            Some("foldr")
        );
        assert_eq!(unknown_variant("missing field `origin`"), None);
    }

    #[test]
    fn test_edit_distance() {
        assert_eq!(edit_distance("move", "move"), 0);
        assert_eq!(edit_distance("mvoe", "move"), 2);
        assert_eq!(edit_distance("exclud", "exclude"), 1);
        assert_eq!(edit_distance("", "git"), 3);
    }

    #[test]
    fn test_find_similar() {
        assert_eq!(find_similar("replce", KNOWN_TAGS), Some("replace"));
        assert_eq!(find_similar("gerit", KNOWN_TAGS), Some("gerrit"));
        assert_eq!(find_similar("transmogrify", KNOWN_TAGS), None);
    }
}
