//! Property-based tests for path and URL handling.
//!
//! These tests use proptest to generate random inputs and verify that
//! invariants hold for all possible inputs.

#[cfg(test)]
mod proptest_tests {
    use crate::cache::{normalize_url, CacheKey};
    use crate::path::{encode_url_path, glob_match, regex_rename};
    use proptest::prelude::*;
    use regex::Regex;

    // ============================================================================
    // encode_url_path property tests
    // ============================================================================

    proptest! {
        /// Property: encode_url_path never produces filesystem-unsafe characters
        #[test]
        fn encode_url_path_never_produces_unsafe_chars(input in ".*") {
            let result = encode_url_path(&input);
            let unsafe_chars = ['/', '\\', ':', '*', '?', '"', '<', '>', '|'];
            for ch in unsafe_chars {
                prop_assert!(
                    !result.contains(ch),
                    "encode_url_path produced unsafe character '{}' from input '{}'",
                    ch,
                    input
                );
            }
        }

        /// Property: encode_url_path output is ASCII with one char per input char
        #[test]
        fn encode_url_path_is_ascii_and_char_preserving(input in ".+") {
            let result = encode_url_path(&input);
            prop_assert!(result.is_ascii());
            prop_assert_eq!(result.len(), input.chars().count());
        }

        /// Property: encode_url_path preserves alphanumeric characters
        #[test]
        fn encode_url_path_preserves_alphanumeric(input in "[a-zA-Z0-9]+") {
            prop_assert_eq!(encode_url_path(&input), input);
        }
    }

    // ============================================================================
    // normalize_url / CacheKey property tests
    // ============================================================================

    proptest! {
        /// Property: normalization is idempotent
        #[test]
        fn normalize_url_is_idempotent(
            host in "[a-z][a-z0-9]{0,10}\\.(com|org|dev)",
            path in "(/[a-z0-9_-]{1,8}){1,4}",
        ) {
            let once = normalize_url(&format!("https://{}{}", host, path)).unwrap();
            let twice = normalize_url(&once).unwrap();
            prop_assert_eq!(once, twice);
        }

        /// Property: case of scheme and host, default port and trailing slash
        /// do not change the key
        #[test]
        fn cache_key_ignores_cosmetic_differences(
            host in "[a-z][a-z0-9]{0,10}\\.(com|org|dev)",
            path in "(/[a-z0-9_-]{1,8}){1,4}",
        ) {
            let plain = CacheKey::for_url(&format!("https://{}{}", host, path)).unwrap();
            let noisy = CacheKey::for_url(
                &format!("HTTPS://{}:443{}/", host.to_uppercase(), path),
            ).unwrap();
            let schemeless = CacheKey::for_url(&format!("{}{}", host, path)).unwrap();
            prop_assert_eq!(&plain, &noisy);
            prop_assert_eq!(&plain, &schemeless);
        }

        /// Property: distinct repository paths get distinct keys
        #[test]
        fn cache_key_separates_paths(
            host in "[a-z][a-z0-9]{0,10}\\.com",
            a in "[a-z0-9]{1,12}",
            b in "[a-z0-9]{1,12}",
        ) {
            prop_assume!(a != b);
            let key_a = CacheKey::for_url(&format!("https://{}/{}", host, a)).unwrap();
            let key_b = CacheKey::for_url(&format!("https://{}/{}", host, b)).unwrap();
            prop_assert_ne!(key_a.dir_name(), key_b.dir_name());
        }

        /// Property: key directory names are single, bounded path components
        #[test]
        fn cache_key_is_a_safe_component(
            host in "[a-z][a-z0-9]{0,20}\\.com",
            path in "(/[A-Za-z0-9._~-]{1,30}){1,6}",
        ) {
            let key = CacheKey::for_url(&format!("https://{}{}", host, path)).unwrap();
            prop_assert!(!key.dir_name().contains('/'));
            prop_assert!(!key.dir_name().starts_with('.'));
            prop_assert!(key.dir_name().len() <= 64 + 1 + 32);
        }
    }

    // ============================================================================
    // glob_match property tests
    // ============================================================================

    proptest! {
        /// Property: glob pattern "*" matches any single path component
        #[test]
        fn glob_star_matches_single_component(path in "[a-zA-Z0-9_.]+") {
            prop_assert!(glob_match("*", &path).unwrap(), "Pattern '*' should match '{}'", path);
        }

        /// Property: pattern "**" matches any path
        #[test]
        fn glob_double_star_matches_all(path in "[a-zA-Z0-9_./]+") {
            prop_assert!(glob_match("**", &path).unwrap(), "Pattern '**' should match '{}'", path);
        }
    }

    // ============================================================================
    // regex_rename property tests
    // ============================================================================

    proptest! {
        /// Property: a non-matching pattern leaves the path alone
        #[test]
        fn regex_rename_non_match_returns_none(path in "[a-zA-Z]+") {
            let re = Regex::new(r"[0-9]+").unwrap();
            prop_assert_eq!(regex_rename(&re, "replacement", &path), None);
        }

        /// Property: capture groups carry their content into the new path
        #[test]
        fn regex_rename_captures_preserve_content(
            prefix in "[a-zA-Z]{1,5}",
            suffix in "[a-zA-Z]{1,5}",
        ) {
            let re = Regex::new(r"^(\w+)\.(\w+)$").unwrap();
            let path = format!("{}.{}", prefix, suffix);
            let renamed = regex_rename(&re, "lib/$2/$1", &path);
            prop_assert_eq!(renamed, Some(format!("lib/{}/{}", suffix, prefix)));
        }
    }
}
