//! Convention-based path derivation.
//!
//! Service methods are exposed at
//! `group + "/" + kebab(service) + "/" + kebab(method)`. The derivation only
//! looks at the names, so it gives the same path on every run and in any
//! registration order.
//!
//! # Kebab-case rule
//!
//! 1. Characters that are not alphanumeric separate words; runs of them
//!    collapse into one hyphen, and leading or trailing ones are dropped.
//! 2. A word starts at an uppercase letter preceded by a lowercase letter or
//!    a digit (`sayHello` → `say-hello`, `V2Users` → `v2-users`).
//! 3. In a run of capitals, the last capital starts a new word when a
//!    lowercase letter follows it (`HTTPServer` → `http-server`).
//! 4. Digits stay with the word before them (`Hello2` → `hello2`).
//! 5. The result is lowercase.

/// Converts a mixed-case identifier to lower kebab-case.
///
/// # Example
///
/// ```rust
/// use janus_router::kebab_case;
///
/// assert_eq!(kebab_case("SayHelloAnonymous"), "say-hello-anonymous");
/// assert_eq!(kebab_case("HTTPServer"), "http-server");
/// assert_eq!(kebab_case("getUserID"), "get-user-id");
/// assert_eq!(kebab_case("say_hello"), "say-hello");
/// ```
#[must_use]
pub fn kebab_case(ident: &str) -> String {
    let chars: Vec<char> = ident.chars().collect();
    let mut out = String::with_capacity(ident.len() + 4);
    let mut pending_separator = false;

    for (i, &c) in chars.iter().enumerate() {
        if !c.is_alphanumeric() {
            pending_separator = !out.is_empty();
            continue;
        }

        if c.is_uppercase() && i > 0 && !out.is_empty() {
            let prev = chars[i - 1];
            let next_is_lower = chars.get(i + 1).is_some_and(|n| n.is_lowercase());
            if prev.is_lowercase()
                || prev.is_ascii_digit()
                || (prev.is_uppercase() && next_is_lower)
            {
                pending_separator = true;
            }
        }

        if pending_separator {
            out.push('-');
            pending_separator = false;
        }
        out.extend(c.to_lowercase());
    }

    out
}

/// Joins path fragments into a normalized absolute path.
///
/// Empty segments are dropped, so duplicate and trailing slashes disappear.
/// The result always starts with `/`.
///
/// # Example
///
/// ```rust
/// use janus_router::join_paths;
///
/// assert_eq!(join_paths("/hi", "/hi"), "/hi/hi");
/// assert_eq!(join_paths("/", "hello/say-hello"), "/hello/say-hello");
/// assert_eq!(join_paths("/api/", ""), "/api");
/// assert_eq!(join_paths("", ""), "/");
/// ```
#[must_use]
pub fn join_paths(prefix: &str, path: &str) -> String {
    let mut out = String::with_capacity(prefix.len() + path.len() + 1);
    for segment in prefix
        .split('/')
        .chain(path.split('/'))
        .filter(|s| !s.is_empty())
    {
        out.push('/');
        out.push_str(segment);
    }
    if out.is_empty() {
        out.push('/');
    }
    out
}

/// Derives the HTTP path of a service method mounted under `group`.
///
/// # Example
///
/// ```rust
/// use janus_router::derive_path;
///
/// assert_eq!(derive_path("/", "Hello", "SayHelloAnonymous"), "/hello/say-hello-anonymous");
/// assert_eq!(derive_path("/api", "Hello", "SayHello"), "/api/hello/say-hello");
/// ```
#[must_use]
pub fn derive_path(group: &str, service: &str, method: &str) -> String {
    let fragment = format!("{}/{}", kebab_case(service), kebab_case(method));
    join_paths(group, &fragment)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_kebab_basic() {
        assert_eq!(kebab_case("Hello"), "hello");
        assert_eq!(kebab_case("SayHello"), "say-hello");
        assert_eq!(kebab_case("SayHelloAnonymous"), "say-hello-anonymous");
        assert_eq!(kebab_case("sayHello"), "say-hello");
    }

    #[test]
    fn test_kebab_acronyms() {
        assert_eq!(kebab_case("HTTPServer"), "http-server");
        assert_eq!(kebab_case("GetHTTPResponse"), "get-http-response");
        assert_eq!(kebab_case("userID"), "user-id");
        assert_eq!(kebab_case("ID"), "id");
        assert_eq!(kebab_case("APIKeys"), "api-keys");
    }

    #[test]
    fn test_kebab_digits() {
        assert_eq!(kebab_case("GetV2Users"), "get-v2-users");
        assert_eq!(kebab_case("Hello2"), "hello2");
        assert_eq!(kebab_case("Hello2World"), "hello2-world");
    }

    #[test]
    fn test_kebab_separators() {
        assert_eq!(kebab_case("say_hello"), "say-hello");
        assert_eq!(kebab_case("__say__hello__"), "say-hello");
        assert_eq!(kebab_case("say-hello"), "say-hello");
        assert_eq!(kebab_case("Say Hello"), "say-hello");
        assert_eq!(kebab_case(""), "");
        assert_eq!(kebab_case("___"), "");
    }

    #[test]
    fn test_join_paths() {
        assert_eq!(join_paths("/", "/"), "/");
        assert_eq!(join_paths("//a//", "//b//"), "/a/b");
        assert_eq!(join_paths("a", "b"), "/a/b");
    }

    #[test]
    fn test_derive_path_example() {
        assert_eq!(
            derive_path("/", "Hello", "SayHelloAnonymous"),
            "/hello/say-hello-anonymous"
        );
        assert_eq!(derive_path("/hi/", "Hello", "SayHello"), "/hi/hello/say-hello");
    }

    proptest! {
        #[test]
        fn kebab_is_idempotent(ident in "[A-Za-z0-9_]{0,24}") {
            let once = kebab_case(&ident);
            prop_assert_eq!(kebab_case(&once), once);
        }

        #[test]
        fn kebab_output_is_url_safe(ident in "[A-Za-z0-9_ .]{0,24}") {
            let out = kebab_case(&ident);
            prop_assert!(out.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-'));
            prop_assert!(!out.starts_with('-'));
            prop_assert!(!out.ends_with('-'));
            prop_assert!(!out.contains("--"));
        }

        #[test]
        fn derive_path_is_deterministic(service in "[A-Z][A-Za-z]{0,12}", method in "[A-Z][A-Za-z]{0,12}") {
            let first = derive_path("/", &service, &method);
            let second = derive_path("/", &service, &method);
            prop_assert_eq!(&first, &second);
            prop_assert!(first.starts_with('/'));
            prop_assert_eq!(first.matches('/').count(), 2);
        }
    }
}
