//! Shell quoting utilities
//!
//! Every path, passphrase and ciphertext interpolated into a remote command
//! goes through [`quote`].

/// Quote a string for a POSIX shell.
///
/// Strings made only of characters that are never special to the shell are
/// returned unchanged. Anything else is wrapped in single quotes, with embedded
/// single quotes rewritten to `'"'"'` (end quote, literal quote via double
/// quotes, start quote again).
///
/// # Examples
///
/// ```
/// use ssh_provision::ssh::shell::quote;
///
/// assert_eq!(quote("/tmp/x"), "/tmp/x");
/// assert_eq!(quote("a b"), "'a b'");
/// assert_eq!(quote("it's"), "'it'\"'\"'s'");
/// assert_eq!(quote(""), "''");
/// ```
pub fn quote(s: &str) -> String {
    if s.is_empty() {
        return "''".to_string();
    }

    if s.chars().all(is_safe) {
        return s.to_string();
    }

    format!("'{}'", s.replace('\'', "'\"'\"'"))
}

/// Join words into a single shell command line, quoting each one.
pub fn join<I, S>(words: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    words
        .into_iter()
        .map(|w| quote(w.as_ref()))
        .collect::<Vec<_>>()
        .join(" ")
}

fn is_safe(c: char) -> bool {
    c.is_ascii_alphanumeric() || "_@%+=:,./-".contains(c)
}
