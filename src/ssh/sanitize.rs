//! Redaction of askpass passphrases in command text
//!
//! Elevated commands carry `ASKPASS_KEY_<hex>=<passphrase>` assignments.
//! Anything that logs a command or puts it into an error goes through
//! [`redact_secrets`] first.

use super::elevation::PASSPHRASE_ENV_PREFIX;

/// Replacement for a redacted value
pub const REDACTED: &str = "[REDACTED]";

/// Replace the value of every `ASKPASS_KEY_*=` assignment with `[REDACTED]`
///
/// The value runs up to the next whitespace character.
///
/// # Example
/// ```
/// use ssh_provision::ssh::sanitize::redact_secrets;
///
/// let cmd = "ASKPASS_KEY_00FF=c2VjcmV0 SUDO_ASKPASS=/tmp/x sudo -A id";
/// assert_eq!(
///     redact_secrets(cmd),
///     "ASKPASS_KEY_00FF=[REDACTED] SUDO_ASKPASS=/tmp/x sudo -A id"
/// );
/// ```
pub fn redact_secrets(command: &str) -> String {
    let mut out = String::with_capacity(command.len());
    let mut rest = command;

    while let Some(start) = rest.find(PASSPHRASE_ENV_PREFIX) {
        let after_prefix = &rest[start + PASSPHRASE_ENV_PREFIX.len()..];
        let name_len = after_prefix
            .find(|c: char| !c.is_ascii_hexdigit())
            .unwrap_or(after_prefix.len());

        if after_prefix[name_len..].starts_with('=') {
            let value = &after_prefix[name_len + 1..];
            let value_len = value.find(char::is_whitespace).unwrap_or(value.len());

            out.push_str(&rest[..start + PASSPHRASE_ENV_PREFIX.len() + name_len + 1]);
            out.push_str(REDACTED);
            rest = &value[value_len..];
        } else {
            out.push_str(&rest[..start + PASSPHRASE_ENV_PREFIX.len()]);
            rest = after_prefix;
        }
    }

    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_command_unchanged() {
        assert_eq!(redact_secrets("ls -la /tmp"), "ls -la /tmp");
        assert_eq!(redact_secrets(""), "");
    }

    #[test]
    fn test_prefix_redacted() {
        let cmd = "ASKPASS_KEY_0123456789ABCDEF=YWJj+/= SUDO_ASKPASS=/tmp/tmp.x sudo -A make";
        assert_eq!(
            redact_secrets(cmd),
            "ASKPASS_KEY_0123456789ABCDEF=[REDACTED] SUDO_ASKPASS=/tmp/tmp.x sudo -A make"
        );
    }

    #[test]
    fn test_exports_redacted() {
        let exports = "export ASKPASS_KEY_AB=secret\nexport SUDO_ASKPASS=/tmp/h\n";
        assert_eq!(
            redact_secrets(exports),
            "export ASKPASS_KEY_AB=[REDACTED]\nexport SUDO_ASKPASS=/tmp/h\n"
        );
    }

    #[test]
    fn test_reference_without_assignment_kept() {
        let cmd = "openssl enc -d -pass env:ASKPASS_KEY_AB";
        assert_eq!(redact_secrets(cmd), cmd);
    }

    #[test]
    fn test_value_at_end_of_input() {
        assert_eq!(redact_secrets("ASKPASS_KEY_AB=xyz"), "ASKPASS_KEY_AB=[REDACTED]");
    }
}
