use secrecy::{ExposeSecret, SecretString};

/// Placeholder shown wherever a secret would appear.
pub const REDACTED: &str = "[REDACTED]";

/// Remove every occurrence of the secret from a diagnostic message.
pub fn scrub(message: &str, secret: &SecretString) -> String {
    let raw = secret.expose_secret();
    if raw.is_empty() {
        return message.to_string();
    }
    message.replace(raw, REDACTED)
}
