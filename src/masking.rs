use secrecy::{ExposeSecret, SecretString};

use crate::driver::AttributeValue;

/// Format a secret value, respecting the show_secrets flag.
pub fn format_secret(secret: &SecretString, show_secrets: bool) -> String {
    if show_secrets {
        secret.expose_secret().to_string()
    } else {
        "[REDACTED]".to_string()
    }
}

/// Format a connection attribute for diagnostics.
///
/// Secret values are masked, and so are plain values under a key that names a
/// credential (a token passed through extra driver properties stays hidden).
pub fn format_attribute(key: &str, value: &AttributeValue, show_secrets: bool) -> String {
    match value {
        AttributeValue::Secret(secret) => format_secret(secret, show_secrets),
        AttributeValue::Plain(_) if !show_secrets && is_sensitive_key(key) => {
            "[REDACTED]".to_string()
        }
        AttributeValue::Plain(v) => v.clone(),
    }
}

fn is_sensitive_key(key: &str) -> bool {
    let key = key.to_ascii_lowercase();
    key == "pwd" || key.contains("password") || key.contains("token") || key.contains("secret")
}
