use dbquery::driver::AttributeValue;
use dbquery::masking::{format_attribute, format_secret};
use secrecy::SecretString;

#[test]
fn test_secret_masked_by_default() {
    let secret = SecretString::from("my-super-secret-password".to_string());
    let output = format_secret(&secret, false);
    assert_eq!(output, "[REDACTED]");
    assert!(!output.contains("my-super-secret-password"));
}

#[test]
fn test_secret_exposed_with_show_secrets() {
    let secret = SecretString::from("my-super-secret-password".to_string());
    let output = format_secret(&secret, true);
    assert_eq!(output, "my-super-secret-password");
}

#[test]
fn test_secret_debug_is_redacted() {
    let secret = SecretString::from("password123".to_string());
    let debug_output = format!("{:?}", secret);
    assert!(!debug_output.contains("password123"), "Debug should not expose secret: {}", debug_output);
}

#[test]
fn test_secret_attribute_masked() {
    let value = AttributeValue::Secret(SecretString::from("dapi123".to_string()));
    assert_eq!(format_attribute("PWD", &value, false), "[REDACTED]");
    assert_eq!(format_attribute("PWD", &value, true), "dapi123");
}

#[test]
fn test_plain_attribute_with_sensitive_key_masked() {
    let value = AttributeValue::Plain("dapi456".to_string());
    assert_eq!(format_attribute("Auth_AccessToken", &value, false), "[REDACTED]");
    assert_eq!(format_attribute("password", &value, false), "[REDACTED]");
    assert_eq!(format_attribute("Auth_AccessToken", &value, true), "dapi456");
}

#[test]
fn test_plain_attribute_shown() {
    let value = AttributeValue::Plain("443".to_string());
    assert_eq!(format_attribute("Port", &value, false), "443");
}
