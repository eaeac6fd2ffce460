//! Contact validation and scrubbing helpers.

use validator::ValidateEmail;

/// Validate an email address format.
pub fn is_valid_email(value: &str) -> bool {
    value.validate_email()
}

/// Validate an E.164-style phone number: leading `+`, 8-15 digits.
pub fn is_valid_phone(value: &str) -> bool {
    let Some(digits) = value.strip_prefix('+') else {
        return false;
    };
    (8..=15).contains(&digits.len()) && digits.chars().all(|c| c.is_ascii_digit())
}

/// Mask an email for display, keeping the first character and the domain.
pub fn scrub_email(value: &str) -> String {
    match value.split_once('@') {
        Some((local, domain)) => {
            let head = local.chars().next().map(String::from).unwrap_or_default();
            format!("{head}•••@{domain}")
        }
        None => "•••".to_string(),
    }
}

/// Mask a phone number for display, keeping the prefix and last 4 digits.
/// Counts characters, not bytes, so arbitrary input cannot split a char.
pub fn scrub_phone(value: &str) -> String {
    let chars: Vec<char> = value.chars().collect();
    if chars.len() <= 6 {
        return "•••".to_string();
    }
    let head: String = chars[..2].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{head}•••••{tail}")
}
