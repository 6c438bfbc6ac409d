//! Email address classification

use crate::models::{ChannelType, ContactChannel, EmailType};
use crate::scoring::normalize_name;

/// Generic newsroom functions
const ROLE_LOCALS: &[&str] = &[
    "news", "tips", "tip", "newstips", "editor", "editors", "newsroom", "info", "contact",
    "press", "letters", "feedback", "hello", "media", "submissions", "corrections",
];

/// Local part of an address, lowercased and without a `+tag`
fn local_part(address: &str) -> Option<String> {
    let (local, domain) = address.trim().rsplit_once('@')?;
    if local.is_empty() || !domain.contains('.') {
        return None;
    }
    let local = local.split('+').next().unwrap_or(local);
    Some(local.to_lowercase())
}

/// Classify `address` relative to the person `name`
///
/// Returns `None` when the address is not a usable email.
pub fn classify_email(address: &str, name: &str) -> Option<EmailType> {
    let local = local_part(address)?;
    let letters: String = local.chars().filter(|c| c.is_ascii_alphabetic()).collect();

    if ROLE_LOCALS.contains(&letters.as_str()) {
        return Some(EmailType::Role);
    }
    if is_derived_from_name(&local, &letters, name) {
        return Some(EmailType::Personal);
    }
    Some(EmailType::Alias)
}

fn is_derived_from_name(local: &str, letters: &str, name: &str) -> bool {
    let key = normalize_name(name);
    let tokens: Vec<&str> = key.split(' ').filter(|t| !t.is_empty()).collect();
    if tokens.is_empty() || letters.is_empty() {
        return false;
    }

    // jane.doe, jane_doe, doe-j
    let local_tokens: Vec<&str> = local
        .split(['.', '_', '-'])
        .filter(|t| !t.is_empty())
        .collect();
    if local_tokens
        .iter()
        .any(|lt| lt.len() >= 2 && tokens.contains(lt))
    {
        return true;
    }

    // janedoe, doejane
    if tokens.iter().filter(|t| t.len() >= 3).any(|t| letters.contains(t)) {
        return true;
    }

    // jd, jdoe, janed
    let initials: String = tokens.iter().filter_map(|t| t.chars().next()).collect();
    let first = tokens[0];
    let last = tokens[tokens.len() - 1];
    let first_initial = &first[..first.chars().next().map_or(0, char::len_utf8)];
    let last_initial = &last[..last.chars().next().map_or(0, char::len_utf8)];

    letters == initials
        || letters == format!("{}{}", first_initial, last)
        || letters == format!("{}{}", first, last_initial)
}

/// Best email for an author: the explicit address, else the first email channel
pub fn find_email<'a>(explicit: Option<&'a str>, channels: &'a [ContactChannel]) -> Option<&'a str> {
    explicit.or_else(|| {
        channels
            .iter()
            .find(|c| c.channel_type == ChannelType::Email)
            .map(|c| c.value.as_str())
    })
}

/// Score factor for an email of the given type
pub fn email_factor(email_type: EmailType) -> f64 {
    match email_type {
        EmailType::Personal => 1.0,
        EmailType::Alias => 0.6,
        EmailType::Role => 0.4,
    }
}
