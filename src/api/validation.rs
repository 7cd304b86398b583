//! Request field validation.
//!
//! Helpers collect messages into a [`FieldErrors`] map so one response can
//! report every invalid field at once.

use url::Url;

use crate::config::ContentConfig;
use crate::domain::{FieldErrors, PageRequest};

use super::ApiError;

pub const TITLE_MAX_LEN: usize = 100;
pub const VIDEO_LINK_MAX_LEN: usize = 200;
pub const PASSWORD_MIN_LEN: usize = 8;

const REQUIRED: &str = "This field is required.";
const BLANK: &str = "This field may not be blank.";

/// Non-blank value of a required field.
pub fn required(errors: &mut FieldErrors, field: &str, value: Option<String>) -> Option<String> {
    match value {
        None => {
            errors.add(field, REQUIRED);
            None
        }
        Some(v) if v.trim().is_empty() => {
            errors.add(field, BLANK);
            None
        }
        Some(v) => Some(v),
    }
}

/// Like [`required`] with an upper length bound.
pub fn required_text(
    errors: &mut FieldErrors,
    field: &str,
    value: Option<String>,
    max_len: usize,
) -> Option<String> {
    let value = required(errors, field, value)?;
    if value.chars().count() > max_len {
        errors.add(field, max_len_message(max_len));
        return None;
    }
    Some(value)
}

/// Optional field that, when present, must be non-blank and bounded.
pub fn optional_text(
    errors: &mut FieldErrors,
    field: &str,
    value: Option<String>,
    max_len: Option<usize>,
) -> Option<String> {
    let value = value?;
    if value.trim().is_empty() {
        errors.add(field, BLANK);
        return None;
    }
    if let Some(max) = max_len
        && value.chars().count() > max
    {
        errors.add(field, max_len_message(max));
        return None;
    }
    Some(value)
}

fn max_len_message(max: usize) -> String {
    format!("Ensure this field has no more than {max} characters.")
}

/// Accepts only http(s) links whose host is `allowed_host` or one of its
/// subdomains.
pub fn validate_video_link(link: &str, allowed_host: &str) -> Result<(), String> {
    let rejected = || format!("Only links to {allowed_host} are allowed.");

    if link.chars().count() > VIDEO_LINK_MAX_LEN {
        return Err(max_len_message(VIDEO_LINK_MAX_LEN));
    }

    let url = Url::parse(link.trim()).map_err(|_| rejected())?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(rejected());
    }

    let host = url.host_str().unwrap_or_default().to_ascii_lowercase();
    let allowed = allowed_host.to_ascii_lowercase();
    if host == allowed || host.ends_with(&format!(".{allowed}")) {
        Ok(())
    } else {
        Err(rejected())
    }
}

pub fn video_link(
    errors: &mut FieldErrors,
    value: Option<String>,
    required_field: bool,
    content: &ContentConfig,
) -> Option<String> {
    let value = if required_field {
        required(errors, "link_to_video", value)?
    } else {
        optional_text(errors, "link_to_video", value, None)?
    };

    match validate_video_link(&value, &content.video_host) {
        Ok(()) => Some(value),
        Err(message) => {
            errors.add("link_to_video", message);
            None
        }
    }
}

pub fn validate_email(errors: &mut FieldErrors, value: &str) {
    let valid = value.split_once('@').is_some_and(|(local, domain)| {
        !local.is_empty()
            && !domain.is_empty()
            && domain.contains('.')
            && !domain.starts_with('.')
            && !domain.ends_with('.')
            && !value.chars().any(char::is_whitespace)
    });
    if !valid {
        errors.add("email", "Enter a valid email address.");
    }
}

pub fn validate_password(errors: &mut FieldErrors, value: &str) {
    if value.chars().count() < PASSWORD_MIN_LEN {
        errors.add(
            "password",
            format!(
                "This password is too short. It must contain at least {PASSWORD_MIN_LEN} characters."
            ),
        );
    }
}

pub fn validate_positive_amount(errors: &mut FieldErrors, value: Option<i64>) -> Option<i64> {
    match value {
        None => {
            errors.add("amount", REQUIRED);
            None
        }
        Some(v) if v <= 0 => {
            errors.add("amount", "Ensure this value is greater than or equal to 1.");
            None
        }
        Some(v) => Some(v),
    }
}

/// Resolves `page` / `page_size` query values. A page that is not a
/// positive integer is reported as an invalid page.
pub fn page_request(
    page: Option<&str>,
    page_size: Option<&str>,
    content: &ContentConfig,
) -> Result<PageRequest, ApiError> {
    let page = match page {
        None => 1,
        Some(raw) => raw
            .parse::<u64>()
            .ok()
            .filter(|p| *p >= 1)
            .ok_or_else(invalid_page)?,
    };

    let page_size = page_size
        .and_then(|raw| raw.parse::<u64>().ok())
        .filter(|s| *s >= 1)
        .unwrap_or(content.page_size)
        .min(content.max_page_size);

    Ok(PageRequest { page, page_size })
}

#[must_use]
pub fn invalid_page() -> ApiError {
    ApiError::NotFound("Invalid page.".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_video_link_host() {
        let host = "youtube.com";
        assert!(validate_video_link("https://youtube.com/watch?v=1", host).is_ok());
        assert!(validate_video_link("https://www.youtube.com/watch?v=1", host).is_ok());
        assert!(validate_video_link("http://m.YouTube.com/x", host).is_ok());

        let err = validate_video_link("https://vimeo.com/1", host).unwrap_err();
        assert_eq!(err, "Only links to youtube.com are allowed.");
        assert!(validate_video_link("https://notyoutube.com/x", host).is_err());
        assert!(validate_video_link("https://youtube.com.evil.io/x", host).is_err());
        assert!(validate_video_link("ftp://youtube.com/x", host).is_err());
        assert!(validate_video_link("youtube.com/watch", host).is_err());
    }

    #[test]
    fn test_video_link_length() {
        let long = format!("https://youtube.com/{}", "a".repeat(200));
        assert_eq!(
            validate_video_link(&long, "youtube.com").unwrap_err(),
            "Ensure this field has no more than 200 characters."
        );
    }

    #[test]
    fn test_required_text_collects_messages() {
        let mut errors = FieldErrors::new();
        assert!(required_text(&mut errors, "title", None, 100).is_none());
        assert!(required_text(&mut errors, "description", Some("  ".into()), 100).is_none());
        assert!(required_text(&mut errors, "name", Some("x".repeat(101)), 100).is_none());
        assert_eq!(
            required_text(&mut errors, "ok", Some("Rust".into()), 100).as_deref(),
            Some("Rust")
        );

        assert_eq!(errors.get("title").unwrap(), ["This field is required."]);
        assert_eq!(errors.get("description").unwrap(), ["This field may not be blank."]);
        assert!(errors.get("name").is_some());
        assert!(errors.get("ok").is_none());
    }

    #[test]
    fn test_email_and_password() {
        let mut errors = FieldErrors::new();
        validate_email(&mut errors, "user@example.com");
        validate_password(&mut errors, "long enough");
        assert!(errors.is_empty());

        validate_email(&mut errors, "nope");
        validate_password(&mut errors, "short");
        assert!(errors.get("email").is_some());
        assert!(errors.get("password").is_some());
    }

    #[test]
    fn test_page_request() {
        let content = ContentConfig::default();

        let req = page_request(None, None, &content).unwrap();
        assert_eq!(req, PageRequest { page: 1, page_size: 10 });

        let req = page_request(Some("3"), Some("500"), &content).unwrap();
        assert_eq!(req, PageRequest { page: 3, page_size: 100 });

        assert!(page_request(Some("0"), None, &content).is_err());
        assert!(page_request(Some("abc"), None, &content).is_err());
    }
}
