use axum::http::Uri;
use thiserror::Error;

use super::model::RequestForm;
use crate::config::RequestsConfig;
use crate::humanize::ByteSize;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FormError {
    #[error("Enter the website URL")]
    MissingUrl,

    #[error("Enter a valid URL including http:// or https://, got {0:?}")]
    InvalidUrl(String),

    #[error("Describe the data you want collected")]
    MissingDescription,

    #[error("Enter your email address")]
    MissingEmail,

    #[error("Enter a valid email address, got {0:?}")]
    InvalidEmail(String),

    #[error("At most {max} attachments are allowed")]
    TooManyAttachments { max: usize },

    #[error("Files {names:?} exceed the {limit} limit")]
    OversizedAttachments { names: Vec<String>, limit: ByteSize },
}

/// First problem with the form, checked in the order the fields appear
pub fn validate(form: &RequestForm, limits: &RequestsConfig) -> Result<(), FormError> {
    let url = form.website_url.trim();
    if url.is_empty() {
        return Err(FormError::MissingUrl);
    }
    if !is_web_url(url) {
        return Err(FormError::InvalidUrl(url.to_string()));
    }

    if form.description.trim().is_empty() {
        return Err(FormError::MissingDescription);
    }

    let email = form.email.trim();
    if email.is_empty() {
        return Err(FormError::MissingEmail);
    }
    if !is_email(email) {
        return Err(FormError::InvalidEmail(email.to_string()));
    }

    if form.attachments.len() > limits.max_attachments {
        return Err(FormError::TooManyAttachments {
            max: limits.max_attachments,
        });
    }

    let oversized: Vec<String> = form
        .attachments
        .iter()
        .filter(|a| a.size() > limits.max_attachment_bytes.as_u64())
        .map(|a| a.name.clone())
        .collect();
    if !oversized.is_empty() {
        return Err(FormError::OversizedAttachments {
            names: oversized,
            limit: limits.max_attachment_bytes,
        });
    }

    Ok(())
}

/// Absolute http(s) URL with a host
pub fn is_web_url(raw: &str) -> bool {
    let Ok(uri) = raw.parse::<Uri>() else {
        return false;
    };
    let web_scheme = matches!(uri.scheme_str(), Some("http" | "https"));
    let has_host = uri.host().is_some_and(|h| !h.is_empty());
    web_scheme && has_host
}

/// `local@domain.tld`, no whitespace
pub fn is_email(raw: &str) -> bool {
    if raw.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = raw.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain
            .split_once('.')
            .is_some_and(|(name, _)| !name.is_empty())
        && !domain.ends_with('.')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::requests::Attachment;

    fn form() -> RequestForm {
        RequestForm {
            website_url: "https://shop.example.com/catalog".into(),
            description: "All product prices".into(),
            email: "me@example.com".into(),
            attachments: vec![],
        }
    }

    #[test]
    fn test_valid_form() {
        assert!(validate(&form(), &RequestsConfig::default()).is_ok());
    }

    #[test]
    fn test_urls() {
        assert!(is_web_url("http://example.com"));
        assert!(is_web_url("https://example.com:8443/a?b=c"));
        assert!(!is_web_url("example.com"));
        assert!(!is_web_url("ftp://example.com"));
        assert!(!is_web_url("/relative/path"));
        assert!(!is_web_url("not a url"));
    }

    #[test]
    fn test_emails() {
        assert!(is_email("a.b@example.co"));
        assert!(!is_email("ab@example"));
        assert!(!is_email("@example.com"));
        assert!(!is_email("a@b@example.com"));
        assert!(!is_email("a @example.com"));
        assert!(!is_email("a@example."));
    }

    #[test]
    fn test_field_order() {
        let limits = RequestsConfig::default();

        let mut f = form();
        f.website_url = " ".into();
        f.description.clear();
        assert_eq!(validate(&f, &limits), Err(FormError::MissingUrl));

        let mut f = form();
        f.website_url = "www.example.com".into();
        assert!(matches!(validate(&f, &limits), Err(FormError::InvalidUrl(_))));

        let mut f = form();
        f.description = "\n".into();
        assert_eq!(validate(&f, &limits), Err(FormError::MissingDescription));

        let mut f = form();
        f.email.clear();
        assert_eq!(validate(&f, &limits), Err(FormError::MissingEmail));
    }

    #[test]
    fn test_attachment_limits() {
        let limits = RequestsConfig {
            max_attachment_bytes: ByteSize(4),
            max_attachments: 2,
            ..RequestsConfig::default()
        };

        let mut f = form();
        f.attachments = vec![
            Attachment::new("ok.txt", "1234"),
            Attachment::new("big.txt", "12345"),
        ];
        assert_eq!(
            validate(&f, &limits),
            Err(FormError::OversizedAttachments {
                names: vec!["big.txt".into()],
                limit: ByteSize(4),
            })
        );

        f.attachments.push(Attachment::new("third.txt", "1"));
        assert_eq!(validate(&f, &limits), Err(FormError::TooManyAttachments { max: 2 }));
    }
}
