// src/types/domain_types.rs
//! Domain-specific newtypes for type safety and validation.

use super::ValidationError;
use crate::constants::{MAX_SHEET_NAME_LENGTH, SUPPORTED_ENCODINGS};
use serde::Serialize;
use std::fmt;
use url::Url;

/// A credential that must never reach logs or terminal output.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    /// Create a new secret, rejecting empty values.
    pub fn new(value: impl Into<String>) -> Result<Self, ValidationError> {
        let value = value.into();
        if value.is_empty() {
            return Err(ValidationError::EmptyField("password"));
        }
        Ok(Self(value))
    }

    /// Expose the secret for the one call that needs it.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "********")
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(********)")
    }
}

/// Validated URL type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedUrl(Url);

impl ValidatedUrl {
    /// Create a new validated URL
    pub fn parse(url: &str) -> Result<Self, ValidationError> {
        match Url::parse(url) {
            Ok(parsed_url) => {
                if parsed_url.scheme() != "http" && parsed_url.scheme() != "https" {
                    return Err(ValidationError::InvalidUrl {
                        url: url.to_string(),
                        reason: "Only HTTP and HTTPS URLs are supported".to_string(),
                    });
                }
                Ok(Self(parsed_url))
            }
            Err(e) => Err(ValidationError::InvalidUrl {
                url: url.to_string(),
                reason: e.to_string(),
            }),
        }
    }

    /// Get the URL as a string
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// Appends a site-relative path (e.g. `/login`) to this base URL.
    ///
    /// Any path already on the base is kept, so `http://host/oa` + `/login`
    /// gives `http://host/oa/login`.
    pub fn page(&self, path: &str) -> String {
        let base = self.0.as_str().trim_end_matches('/');
        if path.is_empty() {
            return base.to_string();
        }
        format!("{}/{}", base, path.trim_start_matches('/'))
    }
}

impl fmt::Display for ValidatedUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Worksheet name accepted by spreadsheet applications.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct SheetName(String);

impl SheetName {
    const FORBIDDEN: &'static [char] = &['[', ']', ':', '*', '?', '/', '\\'];

    pub fn new(name: impl Into<String>) -> Result<Self, ValidationError> {
        let name = name.into();

        if name.trim().is_empty() {
            return Err(ValidationError::InvalidSheetName {
                name,
                reason: "Sheet name cannot be empty".to_string(),
            });
        }

        if name.chars().count() > MAX_SHEET_NAME_LENGTH {
            return Err(ValidationError::InvalidSheetName {
                name,
                reason: format!("Sheet name exceeds {} characters", MAX_SHEET_NAME_LENGTH),
            });
        }

        if let Some(c) = name.chars().find(|c| Self::FORBIDDEN.contains(c)) {
            return Err(ValidationError::InvalidSheetName {
                name,
                reason: format!("Sheet name cannot contain '{}'", c),
            });
        }

        if name.starts_with('\'') || name.ends_with('\'') {
            return Err(ValidationError::InvalidSheetName {
                name,
                reason: "Sheet name cannot start or end with an apostrophe".to_string(),
            });
        }

        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SheetName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Leading part of every artifact filename.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePrefix(String);

impl FilePrefix {
    pub fn new(prefix: impl Into<String>) -> Result<Self, ValidationError> {
        let prefix = prefix.into();

        if prefix.trim().is_empty() {
            return Err(ValidationError::InvalidFilePrefix {
                prefix,
                reason: "File prefix cannot be empty".to_string(),
            });
        }

        if prefix
            .chars()
            .any(|c| matches!(c, '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|') || c.is_control())
        {
            return Err(ValidationError::InvalidFilePrefix {
                prefix,
                reason: "File prefix contains characters not allowed in filenames".to_string(),
            });
        }

        Ok(Self(prefix))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Artifact file extension, always stored with its leading dot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileExtension(String);

impl FileExtension {
    const VALID_EXTENSIONS: &'static [&'static str] = &["xlsx"];

    pub fn new(extension: impl Into<String>) -> Result<Self, ValidationError> {
        let extension = extension.into();
        let bare = extension.trim_start_matches('.').to_ascii_lowercase();

        if !Self::VALID_EXTENSIONS.contains(&bare.as_str()) {
            return Err(ValidationError::InvalidExtension { extension });
        }

        Ok(Self(format!(".{}", bare)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for FileExtension {
    fn default() -> Self {
        Self(".xlsx".to_string())
    }
}

/// Character encoding requested for the database session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Encoding(String);

impl Encoding {
    pub fn new(name: impl Into<String>) -> Result<Self, ValidationError> {
        let name = name.into();
        let normalized = name.trim().to_ascii_uppercase();

        if !SUPPORTED_ENCODINGS.contains(&normalized.as_str()) {
            return Err(ValidationError::UnsupportedEncoding(name));
        }

        Ok(Self(normalized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for Encoding {
    fn default() -> Self {
        Self("UTF-8".to_string())
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Non-empty list of mail recipients, kept in configured order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct RecipientList(Vec<String>);

impl RecipientList {
    pub fn new(recipients: Vec<String>) -> Result<Self, ValidationError> {
        let recipients: Vec<String> = recipients
            .into_iter()
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty())
            .collect();

        if recipients.is_empty() {
            return Err(ValidationError::NoRecipients);
        }

        Ok(Self(recipients))
    }

    /// Number of recipients; never zero.
    pub fn count(&self) -> usize {
        self.0.len()
    }

    /// Renders the list the way the composer field expects it.
    pub fn joined(&self) -> String {
        self.0.join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn secret_never_displays_value() {
        let secret = Secret::new("admin123").unwrap();
        assert_eq!(format!("{}", secret), "********");
        assert!(!format!("{:?}", secret).contains("admin123"));
        assert_eq!(secret.expose(), "admin123");
    }

    #[test]
    fn secret_rejects_empty() {
        assert_eq!(Secret::new(""), Err(ValidationError::EmptyField("password")));
    }

    #[test]
    fn url_must_be_http() {
        assert!(ValidatedUrl::parse("http://localhost:5000").is_ok());
        assert!(matches!(
            ValidatedUrl::parse("ftp://localhost"),
            Err(ValidationError::InvalidUrl { .. })
        ));
        assert!(ValidatedUrl::parse("not a url").is_err());
    }

    #[test]
    fn url_page_joins_paths() {
        let base = ValidatedUrl::parse("http://localhost:5000").unwrap();
        assert_eq!(base.page("/login"), "http://localhost:5000/login");
        assert_eq!(base.page("compose"), "http://localhost:5000/compose");
        assert_eq!(base.page(""), "http://localhost:5000");

        let nested = ValidatedUrl::parse("http://intranet/oa/").unwrap();
        assert_eq!(nested.page("/login"), "http://intranet/oa/login");
    }

    #[test]
    fn sheet_name_rules() {
        assert!(SheetName::new("数据报表").is_ok());
        assert!(SheetName::new("Report 2024").is_ok());
        assert!(SheetName::new("").is_err());
        assert!(SheetName::new("a/b").is_err());
        assert!(SheetName::new("[x]").is_err());
        assert!(SheetName::new("'quoted'").is_err());
        assert!(SheetName::new("x".repeat(32)).is_err());
        assert!(SheetName::new("x".repeat(31)).is_ok());
    }

    #[test]
    fn file_prefix_rejects_path_separators() {
        assert!(FilePrefix::new("数据报表").is_ok());
        assert!(FilePrefix::new("outpatient_records").is_ok());
        assert!(FilePrefix::new("../escape").is_err());
        assert!(FilePrefix::new("   ").is_err());
    }

    #[test]
    fn extension_is_normalized_with_dot() {
        assert_eq!(FileExtension::new("xlsx").unwrap().as_str(), ".xlsx");
        assert_eq!(FileExtension::new(".XLSX").unwrap().as_str(), ".xlsx");
        assert!(FileExtension::new(".csv").is_err());
    }

    #[test]
    fn encoding_accepts_utf8_family_only() {
        assert_eq!(Encoding::new("utf-8").unwrap().as_str(), "UTF-8");
        assert_eq!(Encoding::new("AL32UTF8").unwrap().as_str(), "AL32UTF8");
        assert!(matches!(
            Encoding::new("GBK"),
            Err(ValidationError::UnsupportedEncoding(_))
        ));
    }

    #[test]
    fn recipients_are_trimmed_and_non_empty() {
        let list = RecipientList::new(vec![" user1 ".into(), "".into(), "user2".into()]).unwrap();
        assert_eq!(list.count(), 2);
        assert_eq!(list.joined(), "user1, user2");
        assert_eq!(
            RecipientList::new(vec!["  ".into()]),
            Err(ValidationError::NoRecipients)
        );
    }
}
