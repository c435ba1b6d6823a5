//! Note data carried by a record, plus the boundary checks applied to it.

use crate::core::record::{self, FIELD_DELIM, RECORD_DELIM};
use crate::core::shape::SHAPE_DELIM;
use crate::{NotamyError, Result};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Tag given to a note added without one.
pub const DEFAULT_TAG: &str = "?";

/// Tag of the synthetic root of a brand-new store.
pub const INITIAL_TAG: &str = "/";

pub const MAX_TAG_LEN: usize = 24;
pub const MAX_COMMENT_LEN: usize = 479;
pub const MAX_KEYWORDS_LEN: usize = 299;
pub const MAX_LINK_LEN: usize = 207;
pub const MAX_DATE_LEN: usize = 19;

/// Format of every note date, local time.
pub const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One note's persisted fields, in record order, plus the optional body.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteRecord {
    pub tag: String,
    pub comment: String,
    pub keywords: String,
    pub link_file: String,
    pub date: String,
    pub iv: String,
    pub protected: bool,
    pub body: Option<String>,
}

impl NoteRecord {
    #[must_use]
    pub fn has_link(&self) -> bool {
        !self.link_file.is_empty()
    }

    #[must_use]
    pub fn has_body(&self) -> bool {
        self.body.as_deref().is_some_and(|b| !b.is_empty())
    }

    /// Checks field lengths and forbidden sequences before the record is staged.
    ///
    /// # Errors
    ///
    /// Returns [`NotamyError::ValidationFailed`] naming the offending field.
    pub fn validate(&self) -> Result<()> {
        check_tag(&self.tag)?;
        check_field("Comment", &self.comment, MAX_COMMENT_LEN)?;
        check_field("Keywords", &self.keywords, MAX_KEYWORDS_LEN)?;
        check_field("Link_File", &self.link_file, MAX_LINK_LEN)?;
        check_field("Date", &self.date, MAX_DATE_LEN)?;
        if let Some(body) = &self.body {
            if body.contains(RECORD_DELIM) {
                return Err(NotamyError::ValidationFailed(
                    "'Body' contains the record delimiter".to_string(),
                ));
            }
        }
        Ok(())
    }
}

/// Field overrides applied by `modify`; `None` keeps the stored value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NoteChanges {
    pub tag: Option<String>,
    pub comment: Option<String>,
    pub keywords: Option<String>,
    pub link_file: Option<String>,
    pub body: Option<String>,
}

impl NoteChanges {
    /// Overwrites every field of `record` that has a non-empty override.
    pub fn apply_to(&self, record: &mut NoteRecord) {
        fn set(slot: &mut String, value: &Option<String>) {
            if let Some(v) = value.as_deref().filter(|v| !v.is_empty()) {
                *slot = v.to_string();
            }
        }
        set(&mut record.tag, &self.tag);
        set(&mut record.comment, &self.comment);
        set(&mut record.keywords, &self.keywords);
        set(&mut record.link_file, &self.link_file);
        if let Some(body) = &self.body {
            record.body = Some(body.clone()).filter(|b| !b.is_empty());
        }
    }
}

/// A tag argument split into the new note's tag and the parent it goes under.
///
/// `child>parent` and `parent<child` both place `child` under `parent`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagSpec {
    pub tag: String,
    pub parent: Option<String>,
}

impl TagSpec {
    /// # Errors
    ///
    /// Returns [`NotamyError::ValidationFailed`] if both separators are used or
    /// either side exceeds the tag length limit.
    pub fn parse(input: &str) -> Result<Self> {
        let split = |sep: char| -> Option<(String, String)> {
            let (a, b) = input.split_once(sep)?;
            Some((a.trim().to_string(), b.trim().to_string()))
        };
        let spec = match (input.contains('<'), input.contains('>')) {
            (true, true) => {
                return Err(NotamyError::ValidationFailed("tag format error".to_string()))
            }
            (true, false) => split('<').map(|(parent, tag)| Self {
                tag,
                parent: Some(parent),
            }),
            (false, true) => split('>').map(|(tag, parent)| Self {
                tag,
                parent: Some(parent),
            }),
            (false, false) => None,
        };
        let mut spec = spec.unwrap_or_else(|| Self {
            tag: input.trim().to_string(),
            parent: None,
        });
        if spec.tag.is_empty() {
            spec.tag = DEFAULT_TAG.to_string();
        }
        if spec.parent.as_deref() == Some("") {
            spec.parent = None;
        }
        check_tag(&spec.tag)?;
        if let Some(parent) = &spec.parent {
            check_tag(parent)?;
        }
        Ok(spec)
    }
}

/// Returns the 40-hex-digit fingerprint identifying a freshly added note.
///
/// A random UUID is mixed in so two identical notes added in the same second
/// still receive distinct hashes.
#[must_use]
pub fn fingerprint(record: &NoteRecord) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(&record::encode(record));
    hasher.update(Uuid::new_v4().as_bytes());
    hex::encode(&hasher.finalize().as_bytes()[..20])
}

/// Current local time in [`DATE_FORMAT`].
#[must_use]
pub fn timestamp_now() -> String {
    chrono::Local::now().format(DATE_FORMAT).to_string()
}

fn check_tag(tag: &str) -> Result<()> {
    if tag.chars().count() > MAX_TAG_LEN {
        return Err(NotamyError::ValidationFailed(format!(
            "'Tag' too long (max {MAX_TAG_LEN} characters)"
        )));
    }
    if tag.contains(['\t', '\n', '\r']) || tag.contains(SHAPE_DELIM) {
        return Err(NotamyError::ValidationFailed(
            "'Tag' contains a reserved character".to_string(),
        ));
    }
    check_field("Tag", tag, MAX_TAG_LEN)
}

fn check_field(name: &str, value: &str, max: usize) -> Result<()> {
    if value.chars().count() > max {
        return Err(NotamyError::ValidationFailed(format!(
            "'{name}' too long (max {max} characters)"
        )));
    }
    if value.contains(FIELD_DELIM) || value.contains(RECORD_DELIM) {
        return Err(NotamyError::ValidationFailed(format!(
            "'{name}' contains a record delimiter"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_spec_plain() {
        let spec = TagSpec::parse("log").unwrap();
        assert_eq!(spec.tag, "log");
        assert!(spec.parent.is_none());
    }

    #[test]
    fn test_tag_spec_both_directions() {
        let spec = TagSpec::parse("cron>log").unwrap();
        assert_eq!(spec.tag, "cron");
        assert_eq!(spec.parent.as_deref(), Some("log"));

        let spec = TagSpec::parse("log<cron").unwrap();
        assert_eq!(spec.tag, "cron");
        assert_eq!(spec.parent.as_deref(), Some("log"));
    }

    #[test]
    fn test_tag_spec_rejects_mixed_separators() {
        assert!(TagSpec::parse("a<b>c").is_err());
    }

    #[test]
    fn test_tag_spec_empty_defaults() {
        let spec = TagSpec::parse("").unwrap();
        assert_eq!(spec.tag, DEFAULT_TAG);
    }

    #[test]
    fn test_validate_rejects_long_tag_and_delimiters() {
        let mut record = NoteRecord {
            tag: "x".repeat(MAX_TAG_LEN + 1),
            ..NoteRecord::default()
        };
        assert!(record.validate().is_err());

        record.tag = "ok".to_string();
        record.comment = format!("a{FIELD_DELIM}b");
        assert!(record.validate().is_err());

        record.comment = "fine".to_string();
        assert!(record.validate().is_ok());
    }

    #[test]
    fn test_fingerprint_is_40_hex_and_unique() {
        let record = NoteRecord {
            tag: "a".into(),
            ..NoteRecord::default()
        };
        let a = fingerprint(&record);
        let b = fingerprint(&record);
        assert_eq!(a.len(), 40);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }

    #[test]
    fn test_changes_skip_empty_values() {
        let mut record = NoteRecord {
            tag: "old".into(),
            comment: "keep".into(),
            ..NoteRecord::default()
        };
        let changes = NoteChanges {
            tag: Some("new".into()),
            comment: Some(String::new()),
            ..NoteChanges::default()
        };
        changes.apply_to(&mut record);
        assert_eq!(record.tag, "new");
        assert_eq!(record.comment, "keep");
    }

    #[test]
    fn test_timestamp_format() {
        let now = timestamp_now();
        assert_eq!(now.len(), MAX_DATE_LEN);
        assert!(chrono::NaiveDateTime::parse_from_str(&now, DATE_FORMAT).is_ok());
    }
}
