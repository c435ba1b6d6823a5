//! Delimited text encoding of a single note record.
//!
//! A record is the seven fixed fields, each followed by [`FIELD_DELIM`], then
//! the optional body, then [`RECORD_DELIM`]:
//!
//! ```text
//! tag<::>comment<::>keywords<::>link<::>date<::>iv<::>0<::>body<::END::>\n
//! ```

use crate::{NoteRecord, NotamyError, Result};
use std::io::{Read, Seek, SeekFrom};

pub const FIELD_DELIM: &str = "<::>";
pub const RECORD_DELIM: &str = "<::END::>\n";

/// Number of fixed fields preceding the body.
const FIELD_COUNT: usize = 7;

/// Encodes `record`, always emitting every field even when empty.
#[must_use]
pub fn encode(record: &NoteRecord) -> Vec<u8> {
    let flag = if record.protected { "1" } else { "0" };
    let fields = [
        record.tag.as_str(),
        &record.comment,
        &record.keywords,
        &record.link_file,
        &record.date,
        &record.iv,
        flag,
    ];

    let mut out = String::new();
    for field in fields {
        out.push_str(field);
        out.push_str(FIELD_DELIM);
    }
    if let Some(body) = &record.body {
        out.push_str(body);
    }
    out.push_str(RECORD_DELIM);
    out.into_bytes()
}

/// Decodes one record. Missing trailing fields are left empty, so short
/// records written by older versions still load.
///
/// # Errors
///
/// Returns [`NotamyError::CorruptRecord`] if the bytes are not UTF-8.
pub fn decode(bytes: &[u8]) -> Result<NoteRecord> {
    let text = std::str::from_utf8(bytes)
        .map_err(|e| NotamyError::CorruptRecord(format!("not valid text: {e}")))?;
    let text = text.strip_suffix(RECORD_DELIM).unwrap_or(text);

    let mut parts = text.splitn(FIELD_COUNT + 1, FIELD_DELIM);
    let mut next = || parts.next().unwrap_or_default().to_string();

    let tag = next();
    let comment = next();
    let keywords = next();
    let link_file = next();
    let date = next();
    let iv = next();
    let protected = next().trim().parse::<i64>().map(|v| v != 0).unwrap_or(false);
    let body = Some(next()).filter(|b| !b.is_empty());

    Ok(NoteRecord {
        tag,
        comment,
        keywords,
        link_file,
        date,
        iv,
        protected,
        body,
    })
}

/// Reads exactly the bytes of `[start, end)` from `reader`.
///
/// # Errors
///
/// Returns [`NotamyError::CorruptRecord`] for an inverted range and
/// [`NotamyError::Io`] if the range runs past the end of the file.
pub fn read_range<R: Read + Seek>(reader: &mut R, start: u64, end: u64) -> Result<Vec<u8>> {
    if end < start {
        return Err(NotamyError::CorruptRecord(format!(
            "invalid byte range {start}..{end}"
        )));
    }
    let mut buffer = vec![0u8; (end - start) as usize];
    reader.seek(SeekFrom::Start(start))?;
    reader.read_exact(&mut buffer)?;
    Ok(buffer)
}

/// Seeks to `start`, reads `end - start` bytes and decodes them.
///
/// # Errors
///
/// See [`read_range`] and [`decode`].
pub fn read_at<R: Read + Seek>(reader: &mut R, start: u64, end: u64) -> Result<NoteRecord> {
    decode(&read_range(reader, start, end)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::io::Cursor;

    fn sample() -> NoteRecord {
        NoteRecord {
            tag: "log".into(),
            comment: "Backup".into(),
            keywords: "cron nightly".into(),
            link_file: "/tmp/backup.sh".into(),
            date: "2025-07-30 10:00:00".into(),
            iv: String::new(),
            protected: false,
            body: Some("line one\nline two".into()),
        }
    }

    #[test]
    fn test_encode_layout() {
        let bytes = encode(&sample());
        let text = String::from_utf8(bytes).unwrap();
        assert_eq!(
            text,
            "log<::>Backup<::>cron nightly<::>/tmp/backup.sh<::>2025-07-30 10:00:00<::><::>0<::>line one\nline two<::END::>\n"
        );
    }

    #[test]
    fn test_decode_without_body() {
        let mut record = sample();
        record.body = None;
        let decoded = decode(&encode(&record)).unwrap();
        assert_eq!(decoded, record);
    }

    #[test]
    fn test_decode_short_legacy_record() {
        let decoded = decode(b"old<::>just a comment<::END::>\n").unwrap();
        assert_eq!(decoded.tag, "old");
        assert_eq!(decoded.comment, "just a comment");
        assert!(decoded.keywords.is_empty());
        assert!(!decoded.protected);
        assert!(decoded.body.is_none());
    }

    #[test]
    fn test_decode_protection_flag() {
        let mut record = sample();
        record.protected = true;
        record.iv = "00112233445566778899aabb".into();
        let decoded = decode(&encode(&record)).unwrap();
        assert!(decoded.protected);
        assert_eq!(decoded.iv, record.iv);
    }

    #[test]
    fn test_read_at_offsets() {
        let first = encode(&sample());
        let mut second_record = sample();
        second_record.tag = "second".into();
        let second = encode(&second_record);

        let mut file = first.clone();
        file.extend_from_slice(&second);
        let mut cursor = Cursor::new(file);

        let start = first.len() as u64;
        let end = start + second.len() as u64;
        let read = read_at(&mut cursor, start, end).unwrap();
        assert_eq!(read, second_record);
    }

    #[test]
    fn test_read_range_rejects_inverted_range() {
        let mut cursor = Cursor::new(vec![0u8; 8]);
        assert!(read_range(&mut cursor, 5, 2).is_err());
    }

    fn field() -> impl Strategy<Value = String> {
        "[a-zA-Z0-9 ./_-]{0,20}"
    }

    proptest! {
        #[test]
        fn prop_decode_inverts_encode(
            tag in field(),
            comment in field(),
            keywords in field(),
            link_file in field(),
            date in field(),
            iv in field(),
            protected in any::<bool>(),
            body in proptest::option::of("[a-zA-Z0-9 \n<>:]{1,60}"),
        ) {
            let record = NoteRecord {
                tag,
                comment,
                keywords,
                link_file,
                date,
                iv,
                protected,
                body,
            };
            prop_assume!(record.body.as_deref().map_or(true, |b| !b.contains(RECORD_DELIM)));
            let decoded = decode(&encode(&record)).unwrap();
            prop_assert_eq!(decoded, record);
        }
    }
}
