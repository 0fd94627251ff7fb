//! Intake: check a submitted form and its attachments before any work starts.
//!
//! Everything here is pure. A rejected request leaves no trace: no image is
//! decoded, no upload is started and no document is touched.

use crate::config::IngestConfig;
use crate::error::ValidationError;
use crate::model::{ChapterDraft, ComicDraft, FormFields, PageFile};
use chrono::{DateTime, NaiveDate, Utc};

/// Validate a chapter upload: required fields, at least one page, and every
/// page within the type and size limits.
pub fn validate_chapter(
    fields: &FormFields,
    files: &[PageFile],
    config: &IngestConfig,
) -> Result<ChapterDraft, ValidationError> {
    let title = required(fields, "title")?;
    let number_raw = required(fields, "chapterNumber")?;
    let date_raw = required(fields, "releaseDate")?;

    if files.is_empty() {
        return Err(ValidationError::NoFiles);
    }
    if files.len() > config.max_pages {
        return Err(ValidationError::TooManyFiles {
            count: files.len(),
            limit: config.max_pages,
        });
    }
    for (index, file) in files.iter().enumerate() {
        check_file(index + 1, file, config)?;
    }

    let chapter_number = number_raw
        .parse::<f64>()
        .ok()
        .filter(|n| n.is_finite())
        .ok_or_else(|| ValidationError::InvalidNumber {
            field: "chapter number",
            value: number_raw.to_string(),
        })?;

    Ok(ChapterDraft {
        title: title.to_string(),
        chapter_number,
        description: optional(fields, "description"),
        release_date: parse_release_date(date_raw)?,
        nsfw: flag(fields, "nsfw"),
        paywalled: flag(fields, "paywalled"),
    })
}

/// Validate a comic creation form and its cover image.
pub fn validate_comic(
    fields: &FormFields,
    cover: Option<&PageFile>,
    config: &IngestConfig,
) -> Result<ComicDraft, ValidationError> {
    let cover = cover.ok_or(ValidationError::MissingCover)?;
    let title = required(fields, "title")?;
    let date_raw = required(fields, "releaseDate")?;
    check_file(1, cover, config)?;

    let tags = fields
        .get("tags")
        .map(|raw| {
            raw.split(',')
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(String::from)
                .collect()
        })
        .unwrap_or_default();

    Ok(ComicDraft {
        title: title.to_string(),
        synopsis: optional(fields, "synopsis"),
        tags,
        release_date: parse_release_date(date_raw)?,
        nsfw: flag(fields, "nsfw"),
        paywalled: flag(fields, "paywalled"),
    })
}

/// Accepts a full RFC 3339 timestamp or a bare `YYYY-MM-DD` (midnight UTC).
pub fn parse_release_date(raw: &str) -> Result<DateTime<Utc>, ValidationError> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(ts.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
        .ok_or_else(|| ValidationError::InvalidDate(raw.to_string()))
}

fn check_file(index: usize, file: &PageFile, config: &IngestConfig) -> Result<(), ValidationError> {
    if !file.media_type.trim().to_ascii_lowercase().starts_with("image/") {
        return Err(ValidationError::UnsupportedMediaType {
            index,
            file_name: file.file_name.clone(),
            media_type: file.media_type.clone(),
        });
    }
    let limit = config.max_upload_bytes();
    if file.bytes.len() > limit {
        return Err(ValidationError::FileTooLarge {
            index,
            file_name: file.file_name.clone(),
            size: file.bytes.len(),
            limit,
        });
    }
    Ok(())
}

fn required<'a>(fields: &'a FormFields, name: &'static str) -> Result<&'a str, ValidationError> {
    fields
        .get(name)
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .ok_or(ValidationError::MissingField(name))
}

fn optional(fields: &FormFields, name: &str) -> String {
    fields.get(name).map(|v| v.trim().to_string()).unwrap_or_default()
}

/// Checkbox semantics: present and not an explicit "off" value.
fn flag(fields: &FormFields, name: &str) -> bool {
    match fields.get(name) {
        None => false,
        Some(v) => !matches!(
            v.trim().to_ascii_lowercase().as_str(),
            "" | "0" | "false" | "off" | "no"
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(pairs: &[(&str, &str)]) -> FormFields {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn chapter_fields() -> FormFields {
        fields(&[
            ("title", "  The Return  "),
            ("chapterNumber", "12.5"),
            ("releaseDate", "2024-03-01"),
        ])
    }

    fn png(name: &str) -> PageFile {
        PageFile::new(name, "image/png", vec![0u8; 16])
    }

    #[test]
    fn accepts_complete_chapter() {
        let draft = validate_chapter(&chapter_fields(), &[png("a.png")], &IngestConfig::default())
            .expect("valid");
        assert_eq!(draft.title, "The Return");
        assert_eq!(draft.chapter_number, 12.5);
        assert_eq!(draft.release_date.to_rfc3339(), "2024-03-01T00:00:00+00:00");
        assert!(!draft.nsfw);
    }

    #[test]
    fn each_required_field_is_checked() {
        for missing in ["title", "chapterNumber", "releaseDate"] {
            let mut f = chapter_fields();
            f.insert(missing.to_string(), "   ".to_string());
            let err = validate_chapter(&f, &[png("a.png")], &IngestConfig::default()).unwrap_err();
            assert_eq!(err, ValidationError::MissingField(missing));
        }
    }

    #[test]
    fn empty_file_list_is_rejected() {
        let err = validate_chapter(&chapter_fields(), &[], &IngestConfig::default()).unwrap_err();
        assert_eq!(err, ValidationError::NoFiles);
    }

    #[test]
    fn non_image_type_is_rejected_with_position() {
        let files = vec![png("a.png"), PageFile::new("notes.pdf", "application/pdf", vec![1])];
        let err =
            validate_chapter(&chapter_fields(), &files, &IngestConfig::default()).unwrap_err();
        assert!(matches!(err, ValidationError::UnsupportedMediaType { index: 2, .. }), "{err:?}");
    }

    #[test]
    fn oversized_file_is_rejected() {
        let config = IngestConfig::builder().max_upload_mb(1).build().unwrap();
        let big = PageFile::new("big.jpg", "image/jpeg", vec![0u8; 1024 * 1024 + 1]);
        let err = validate_chapter(&chapter_fields(), &[big], &config).unwrap_err();
        assert!(matches!(err, ValidationError::FileTooLarge { index: 1, .. }), "{err:?}");
    }

    #[test]
    fn too_many_files_is_rejected() {
        let config = IngestConfig::builder().max_pages(2).build().unwrap();
        let files = vec![png("1.png"), png("2.png"), png("3.png")];
        let err = validate_chapter(&chapter_fields(), &files, &config).unwrap_err();
        assert_eq!(err, ValidationError::TooManyFiles { count: 3, limit: 2 });
    }

    #[test]
    fn bad_number_and_date_are_rejected() {
        let mut f = chapter_fields();
        f.insert("chapterNumber".into(), "twelve".into());
        assert!(matches!(
            validate_chapter(&f, &[png("a.png")], &IngestConfig::default()),
            Err(ValidationError::InvalidNumber { .. })
        ));

        let mut f = chapter_fields();
        f.insert("releaseDate".into(), "someday".into());
        assert!(matches!(
            validate_chapter(&f, &[png("a.png")], &IngestConfig::default()),
            Err(ValidationError::InvalidDate(_))
        ));
    }

    #[test]
    fn rfc3339_dates_are_normalised_to_utc() {
        let d = parse_release_date("2024-03-01T10:00:00+02:00").unwrap();
        assert_eq!(d.to_rfc3339(), "2024-03-01T08:00:00+00:00");
    }

    #[test]
    fn checkbox_flags() {
        let mut f = chapter_fields();
        f.insert("nsfw".into(), "on".into());
        f.insert("paywalled".into(), "false".into());
        let draft = validate_chapter(&f, &[png("a.png")], &IngestConfig::default()).unwrap();
        assert!(draft.nsfw);
        assert!(!draft.paywalled);
    }

    #[test]
    fn comic_requires_cover_and_splits_tags() {
        let f = fields(&[
            ("title", "Moonlit"),
            ("releaseDate", "2023-12-24"),
            ("tags", "fantasy, , drama ,romance"),
        ]);
        assert_eq!(
            validate_comic(&f, None, &IngestConfig::default()).unwrap_err(),
            ValidationError::MissingCover
        );
        let draft = validate_comic(&f, Some(&png("cover.png")), &IngestConfig::default()).unwrap();
        assert_eq!(draft.tags, vec!["fantasy", "drama", "romance"]);
    }
}
