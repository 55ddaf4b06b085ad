//! ComicInfo.xml (the Anansi schema used by ComicRack and most taggers).

use chrono::NaiveDate;
use folio_model::{AgeRating, EmbeddedMetadata, Numbering, Person, PersonRole};
use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
struct ComicInfo {
    series: Option<String>,
    localized_series: Option<String>,
    title: Option<String>,
    number: Option<String>,
    volume: Option<String>,
    summary: Option<String>,
    year: Option<String>,
    month: Option<String>,
    day: Option<String>,
    writer: Option<String>,
    penciller: Option<String>,
    inker: Option<String>,
    colorist: Option<String>,
    letterer: Option<String>,
    cover_artist: Option<String>,
    editor: Option<String>,
    translator: Option<String>,
    publisher: Option<String>,
    genre: Option<String>,
    tags: Option<String>,
    age_rating: Option<String>,
    #[serde(rename = "LanguageISO")]
    language_iso: Option<String>,
    page_count: Option<String>,
    format: Option<String>,
}

/// Formats that put an entry outside the numbered run.
const SPECIAL_FORMATS: &[&str] = &["special", "one-shot", "oneshot", "one shot"];

/// Parse a ComicInfo document. Any structural error is returned to the
/// caller, which treats the sidecar as absent.
pub fn parse_comic_info(xml: &str) -> Result<EmbeddedMetadata, quick_xml::DeError> {
    let info: ComicInfo = quick_xml::de::from_str(xml)?;

    let mut people = Vec::new();
    for (value, role) in [
        (&info.writer, PersonRole::Writer),
        (&info.penciller, PersonRole::Penciller),
        (&info.inker, PersonRole::Inker),
        (&info.colorist, PersonRole::Colorist),
        (&info.letterer, PersonRole::Letterer),
        (&info.cover_artist, PersonRole::CoverArtist),
        (&info.editor, PersonRole::Editor),
        (&info.translator, PersonRole::Translator),
    ] {
        people.extend(split_list(value).map(|name| Person::new(name, role)));
    }

    let release_date = int(&info.year).and_then(|year| {
        let month = int(&info.month).filter(|m| (1..=12).contains(m)).unwrap_or(1);
        let day = int(&info.day).filter(|d| (1..=31).contains(d)).unwrap_or(1);
        NaiveDate::from_ymd_opt(year, month as u32, day as u32)
            .or_else(|| NaiveDate::from_ymd_opt(year, month as u32, 1))
    });

    Ok(EmbeddedMetadata {
        series: text(&info.series),
        localized_series: text(&info.localized_series),
        title: text(&info.title),
        number: numbering(&info.number),
        volume: numbering(&info.volume),
        summary: text(&info.summary),
        people,
        age_rating: info.age_rating.as_deref().and_then(AgeRating::from_label),
        release_date,
        genres: split_list(&info.genre).collect(),
        tags: split_list(&info.tags).collect(),
        publisher: text(&info.publisher),
        language: text(&info.language_iso),
        page_count: int(&info.page_count).and_then(|count| u32::try_from(count).ok()),
        is_special: info
            .format
            .as_deref()
            .map(|format| format.trim().to_ascii_lowercase())
            .is_some_and(|format| SPECIAL_FORMATS.contains(&format.as_str())),
    })
}

fn text(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

fn int(value: &Option<String>) -> Option<i32> {
    value.as_deref().and_then(|raw| raw.trim().parse().ok())
}

/// Numbering fields; ComicRack writes `-1` for "unset".
fn numbering(value: &Option<String>) -> Option<Numbering> {
    text(value).and_then(|raw| raw.parse().ok())
}

fn split_list(value: &Option<String>) -> impl Iterator<Item = String> + '_ {
    value
        .as_deref()
        .unwrap_or_default()
        .split([',', ';'])
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<ComicInfo xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance" xmlns:xsd="http://www.w3.org/2001/XMLSchema">
  <Series>Sample Series</Series>
  <LocalizedSeries>サンプル</LocalizedSeries>
  <Title>The Beginning</Title>
  <Number>12.5</Number>
  <Volume>-1</Volume>
  <Summary>Things happen.</Summary>
  <Year>2019</Year>
  <Month>4</Month>
  <Writer>Jane Doe, John Roe</Writer>
  <CoverArtist>Jane Doe</CoverArtist>
  <Publisher>Example Press</Publisher>
  <Genre>Action, Drama</Genre>
  <Tags>school</Tags>
  <AgeRating>Teen</AgeRating>
  <LanguageISO>en</LanguageISO>
  <PageCount>24</PageCount>
  <Pages><Page Image="0" Type="FrontCover"/></Pages>
</ComicInfo>"#;

    #[test]
    fn maps_known_fields() {
        let meta = parse_comic_info(SAMPLE).unwrap();
        assert_eq!(meta.series.as_deref(), Some("Sample Series"));
        assert_eq!(meta.localized_series.as_deref(), Some("サンプル"));
        assert_eq!(meta.number, Some(Numbering::number(12.5)));
        assert_eq!(meta.volume, None);
        assert_eq!(meta.release_date, NaiveDate::from_ymd_opt(2019, 4, 1));
        assert_eq!(meta.people.len(), 3);
        assert_eq!(meta.genres, vec!["Action", "Drama"]);
        assert_eq!(meta.age_rating, Some(AgeRating::Teen));
        assert_eq!(meta.page_count, Some(24));
        assert!(!meta.is_special);
    }

    #[test]
    fn special_format_is_flagged() {
        let meta =
            parse_comic_info("<ComicInfo><Format>One-Shot</Format></ComicInfo>").unwrap();
        assert!(meta.is_special);
    }

    #[test]
    fn malformed_documents_are_errors() {
        assert!(parse_comic_info("<ComicInfo><Series>open").is_err());
    }
}
