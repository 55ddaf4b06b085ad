use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;

use crate::numbers::Numbering;

/// Metadata fields the scanner may write onto persisted series/chapters.
/// Each one can be locked individually by a manual edit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "snake_case")
)]
pub enum MetadataField {
    Name,
    LocalizedName,
    Title,
    Summary,
    ReleaseDate,
    AgeRating,
    Genres,
    Tags,
    People,
    Publisher,
    Language,
}

impl MetadataField {
    pub const ALL: [MetadataField; 11] = [
        MetadataField::Name,
        MetadataField::LocalizedName,
        MetadataField::Title,
        MetadataField::Summary,
        MetadataField::ReleaseDate,
        MetadataField::AgeRating,
        MetadataField::Genres,
        MetadataField::Tags,
        MetadataField::People,
        MetadataField::Publisher,
        MetadataField::Language,
    ];
}

/// Fields locked on a persisted entity.
pub type LockedFields = BTreeSet<MetadataField>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PersonRole {
    Writer,
    Penciller,
    Inker,
    Colorist,
    Letterer,
    CoverArtist,
    Editor,
    Translator,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Person {
    pub name: String,
    pub role: PersonRole,
}

impl Person {
    pub fn new(name: impl Into<String>, role: PersonRole) -> Self {
        Self {
            name: name.into(),
            role,
        }
    }
}

/// Age ratings ordered from least to most restrictive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum AgeRating {
    Everyone,
    EarlyChildhood,
    Everyone10Plus,
    KidsToAdults,
    Teen,
    Mature15Plus,
    Mature17Plus,
    Mature,
    AdultsOnly,
    R18Plus,
    X18Plus,
}

impl AgeRating {
    /// Map the labels used by ComicInfo-style sidecars. Unknown and pending
    /// ratings map to `None`.
    pub fn from_label(label: &str) -> Option<Self> {
        let normalized: String = label
            .chars()
            .filter(|ch| ch.is_ascii_alphanumeric() || *ch == '+')
            .flat_map(|ch| ch.to_lowercase())
            .collect();
        let rating = match normalized.as_str() {
            "everyone" | "g" => AgeRating::Everyone,
            "earlychildhood" => AgeRating::EarlyChildhood,
            "everyone10+" | "pg" => AgeRating::Everyone10Plus,
            "kidstoadults" => AgeRating::KidsToAdults,
            "teen" => AgeRating::Teen,
            "ma15+" => AgeRating::Mature15Plus,
            "mature17+" => AgeRating::Mature17Plus,
            "m" | "mature" => AgeRating::Mature,
            "adultsonly18+" => AgeRating::AdultsOnly,
            "r18+" => AgeRating::R18Plus,
            "x18+" => AgeRating::X18Plus,
            _ => return None,
        };
        Some(rating)
    }
}

/// Value stored for a [`MetadataField`].
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum FieldValue {
    Text(String),
    Date(NaiveDate),
    AgeRating(AgeRating),
    List(Vec<String>),
    People(Vec<Person>),
}

/// Field/value map carried by scanned and persisted entities.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(transparent)
)]
pub struct MetadataSet(BTreeMap<MetadataField, FieldValue>);

impl MetadataSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, field: MetadataField) -> Option<&FieldValue> {
        self.0.get(&field)
    }

    pub fn insert(&mut self, field: MetadataField, value: FieldValue) {
        self.0.insert(field, value);
    }

    pub fn remove(&mut self, field: MetadataField) -> Option<FieldValue> {
        self.0.remove(&field)
    }

    pub fn iter(&self) -> impl Iterator<Item = (MetadataField, &FieldValue)> {
        self.0.iter().map(|(field, value)| (*field, value))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Fill fields this set does not carry yet from `other`.
    pub fn fill_missing(&mut self, other: &MetadataSet) {
        for (field, value) in other.iter() {
            self.0.entry(field).or_insert_with(|| value.clone());
        }
    }

    /// Union list-valued fields (genres, tags, people) with `other`.
    pub fn union_lists(&mut self, other: &MetadataSet) {
        for (field, value) in other.iter() {
            if !self.0.contains_key(&field) {
                if matches!(value, FieldValue::List(_) | FieldValue::People(_)) {
                    self.0.insert(field, value.clone());
                }
                continue;
            }
            match (self.0.get_mut(&field), value) {
                (Some(FieldValue::List(mine)), FieldValue::List(theirs)) => {
                    let merged: BTreeSet<String> =
                        mine.drain(..).chain(theirs.iter().cloned()).collect();
                    mine.extend(merged);
                }
                (Some(FieldValue::People(mine)), FieldValue::People(theirs)) => {
                    let merged: BTreeSet<Person> =
                        mine.drain(..).chain(theirs.iter().cloned()).collect();
                    mine.extend(merged);
                }
                _ => {}
            }
        }
    }
}

impl FromIterator<(MetadataField, FieldValue)> for MetadataSet {
    fn from_iter<T: IntoIterator<Item = (MetadataField, FieldValue)>>(
        iter: T,
    ) -> Self {
        MetadataSet(iter.into_iter().collect())
    }
}

/// Metadata read from a sidecar embedded in an archive (ComicInfo.xml, an
/// EPUB package document, or a folder-level ComicInfo.xml for image sets).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EmbeddedMetadata {
    pub series: Option<String>,
    pub localized_series: Option<String>,
    pub title: Option<String>,
    /// Chapter/issue number override.
    pub number: Option<Numbering>,
    pub volume: Option<Numbering>,
    pub summary: Option<String>,
    pub people: Vec<Person>,
    pub age_rating: Option<AgeRating>,
    pub release_date: Option<NaiveDate>,
    pub genres: Vec<String>,
    pub tags: Vec<String>,
    pub publisher: Option<String>,
    pub language: Option<String>,
    pub page_count: Option<u32>,
    /// The sidecar declares a special, one-shot or similar out-of-run entry.
    pub is_special: bool,
}

impl EmbeddedMetadata {
    pub fn builder() -> EmbeddedMetadataBuilder {
        EmbeddedMetadataBuilder::default()
    }

    /// Fields that describe one chapter.
    pub fn chapter_fields(&self) -> MetadataSet {
        let mut set = MetadataSet::new();
        if let Some(title) = non_empty(&self.title) {
            set.insert(MetadataField::Title, FieldValue::Text(title));
        }
        if let Some(summary) = non_empty(&self.summary) {
            set.insert(MetadataField::Summary, FieldValue::Text(summary));
        }
        if let Some(date) = self.release_date {
            set.insert(MetadataField::ReleaseDate, FieldValue::Date(date));
        }
        if let Some(rating) = self.age_rating {
            set.insert(MetadataField::AgeRating, FieldValue::AgeRating(rating));
        }
        self.insert_lists(&mut set);
        set
    }

    /// Fields that roll up onto the owning series.
    pub fn series_fields(&self) -> MetadataSet {
        let mut set = MetadataSet::new();
        if let Some(localized) = non_empty(&self.localized_series) {
            set.insert(MetadataField::LocalizedName, FieldValue::Text(localized));
        }
        if let Some(summary) = non_empty(&self.summary) {
            set.insert(MetadataField::Summary, FieldValue::Text(summary));
        }
        if let Some(publisher) = non_empty(&self.publisher) {
            set.insert(MetadataField::Publisher, FieldValue::Text(publisher));
        }
        if let Some(language) = non_empty(&self.language) {
            set.insert(MetadataField::Language, FieldValue::Text(language));
        }
        if let Some(rating) = self.age_rating {
            set.insert(MetadataField::AgeRating, FieldValue::AgeRating(rating));
        }
        self.insert_lists(&mut set);
        set
    }

    fn insert_lists(&self, set: &mut MetadataSet) {
        if !self.genres.is_empty() {
            let genres: BTreeSet<String> = self.genres.iter().cloned().collect();
            set.insert(
                MetadataField::Genres,
                FieldValue::List(genres.into_iter().collect()),
            );
        }
        if !self.tags.is_empty() {
            let tags: BTreeSet<String> = self.tags.iter().cloned().collect();
            set.insert(
                MetadataField::Tags,
                FieldValue::List(tags.into_iter().collect()),
            );
        }
        if !self.people.is_empty() {
            let people: BTreeSet<Person> = self.people.iter().cloned().collect();
            set.insert(
                MetadataField::People,
                FieldValue::People(people.into_iter().collect()),
            );
        }
    }
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(str::to_string)
}

/// Fluent builder for [`EmbeddedMetadata`]; only defaults fields.
#[derive(Debug, Clone, Default)]
pub struct EmbeddedMetadataBuilder {
    inner: EmbeddedMetadata,
}

impl EmbeddedMetadataBuilder {
    pub fn series(mut self, series: impl Into<String>) -> Self {
        self.inner.series = Some(series.into());
        self
    }

    pub fn localized_series(mut self, name: impl Into<String>) -> Self {
        self.inner.localized_series = Some(name.into());
        self
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.inner.title = Some(title.into());
        self
    }

    pub fn number(mut self, number: Numbering) -> Self {
        self.inner.number = Some(number);
        self
    }

    pub fn volume(mut self, volume: Numbering) -> Self {
        self.inner.volume = Some(volume);
        self
    }

    pub fn summary(mut self, summary: impl Into<String>) -> Self {
        self.inner.summary = Some(summary.into());
        self
    }

    pub fn person(mut self, name: impl Into<String>, role: PersonRole) -> Self {
        self.inner.people.push(Person::new(name, role));
        self
    }

    pub fn age_rating(mut self, rating: AgeRating) -> Self {
        self.inner.age_rating = Some(rating);
        self
    }

    pub fn release_date(mut self, date: NaiveDate) -> Self {
        self.inner.release_date = Some(date);
        self
    }

    pub fn genre(mut self, genre: impl Into<String>) -> Self {
        self.inner.genres.push(genre.into());
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.inner.tags.push(tag.into());
        self
    }

    pub fn publisher(mut self, publisher: impl Into<String>) -> Self {
        self.inner.publisher = Some(publisher.into());
        self
    }

    pub fn language(mut self, language: impl Into<String>) -> Self {
        self.inner.language = Some(language.into());
        self
    }

    pub fn special(mut self) -> Self {
        self.inner.is_special = true;
        self
    }

    pub fn page_count(mut self, pages: u32) -> Self {
        self.inner.page_count = Some(pages);
        self
    }

    pub fn build(self) -> EmbeddedMetadata {
        self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_comicinfo_age_labels() {
        assert_eq!(AgeRating::from_label("Mature 17+"), Some(AgeRating::Mature17Plus));
        assert_eq!(AgeRating::from_label("Everyone 10+"), Some(AgeRating::Everyone10Plus));
        assert_eq!(AgeRating::from_label("Rating Pending"), None);
        assert!(AgeRating::Teen < AgeRating::AdultsOnly);
    }

    #[test]
    fn union_lists_dedupes_and_sorts() {
        let mut left = EmbeddedMetadata::builder()
            .genre("Drama")
            .genre("Action")
            .build()
            .series_fields();
        let right = EmbeddedMetadata::builder()
            .genre("Action")
            .genre("Comedy")
            .build()
            .series_fields();
        left.union_lists(&right);
        assert_eq!(
            left.get(MetadataField::Genres),
            Some(&FieldValue::List(vec![
                "Action".into(),
                "Comedy".into(),
                "Drama".into()
            ]))
        );
    }

    #[test]
    fn blank_text_fields_are_skipped() {
        let fields = EmbeddedMetadata::builder()
            .title("   ")
            .summary("A summary")
            .build()
            .chapter_fields();
        assert!(fields.get(MetadataField::Title).is_none());
        assert_eq!(fields.len(), 1);
    }
}
