//! Predicate composition for list views.
//!
//! A [`FilterCriteria`] combines three independent predicates over a record:
//! - a free-text query, matched case-insensitively as a substring of any designated search
//!   field (OR across fields),
//! - zero or more equality [`Selection`]s on named fields, where `"all"` means no filter,
//! - an inclusive [`DateRange`] over the record's timestamp.
//!
//! A record is kept when all three hold. Filtering never reorders records.

use crate::dates::parse_date;
use crate::error::{LisError, LisResult};
use chrono::NaiveDate;
use std::borrow::Cow;
use std::fmt;

/// A record that can be searched, filtered and ordered by the query engine.
///
/// `Field` is a closed enum naming the record's filterable fields; each record type maps its
/// fields to display text (and optionally to numbers for aggregate sums).
pub trait Filterable {
    type Field: Copy + Eq + fmt::Debug;

    /// Text of `field` as displayed, or `None` when the record has no value for it.
    fn field_text(&self, field: Self::Field) -> Option<Cow<'_, str>>;

    /// Raw timestamp string used for date-range filtering and timestamp sorting.
    fn timestamp_text(&self) -> Option<&str>;

    /// Numeric value of `field`, for fields that carry one.
    fn field_number(&self, _field: Self::Field) -> Option<i64> {
        None
    }
}

/// Equality filter value for one field.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum Selection {
    /// No filtering on this field.
    #[default]
    All,
    /// Keep records whose field text equals this literal exactly.
    Only(String),
}

impl Selection {
    /// Reads a dropdown value: blank, `"all"` and `"All"` (any case) select everything.
    pub fn parse(input: &str) -> Self {
        let trimmed = input.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("all") {
            Selection::All
        } else {
            Selection::Only(trimmed.to_owned())
        }
    }

    pub fn only(value: impl Into<String>) -> Self {
        Selection::Only(value.into())
    }

    pub fn is_all(&self) -> bool {
        matches!(self, Selection::All)
    }

    pub fn matches(&self, value: Option<&str>) -> bool {
        match self {
            Selection::All => true,
            Selection::Only(wanted) => value == Some(wanted.as_str()),
        }
    }
}

impl From<&str> for Selection {
    fn from(value: &str) -> Self {
        Selection::parse(value)
    }
}

/// Inclusive calendar-date bounds, each optional.
///
/// A record whose timestamp cannot be parsed is outside every bounded range. An unbounded range
/// contains everything, including records without a readable timestamp. A start after the end
/// is kept as given and contains nothing.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DateRange {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl DateRange {
    pub fn new(start: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
        Self { start, end }
    }

    pub fn unbounded() -> Self {
        Self::default()
    }

    /// Parses date-picker text. Blank bounds are open.
    ///
    /// # Errors
    ///
    /// Returns [`LisError::InvalidDate`] if a non-blank bound cannot be parsed.
    pub fn parse(start: Option<&str>, end: Option<&str>) -> LisResult<Self> {
        fn bound(input: Option<&str>) -> LisResult<Option<NaiveDate>> {
            match input.map(str::trim).filter(|s| !s.is_empty()) {
                None => Ok(None),
                Some(text) => parse_date(text)
                    .map(Some)
                    .ok_or_else(|| LisError::InvalidDate(text.to_owned())),
            }
        }

        Ok(Self {
            start: bound(start)?,
            end: bound(end)?,
        })
    }

    pub fn is_unbounded(&self) -> bool {
        self.start.is_none() && self.end.is_none()
    }

    /// Whether a record with the given raw timestamp falls within the range.
    pub fn contains(&self, timestamp: Option<&str>) -> bool {
        if self.is_unbounded() {
            return true;
        }
        let Some(date) = timestamp.and_then(parse_date) else {
            return false;
        };
        self.start.map_or(true, |start| date >= start) && self.end.map_or(true, |end| date <= end)
    }
}

/// The composed filter state of one list view.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FilterCriteria<F> {
    search_fields: Vec<F>,
    query: String,
    selections: Vec<(F, Selection)>,
    range: DateRange,
}

impl<F: Copy + Eq + fmt::Debug> FilterCriteria<F> {
    /// Creates inactive criteria that search the given fields once a query is set.
    pub fn new(search_fields: impl IntoIterator<Item = F>) -> Self {
        Self {
            search_fields: search_fields.into_iter().collect(),
            query: String::new(),
            selections: Vec::new(),
            range: DateRange::unbounded(),
        }
    }

    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.set_query(query);
        self
    }

    pub fn with_selection(mut self, field: F, selection: Selection) -> Self {
        self.set_selection(field, selection);
        self
    }

    pub fn with_range(mut self, range: DateRange) -> Self {
        self.range = range;
        self
    }

    pub fn set_query(&mut self, query: impl Into<String>) {
        self.query = query.into();
    }

    /// Sets the selection for `field`, replacing any earlier one. `Selection::All` removes it.
    pub fn set_selection(&mut self, field: F, selection: Selection) {
        self.selections.retain(|(f, _)| *f != field);
        if !selection.is_all() {
            self.selections.push((field, selection));
        }
    }

    pub fn set_range(&mut self, range: DateRange) {
        self.range = range;
    }

    /// Resets query, selections and range. Search fields are kept.
    pub fn clear(&mut self) {
        self.query.clear();
        self.selections.clear();
        self.range = DateRange::unbounded();
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn selection(&self, field: F) -> &Selection {
        const ALL: &Selection = &Selection::All;
        self.selections
            .iter()
            .find(|(f, _)| *f == field)
            .map(|(_, s)| s)
            .unwrap_or(ALL)
    }

    pub fn range(&self) -> DateRange {
        self.range
    }

    pub fn search_fields(&self) -> &[F] {
        &self.search_fields
    }

    /// True when any of the three predicates would exclude something.
    pub fn is_active(&self) -> bool {
        !self.query.trim().is_empty() || !self.selections.is_empty() || !self.range.is_unbounded()
    }

    pub fn matches_query<T: Filterable<Field = F>>(&self, record: &T) -> bool {
        let needle = self.query.trim().to_lowercase();
        if needle.is_empty() {
            return true;
        }
        self.search_fields.iter().any(|field| {
            record
                .field_text(*field)
                .is_some_and(|text| text.to_lowercase().contains(&needle))
        })
    }

    pub fn matches_selections<T: Filterable<Field = F>>(&self, record: &T) -> bool {
        self.selections
            .iter()
            .all(|(field, selection)| selection.matches(record.field_text(*field).as_deref()))
    }

    pub fn matches_range<T: Filterable<Field = F>>(&self, record: &T) -> bool {
        self.range.contains(record.timestamp_text())
    }

    /// The full conjunction of query, selections and date range.
    pub fn matches<T: Filterable<Field = F>>(&self, record: &T) -> bool {
        self.matches_query(record) && self.matches_selections(record) && self.matches_range(record)
    }

    /// The composed predicate as a closure, for use with iterator adapters.
    pub fn predicate<'a, T: Filterable<Field = F> + 'a>(&'a self) -> impl Fn(&T) -> bool + 'a {
        move |record| self.matches(record)
    }

    /// Keeps the records that match, in input order.
    pub fn apply<'r, T, I>(&self, records: I) -> Vec<&'r T>
    where
        T: Filterable<Field = F> + 'r,
        I: IntoIterator<Item = &'r T>,
    {
        records.into_iter().filter(|r| self.matches(*r)).collect()
    }
}
