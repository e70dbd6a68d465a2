//! Summary counts and sums for dashboard cards.
//!
//! Each card is an [`AggregateSpec`]: a name, the record set it is computed over (the full
//! store or the currently visible rows), and a [`Measure`]. The source is always stated on the
//! spec, never implied by where the card is drawn.

use super::filter::Filterable;
use serde::Serialize;

/// Which record set an aggregate is computed over.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregateSource {
    /// Every record in the store, regardless of filters.
    Full,
    /// Only the rows that pass the current filters.
    Filtered,
}

/// What an aggregate measures.
pub enum Measure<T: Filterable> {
    /// Number of records.
    Count,
    /// Number of records whose field text equals the literal.
    CountEqual(T::Field, String),
    /// Number of records satisfying the predicate.
    CountWhere(Box<dyn Fn(&T) -> bool>),
    /// Sum of a numeric field; records without a number contribute zero.
    Sum(T::Field),
}

impl<T: Filterable> Measure<T> {
    fn evaluate<'a>(&self, records: impl Iterator<Item = &'a T>) -> i64
    where
        T: 'a,
    {
        match self {
            Measure::Count => records.count() as i64,
            Measure::CountEqual(field, literal) => records
                .filter(|r| r.field_text(*field).as_deref() == Some(literal.as_str()))
                .count() as i64,
            Measure::CountWhere(predicate) => records.filter(|r| predicate(*r)).count() as i64,
            Measure::Sum(field) => records.filter_map(|r| r.field_number(*field)).sum(),
        }
    }
}

/// One named summary value definition.
pub struct AggregateSpec<T: Filterable> {
    pub name: &'static str,
    pub source: AggregateSource,
    pub measure: Measure<T>,
}

impl<T: Filterable> AggregateSpec<T> {
    pub fn count(name: &'static str, source: AggregateSource) -> Self {
        Self {
            name,
            source,
            measure: Measure::Count,
        }
    }

    pub fn count_equal(
        name: &'static str,
        source: AggregateSource,
        field: T::Field,
        literal: impl Into<String>,
    ) -> Self {
        Self {
            name,
            source,
            measure: Measure::CountEqual(field, literal.into()),
        }
    }

    pub fn count_where(
        name: &'static str,
        source: AggregateSource,
        predicate: impl Fn(&T) -> bool + 'static,
    ) -> Self {
        Self {
            name,
            source,
            measure: Measure::CountWhere(Box::new(predicate)),
        }
    }

    pub fn sum(name: &'static str, source: AggregateSource, field: T::Field) -> Self {
        Self {
            name,
            source,
            measure: Measure::Sum(field),
        }
    }
}

/// A computed summary value.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct AggregateValue {
    pub name: &'static str,
    pub source: AggregateSource,
    pub value: i64,
}

/// Computed summary values, in the order of their `AggregateSpec`s.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Aggregates(Vec<AggregateValue>);

impl Aggregates {
    pub fn get(&self, name: &str) -> Option<i64> {
        self.0.iter().find(|v| v.name == name).map(|v| v.value)
    }

    pub fn iter(&self) -> impl Iterator<Item = &AggregateValue> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Evaluates every `AggregateSpec` against its declared source.
pub fn compute_aggregates<T: Filterable>(
    full: &[T],
    filtered: &[&T],
    specs: &[AggregateSpec<T>],
) -> Aggregates {
    let values = specs
        .iter()
        .map(|spec| {
            let value = match spec.source {
                AggregateSource::Full => spec.measure.evaluate(full.iter()),
                AggregateSource::Filtered => spec.measure.evaluate(filtered.iter().copied()),
            };
            AggregateValue {
                name: spec.name,
                source: spec.source,
                value,
            }
        })
        .collect();
    Aggregates(values)
}
