//! Timestamp ordering for list views.
//!
//! Only one comparator family exists: by parsed timestamp, ascending or descending. The sort is
//! stable, so records with equal timestamps keep their input order in both directions. Records
//! whose timestamp cannot be parsed are placed after every dated record, also in input order.

use super::filter::Filterable;
use crate::dates::parse_timestamp;
use chrono::NaiveDateTime;
use std::cmp::Ordering;

labelled_enum! {
    /// User-facing sort choice of the event log view.
    pub enum SortOrder {
        NewestFirst => "Newest First",
        OldestFirst => "Oldest First",
    }
}

impl Default for SortOrder {
    fn default() -> Self {
        SortOrder::NewestFirst
    }
}

impl SortOrder {
    /// Compares two parsed timestamps under this order. Missing timestamps sort last.
    pub fn compare(self, a: Option<NaiveDateTime>, b: Option<NaiveDateTime>) -> Ordering {
        match (a, b) {
            (Some(a), Some(b)) => match self {
                SortOrder::OldestFirst => a.cmp(&b),
                SortOrder::NewestFirst => b.cmp(&a),
            },
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        }
    }
}

/// Orders `records` by timestamp in place.
pub fn sort_by_timestamp<T: Filterable>(records: &mut Vec<&T>, order: SortOrder) {
    let mut keyed: Vec<(Option<NaiveDateTime>, &T)> = records
        .iter()
        .map(|r| (r.timestamp_text().and_then(parse_timestamp), *r))
        .collect();

    // `sort_by` is stable.
    keyed.sort_by(|(a, _), (b, _)| order.compare(*a, *b));

    records.clear();
    records.extend(keyed.into_iter().map(|(_, r)| r));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::filter::tests::Row;
    use proptest::prelude::*;

    fn names<'a>(rows: &[&'a Row]) -> Vec<&'a str> {
        rows.iter().map(|r| r.name.as_str()).collect()
    }

    #[test]
    fn newest_first_descends() {
        let rows = vec![
            Row::new("a", "", "2024-01-01 08:00"),
            Row::new("b", "", "2024-01-03 08:00"),
            Row::new("c", "", "2024-01-02 08:00"),
        ];
        let mut view: Vec<&Row> = rows.iter().collect();

        sort_by_timestamp(&mut view, SortOrder::NewestFirst);
        assert_eq!(names(&view), ["b", "c", "a"]);

        sort_by_timestamp(&mut view, SortOrder::OldestFirst);
        assert_eq!(names(&view), ["a", "c", "b"]);
    }

    #[test]
    fn ties_keep_input_order_in_both_directions() {
        let rows = vec![
            Row::new("first", "", "2024-01-01 08:00:00"),
            Row::new("later", "", "2024-01-02 08:00:00"),
            Row::new("second", "", "2024-01-01T08:00:00"),
        ];
        let mut view: Vec<&Row> = rows.iter().collect();

        sort_by_timestamp(&mut view, SortOrder::NewestFirst);
        assert_eq!(names(&view), ["later", "first", "second"]);

        let mut view: Vec<&Row> = rows.iter().collect();
        sort_by_timestamp(&mut view, SortOrder::OldestFirst);
        assert_eq!(names(&view), ["first", "second", "later"]);
    }

    #[test]
    fn undated_rows_go_last_in_input_order() {
        let rows = vec![
            Row::new("x", "", "garbage"),
            Row::new("a", "", "2024-01-01"),
            Row::new("y", "", ""),
            Row::new("b", "", "2024-01-02"),
        ];
        let mut view: Vec<&Row> = rows.iter().collect();

        sort_by_timestamp(&mut view, SortOrder::NewestFirst);
        assert_eq!(names(&view), ["b", "a", "x", "y"]);

        sort_by_timestamp(&mut view, SortOrder::OldestFirst);
        assert_eq!(names(&view), ["a", "b", "x", "y"]);
    }

    #[test]
    fn parses_user_choice() {
        assert_eq!("newest first".parse::<SortOrder>().unwrap(), SortOrder::NewestFirst);
        assert_eq!("oldest_first".parse::<SortOrder>().unwrap(), SortOrder::OldestFirst);
        assert_eq!(SortOrder::default(), SortOrder::NewestFirst);
    }

    proptest! {
        /// Under Newest First, rows sharing a timestamp appear in their original relative order.
        #[test]
        fn newest_first_is_stable(days in proptest::collection::vec(1u32..=4, 0..30)) {
            let rows: Vec<Row> = days
                .iter()
                .enumerate()
                .map(|(i, day)| Row::new(&i.to_string(), "", &format!("2024-03-0{day} 12:00:00")))
                .collect();
            let mut view: Vec<&Row> = rows.iter().collect();
            sort_by_timestamp(&mut view, SortOrder::NewestFirst);

            for pair in view.windows(2) {
                let (a, b) = (pair[0], pair[1]);
                prop_assert!(a.timestamp >= b.timestamp);
                if a.timestamp == b.timestamp {
                    let ia: usize = a.name.parse().unwrap();
                    let ib: usize = b.name.parse().unwrap();
                    prop_assert!(ia < ib);
                }
            }
        }
    }
}
