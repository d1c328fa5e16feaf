//! Record selection: stable filtering with an optional cap.

use crate::notion::Record;
use serde::{Deserialize, Serialize};

/// Keep the first `cap` records satisfying `predicate`, in input order.
///
/// A cap of zero keeps every match.
pub fn select<P>(records: Vec<Record>, predicate: P, cap: usize) -> Vec<Record>
where
    P: Fn(&Record) -> bool,
{
    let matching = records.into_iter().filter(|r| predicate(r));
    if cap == 0 {
        matching.collect()
    } else {
        matching.take(cap).collect()
    }
}

/// Title-based inclusion/exclusion rule.
///
/// The title is lowercased before matching; `required` and `excluded` are
/// compared lowercased as well.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TitlePredicate {
    pub property: String,
    #[serde(default)]
    pub required: Option<String>,
    #[serde(default)]
    pub excluded: Vec<String>,
}

impl TitlePredicate {
    pub fn new(property: &str) -> Self {
        Self {
            property: property.to_string(),
            required: None,
            excluded: Vec::new(),
        }
    }

    pub fn requiring(mut self, substring: &str) -> Self {
        self.required = Some(substring.to_lowercase());
        self
    }

    pub fn excluding<I, S>(mut self, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.excluded = keywords
            .into_iter()
            .map(|k| k.as_ref().to_lowercase())
            .collect();
        self
    }

    /// Evaluate against a record. An absent or empty title never matches.
    pub fn matches(&self, record: &Record) -> bool {
        let title = record.text(&self.property).to_lowercase();
        if title.trim().is_empty() {
            return false;
        }

        if let Some(required) = &self.required {
            if !title.contains(required.to_lowercase().as_str()) {
                return false;
            }
        }

        !self
            .excluded
            .iter()
            .any(|keyword| title.contains(keyword.to_lowercase().as_str()))
    }
}

/// Predicate plus cap, as configured for one extraction tool.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordFilter {
    pub title: Option<TitlePredicate>,
    pub cap: usize,
}

impl RecordFilter {
    /// A filter that keeps up to `cap` records (zero for all).
    pub fn new(cap: usize) -> Self {
        Self { title: None, cap }
    }

    pub fn with_title(mut self, predicate: TitlePredicate) -> Self {
        self.title = Some(predicate);
        self
    }

    /// Apply the configured predicate and cap.
    pub fn select(&self, records: Vec<Record>) -> Vec<Record> {
        match &self.title {
            Some(predicate) => select(records, |r| predicate.matches(r), self.cap),
            None => select(records, |_| true, self.cap),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notion::{PropertyValue, TextSpan};
    use chrono::Utc;

    fn titled(id: &str, title: &str) -> Record {
        Record::new(id, Utc::now())
            .with_property("Name", PropertyValue::Title(vec![TextSpan::plain(title)]))
    }

    fn ids(records: &[Record]) -> Vec<&str> {
        records.iter().map(|r| r.id.as_str()).collect()
    }

    #[test]
    fn test_cap_keeps_first_matches_in_order() {
        let records: Vec<Record> = (0..10).map(|i| titled(&i.to_string(), "Script")).collect();

        let capped = select(records.clone(), |_| true, 3);
        assert_eq!(ids(&capped), vec!["0", "1", "2"]);

        let all = select(records, |_| true, 0);
        assert_eq!(all.len(), 10);
    }

    #[test]
    fn test_title_predicate_required_and_excluded() {
        let predicate = TitlePredicate::new("Name")
            .requiring("Script")
            .excluding(["description", "thumbnail", "idea", "tags"]);

        assert!(predicate.matches(&titled("a", "Agents SCRIPT v2")));
        assert!(!predicate.matches(&titled("b", "Script thumbnail ideas")));
        assert!(!predicate.matches(&titled("c", "Outline")));
        assert!(!predicate.matches(&titled("d", "")));
        assert!(!predicate.matches(&Record::new("e", Utc::now())));
    }

    #[test]
    fn test_non_title_property_shapes_do_not_panic() {
        let predicate = TitlePredicate::new("Name").requiring("script");
        let odd = Record::new("x", Utc::now()).with_property("Name", PropertyValue::Number(4.0));
        assert!(!predicate.matches(&odd));
    }

    #[test]
    fn test_record_filter_applies_predicate_then_cap() {
        let records = vec![
            titled("1", "Script one"),
            titled("2", "Tags for script"),
            titled("3", "Script three"),
            titled("4", "Script four"),
        ];
        let filter = RecordFilter::new(2).with_title(
            TitlePredicate::new("Name")
                .requiring("script")
                .excluding(["tags"]),
        );
        assert_eq!(ids(&filter.select(records)), vec!["1", "3"]);
    }
}
