use crate::types::{TimeBucketRange, TIME_BUCKET};
use serde::{Deserialize, Serialize};

/// Leaf predicate understood by every storage backend.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Predicate {
    /// Inclusive on both ends.
    Range { column: String, lower: i64, upper: i64 },
    Equals { column: String, value: String },
}

impl Predicate {
    pub fn column(&self) -> &str {
        match self {
            Predicate::Range { column, .. } | Predicate::Equals { column, .. } => column,
        }
    }
}

/// AND of leaf predicates: exactly one range on the time bucket column,
/// optionally followed by one equality on a parent column.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CompositePredicate {
    predicates: Vec<Predicate>,
}

impl CompositePredicate {
    pub fn predicates(&self) -> &[Predicate] {
        &self.predicates
    }

    pub fn time_range(&self) -> (i64, i64) {
        match self.predicates.first() {
            Some(Predicate::Range { lower, upper, .. }) => (*lower, *upper),
            // The builder always puts the time range first.
            _ => (i64::MIN, i64::MAX),
        }
    }

    /// `(column, value)` of the scoping filter, if any.
    pub fn parent(&self) -> Option<(&str, &str)> {
        self.predicates.iter().find_map(|p| match p {
            Predicate::Equals { column, value } => Some((column.as_str(), value.as_str())),
            Predicate::Range { .. } => None,
        })
    }

    pub fn len(&self) -> usize {
        self.predicates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }
}

/// Composes the time window and an optional parent scoping filter.
pub struct ScopeFilterBuilder {
    time_range: TimeBucketRange,
    parent: Option<(String, String)>,
}

impl ScopeFilterBuilder {
    pub fn new(time_range: TimeBucketRange) -> Self {
        Self {
            time_range,
            parent: None,
        }
    }

    pub fn parent(mut self, column: impl Into<String>, id: impl Into<String>) -> Self {
        self.parent = Some((column.into(), id.into()));
        self
    }

    pub fn maybe_parent(self, column: &str, id: Option<&str>) -> Self {
        match id {
            Some(id) => self.parent(column, id),
            None => self,
        }
    }

    pub fn build(self) -> CompositePredicate {
        let mut predicates = Vec::with_capacity(2);
        predicates.push(Predicate::Range {
            column: TIME_BUCKET.to_string(),
            lower: self.time_range.start_tb(),
            upper: self.time_range.end_tb(),
        });

        if let Some((column, value)) = self.parent {
            predicates.push(Predicate::Equals { column, value });
        }

        CompositePredicate { predicates }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SERVICE_ID;

    #[test]
    fn test_unscoped_filter() {
        let range = TimeBucketRange::new(100, 200).unwrap();
        let predicate = ScopeFilterBuilder::new(range).build();

        assert_eq!(predicate.len(), 1);
        assert_eq!(predicate.time_range(), (100, 200));
        assert_eq!(predicate.parent(), None);
        assert_eq!(predicate.predicates()[0].column(), TIME_BUCKET);
    }

    #[test]
    fn test_scoped_filter() {
        let range = TimeBucketRange::new(100, 100).unwrap();
        let predicate = ScopeFilterBuilder::new(range)
            .maybe_parent(SERVICE_ID, Some("svc-a"))
            .build();

        assert_eq!(predicate.len(), 2);
        assert_eq!(predicate.time_range(), (100, 100));
        assert_eq!(predicate.parent(), Some((SERVICE_ID, "svc-a")));
        assert!(matches!(predicate.predicates()[0], Predicate::Range { .. }));
    }

    #[test]
    fn test_maybe_parent_none() {
        let range = TimeBucketRange::new(1, 2).unwrap();
        let predicate = ScopeFilterBuilder::new(range)
            .maybe_parent(SERVICE_ID, None)
            .build();

        assert_eq!(predicate.len(), 1);
    }
}
