//! Partition of parsed candidates into new and duplicate records.
//!
//! Storage is asked about each batch once; hashes already seen earlier in
//! the same import are settled locally. The result is a point-in-time view:
//! uniqueness proper is enforced by the store's constraint.

use std::collections::{HashMap, HashSet};

use crate::toll_record::NewTollRecord;

/// A parsed row waiting for duplicate classification.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub row_number: u64,
    pub record: NewTollRecord,
}

#[derive(Debug, Default)]
pub struct Partition {
    /// Candidates to persist, in row order.
    pub fresh: Vec<Candidate>,
    /// Candidates to skip, in row order.
    pub duplicates: Vec<Candidate>,
}

/// Per-import duplicate detector.
#[derive(Debug, Default)]
pub struct DuplicateDetector {
    seen: HashSet<String>,
}

impl DuplicateDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Distinct hashes in `batch` that this import has not seen yet.
    ///
    /// An empty result means the batch needs no storage round trip.
    pub fn hashes_to_check(&self, batch: &[Candidate]) -> Vec<String> {
        let mut unique = HashSet::new();
        batch
            .iter()
            .map(|c| c.record.hash.as_str())
            .filter(|h| !self.seen.contains(*h) && unique.insert(*h))
            .map(str::to_string)
            .collect()
    }

    /// Split `batch` using the store's answer for [`hashes_to_check`].
    ///
    /// Hashes missing from `known` are treated as new.
    ///
    /// [`hashes_to_check`]: Self::hashes_to_check
    pub fn partition(&mut self, batch: Vec<Candidate>, known: &HashMap<String, bool>) -> Partition {
        let mut partition = Partition::default();
        for candidate in batch {
            let hash = &candidate.record.hash;
            let exists = known.get(hash).copied().unwrap_or(false);
            if exists || !self.seen.insert(hash.clone()) {
                self.seen.insert(hash.clone());
                partition.duplicates.push(candidate);
            } else {
                partition.fresh.push(candidate);
            }
        }
        partition
    }

    pub fn seen_count(&self) -> usize {
        self.seen.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveTime};

    fn candidate(row: u64, amount: i64) -> Candidate {
        let record = NewTollRecord::new(
            NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            NaiveTime::from_hms_opt(8, 15, 0).unwrap(),
            "Tokyo IC",
            "Yokohama IC",
            amount,
            "V-1",
            "C-1",
            None,
            None,
        )
        .unwrap();
        Candidate { row_number: row, record }
    }

    #[test]
    fn known_hashes_are_duplicates() {
        let mut detector = DuplicateDetector::new();
        let batch = vec![candidate(1, 100), candidate(2, 200)];
        let known = HashMap::from([
            (batch[0].record.hash.clone(), true),
            (batch[1].record.hash.clone(), false),
        ]);
        let p = detector.partition(batch, &known);
        assert_eq!(p.duplicates.len(), 1);
        assert_eq!(p.duplicates[0].row_number, 1);
        assert_eq!(p.fresh.len(), 1);
        assert_eq!(p.fresh[0].row_number, 2);
    }

    #[test]
    fn repeats_within_import_are_duplicates() {
        let mut detector = DuplicateDetector::new();
        let p = detector.partition(vec![candidate(1, 100), candidate(2, 100)], &HashMap::new());
        assert_eq!(p.fresh.len(), 1);
        assert_eq!(p.duplicates.len(), 1);
        assert_eq!(p.duplicates[0].row_number, 2);

        let next = vec![candidate(3, 100)];
        assert!(detector.hashes_to_check(&next).is_empty());
        let p = detector.partition(next, &HashMap::new());
        assert_eq!(p.duplicates.len(), 1);
    }

    #[test]
    fn hashes_to_check_are_distinct() {
        let detector = DuplicateDetector::new();
        let batch = vec![candidate(1, 100), candidate(2, 100), candidate(3, 300)];
        assert_eq!(detector.hashes_to_check(&batch).len(), 2);
    }
}
