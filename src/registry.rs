//! Digest-keyed set of files still to be organized

use crate::candidate::Candidate;
use std::collections::BTreeMap;
use std::collections::btree_map::Entry;

/// What happened when a candidate was offered to the registry
#[derive(Debug)]
pub enum Offer {
    /// No file with this digest was registered yet
    Inserted,
    /// The new file had a shorter name and took the slot; the old one is returned
    Replaced { evicted: Candidate },
    /// A file with this digest is already registered and keeps the slot;
    /// the offered candidate is handed back
    Rejected { rejected: Candidate },
}

/// Mapping from content digest to the one candidate kept for that content
///
/// Iteration follows digest order, so the copy phase visits files in the
/// same order on every run.
#[derive(Debug, Default)]
pub struct CandidateRegistry {
    entries: BTreeMap<String, Candidate>,
}

impl CandidateRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `candidate` under `digest`
    ///
    /// On a digest collision the file with the strictly shorter file name
    /// wins. Equal lengths keep the file registered first.
    pub fn offer(&mut self, digest: String, candidate: Candidate) -> Offer {
        match self.entries.entry(digest) {
            Entry::Vacant(slot) => {
                slot.insert(candidate);
                Offer::Inserted
            }
            Entry::Occupied(mut slot) => {
                let offered_len = name_length(&candidate);
                let kept_len = name_length(slot.get());
                if offered_len < kept_len {
                    let evicted = slot.insert(candidate);
                    Offer::Replaced { evicted }
                } else {
                    Offer::Rejected {
                        rejected: candidate,
                    }
                }
            }
        }
    }

    /// Drop the candidate registered under `digest`, if any
    pub fn remove(&mut self, digest: &str) -> Option<Candidate> {
        self.entries.remove(digest)
    }

    pub fn get(&self, digest: &str) -> Option<&Candidate> {
        self.entries.get(digest)
    }

    pub fn contains(&self, digest: &str) -> bool {
        self.entries.contains_key(digest)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Candidate)> {
        self.entries.iter().map(|(digest, c)| (digest.as_str(), c))
    }

    pub fn candidates(&self) -> impl Iterator<Item = &Candidate> {
        self.entries.values()
    }

    pub fn candidates_mut(&mut self) -> impl Iterator<Item = &mut Candidate> {
        self.entries.values_mut()
    }
}

/// File name length in UTF-16 code units, so a character outside the
/// Basic Multilingual Plane counts twice
fn name_length(candidate: &Candidate) -> usize {
    candidate.file_name().encode_utf16().count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn candidate(path: &str) -> Candidate {
        Candidate::new(Path::new("/src"), Path::new(path))
    }

    #[test]
    fn test_insert_distinct_digests() {
        let mut registry = CandidateRegistry::new();
        assert!(matches!(
            registry.offer("aa".into(), candidate("/src/a.jpg")),
            Offer::Inserted
        ));
        assert!(matches!(
            registry.offer("bb".into(), candidate("/src/b.jpg")),
            Offer::Inserted
        ));
        assert_eq!(registry.len(), 2);
        assert!(registry.contains("aa"));
    }

    #[test]
    fn test_shorter_name_replaces() {
        let mut registry = CandidateRegistry::new();
        registry.offer("aa".into(), candidate("/src/IMG_0001.JPG"));
        match registry.offer("aa".into(), candidate("/src/other/img.jpg")) {
            Offer::Replaced { evicted } => {
                assert_eq!(evicted.file_name(), "IMG_0001.JPG");
            }
            other => panic!("expected replacement, got {other:?}"),
        }
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get("aa").unwrap().file_name(), "img.jpg");
    }

    #[test]
    fn test_longer_or_equal_name_is_rejected() {
        let mut registry = CandidateRegistry::new();
        registry.offer("aa".into(), candidate("/src/abc.jpg"));

        let outcome = registry.offer("aa".into(), candidate("/src/x/xyz.jpg"));
        assert!(matches!(outcome, Offer::Rejected { ref rejected } if rejected.file_name() == "xyz.jpg"));

        let outcome = registry.offer("aa".into(), candidate("/src/abcd.jpg"));
        assert!(matches!(outcome, Offer::Rejected { .. }));

        assert_eq!(
            registry.get("aa").unwrap().source_path(),
            Path::new("/src/abc.jpg")
        );
    }

    #[test]
    fn test_name_length_ignores_directory_depth() {
        let mut registry = CandidateRegistry::new();
        registry.offer("aa".into(), candidate("/src/a.jpg"));
        let outcome = registry.offer("aa".into(), candidate("/src/deeply/nested/dir/b.jpg"));
        assert!(matches!(outcome, Offer::Rejected { .. }));
    }

    #[test]
    fn test_name_length_counts_utf16_units() {
        let mut registry = CandidateRegistry::new();
        registry.offer("aa".into(), candidate("/src/abcde.jpg"));

        // 8 chars but 12 UTF-16 units against 9 for the kept name
        let wide = candidate("/src/\u{1F600}\u{1F600}\u{1F600}\u{1F600}.jpg");
        let outcome = registry.offer("aa".into(), wide);
        assert!(matches!(outcome, Offer::Rejected { .. }));

        // 8 units beat 9
        let outcome = registry.offer("aa".into(), candidate("/src/\u{1F600}\u{1F600}.mov"));
        assert!(matches!(outcome, Offer::Replaced { .. }));
    }

    #[test]
    fn test_remove_and_iteration_order() {
        let mut registry = CandidateRegistry::new();
        registry.offer("cc".into(), candidate("/src/c.jpg"));
        registry.offer("aa".into(), candidate("/src/a.jpg"));
        registry.offer("bb".into(), candidate("/src/b.jpg"));

        let digests: Vec<&str> = registry.iter().map(|(d, _)| d).collect();
        assert_eq!(digests, vec!["aa", "bb", "cc"]);

        assert!(registry.remove("bb").is_some());
        assert!(registry.remove("bb").is_none());
        assert_eq!(registry.len(), 2);
        assert!(!registry.is_empty());
    }
}
