use std::collections::BTreeMap;
use std::fmt;

use super::result::{DetectionSet, MaskLabel, LABEL_UNKNOWN};

/// Per-label tally of one detection set.
///
/// Keys are the raw label strings; detections without a label land in the
/// `unknown` bucket. Always rebuilt from scratch for each new set.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LabelStats {
    counts: BTreeMap<String, usize>,
}

impl LabelStats {
    pub fn tally(set: &DetectionSet) -> Self {
        let mut counts = BTreeMap::new();
        for det in set {
            let key = det.label_name().unwrap_or(LABEL_UNKNOWN);
            *counts.entry(key.to_string()).or_insert(0) += 1;
        }
        Self { counts }
    }

    /// Count for a raw label, zero when absent.
    pub fn get(&self, label: &str) -> usize {
        self.counts.get(label).copied().unwrap_or(0)
    }

    pub fn count(&self, label: MaskLabel) -> usize {
        self.get(label.as_str())
    }

    pub fn contains(&self, label: &str) -> bool {
        self.counts.contains_key(label)
    }

    pub fn total(&self) -> usize {
        self.counts.values().sum()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// The three displayed counters, zero-filled.
    pub fn counters(&self) -> [(MaskLabel, usize); 3] {
        MaskLabel::COUNTED.map(|label| (label, self.count(label)))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, usize)> {
        self.counts.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

impl fmt::Display for LabelStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (label, count) in self.counters() {
            if !first {
                f.write_str(" ")?;
            }
            first = false;
            write!(f, "{}={}", label.as_str(), count)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::{BBox, Detection};

    fn labelled(label: Option<&str>) -> Detection {
        let det = Detection::new(BBox::default());
        match label {
            Some(l) => det.with_label(l),
            None => det,
        }
    }

    #[test]
    fn tallies_each_label() {
        let set: DetectionSet = [Some("with_mask"), Some("without_mask"), Some("without_mask")]
            .into_iter()
            .map(labelled)
            .collect();
        let stats = LabelStats::tally(&set);

        assert_eq!(stats.get("with_mask"), 1);
        assert_eq!(stats.get("without_mask"), 2);
        assert!(!stats.contains("mask_weared_incorrect"));
        assert_eq!(stats.count(MaskLabel::MaskWearedIncorrect), 0);
        assert_eq!(stats.total(), 3);
    }

    #[test]
    fn missing_labels_go_to_unknown() {
        let set: DetectionSet = [None, None, Some("with_mask")].into_iter().map(labelled).collect();
        let stats = LabelStats::tally(&set);
        assert_eq!(stats.get("unknown"), 2);
        assert_eq!(stats.count(MaskLabel::Unknown), 2);
    }

    #[test]
    fn empty_labels_go_to_unknown() {
        let set: DetectionSet = [Some(""), Some("with_mask")].into_iter().map(labelled).collect();
        let stats = LabelStats::tally(&set);
        assert!(!stats.contains(""));
        assert_eq!(stats.get("unknown"), 1);
        assert_eq!(stats.count(MaskLabel::WithMask), 1);
    }

    #[test]
    fn display_shows_zero_filled_counters() {
        let stats = LabelStats::tally(&DetectionSet::empty());
        assert!(stats.is_empty());
        assert_eq!(
            stats.to_string(),
            "with_mask=0 without_mask=0 mask_weared_incorrect=0"
        );
    }
}
