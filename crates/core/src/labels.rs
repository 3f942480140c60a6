//! The fixed label set the classifier scores against.
//!
//! Loaded from a CSV file with a header row. Labels are taken from one
//! named column, de-duplicated and sorted, so score index `i` maps to the
//! `i`-th label in lexical order.

use std::collections::BTreeSet;
use std::path::Path;

use serde::Serialize;

use crate::error::CoreError;

/// Column holding the label names in the default labels file.
pub const DEFAULT_LABEL_COLUMN: &str = "breed";

/// Number of ranked labels returned by a prediction.
pub const TOP_K: usize = 5;

/// One ranked label with its confidence as a percentage.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedLabel {
    pub breed: String,
    pub confidence: f64,
}

/// Sorted, de-duplicated list of class names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelSet {
    names: Vec<String>,
}

impl LabelSet {
    /// Build from explicit names (sorted and de-duplicated).
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let unique: BTreeSet<String> = names.into_iter().map(Into::into).collect();
        Self {
            names: unique.into_iter().collect(),
        }
    }

    /// Parse CSV text and collect the values of `column`.
    ///
    /// Only the subset of CSV needed for a label file is understood:
    /// comma separated, optional double quotes around a field, no
    /// embedded commas.
    pub fn from_csv(text: &str, column: &str) -> Result<Self, CoreError> {
        let mut lines = text.lines().filter(|l| !l.trim().is_empty());

        let header = lines
            .next()
            .ok_or_else(|| CoreError::Validation("Labels file is empty".into()))?;
        let index = split_row(header)
            .position(|h| h == column)
            .ok_or_else(|| {
                CoreError::Validation(format!("Labels file has no '{column}' column"))
            })?;

        let names: Vec<String> = lines
            .filter_map(|line| split_row(line).nth(index))
            .filter(|v| !v.is_empty())
            .map(str::to_string)
            .collect();

        if names.is_empty() {
            return Err(CoreError::Validation(format!(
                "Labels file has no values in column '{column}'"
            )));
        }

        Ok(Self::new(names))
    }

    /// Read and parse a CSV labels file.
    pub fn load(path: &Path, column: &str) -> Result<Self, CoreError> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            CoreError::Internal(format!("Failed to read labels file {}: {e}", path.display()))
        })?;
        Self::from_csv(&text, column)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn name(&self, index: usize) -> Option<&str> {
        self.names.get(index).map(String::as_str)
    }

    /// Rank `scores` and return the `k` best labels, highest first.
    ///
    /// Confidence is the score as a percentage rounded to two decimals.
    /// Fails if the score vector does not match the label count.
    pub fn top_k(&self, scores: &[f32], k: usize) -> Result<Vec<RankedLabel>, CoreError> {
        if scores.len() != self.names.len() {
            return Err(CoreError::Inference(format!(
                "Model returned {} scores for {} labels",
                scores.len(),
                self.names.len()
            )));
        }

        let mut order: Vec<usize> = (0..scores.len()).collect();
        order.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]));

        Ok(order
            .into_iter()
            .take(k)
            .map(|i| RankedLabel {
                breed: self.names[i].clone(),
                confidence: to_percent(scores[i]),
            })
            .collect())
    }
}

fn split_row(line: &str) -> impl Iterator<Item = &str> {
    line.split(',').map(|f| f.trim().trim_matches('"'))
}

fn to_percent(score: f32) -> f64 {
    (f64::from(score) * 10_000.0).round() / 100.0
}

/// Index of the highest score, if any.
pub fn argmax(scores: &[f32]) -> Option<usize> {
    scores
        .iter()
        .enumerate()
        .max_by(|(_, a), (_, b)| a.total_cmp(b))
        .map(|(i, _)| i)
}

#[cfg(test)]
mod tests {
    use super::*;

    const CSV: &str = "id,breed,url\n\
                       1,pug,a.jpg\n\
                       2,beagle,b.jpg\n\
                       3,\"akita\",c.jpg\n\
                       4,pug,d.jpg\n";

    #[test]
    fn csv_labels_are_sorted_and_unique() {
        let labels = LabelSet::from_csv(CSV, "breed").unwrap();
        assert_eq!(labels.len(), 3);
        assert_eq!(labels.name(0), Some("akita"));
        assert_eq!(labels.name(1), Some("beagle"));
        assert_eq!(labels.name(2), Some("pug"));
    }

    #[test]
    fn missing_column_rejected() {
        let msg = LabelSet::from_csv(CSV, "species").unwrap_err().to_string();
        assert!(msg.contains("no 'species' column"));
    }

    #[test]
    fn empty_file_rejected() {
        assert!(LabelSet::from_csv("", "breed").is_err());
        assert!(LabelSet::from_csv("breed\n", "breed").is_err());
    }

    #[test]
    fn top_k_orders_by_score() {
        let labels = LabelSet::new(["a", "b", "c"]);
        let ranked = labels.top_k(&[0.1, 0.7, 0.2], 2).unwrap();

        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].breed, "b");
        assert_eq!(ranked[0].confidence, 70.0);
        assert_eq!(ranked[1].breed, "c");
    }

    #[test]
    fn top_k_rounds_to_two_decimals() {
        let labels = LabelSet::new(["a"]);
        let ranked = labels.top_k(&[0.123456], 1).unwrap();
        assert_eq!(ranked[0].confidence, 12.35);
    }

    #[test]
    fn top_k_rejects_wrong_score_count() {
        let labels = LabelSet::new(["a", "b"]);
        assert!(labels.top_k(&[1.0], 1).is_err());
    }

    #[test]
    fn argmax_picks_highest() {
        assert_eq!(argmax(&[0.2, 0.5, 0.3]), Some(1));
        assert_eq!(argmax(&[]), None);
    }
}
