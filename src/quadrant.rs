//! Quadrant classification of queries by CTR and ranking position

use serde::{Deserialize, Serialize};

use crate::data::{Dataset, Observation};
use crate::error::{Result, SerplensError};

/// Scatter quadrant for a query, split at the dataset-wide mean CTR and mean
/// position. Rows exactly at a mean go to the "not greater" side: the strict
/// `>` on CTR and the inclusive `<=` on position make the four buckets a
/// disjoint cover of the dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Quadrant {
    /// High CTR, strong position
    TopRight,
    /// High CTR, weak position
    BottomRight,
    /// Low CTR, weak position
    BottomLeft,
    /// Low CTR, strong position
    TopLeft,
}

impl Quadrant {
    pub const ALL: [Quadrant; 4] = [
        Quadrant::TopRight,
        Quadrant::BottomRight,
        Quadrant::BottomLeft,
        Quadrant::TopLeft,
    ];

    /// Bucket a single row against the dataset means. Lower position numbers
    /// rank higher, so `position <= mean` is the strong side.
    pub fn assign(ctr: f64, position: f64, mean_ctr: f64, mean_position: f64) -> Quadrant {
        let high_ctr = ctr > mean_ctr;
        let strong_position = position <= mean_position;
        match (high_ctr, strong_position) {
            (true, true) => Quadrant::TopRight,
            (true, false) => Quadrant::BottomRight,
            (false, false) => Quadrant::BottomLeft,
            (false, true) => Quadrant::TopLeft,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Quadrant::TopRight => "TopRight",
            Quadrant::BottomRight => "BottomRight",
            Quadrant::BottomLeft => "BottomLeft",
            Quadrant::TopLeft => "TopLeft",
        }
    }

    /// One-line reading of what the bucket means for SEO work
    pub fn commentary(&self) -> &'static str {
        match self {
            Quadrant::TopRight => "High CTR and strong position. These queries are performing best.",
            Quadrant::BottomRight => {
                "High CTR but weak position. Optimizing content could boost rank."
            }
            Quadrant::BottomLeft => {
                "Low CTR and weak position. Evaluate whether these queries are worth further effort."
            }
            Quadrant::TopLeft => {
                "Strong position but low CTR. Investigate why users are not clicking."
            }
        }
    }

    fn index(&self) -> usize {
        match self {
            Quadrant::TopRight => 0,
            Quadrant::BottomRight => 1,
            Quadrant::BottomLeft => 2,
            Quadrant::TopLeft => 3,
        }
    }
}

impl std::fmt::Display for Quadrant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One quadrant and the rows that fell into it
#[derive(Debug, Clone, Serialize)]
pub struct QuadrantBucket {
    pub quadrant: Quadrant,
    pub commentary: &'static str,
    pub rows: Vec<Observation>,
}

/// Full classification result: the two means used as thresholds and the four
/// buckets in [`Quadrant::ALL`] order
#[derive(Debug, Clone, Serialize)]
pub struct QuadrantReport {
    pub mean_ctr: f64,
    pub mean_position: f64,
    pub buckets: Vec<QuadrantBucket>,
}

impl QuadrantReport {
    pub fn bucket(&self, quadrant: Quadrant) -> &QuadrantBucket {
        &self.buckets[quadrant.index()]
    }

    pub fn count(&self, quadrant: Quadrant) -> usize {
        self.bucket(quadrant).rows.len()
    }

    /// Total rows across all four buckets
    pub fn total(&self) -> usize {
        self.buckets.iter().map(|b| b.rows.len()).sum()
    }
}

/// Partition every row of the dataset into exactly one quadrant. Means are
/// computed over the full dataset, so the thresholds shift whenever rows
/// change. Rows carry their `predicted_clicks` through untouched; the split
/// itself only looks at `ctr` and `position`.
pub fn classify(dataset: &Dataset) -> Result<QuadrantReport> {
    if dataset.is_empty() {
        return Err(SerplensError::EmptyDataset);
    }

    let rows = dataset.observations()?;
    let n = rows.len() as f64;
    let mean_ctr = rows.iter().map(|r| r.ctr).sum::<f64>() / n;
    let mean_position = rows.iter().map(|r| r.position).sum::<f64>() / n;

    let mut buckets: Vec<QuadrantBucket> = Quadrant::ALL
        .iter()
        .map(|&quadrant| QuadrantBucket {
            quadrant,
            commentary: quadrant.commentary(),
            rows: Vec::new(),
        })
        .collect();

    for row in rows {
        let quadrant = Quadrant::assign(row.ctr, row.position, mean_ctr, mean_position);
        buckets[quadrant.index()].rows.push(row);
    }

    Ok(QuadrantReport {
        mean_ctr,
        mean_position,
        buckets,
    })
}
