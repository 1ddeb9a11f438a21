//! Zonal statistics over the valid cells of one geometry.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::WiwbError;

/// Statistics that can be computed per geometry and time step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Statistic {
    Mean,
    Min,
    Max,
    Sum,
    Count,
    Median,
    Std,
}

impl Statistic {
    pub const ALL: [Statistic; 7] = [
        Statistic::Mean,
        Statistic::Min,
        Statistic::Max,
        Statistic::Sum,
        Statistic::Count,
        Statistic::Median,
        Statistic::Std,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Statistic::Mean => "mean",
            Statistic::Min => "min",
            Statistic::Max => "max",
            Statistic::Sum => "sum",
            Statistic::Count => "count",
            Statistic::Median => "median",
            Statistic::Std => "std",
        }
    }

    /// Reduce valid cell values; `None` when there are none.
    ///
    /// `values` may be reordered.
    pub fn compute(&self, values: &mut [f64]) -> Option<f64> {
        if values.is_empty() {
            return None;
        }

        let n = values.len() as f64;
        let result = match self {
            Statistic::Mean => values.iter().sum::<f64>() / n,
            Statistic::Min => values.iter().copied().fold(f64::INFINITY, f64::min),
            Statistic::Max => values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            Statistic::Sum => values.iter().sum(),
            Statistic::Count => n,
            Statistic::Median => {
                values.sort_unstable_by(f64::total_cmp);
                let mid = values.len() / 2;
                if values.len() % 2 == 0 {
                    (values[mid - 1] + values[mid]) / 2.0
                } else {
                    values[mid]
                }
            }
            // Population standard deviation
            Statistic::Std => {
                let mean = values.iter().sum::<f64>() / n;
                (values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n).sqrt()
            }
        };
        Some(result)
    }
}

impl FromStr for Statistic {
    type Err = WiwbError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let name = s.trim().to_lowercase();
        Statistic::ALL
            .into_iter()
            .find(|stat| stat.name() == name)
            .ok_or_else(|| {
                WiwbError::validation(format!(
                    "Unknown statistic: {}. Must be one of: mean, min, max, sum, count, median, std",
                    s
                ))
            })
    }
}

impl fmt::Display for Statistic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Parse a comma separated list such as `"mean,max"`
pub fn parse_statistics(list: &str) -> crate::error::Result<Vec<Statistic>> {
    list.split(',')
        .filter(|part| !part.trim().is_empty())
        .map(str::parse)
        .collect()
}
