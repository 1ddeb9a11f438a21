//! Time-indexed tables of zonal statistics.

use chrono::NaiveDateTime;
use serde::Serialize;
use std::fs::File;
use std::io::Write;
use std::path::Path;

use super::stats::Statistic;
use crate::error::{Result, WiwbError};

const CSV_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One row per time step, one column per (geometry, statistic).
///
/// A column is named by the geometry label when a single statistic was computed,
/// otherwise `<label>_<statistic>`. `None` marks a fully masked geometry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ZonalResult {
    index: Vec<NaiveDateTime>,
    columns: Vec<String>,
    data: Vec<Vec<Option<f64>>>,
    #[serde(skip)]
    labels: Vec<String>,
    #[serde(skip)]
    statistics: Vec<Statistic>,
}

impl ZonalResult {
    /// Assemble a table. Each row holds, per label, one value per statistic.
    pub(crate) fn new(
        index: Vec<NaiveDateTime>,
        labels: Vec<String>,
        statistics: Vec<Statistic>,
        data: Vec<Vec<Option<f64>>>,
    ) -> Self {
        let columns = if statistics.len() == 1 {
            labels.clone()
        } else {
            labels
                .iter()
                .flat_map(|label| {
                    statistics
                        .iter()
                        .map(move |stat| format!("{}_{}", label, stat))
                })
                .collect()
        };

        Self {
            index,
            columns,
            data,
            labels,
            statistics,
        }
    }

    pub fn index(&self) -> &[NaiveDateTime] {
        &self.index
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn statistics(&self) -> &[Statistic] {
        &self.statistics
    }

    pub fn rows(&self) -> usize {
        self.index.len()
    }

    pub fn row(&self, time_index: usize) -> Option<&[Option<f64>]> {
        self.data.get(time_index).map(Vec::as_slice)
    }

    /// Value of one cell; `Ok(None)` is a no-value cell
    pub fn value(&self, time_index: usize, label: &str, statistic: Statistic) -> Result<Option<f64>> {
        let row = self.data.get(time_index).ok_or_else(|| {
            WiwbError::validation(format!(
                "Time index {} out of range for {} rows",
                time_index,
                self.index.len()
            ))
        })?;
        let label_pos = self
            .labels
            .iter()
            .position(|l| l == label)
            .ok_or_else(|| WiwbError::validation(format!("Unknown geometry label: {}", label)))?;
        let stat_pos = self
            .statistics
            .iter()
            .position(|s| *s == statistic)
            .ok_or_else(|| {
                WiwbError::validation(format!("Statistic {} was not computed", statistic))
            })?;

        Ok(row[label_pos * self.statistics.len() + stat_pos])
    }

    /// Write the table as CSV. No-value cells are empty fields.
    pub fn write_csv_to<W: Write>(&self, writer: W) -> Result<()> {
        let mut csv = csv::Writer::from_writer(writer);

        let mut header = Vec::with_capacity(self.columns.len() + 1);
        header.push("time");
        header.extend(self.columns.iter().map(String::as_str));
        csv.write_record(&header)?;

        for (time, row) in self.index.iter().zip(&self.data) {
            let mut record = Vec::with_capacity(row.len() + 1);
            record.push(time.format(CSV_TIME_FORMAT).to_string());
            record.extend(row.iter().map(|value| match value {
                Some(v) => v.to_string(),
                None => String::new(),
            }));
            csv.write_record(&record)?;
        }

        csv.flush()?;
        Ok(())
    }

    pub fn write_csv(&self, path: &Path) -> Result<()> {
        let file = File::create(path).map_err(|e| WiwbError::Resource {
            message: format!("Cannot create {}: {}", path.display(), e),
        })?;
        self.write_csv_to(file)
    }
}
