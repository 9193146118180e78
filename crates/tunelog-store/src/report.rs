//! Offline analysis of a persisted tuning log.
//!
//! The report works on the delimited text log as written by [`CsvSink`](crate::CsvSink)
//! and covers:
//!
//! - Descriptive statistics of frequency, overall and per status
//! - Status counts, percentages and success rate
//! - Measurements per hour of day
//! - One-way ANOVA of frequency across status groups
//! - Status transitions between consecutive rows
//! - Drift (first differences of frequency) and a stability score
//! - The longest consecutive run of "In Tune"

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use serde::Serialize;

use tunelog_types::{Reading, TuningStatus};

use crate::csv_log::read_csv_log;
use crate::error::Result;
use crate::stats::{f_survival, mean, quantile_sorted, sample_std};

/// Offset added to the standard deviation before inverting it.
const STABILITY_EPSILON: f64 = 1e-6;

/// Descriptive statistics of a series.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    pub count: usize,
    pub mean: f64,
    /// Sample standard deviation; absent for a single value.
    pub std: Option<f64>,
    pub min: f64,
    pub q25: f64,
    pub median: f64,
    pub q75: f64,
    pub max: f64,
}

impl Summary {
    /// Summarize a series. `None` when it is empty.
    pub fn from_values(values: &[f64]) -> Option<Self> {
        let mut sorted = values.to_vec();
        sorted.sort_by(f64::total_cmp);

        Some(Self {
            count: sorted.len(),
            mean: mean(&sorted)?,
            std: sample_std(&sorted),
            min: *sorted.first()?,
            q25: quantile_sorted(&sorted, 0.25)?,
            median: quantile_sorted(&sorted, 0.5)?,
            q75: quantile_sorted(&sorted, 0.75)?,
            max: *sorted.last()?,
        })
    }
}

/// How often a status occurs.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusShare {
    pub status: String,
    pub count: usize,
    /// Percentage of all rows, rounded to two decimals.
    pub percentage: f64,
}

/// Frequency statistics within one status group.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusFrequency {
    pub status: String,
    pub mean: f64,
    pub std: Option<f64>,
    pub min: f64,
    pub max: f64,
}

/// One-way ANOVA of frequency across status groups.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Anova {
    pub f_statistic: f64,
    pub df_between: usize,
    pub df_within: usize,
    pub p_value: f64,
}

/// Count of row `i` having status `from` and row `i + 1` having status `to`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Transition {
    pub from: String,
    pub to: String,
    pub count: usize,
}

/// Full analysis of a tuning log.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    pub total: usize,
    pub frequency: Option<Summary>,
    /// Most frequent status first.
    pub status_shares: Vec<StatusShare>,
    /// Sorted by status label.
    pub status_frequencies: Vec<StatusFrequency>,
    /// Hour of day (0-23) to number of measurements.
    pub hourly_counts: BTreeMap<u8, usize>,
    pub anova: Option<Anova>,
    pub transitions: Vec<Transition>,
    /// Summary of frequency first differences.
    pub drift: Option<Summary>,
    pub stability_score: Option<f64>,
    /// Share of rows that are "In Tune", between 0 and 1.
    pub success_rate: Option<f64>,
    pub longest_in_tune_streak: usize,
}

/// Analyze readings in log order.
pub fn analyze(readings: &[Reading]) -> Report {
    let frequencies: Vec<f64> = readings.iter().map(|r| r.frequency).collect();
    let groups = group_by_status(readings);

    let frequency = Summary::from_values(&frequencies);
    let stability_score = frequency
        .as_ref()
        .and_then(|s| s.std)
        .map(|std| 1.0 / (std + STABILITY_EPSILON));

    let drift_values: Vec<f64> = frequencies.windows(2).map(|w| w[1] - w[0]).collect();

    let in_tune = TuningStatus::InTune.label();
    let in_tune_count = readings.iter().filter(|r| r.status == in_tune).count();
    let success_rate =
        (!readings.is_empty()).then(|| in_tune_count as f64 / readings.len() as f64);

    Report {
        total: readings.len(),
        frequency,
        status_shares: status_shares(&groups, readings.len()),
        status_frequencies: status_frequencies(&groups),
        hourly_counts: hourly_counts(readings),
        anova: one_way_anova(&groups),
        transitions: transitions(readings),
        drift: Summary::from_values(&drift_values),
        stability_score,
        success_rate,
        longest_in_tune_streak: longest_streak(readings, in_tune),
    }
}

/// Read a CSV log and analyze it.
pub fn analyze_csv<P: AsRef<Path>>(path: P) -> Result<Report> {
    let readings = read_csv_log(path)?;
    Ok(analyze(&readings))
}

fn group_by_status(readings: &[Reading]) -> BTreeMap<&str, Vec<f64>> {
    let mut groups: BTreeMap<&str, Vec<f64>> = BTreeMap::new();
    for reading in readings {
        groups
            .entry(reading.status.as_str())
            .or_default()
            .push(reading.frequency);
    }
    groups
}

fn status_shares(groups: &BTreeMap<&str, Vec<f64>>, total: usize) -> Vec<StatusShare> {
    let mut shares: Vec<StatusShare> = groups
        .iter()
        .map(|(status, values)| StatusShare {
            status: status.to_string(),
            count: values.len(),
            percentage: (values.len() as f64 / total as f64 * 10_000.0).round() / 100.0,
        })
        .collect();
    // Stable sort keeps label order among ties.
    shares.sort_by(|a, b| b.count.cmp(&a.count));
    shares
}

fn status_frequencies(groups: &BTreeMap<&str, Vec<f64>>) -> Vec<StatusFrequency> {
    groups
        .iter()
        .filter_map(|(status, values)| {
            let summary = Summary::from_values(values)?;
            Some(StatusFrequency {
                status: status.to_string(),
                mean: summary.mean,
                std: summary.std,
                min: summary.min,
                max: summary.max,
            })
        })
        .collect()
}

fn hourly_counts(readings: &[Reading]) -> BTreeMap<u8, usize> {
    let mut counts = BTreeMap::new();
    for reading in readings {
        *counts.entry(reading.timestamp.hour()).or_insert(0) += 1;
    }
    counts
}

/// Undefined with fewer than two groups, no within-group degrees of
/// freedom, or zero within-group variance.
fn one_way_anova(groups: &BTreeMap<&str, Vec<f64>>) -> Option<Anova> {
    let k = groups.len();
    let n: usize = groups.values().map(Vec::len).sum();
    if k < 2 || n <= k {
        return None;
    }

    let all: Vec<f64> = groups.values().flatten().copied().collect();
    let grand_mean = mean(&all)?;

    let mut ss_between = 0.0;
    let mut ss_within = 0.0;
    for values in groups.values() {
        let group_mean = mean(values)?;
        ss_between += values.len() as f64 * (group_mean - grand_mean).powi(2);
        ss_within += values.iter().map(|v| (v - group_mean).powi(2)).sum::<f64>();
    }

    let df_between = k - 1;
    let df_within = n - k;
    let ms_within = ss_within / df_within as f64;
    if ms_within == 0.0 {
        return None;
    }

    let f_statistic = (ss_between / df_between as f64) / ms_within;
    Some(Anova {
        f_statistic,
        df_between,
        df_within,
        p_value: f_survival(f_statistic, df_between as f64, df_within as f64),
    })
}

fn transitions(readings: &[Reading]) -> Vec<Transition> {
    let mut counts: BTreeMap<(&str, &str), usize> = BTreeMap::new();
    for pair in readings.windows(2) {
        *counts
            .entry((pair[0].status.as_str(), pair[1].status.as_str()))
            .or_insert(0) += 1;
    }
    counts
        .into_iter()
        .map(|((from, to), count)| Transition {
            from: from.to_string(),
            to: to.to_string(),
            count,
        })
        .collect()
}

fn longest_streak(readings: &[Reading], status: &str) -> usize {
    let mut longest = 0;
    let mut current = 0;
    for reading in readings {
        if reading.status == status {
            current += 1;
            longest = longest.max(current);
        } else {
            current = 0;
        }
    }
    longest
}

fn fmt_optional(value: Option<f64>) -> String {
    value.map_or_else(|| "n/a".to_string(), |v| format!("{:.2}", v))
}

fn write_summary(f: &mut fmt::Formatter<'_>, summary: &Summary) -> fmt::Result {
    writeln!(f, "  count   {}", summary.count)?;
    writeln!(f, "  mean    {:.2}", summary.mean)?;
    writeln!(f, "  std     {}", fmt_optional(summary.std))?;
    writeln!(f, "  min     {:.2}", summary.min)?;
    writeln!(f, "  25%     {:.2}", summary.q25)?;
    writeln!(f, "  50%     {:.2}", summary.median)?;
    writeln!(f, "  75%     {:.2}", summary.q75)?;
    writeln!(f, "  max     {:.2}", summary.max)
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== BASIC STATISTICS ===")?;
        writeln!(f, "Frequency (Hz):")?;
        match &self.frequency {
            Some(summary) => write_summary(f, summary)?,
            None => writeln!(f, "  no readings")?,
        }

        writeln!(f, "\n=== TUNING STATUS ===")?;
        for share in &self.status_shares {
            writeln!(f, "{}: {} ({}%)", share.status, share.count, share.percentage)?;
        }

        writeln!(f, "\n=== FREQUENCY BY STATUS ===")?;
        for group in &self.status_frequencies {
            writeln!(
                f,
                "{}: mean {:.2} Hz, std {} Hz, range {:.2} - {:.2} Hz",
                group.status,
                group.mean,
                fmt_optional(group.std),
                group.min,
                group.max
            )?;
        }

        writeln!(f, "\n=== MEASUREMENTS BY HOUR ===")?;
        for (hour, count) in &self.hourly_counts {
            writeln!(f, "{:02}:00  {}", hour, count)?;
        }

        writeln!(f, "\n=== ONE-WAY ANOVA ===")?;
        match &self.anova {
            Some(anova) => {
                writeln!(
                    f,
                    "F({}, {}) = {:.4}",
                    anova.df_between, anova.df_within, anova.f_statistic
                )?;
                writeln!(f, "p-value = {:.4}", anova.p_value)?;
            }
            None => writeln!(f, "not enough groups or variance")?,
        }

        writeln!(f, "\n=== STATUS TRANSITIONS ===")?;
        for t in &self.transitions {
            writeln!(f, "{} -> {}: {}", t.from, t.to, t.count)?;
        }

        writeln!(f, "\n=== DRIFT ===")?;
        match &self.drift {
            Some(summary) => write_summary(f, summary)?,
            None => writeln!(f, "  not enough readings")?,
        }

        writeln!(f, "\n=== OVERALL ===")?;
        writeln!(
            f,
            "Stability score: {}",
            self.stability_score
                .map_or_else(|| "n/a".to_string(), |v| format!("{:.4}", v))
        )?;
        writeln!(
            f,
            "Success rate: {}",
            self.success_rate
                .map_or_else(|| "n/a".to_string(), |v| format!("{:.2}%", v * 100.0))
        )?;
        writeln!(
            f,
            "Longest in-tune streak: {}",
            self.longest_in_tune_streak
        )
    }
}
