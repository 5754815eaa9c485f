use agenteval_critic::{CriteriaStore, Criterion};
use serde::Serialize;

use crate::error::AggregateError;
use crate::ScoredBatch;

/// Two-sided 95% critical values of Student's t for 1..=30 degrees of freedom
const T_CRITICAL_95: [f64; 30] = [
    12.706, 4.303, 3.182, 2.776, 2.571, 2.447, 2.365, 2.306, 2.262, 2.228, 2.201, 2.179, 2.160,
    2.145, 2.131, 2.120, 2.110, 2.101, 2.093, 2.086, 2.080, 2.074, 2.069, 2.064, 2.060, 2.056,
    2.052, 2.048, 2.045, 2.042,
];

/// Statistics for one criterion within one outcome group
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupStats {
    pub count: usize,
    /// Mean ordinal position
    pub mean: f64,
    pub ci_low: f64,
    pub ci_high: f64,
    /// Number of records per accepted value, in declared order
    pub distribution: Vec<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CriterionStats {
    pub name: String,
    pub accepted_values: Vec<String>,
    /// Records whose `actual_success` is set; `None` when there are none
    pub success: Option<GroupStats>,
    pub failure: Option<GroupStats>,
}

/// Per-criterion statistics in store order
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregateReport {
    pub records: usize,
    pub criteria: Vec<CriterionStats>,
}

impl AggregateReport {
    pub fn get(&self, name: &str) -> Option<&CriterionStats> {
        self.criteria.iter().find(|c| c.name == name)
    }
}

/// Reduce a scored batch to ordinal statistics per criterion, split by outcome.
///
/// Each value maps to its position in the criterion's declared
/// `accepted_values`. Every record must carry exactly the store's criteria
/// with in-domain values; anything else is an error rather than skipped.
pub fn aggregate(
    store: &CriteriaStore,
    batch: &ScoredBatch,
) -> Result<AggregateReport, AggregateError> {
    validate(store, batch)?;

    let criteria = store
        .iter()
        .map(|criterion| criterion_stats(criterion, batch))
        .collect();

    Ok(AggregateReport {
        records: batch.len(),
        criteria,
    })
}

fn validate(store: &CriteriaStore, batch: &ScoredBatch) -> Result<(), AggregateError> {
    for (id, record) in batch.iter() {
        if let Some(unknown) = record
            .estimated_performance
            .keys()
            .find(|name| !store.contains(name))
        {
            return Err(AggregateError::UnknownCriterion {
                id: id.to_string(),
                criterion: unknown.clone(),
            });
        }

        for criterion in store {
            let value = record
                .estimated_performance
                .get(criterion.name())
                .ok_or_else(|| AggregateError::MissingCriterion {
                    id: id.to_string(),
                    criterion: criterion.name().to_string(),
                })?;
            if !criterion.accepts(value) {
                return Err(AggregateError::OutOfDomain {
                    id: id.to_string(),
                    criterion: criterion.name().to_string(),
                    value: value.clone(),
                });
            }
        }
    }
    Ok(())
}

fn criterion_stats(criterion: &Criterion, batch: &ScoredBatch) -> CriterionStats {
    let mut success = Vec::new();
    let mut failure = Vec::new();

    for (_, record) in batch.iter() {
        let ordinal = record
            .estimated_performance
            .get(criterion.name())
            .and_then(|value| criterion.ordinal(value));
        if let Some(ordinal) = ordinal {
            if record.actual_success {
                success.push(ordinal);
            } else {
                failure.push(ordinal);
            }
        }
    }

    let levels = criterion.accepted_values().len();
    CriterionStats {
        name: criterion.name().to_string(),
        accepted_values: criterion.accepted_values().to_vec(),
        success: group_stats(&success, levels),
        failure: group_stats(&failure, levels),
    }
}

fn group_stats(ordinals: &[usize], levels: usize) -> Option<GroupStats> {
    if ordinals.is_empty() {
        return None;
    }

    let mut distribution = vec![0; levels];
    for &ordinal in ordinals {
        if let Some(slot) = distribution.get_mut(ordinal) {
            *slot += 1;
        }
    }

    let count = ordinals.len();
    let mean = ordinals.iter().sum::<usize>() as f64 / count as f64;
    let half_width = if count > 1 {
        let variance = ordinals
            .iter()
            .map(|&x| (x as f64 - mean).powi(2))
            .sum::<f64>()
            / (count - 1) as f64;
        t_critical_95(count - 1) * variance.sqrt() / (count as f64).sqrt()
    } else {
        0.0
    };

    Some(GroupStats {
        count,
        mean,
        ci_low: mean - half_width,
        ci_high: mean + half_width,
        distribution,
    })
}

/// Critical value for `df` degrees of freedom, rounding `df` down between
/// tabulated points
fn t_critical_95(df: usize) -> f64 {
    match df {
        0 => f64::NAN,
        1..=30 => T_CRITICAL_95[df - 1],
        31..=39 => 2.042,
        40..=59 => 2.021,
        60..=119 => 2.000,
        120..=999 => 1.980,
        _ => 1.960,
    }
}
