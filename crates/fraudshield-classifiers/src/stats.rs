use std::cmp::Ordering;

use itertools_num::ItertoolsNum;

use crate::error::MetricError;

/// Points of a receiver operating characteristic curve.
#[derive(Debug, Clone, PartialEq)]
pub struct RocCurve {
    pub fpr: Vec<f64>,
    pub tpr: Vec<f64>,
    /// Score threshold at each point; the first point uses `+inf`.
    pub thresholds: Vec<f64>,
}

fn validate(labels: &[u8], scores: &[f64]) -> Result<(usize, usize), MetricError> {
    if labels.len() != scores.len() {
        return Err(MetricError::LengthMismatch {
            scores: scores.len(),
            labels: labels.len(),
        });
    }
    if labels.is_empty() {
        return Err(MetricError::Empty);
    }
    if let Some(&label) = labels.iter().find(|&&l| l > 1) {
        return Err(MetricError::NonBinaryLabel(label));
    }
    let non_finite = scores.iter().filter(|s| !s.is_finite()).count();
    if non_finite > 0 {
        return Err(MetricError::NonFinite(non_finite));
    }
    let positives = labels.iter().filter(|&&l| l == 1).count();
    let negatives = labels.len() - positives;
    if positives == 0 || negatives == 0 {
        return Err(MetricError::SingleClass);
    }
    Ok((positives, negatives))
}

/// Compute the ROC curve for binary labels (1 = positive) and scores where
/// higher means more likely positive.
///
/// Tied scores collapse into a single point, so a constant scorer yields the
/// diagonal `(0,0) -> (1,1)`.
///
/// # Errors
///
/// The curve is undefined when `labels` holds a single class, when inputs are
/// empty or of different lengths, or when any score is not finite.
pub fn roc_curve(labels: &[u8], scores: &[f64]) -> Result<RocCurve, MetricError> {
    let (positives, negatives) = validate(labels, scores)?;

    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[b].partial_cmp(&scores[a]).unwrap_or(Ordering::Equal));

    let is_pos: Vec<f64> = order.iter().map(|&i| f64::from(labels[i])).collect();
    let is_neg: Vec<f64> = is_pos.iter().map(|p| 1.0 - p).collect();
    let tps: Vec<f64> = is_pos.iter().copied().cumsum().collect();
    let fps: Vec<f64> = is_neg.iter().copied().cumsum().collect();

    let mut curve = RocCurve {
        fpr: vec![0.0],
        tpr: vec![0.0],
        thresholds: vec![f64::INFINITY],
    };
    for k in 0..order.len() {
        let last_of_group = k + 1 == order.len() || scores[order[k + 1]] != scores[order[k]];
        if last_of_group {
            curve.fpr.push(fps[k] / negatives as f64);
            curve.tpr.push(tps[k] / positives as f64);
            curve.thresholds.push(scores[order[k]]);
        }
    }
    Ok(curve)
}

/// Area under the ROC curve, in `[0, 1]`. Higher is better; 0.5 is chance.
pub fn roc_auc(labels: &[u8], scores: &[f64]) -> Result<f64, MetricError> {
    let curve = roc_curve(labels, scores)?;
    let area = curve
        .fpr
        .windows(2)
        .zip(curve.tpr.windows(2))
        .map(|(x, y)| (x[1] - x[0]) * (y[1] + y[0]) / 2.0)
        .sum::<f64>();
    Ok(area.clamp(0.0, 1.0))
}
