use plotly::common::{DashType, Line, Mode};
use plotly::layout::{Axis, Layout};
use plotly::{Bar, Histogram, Plot, Scatter};

use crate::error::MetricError;
use crate::stats::RocCurve;

/// Plot a histogram of the held-out scores for fraud and legitimate rows
pub fn plot_score_histogram(scores: &[f64], labels: &[u8], title: &str) -> Result<Plot, MetricError> {
    if scores.len() != labels.len() {
        return Err(MetricError::LengthMismatch {
            scores: scores.len(),
            labels: labels.len(),
        });
    }

    let (fraud, legit): (Vec<(f64, u8)>, Vec<(f64, u8)>) = scores
        .iter()
        .copied()
        .zip(labels.iter().copied())
        .partition(|(_, l)| *l == 1);

    let trace_fraud = Histogram::new(fraud.into_iter().map(|(s, _)| s).collect()).name("Fraud");
    let trace_legit = Histogram::new(legit.into_iter().map(|(s, _)| s).collect()).name("Legitimate");

    let layout = Layout::new()
        .title(title)
        .x_axis(Axis::new().title("Score"))
        .y_axis(Axis::new().title("Count"));

    let mut plot = Plot::new();
    plot.add_trace(trace_legit);
    plot.add_trace(trace_fraud);
    plot.set_layout(layout);

    Ok(plot)
}

/// ROC curve with the chance diagonal for reference.
pub fn plot_roc_curve(curve: &RocCurve, auc: f64, title: &str) -> Plot {
    let trace = Scatter::new(curve.fpr.clone(), curve.tpr.clone())
        .mode(Mode::Lines)
        .name(&format!("ROC (AUC = {:.4})", auc));
    let chance = Scatter::new(vec![0.0, 1.0], vec![0.0, 1.0])
        .mode(Mode::Lines)
        .line(Line::new().dash(DashType::Dash))
        .name("Chance");

    let layout = Layout::new()
        .title(title)
        .x_axis(Axis::new().title("False Positive Rate").range(vec![0.0, 1.0]))
        .y_axis(Axis::new().title("True Positive Rate").range(vec![0.0, 1.0]));

    let mut plot = Plot::new();
    plot.add_trace(trace);
    plot.add_trace(chance);
    plot.set_layout(layout);
    plot
}

/// Held-out ROC AUC per candidate. Failed candidates are left out.
pub fn plot_candidate_scores(scores: &[(&str, f64)], title: &str) -> Plot {
    let (names, values): (Vec<String>, Vec<f64>) = scores
        .iter()
        .filter(|(_, s)| *s >= 0.0)
        .map(|(n, s)| (n.to_string(), *s))
        .unzip();

    let layout = Layout::new()
        .title(title)
        .x_axis(Axis::new().title("Candidate"))
        .y_axis(Axis::new().title("ROC AUC").range(vec![0.0, 1.0]));

    let mut plot = Plot::new();
    plot.add_trace(Bar::new(names, values).name("ROC AUC"));
    plot.set_layout(layout);
    plot
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::roc_curve;

    #[test]
    fn histogram_requires_aligned_inputs() {
        assert!(plot_score_histogram(&[0.1, 0.2], &[1], "Scores").is_err());
        assert!(plot_score_histogram(&[0.1, 0.2], &[1, 0], "Scores").is_ok());
    }

    #[test]
    fn roc_plot_embeds_as_html() {
        let curve = roc_curve(&[0, 1, 1, 0], &[0.2, 0.9, 0.6, 0.4]).unwrap();
        let html = plot_roc_curve(&curve, 1.0, "ROC").to_inline_html(Some("roc"));
        assert!(html.contains("roc"));
    }
}
