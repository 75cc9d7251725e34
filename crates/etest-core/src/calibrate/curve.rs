//! Text rendering of a false-positive curve.
//!
//! The plot is a scatter of empirical rate against candidate rate μ with a
//! horizontal dashed line at the nominal α. The y axis runs from 0 to a bit
//! above the larger of α and the highest observed rate.

use super::{CalibrationReport, FalsePositivePoint};

const MIN_WIDTH: usize = 8;
const MIN_HEIGHT: usize = 3;

impl CalibrationReport {
    /// ASCII scatter of the false-positive rate per μ.
    pub fn ascii_plot(&self, width: usize, height: usize) -> String {
        let width = width.max(MIN_WIDTH);
        let height = height.max(MIN_HEIGHT);
        let mut output = String::new();

        output.push_str(&format!(
            "False-Positive Rate (alpha={:.3}, mean={:.4}, experiments={})\n",
            self.alpha, self.overall_rate, self.experiments
        ));
        output.push_str(&"─".repeat(width + 7));
        output.push('\n');

        let y_max = y_axis_max(self.alpha, &self.points);
        let (x_min, x_max) = mu_range(&self.points);
        let mut grid = vec![vec![' '; width]; height];

        let alpha_row = row_for(self.alpha, y_max, height);
        for cell in grid[alpha_row].iter_mut() {
            *cell = '╌';
        }

        for point in &self.points {
            let x = column_for(point.mu, x_min, x_max, width);
            let y = row_for(point.rate, y_max, height);
            grid[y][x] = '●';
        }

        for (i, row) in grid.iter().enumerate() {
            let y_val = y_max * (1.0 - i as f64 / (height - 1) as f64);
            output.push_str(&format!("{:>5.3}│", y_val));
            output.extend(row.iter());
            if i == alpha_row {
                output.push_str(" α");
            }
            output.push('\n');
        }

        output.push_str("     └");
        output.push_str(&"─".repeat(width));
        output.push('\n');
        let left = format!("{}", x_min);
        let right = format!("{}", x_max);
        let gap = (width + 1).saturating_sub(left.len() + right.len());
        output.push_str(&format!("      {}{}{}\n", left, " ".repeat(gap), right));
        output.push_str(&format!("{}μ (true rate)\n", " ".repeat(width / 2)));
        output
    }

    /// Markdown table with one row per candidate rate.
    pub fn markdown_table(&self) -> String {
        let mut output = String::from("| μ | trials | positives | rate | 95% CI |\n");
        output.push_str("|---:|---:|---:|---:|:---|\n");
        for p in &self.points {
            output.push_str(&format!(
                "| {} | {} | {} | {:.4} | [{:.4}, {:.4}] |\n",
                p.mu, p.trials, p.positives, p.rate, p.interval.lower, p.interval.upper
            ));
        }
        output
    }
}

fn y_axis_max(alpha: f64, points: &[FalsePositivePoint]) -> f64 {
    let highest = points.iter().map(|p| p.rate).fold(alpha, f64::max);
    (highest * 1.25).clamp(f64::EPSILON, 1.0)
}

fn mu_range(points: &[FalsePositivePoint]) -> (f64, f64) {
    let min = points.iter().map(|p| p.mu).fold(f64::INFINITY, f64::min);
    let max = points.iter().map(|p| p.mu).fold(f64::NEG_INFINITY, f64::max);
    if min.is_finite() && max.is_finite() {
        (min, max)
    } else {
        (0.0, 0.0)
    }
}

fn column_for(mu: f64, x_min: f64, x_max: f64, width: usize) -> usize {
    let span = x_max - x_min;
    if span <= 0.0 {
        return 0;
    }
    let frac = ((mu - x_min) / span).clamp(0.0, 1.0);
    ((frac * (width - 1) as f64).round() as usize).min(width - 1)
}

fn row_for(value: f64, y_max: f64, height: usize) -> usize {
    let frac = (value / y_max).clamp(0.0, 1.0);
    let from_bottom = (frac * (height - 1) as f64).round() as usize;
    height - 1 - from_bottom.min(height - 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calibrate::{wilson_interval, Z_95};
    use crate::config::ConfigSource;

    fn point(mu: f64, positives: u64) -> FalsePositivePoint {
        FalsePositivePoint {
            mu,
            trials: 100,
            positives,
            rate: positives as f64 / 100.0,
            interval: wilson_interval(positives, 100, Z_95),
        }
    }

    fn report(points: Vec<FalsePositivePoint>) -> CalibrationReport {
        let experiments = points.len();
        let overall_rate = points.iter().map(|p| p.rate).sum::<f64>() / experiments.max(1) as f64;
        CalibrationReport {
            alpha: 0.1,
            n1: 1.0,
            n2: 1.0,
            seed: 0,
            total_trials: 100 * experiments as u64,
            points,
            overall_rate,
            experiments,
            config_source: ConfigSource::default(),
        }
    }

    #[test]
    fn plot_has_header_points_and_alpha_line() {
        let r = report(vec![point(1.0, 6), point(3.0, 9), point(5.0, 8)]);
        let plot = r.ascii_plot(40, 10);
        assert!(plot.contains("False-Positive Rate"));
        assert_eq!(plot.matches('●').count(), 3);
        assert!(plot.contains('╌'));
        assert!(plot.contains(" α"));
        assert!(plot.contains("μ (true rate)"));
    }

    #[test]
    fn plot_row_count_matches_height() {
        let r = report(vec![point(1.0, 10), point(2.0, 5)]);
        let plot = r.ascii_plot(30, 12);
        assert_eq!(plot.lines().filter(|l| l.contains('│')).count(), 12);
    }

    #[test]
    fn tiny_dimensions_are_widened() {
        let r = report(vec![point(2.0, 4)]);
        let plot = r.ascii_plot(0, 0);
        assert_eq!(plot.lines().filter(|l| l.contains('│')).count(), MIN_HEIGHT);
        assert_eq!(plot.matches('●').count(), 1);
    }

    #[test]
    fn empty_report_still_renders() {
        let r = report(Vec::new());
        let plot = r.ascii_plot(20, 5);
        assert_eq!(plot.matches('●').count(), 0);
        assert!(plot.contains('╌'));
    }

    #[test]
    fn column_mapping_spans_width() {
        assert_eq!(column_for(1.0, 1.0, 5.0, 41), 0);
        assert_eq!(column_for(5.0, 1.0, 5.0, 41), 40);
        assert_eq!(column_for(3.0, 1.0, 5.0, 41), 20);
        assert_eq!(column_for(3.0, 3.0, 3.0, 41), 0);
    }

    #[test]
    fn row_mapping_puts_zero_at_bottom() {
        assert_eq!(row_for(0.0, 0.5, 10), 9);
        assert_eq!(row_for(0.5, 0.5, 10), 0);
        assert_eq!(row_for(2.0, 0.5, 10), 0);
    }

    #[test]
    fn markdown_lists_every_point() {
        let r = report(vec![point(1.0, 6), point(2.0, 9)]);
        let md = r.markdown_table();
        assert_eq!(md.lines().count(), 4);
        assert!(md.contains("| 2 | 100 | 9 | 0.0900 |"));
    }
}
