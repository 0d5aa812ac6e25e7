//! Terminal rendering for analysis reports.
//!
//! A vertical card in three sections (financial estimate, priority,
//! risk drivers) with a signed-bar force plot: the strongest SHAP
//! contributions shown as bars scaled to the largest magnitude, positive
//! drivers pushing the reserve up, negative pulling it down.

use claimlens_core::feature_name;

use crate::analyze::AnalysisReport;
use crate::artifacts::ArtifactBundle;

const BAR_WIDTH: usize = 28;

/// Print a full report card for one analyzed narrative.
pub fn print_report(report: &AnalysisReport, top: usize) {
    println!("=== Claim Reserve Analysis ===");
    println!("{}", report.narrative);
    println!();

    println!("Financial Estimate");
    println!(
        "  {:<26} {}",
        "recommended_reserve",
        format_usd(report.reserve)
    );
    println!();

    println!("Priority");
    println!("  {:<26} {}", "tier", report.tier.as_str());
    println!("  {:<26} {}", "assessment", report.assessment);
    println!();

    println!("Risk Drivers (SHAP)");
    println!(
        "  {:<26} {}",
        "baseline",
        format_usd(report.attribution.baseline)
    );
    for line in force_plot_lines(report, top) {
        println!("  {line}");
    }
    println!("  {:<26} {}", "model_output", format_usd(report.raw_margin));
    println!();
}

/// Render the top-N contributions as signed bars. Contributions of
/// exactly zero are omitted rather than drawn as a spurious bar.
fn force_plot_lines(report: &AnalysisReport, top: usize) -> Vec<String> {
    let drivers = report.attribution.top_drivers(top);
    let max_magnitude = drivers
        .first()
        .map(|&(_, v)| v.abs())
        .unwrap_or(0.0)
        .max(f32::EPSILON);

    drivers
        .iter()
        .filter(|&&(_, value)| value != 0.0)
        .map(|&(feature, value)| {
            let filled = ((value.abs() / max_magnitude) * BAR_WIDTH as f32).round() as usize;
            let bar: String = "█".repeat(filled.max(1));
            format!(
                "{:<10} {:>+12.2} {}",
                feature_name(feature),
                value,
                if value >= 0.0 {
                    format!("▶ {bar}")
                } else {
                    format!("◀ {bar}")
                }
            )
        })
        .collect()
}

/// Summary card for the loaded artifact bundle.
pub fn print_inspect(bundle: &ArtifactBundle) {
    println!("=== Loaded Artifacts ===");
    println!();

    println!("Regression Model");
    println!("  {:<26} {}", "trees", bundle.booster.num_trees());
    println!("  {:<26} {}", "features", bundle.booster.num_features());
    println!("  {:<26} {}", "base_score", bundle.booster.base_score());
    println!(
        "  {:<26} {}",
        "expected_value",
        format_usd(bundle.booster.expected_value())
    );
    println!();

    println!("Embedding Model");
    println!("  {:<26} {}", "dimension", bundle.embedder.dim());
    println!();

    println!("Explainer");
    println!(
        "  {:<26} {}",
        "perturbation",
        bundle.explainer.feature_perturbation
    );
    println!(
        "  {:<26} {}",
        "expected_value",
        format_usd(bundle.explainer.expected_value)
    );
    println!();

    println!("Background Data");
    println!("  {:<26} {}", "rows", bundle.background.len());
    println!("  {:<26} {}", "dimension", bundle.background.dim());
    println!();
}

/// `1234567.891` → `$1,234,567.89`; negatives keep the sign outside.
pub fn format_usd(amount: f64) -> String {
    let negative = amount < 0.0;
    let cents = (amount.abs() * 100.0).round() as u64;
    let dollars = cents / 100;
    let fraction = cents % 100;

    let digits = dollars.to_string();
    let mut grouped = String::new();
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }

    if negative {
        format!("-${grouped}.{fraction:02}")
    } else {
        format!("${grouped}.{fraction:02}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use claimlens_ai::Attribution;
    use claimlens_core::PriorityTier;

    fn report() -> AnalysisReport {
        AnalysisReport {
            narrative: "test".into(),
            reserve: 66_000.0,
            raw_margin: 66_000.0,
            tier: PriorityTier::High,
            assessment: PriorityTier::High.assessment(),
            attribution: Attribution {
                values: vec![1_000.0, -2_500.0, 40.0, 0.0],
                baseline: 67_460.0,
            },
        }
    }

    #[test]
    fn usd_formatting_groups_thousands() {
        assert_eq!(format_usd(0.0), "$0.00");
        assert_eq!(format_usd(999.5), "$999.50");
        assert_eq!(format_usd(48_210.754), "$48,210.75");
        assert_eq!(format_usd(1_234_567.891), "$1,234,567.89");
        assert_eq!(format_usd(-950.1), "-$950.10");
    }

    #[test]
    fn force_plot_orders_by_magnitude() {
        let lines = force_plot_lines(&report(), 3);
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("nlp_1"), "strongest first: {}", lines[0]);
        assert!(lines[0].contains('◀'), "negative marker: {}", lines[0]);
        assert!(lines[1].starts_with("nlp_0"));
        assert!(lines[1].contains('▶'));
    }

    #[test]
    fn force_plot_omits_zero_contributions() {
        let lines = force_plot_lines(&report(), 4);
        assert_eq!(lines.len(), 3, "nlp_3 contributes 0.0 and is skipped");
        assert!(lines.iter().all(|l| !l.starts_with("nlp_3")));
    }

    #[test]
    fn force_plot_scales_to_largest_bar() {
        let lines = force_plot_lines(&report(), 2);
        let bars: Vec<usize> = lines
            .iter()
            .map(|l| l.matches('█').count())
            .collect();
        assert_eq!(bars[0], BAR_WIDTH);
        assert!(bars[1] < BAR_WIDTH);
        assert!(bars[1] >= 1);
    }
}
