#![allow(clippy::format_push_string)]

use crate::summary::StrategySummary;

pub struct MetricsFormatter;

impl MetricsFormatter {
    #[must_use]
    pub fn format(summary: &StrategySummary) -> String {
        let mut output = String::new();

        output.push('\n');
        output.push_str("═══════════════════════════════════════════════════════════════\n");
        output.push_str(&format!("  {}\n", summary.name));
        output.push_str("═══════════════════════════════════════════════════════════════\n");
        output.push('\n');

        output.push_str("Trades\n");
        output.push_str("───────────────────────────────────────────────────────────────\n");
        output.push_str(&format!("Total Trades:          {}\n", summary.num_trades));
        output.push_str(&format!(
            "Win Rate:              {}\n",
            percent(summary.win_rate)
        ));
        output.push('\n');

        output.push_str("Returns\n");
        output.push_str("───────────────────────────────────────────────────────────────\n");
        output.push_str(&format!("Total P&L (scaled):    {:.2}\n", summary.total_pnl));
        output.push_str(&format!(
            "Return Mean:           {}\n",
            percent(summary.return_mean)
        ));
        output.push_str(&format!(
            "Return Std. Dev.:      {}\n",
            percent(summary.return_std)
        ));
        output.push_str(&format!(
            "Sharpe Ratio:          {}\n",
            ratio(summary.sharpe)
        ));

        if summary.max_drawdown.is_some() || summary.calmar.is_some() {
            output.push_str(&format!(
                "Max Drawdown:          {}\n",
                percent(summary.max_drawdown)
            ));
            output.push_str(&format!(
                "Calmar Ratio:          {}\n",
                ratio(summary.calmar)
            ));
        }

        output.push('\n');
        output.push_str("═══════════════════════════════════════════════════════════════\n");

        if summary.num_trades == 0 {
            output.push_str("\n⚠️  No trades matched the entry rule.\n");
            output.push_str("    Consider widening the price range or entry time.\n\n");
        }

        output
    }
}

fn percent(value: Option<f64>) -> String {
    value.map_or_else(|| "N/A".to_string(), |v| format!("{:.2}%", v * 100.0))
}

fn ratio(value: Option<f64>) -> String {
    value.map_or_else(|| "N/A".to_string(), |v| format!("{v:.4}"))
}
