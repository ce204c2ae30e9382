//! Trade selection and the calibration, performance and equity studies built on it.

pub mod bins;
pub mod calibration;
pub mod equity;
pub mod performance;
pub mod regression;
pub mod studies;
pub mod sweep;
pub mod trades;

pub use bins::{Breaks, Interval, PriceRange, TimeWindow, WindowBounds};
pub use calibration::{
    aggregate_by_bin, aggregate_by_bin_and_time, clip_tstats, count_heatmap, rows_for_price_bin,
    time_bin_totals, CalibrationRow, CountHeatmap, TimeBinTotal,
};
pub use equity::{daily_equity, DailyReturn, EquityCurve, EquitySummary};
pub use performance::{
    lost_trades, performance_table, profits, strategy_summary, PerformanceRow, ProfitRow,
    TradeType,
};
pub use regression::{fit_pnl_regression, pnl_by_price, PnlPoint};
pub use studies::{CalibrationOverTime, CalibrationStudy, PerformanceStudy, Study};
pub use sweep::{
    calibration_sweep, default_entry_times, fine_calibration, performance_sweep, select_ranges,
    CalibrationSweepRow, FineBin, PerformanceSweepRow,
};
pub use trades::{
    assign_price_bins, binned_quotes, first_trades, windowed_trades, within_price, BinFilter,
    PriceSelection, PriceSource, Trade,
};
