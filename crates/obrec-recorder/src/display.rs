//! Plain-text rendering for the console. Advisory only; nothing here is part
//! of the persisted data.

use std::fmt::Write;

use obrec_book::Snapshot;
use rust_decimal::Decimal;

use crate::report::RecorderReport;

const RULE_WIDTH: usize = 72;

fn opt(value: Option<Decimal>) -> String {
    value.map_or_else(|| "-".to_string(), |v| v.normalize().to_string())
}

/// Top `levels` of a snapshot: asks high to low, a spread line, then bids
/// high to low, each with its notional value.
pub fn render_snapshot(snapshot: &Snapshot, levels: usize) -> String {
    let mut out = String::new();
    let rule = "-".repeat(RULE_WIDTH);

    let _ = writeln!(
        out,
        "{} seq={} {}",
        snapshot.market,
        snapshot
            .sequence_id
            .map_or_else(|| "-".to_string(), |s| s.to_string()),
        snapshot.timestamp.format("%H:%M:%S%.3f")
    );
    let _ = writeln!(out, "{}", rule);
    let _ = writeln!(out, "{:>6} {:>20} {:>20} {:>20}", "", "price", "size", "notional");

    for level in snapshot.asks.iter().take(levels).rev() {
        let _ = writeln!(
            out,
            "{:>6} {:>20} {:>20} {:>20}",
            "ASK",
            level.price.normalize(),
            level.size.normalize(),
            opt(level.notional().map(|n| n.round_dp(2)))
        );
    }

    let _ = writeln!(
        out,
        "{:>6} spread={} ({}%) mid={}",
        "",
        opt(snapshot.spread),
        opt(snapshot.spread_percent.map(|p| p.round_dp(4))),
        opt(snapshot.mid_price)
    );

    for level in snapshot.bids.iter().take(levels) {
        let _ = writeln!(
            out,
            "{:>6} {:>20} {:>20} {:>20}",
            "BID",
            level.price.normalize(),
            level.size.normalize(),
            opt(level.notional().map(|n| n.round_dp(2)))
        );
    }
    let _ = write!(out, "{}", rule);
    out
}

pub fn render_report(report: &RecorderReport) -> String {
    let mut out = String::new();
    let rule = "=".repeat(RULE_WIDTH);
    let title = if report.is_final {
        "Final recording report"
    } else {
        "Recording statistics"
    };

    let _ = writeln!(out, "{}", rule);
    let _ = writeln!(
        out,
        "{} - {}",
        title,
        report.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    let _ = writeln!(out, "{}", rule);
    let _ = writeln!(
        out,
        "Running: {:.2} h ({} s)",
        report.elapsed.as_secs_f64() / 3600.0,
        report.elapsed.as_secs()
    );

    for adapter in &report.adapters {
        let _ = writeln!(
            out,
            "  {:<32} {:<16} {:>12} msgs {:>10.1} msg/s  buffer {:>6}  reconnects {}",
            adapter.id,
            adapter.state.as_str(),
            adapter.messages,
            adapter.rate,
            adapter.buffer_depth,
            adapter.reconnects
        );
    }

    let _ = writeln!(out);
    if report.is_final {
        let _ = writeln!(out, "Total messages: {}", report.total_messages());
        let _ = writeln!(out, "Average rate:   {:.1} msg/s", report.average_rate());
        let _ = writeln!(out, "Data directory: {}", report.data_dir.display());
    } else {
        let _ = writeln!(out, "Total rate: {:.1} msg/s", report.total_rate());
    }
    let _ = write!(out, "{}", rule);
    out
}
