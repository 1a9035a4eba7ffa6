//! The six-metric combined-weight formula, extracted verbatim (in meaning) from the
//! most elaborate `weight_calculator.py` in the original source: `status_failed > 0`
//! is a hard gate to weight 0, otherwise CPU/net/disk are blended 60/25/15 and
//! inverted so busier backends get smaller weights.

use crate::types::Metrics;

pub fn calculate_weight(metrics: &Metrics) -> u32 {
    if metrics.status_failed > 0.0 {
        return 0;
    }

    let cpu_factor = metrics.cpu.clamp(0.0, 100.0);
    let net_factor = ((metrics.net_in + metrics.net_out) / (1024.0 * 1024.0)).min(100.0);
    let disk_factor = ((metrics.disk_read + metrics.disk_write) / 100.0).min(100.0);

    let combined = 0.60 * cpu_factor + 0.25 * net_factor + 0.15 * disk_factor;
    let raw = (10.0 - combined / 10.0).round();
    raw.clamp(1.0, 10.0) as u32
}
