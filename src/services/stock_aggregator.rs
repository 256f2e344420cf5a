// Stock Aggregator
// A product's canonical stock is the sum of what each marketplace holds.

use std::collections::BTreeMap;

use crate::models::product::Platform;

/// Sum per-platform stock into the product total.
///
/// Platforms absent from the map count as zero. Each figure is widened before
/// summing, so the result cannot overflow or go negative.
pub fn compute_total_stock(platform_stocks: &BTreeMap<Platform, u32>) -> u64 {
    Platform::ALL
        .iter()
        .map(|platform| platform_stocks.get(platform).copied().unwrap_or(0) as u64)
        .sum()
}
