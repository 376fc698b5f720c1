//! The four quality gates.
//!
//! Each gate takes the thresholds of the tier being attempted, so one set of
//! functions serves every tier.

use crate::config::{band_points, GateThresholds, VolumeQualityConfig};
use crate::error::{Result, ScoringError};
use crate::types::{Gate, GateResult, IndicatorSnapshot};

/// Trend-structure gate.
///
/// Blocks only on severe bearish structure: a wide bearish EMA spread, price
/// far below every EMA, or RSI and ADX both under their floors. Milder
/// versions of the same signs cost score but pass.
pub fn trend_structure(
    snapshot: &IndicatorSnapshot,
    thresholds: &GateThresholds,
    warning_penalty: f64,
) -> GateResult {
    let gate = Gate::TrendStructure;
    let mut warnings: Vec<String> = Vec::new();

    if snapshot.has_bearish_ema_order() {
        if let (Some(e20), Some(e200)) = (snapshot.ema20, snapshot.ema200) {
            if e200 > 0.0 {
                let gap = (e200 - e20) / e200 * 100.0;
                if gap > thresholds.max_bearish_ema_gap_pct {
                    return GateResult::block(
                        gate,
                        0.0,
                        format!(
                            "Bearish EMA structure: EMA20 < EMA50 < EMA200 with {:.1}% spread (max {:.1}%)",
                            gap, thresholds.max_bearish_ema_gap_pct
                        ),
                    );
                }
                warnings.push(format!("mild bearish EMA ordering ({:.1}% spread)", gap));
            }
        }
    }

    if let Some(price) = snapshot.price {
        let lowest_ema = [snapshot.ema20, snapshot.ema50, snapshot.ema200]
            .into_iter()
            .flatten()
            .filter(|e| *e > 0.0)
            .fold(None, |acc: Option<f64>, e| Some(acc.map_or(e, |a| a.min(e))));

        if let Some(lowest) = lowest_ema {
            if price < lowest {
                let below = (lowest - price) / lowest * 100.0;
                if below > thresholds.max_below_emas_pct {
                    return GateResult::block(
                        gate,
                        0.0,
                        format!(
                            "Price {:.1}% below all EMAs (max {:.1}%)",
                            below, thresholds.max_below_emas_pct
                        ),
                    );
                }
                warnings.push(format!("price {:.1}% below all EMAs", below));
            } else if snapshot.ema20.map_or(false, |e20| price < e20) {
                warnings.push("price below EMA20".to_string());
            }
        }
    }

    if let (Some(rsi), Some(adx)) = (snapshot.rsi, snapshot.adx) {
        let weak_rsi = rsi < thresholds.weak_rsi_floor;
        let weak_adx = adx < thresholds.weak_adx_floor;
        if weak_rsi && weak_adx {
            return GateResult::block(
                gate,
                0.0,
                format!(
                    "Weak momentum: RSI {:.1} < {:.0} and ADX {:.1} < {:.0}",
                    rsi, thresholds.weak_rsi_floor, adx, thresholds.weak_adx_floor
                ),
            );
        }
        if weak_rsi {
            warnings.push(format!("RSI {:.1} below floor", rsi));
        }
        if weak_adx {
            warnings.push(format!("ADX {:.1} below floor", adx));
        }
    }

    let score = 100.0 - warning_penalty * warnings.len() as f64;
    if warnings.is_empty() {
        GateResult::pass(gate, score, "Trend structure healthy")
    } else {
        GateResult::pass(gate, score, format!("Trend structure passed with warnings: {}", warnings.join(", ")))
    }
}

/// Risk-factor gate.
///
/// Counts overbought RSI, weak money flow and excessive ATR volatility, and
/// blocks when the count exceeds the tier's tolerance. Fails with an internal
/// error when ATR is known but the price is not positive.
pub fn risk_factors(
    snapshot: &IndicatorSnapshot,
    thresholds: &GateThresholds,
    flag_penalty: f64,
) -> Result<GateResult> {
    let gate = Gate::RiskFactor;
    let mut flags: Vec<String> = Vec::new();

    if let Some(rsi) = snapshot.rsi {
        if rsi > thresholds.rsi_overbought {
            flags.push(format!("RSI {:.1} overbought", rsi));
        }
    }

    if let Some(mfi) = snapshot.mfi {
        if mfi < thresholds.mfi_weak_below {
            flags.push(format!("MFI {:.1} weak money flow", mfi));
        }
    }

    if let (Some(atr), Some(price)) = (snapshot.atr, snapshot.price) {
        if price <= 0.0 {
            return Err(ScoringError::Internal(format!(
                "cannot derive ATR volatility for {} from price {}",
                snapshot.symbol, price
            )));
        }
        let atr_pct = atr / price * 100.0;
        if atr_pct > thresholds.max_atr_pct {
            flags.push(format!("ATR {:.1}% of price", atr_pct));
        }
    }

    let score = 100.0 - flag_penalty * flags.len() as f64;
    if flags.len() as u32 > thresholds.max_risk_flags {
        Ok(GateResult::block(
            gate,
            score,
            format!(
                "{} risk flag(s), {} tolerated: {}",
                flags.len(),
                thresholds.max_risk_flags,
                flags.join(", ")
            ),
        ))
    } else if flags.is_empty() {
        Ok(GateResult::pass(gate, score, "No risk flags"))
    } else {
        Ok(GateResult::pass(gate, score, format!("Tolerated risk: {}", flags.join(", "))))
    }
}

/// Volume-quality sub-score: volume bands + money-flow bands + baseline.
pub fn volume_quality_score(snapshot: &IndicatorSnapshot, config: &VolumeQualityConfig) -> f64 {
    let volume_points = match snapshot.volume_ratio {
        Some(ratio) => band_points(&config.volume_bands, ratio).unwrap_or(0.0),
        None => config.volume_missing_points,
    };

    let mfi_points = match snapshot.mfi {
        Some(mfi) if mfi >= config.mfi_healthy_low && mfi <= config.mfi_healthy_high => {
            config.mfi_healthy_points
        }
        Some(mfi) if mfi >= config.mfi_fair_low && mfi <= config.mfi_fair_high => config.mfi_fair_points,
        Some(_) => config.mfi_poor_points,
        None => config.mfi_missing_points,
    };

    (volume_points + mfi_points + config.consistency_baseline).min(100.0)
}

/// Volume-quality gate.
pub fn volume_quality(
    snapshot: &IndicatorSnapshot,
    thresholds: &GateThresholds,
    config: &VolumeQualityConfig,
) -> GateResult {
    let score = volume_quality_score(snapshot, config);
    if score < thresholds.min_volume_quality {
        GateResult::block(
            Gate::VolumeQuality,
            score,
            format!(
                "Volume quality {:.0} below minimum {:.0}",
                score, thresholds.min_volume_quality
            ),
        )
    } else {
        GateResult::pass(Gate::VolumeQuality, score, format!("Volume quality {:.0}", score))
    }
}

/// Confirmation-count gate: volume, positive MACD histogram, RSI in band.
/// Missing indicators never confirm.
pub fn confirmations(snapshot: &IndicatorSnapshot, thresholds: &GateThresholds) -> GateResult {
    let mut confirmed: Vec<&str> = Vec::new();

    if snapshot
        .volume_ratio
        .map_or(false, |v| v >= thresholds.confirm_volume_ratio)
    {
        confirmed.push("volume");
    }
    if snapshot.macd.map_or(false, |m| m.histogram > 0.0) {
        confirmed.push("macd");
    }
    if snapshot
        .rsi
        .map_or(false, |r| r >= thresholds.confirm_rsi_low && r <= thresholds.confirm_rsi_high)
    {
        confirmed.push("rsi");
    }

    let count = confirmed.len() as u32;
    let score = count as f64 / 3.0 * 100.0;
    let detail = if confirmed.is_empty() {
        "none".to_string()
    } else {
        confirmed.join(", ")
    };

    if count < thresholds.required_confirmations {
        GateResult::block(
            Gate::Confirmation,
            score,
            format!(
                "{} of {} required confirmations ({})",
                count, thresholds.required_confirmations, detail
            ),
        )
    } else {
        GateResult::pass(Gate::Confirmation, score, format!("{} confirmations ({})", count, detail))
    }
}
