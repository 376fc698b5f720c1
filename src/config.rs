use serde::de::{DeserializeOwned, Deserializer, Error as _};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::env;
use std::str::FromStr;

use crate::error::{Result, ScoringError};
use crate::types::Tier;

/// Named confluence rubric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RubricKind {
    /// Strict scalping rubric.
    #[default]
    Momentum,
    /// Looser adaptive rubric.
    Adaptive,
}

impl FromStr for RubricKind {
    type Err = ScoringError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "momentum" | "scalping" => Ok(RubricKind::Momentum),
            "adaptive" => Ok(RubricKind::Adaptive),
            other => Err(ScoringError::Config(format!("unknown rubric '{}'", other))),
        }
    }
}

/// Account risk appetite, scales position size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Conservative,
    #[default]
    Balanced,
    Aggressive,
}

impl RiskLevel {
    pub fn position_multiplier(&self) -> f64 {
        match self {
            RiskLevel::Conservative => 0.5,
            RiskLevel::Balanced => 1.0,
            RiskLevel::Aggressive => 1.5,
        }
    }
}

impl FromStr for RiskLevel {
    type Err = ScoringError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "conservative" => Ok(RiskLevel::Conservative),
            "balanced" => Ok(RiskLevel::Balanced),
            "aggressive" => Ok(RiskLevel::Aggressive),
            other => Err(ScoringError::Config(format!("unknown risk level '{}'", other))),
        }
    }
}

/// Points awarded when a value is at or above `min`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PointBand {
    pub min: f64,
    pub points: f64,
}

impl PointBand {
    pub const fn new(min: f64, points: f64) -> Self {
        Self { min, points }
    }
}

/// Points for the first band `value` reaches. Bands are ordered by
/// descending `min`.
pub fn band_points(bands: &[PointBand], value: f64) -> Option<f64> {
    bands.iter().find(|band| value >= band.min).map(|band| band.points)
}

/// One value per approved tier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TierTable<T> {
    pub premium: T,
    pub moderate: T,
    pub conservative: T,
}

impl<T> TierTable<T> {
    pub fn get(&self, tier: Tier) -> Option<&T> {
        match tier {
            Tier::Premium => Some(&self.premium),
            Tier::Moderate => Some(&self.moderate),
            Tier::Conservative => Some(&self.conservative),
            Tier::Rejected => None,
        }
    }

    /// Entries in cascade order.
    pub fn iter(&self) -> impl Iterator<Item = (Tier, &T)> {
        [
            (Tier::Premium, &self.premium),
            (Tier::Moderate, &self.moderate),
            (Tier::Conservative, &self.conservative),
        ]
        .into_iter()
    }
}

/// Expected-move contribution per earned rubric point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MoveWeights {
    pub rsi: f64,
    pub macd: f64,
    pub ema: f64,
    pub volume: f64,
    pub adx: f64,
    pub extension: f64,
}

impl Default for MoveWeights {
    fn default() -> Self {
        Self {
            rsi: 0.02,
            macd: 0.03,
            ema: 0.03,
            volume: 0.04,
            adx: 0.03,
            extension: 0.02,
        }
    }
}

/// Point allotments of a confluence rubric. Missing fields take the
/// momentum preset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RubricConfig {
    // RSI
    pub rsi_sweet_low: f64,
    pub rsi_sweet_high: f64,
    pub rsi_sweet_points: f64,
    pub rsi_ok_low: f64,
    pub rsi_ok_high: f64,
    pub rsi_ok_points: f64,
    pub rsi_extreme_low: f64,
    pub rsi_extreme_high: f64,
    pub rsi_extreme_penalty: f64,
    pub rsi_missing_points: f64,

    // MACD
    pub macd_bullish_points: f64,
    pub macd_near_points: f64,
    pub macd_missing_points: f64,

    // EMA structure
    pub ema_aligned_points: f64,
    pub ema_above_both_points: f64,
    pub ema_above_one_points: f64,
    pub ema_missing_points: f64,

    // Volume ratio
    pub volume_bands: Vec<PointBand>,
    pub volume_below_points: f64,
    pub volume_missing_points: f64,

    // ADX
    pub adx_bands: Vec<PointBand>,
    pub adx_below_points: f64,
    pub adx_missing_points: f64,

    // Price extension above EMAs (percent)
    pub ema20_extension_pct: f64,
    pub ema20_extension_points: f64,
    pub ema50_extension_pct: f64,
    pub ema50_extension_points: f64,

    pub move_weights: MoveWeights,
    /// Floor for the expected move (percent).
    pub min_expected_move: f64,
}

impl RubricConfig {
    /// Strict scalping rubric.
    pub fn momentum() -> Self {
        Self {
            rsi_sweet_low: 35.0,
            rsi_sweet_high: 50.0,
            rsi_sweet_points: 25.0,
            rsi_ok_low: 25.0,
            rsi_ok_high: 65.0,
            rsi_ok_points: 12.0,
            rsi_extreme_low: 20.0,
            rsi_extreme_high: 85.0,
            rsi_extreme_penalty: -10.0,
            rsi_missing_points: 8.0,
            macd_bullish_points: 20.0,
            macd_near_points: 10.0,
            macd_missing_points: 8.0,
            ema_aligned_points: 20.0,
            ema_above_both_points: 14.0,
            ema_above_one_points: 8.0,
            ema_missing_points: 6.0,
            volume_bands: vec![
                PointBand::new(2.0, 20.0),
                PointBand::new(1.5, 15.0),
                PointBand::new(1.0, 8.0),
            ],
            volume_below_points: -5.0,
            volume_missing_points: 5.0,
            adx_bands: vec![
                PointBand::new(25.0, 15.0),
                PointBand::new(20.0, 10.0),
                PointBand::new(15.0, 5.0),
            ],
            adx_below_points: 0.0,
            adx_missing_points: 5.0,
            ema20_extension_pct: 1.5,
            ema20_extension_points: 5.0,
            ema50_extension_pct: 5.0,
            ema50_extension_points: 5.0,
            move_weights: MoveWeights::default(),
            min_expected_move: 1.0,
        }
    }

    /// Looser adaptive rubric.
    pub fn adaptive() -> Self {
        Self {
            rsi_sweet_low: 25.0,
            rsi_sweet_high: 55.0,
            rsi_sweet_points: 20.0,
            rsi_ok_low: 20.0,
            rsi_ok_high: 70.0,
            rsi_ok_points: 10.0,
            rsi_extreme_low: 20.0,
            rsi_extreme_high: 85.0,
            rsi_extreme_penalty: -5.0,
            rsi_missing_points: 10.0,
            macd_bullish_points: 12.0,
            macd_near_points: 8.0,
            macd_missing_points: 10.0,
            ema_aligned_points: 15.0,
            ema_above_both_points: 10.0,
            ema_above_one_points: 6.0,
            ema_missing_points: 8.0,
            volume_bands: vec![
                PointBand::new(1.5, 15.0),
                PointBand::new(1.2, 10.0),
                PointBand::new(0.8, 5.0),
            ],
            volume_below_points: -2.0,
            volume_missing_points: 6.0,
            adx_bands: vec![
                PointBand::new(25.0, 12.0),
                PointBand::new(20.0, 8.0),
                PointBand::new(15.0, 4.0),
            ],
            adx_below_points: 0.0,
            adx_missing_points: 6.0,
            ema20_extension_pct: 1.0,
            ema20_extension_points: 4.0,
            ema50_extension_pct: 3.0,
            ema50_extension_points: 4.0,
            move_weights: MoveWeights::default(),
            min_expected_move: 1.0,
        }
    }
}

impl Default for RubricConfig {
    fn default() -> Self {
        Self::momentum()
    }
}

/// Minimum requirements for the classifier to assign a tier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TierRequirements {
    pub min_score: f64,
    pub rsi_low: f64,
    pub rsi_high: f64,
    pub min_adx: f64,
    pub min_volume_ratio: f64,
}

impl Default for TierTable<TierRequirements> {
    fn default() -> Self {
        Self {
            premium: TierRequirements {
                min_score: 75.0,
                rsi_low: 30.0,
                rsi_high: 65.0,
                min_adx: 25.0,
                min_volume_ratio: 1.5,
            },
            moderate: TierRequirements {
                min_score: 60.0,
                rsi_low: 25.0,
                rsi_high: 70.0,
                min_adx: 20.0,
                min_volume_ratio: 1.2,
            },
            conservative: TierRequirements {
                min_score: 45.0,
                rsi_low: 20.0,
                rsi_high: 75.0,
                min_adx: 15.0,
                min_volume_ratio: 0.8,
            },
        }
    }
}

/// Values assumed for missing supplementary indicators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndicatorDefaults {
    pub rsi: f64,
    pub adx: f64,
    pub volume_ratio: f64,
    pub mfi: f64,
}

impl Default for IndicatorDefaults {
    fn default() -> Self {
        Self {
            rsi: 50.0,
            adx: 20.0,
            volume_ratio: 1.0,
            mfi: 50.0,
        }
    }
}

/// Per-tier thresholds for the four quality gates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateThresholds {
    // Trend structure
    /// Bearish EMA spread (ema200 - ema20) / ema200 above which the gate blocks.
    pub max_bearish_ema_gap_pct: f64,
    /// Distance below the lowest EMA above which the gate blocks.
    pub max_below_emas_pct: f64,
    pub weak_rsi_floor: f64,
    pub weak_adx_floor: f64,

    // Risk factors
    pub rsi_overbought: f64,
    pub mfi_weak_below: f64,
    pub max_atr_pct: f64,
    pub max_risk_flags: u32,

    // Volume quality
    pub min_volume_quality: f64,

    // Confirmations
    pub confirm_volume_ratio: f64,
    pub confirm_rsi_low: f64,
    pub confirm_rsi_high: f64,
    pub required_confirmations: u32,
}

impl Default for TierTable<GateThresholds> {
    fn default() -> Self {
        Self {
            premium: GateThresholds {
                max_bearish_ema_gap_pct: 2.0,
                max_below_emas_pct: 1.0,
                weak_rsi_floor: 40.0,
                weak_adx_floor: 20.0,
                rsi_overbought: 75.0,
                mfi_weak_below: 35.0,
                max_atr_pct: 8.0,
                max_risk_flags: 0,
                min_volume_quality: 70.0,
                confirm_volume_ratio: 1.2,
                confirm_rsi_low: 30.0,
                confirm_rsi_high: 70.0,
                required_confirmations: 3,
            },
            moderate: GateThresholds {
                max_bearish_ema_gap_pct: 5.0,
                max_below_emas_pct: 3.0,
                weak_rsi_floor: 35.0,
                weak_adx_floor: 15.0,
                rsi_overbought: 80.0,
                mfi_weak_below: 35.0,
                max_atr_pct: 8.0,
                max_risk_flags: 1,
                min_volume_quality: 55.0,
                confirm_volume_ratio: 1.0,
                confirm_rsi_low: 25.0,
                confirm_rsi_high: 75.0,
                required_confirmations: 2,
            },
            conservative: GateThresholds {
                max_bearish_ema_gap_pct: 8.0,
                max_below_emas_pct: 5.0,
                weak_rsi_floor: 30.0,
                weak_adx_floor: 12.0,
                rsi_overbought: 80.0,
                mfi_weak_below: 35.0,
                max_atr_pct: 12.0,
                max_risk_flags: 2,
                min_volume_quality: 40.0,
                confirm_volume_ratio: 0.8,
                confirm_rsi_low: 20.0,
                confirm_rsi_high: 80.0,
                required_confirmations: 1,
            },
        }
    }
}

/// Sub-score rubric of the volume-quality gate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VolumeQualityConfig {
    pub volume_bands: Vec<PointBand>,
    pub volume_missing_points: f64,
    pub mfi_healthy_low: f64,
    pub mfi_healthy_high: f64,
    pub mfi_healthy_points: f64,
    pub mfi_fair_low: f64,
    pub mfi_fair_high: f64,
    pub mfi_fair_points: f64,
    pub mfi_poor_points: f64,
    pub mfi_missing_points: f64,
    pub consistency_baseline: f64,
}

impl Default for VolumeQualityConfig {
    fn default() -> Self {
        Self {
            volume_bands: vec![
                PointBand::new(2.0, 50.0),
                PointBand::new(1.5, 40.0),
                PointBand::new(1.2, 30.0),
                PointBand::new(1.0, 20.0),
                PointBand::new(0.8, 10.0),
            ],
            volume_missing_points: 20.0,
            mfi_healthy_low: 40.0,
            mfi_healthy_high: 80.0,
            mfi_healthy_points: 30.0,
            mfi_fair_low: 30.0,
            mfi_fair_high: 90.0,
            mfi_fair_points: 15.0,
            mfi_poor_points: 5.0,
            mfi_missing_points: 15.0,
            consistency_baseline: 20.0,
        }
    }
}

/// Quality filter cascade settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    #[serde(deserialize_with = "overlay_default")]
    pub gates: TierTable<GateThresholds>,
    pub volume_quality: VolumeQualityConfig,
    /// Trend gate score lost per mild bearish warning.
    pub trend_warning_penalty: f64,
    /// Risk gate score lost per risk flag.
    pub risk_flag_penalty: f64,
    /// Confidence multiplier applied when the cascade fails internally.
    pub error_confidence_factor: f64,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            gates: TierTable::default(),
            volume_quality: VolumeQualityConfig::default(),
            trend_warning_penalty: 15.0,
            risk_flag_penalty: 25.0,
            error_confidence_factor: 0.5,
        }
    }
}

/// Entry-enhancement overlay settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnhancementConfig {
    pub enabled: bool,
    /// Entry score needed to attach targets (0-100).
    pub min_entry_score: f64,

    pub rsi_good_low: f64,
    pub rsi_good_high: f64,
    pub rsi_good_points: f64,
    pub rsi_fair_low: f64,
    pub rsi_fair_high: f64,
    pub rsi_fair_points: f64,
    pub macd_positive_points: f64,
    pub macd_missing_points: f64,
    pub above_ema20_points: f64,
    pub ema_missing_points: f64,
    pub volume_bands: Vec<PointBand>,
    pub volume_missing_points: f64,
    pub adx_bands: Vec<PointBand>,
    pub adx_missing_points: f64,
    /// Price in the lower half of the Bollinger band.
    pub bb_lower_half_points: f64,
    pub bb_missing_points: f64,

    /// Profit targets as fractions of the expected move.
    pub target_fractions: Vec<f64>,
    pub stop_fraction: f64,
    pub min_stop_percent: f64,
    pub max_stop_percent: f64,
    pub min_hold_hours: f64,
    pub max_hold_hours: f64,
}

impl Default for EnhancementConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min_entry_score: 60.0,
            rsi_good_low: 30.0,
            rsi_good_high: 70.0,
            rsi_good_points: 25.0,
            rsi_fair_low: 20.0,
            rsi_fair_high: 80.0,
            rsi_fair_points: 15.0,
            macd_positive_points: 20.0,
            macd_missing_points: 10.0,
            above_ema20_points: 15.0,
            ema_missing_points: 8.0,
            volume_bands: vec![PointBand::new(1.2, 20.0), PointBand::new(0.8, 10.0)],
            volume_missing_points: 10.0,
            adx_bands: vec![PointBand::new(20.0, 10.0), PointBand::new(12.0, 5.0)],
            adx_missing_points: 5.0,
            bb_lower_half_points: 10.0,
            bb_missing_points: 5.0,
            target_fractions: vec![0.6, 0.9, 1.0],
            stop_fraction: 0.4,
            min_stop_percent: 0.5,
            max_stop_percent: 2.0,
            min_hold_hours: 1.5,
            max_hold_hours: 6.0,
        }
    }
}

/// Position sizing and exit levels of the final signal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SizingConfig {
    /// Position size per tier before the risk-level multiplier (percent).
    pub base_position_percent: TierTable<f64>,
    pub stop_loss_percent: TierTable<f64>,
    pub max_position_percent: f64,
    pub risk_level: RiskLevel,
    /// Emit SELL for decisively bearish snapshots the classifier rejected.
    pub emit_sell_signals: bool,
    /// RSI must sit below this for a SELL.
    pub sell_rsi_below: f64,
}

impl Default for SizingConfig {
    fn default() -> Self {
        Self {
            base_position_percent: TierTable {
                premium: 5.0,
                moderate: 3.5,
                conservative: 2.0,
            },
            stop_loss_percent: TierTable {
                premium: 2.0,
                moderate: 2.5,
                conservative: 3.0,
            },
            max_position_percent: 5.0,
            risk_level: RiskLevel::Balanced,
            emit_sell_signals: true,
            sell_rsi_below: 50.0,
        }
    }
}

/// Indicator supplier boundary settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SupplierConfig {
    pub timeframe: String,
    pub exchange: String,
    pub request_timeout_ms: u64,
    /// Wait before the single retry after a rate limit.
    pub retry_backoff_ms: u64,
    pub cache_ttl_secs: u64,
    /// How long the batcher collects requests before one bulk call.
    pub batch_window_ms: u64,
    pub max_batch_size: usize,
}

impl Default for SupplierConfig {
    fn default() -> Self {
        Self {
            timeframe: "1h".to_string(),
            exchange: "binance".to_string(),
            request_timeout_ms: 5_000,
            retry_backoff_ms: 1_000,
            cache_ttl_secs: 600,
            batch_window_ms: 25,
            max_batch_size: 20,
        }
    }
}

/// Scorer configuration.
///
/// Deserializing merges the input over the defaults at every nesting level,
/// so a JSON config only needs the thresholds it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScorerConfig {
    /// Rubric used for the confluence score.
    pub rubric: RubricKind,
    #[serde(deserialize_with = "overlay_default")]
    pub momentum: RubricConfig,
    #[serde(deserialize_with = "overlay_adaptive")]
    pub adaptive: RubricConfig,
    #[serde(deserialize_with = "overlay_default")]
    pub classifier: TierTable<TierRequirements>,
    #[serde(deserialize_with = "overlay_default")]
    pub defaults: IndicatorDefaults,
    #[serde(deserialize_with = "overlay_default")]
    pub filter: FilterConfig,
    #[serde(deserialize_with = "overlay_default")]
    pub enhancement: EnhancementConfig,
    #[serde(deserialize_with = "overlay_default")]
    pub sizing: SizingConfig,
    #[serde(deserialize_with = "overlay_default")]
    pub supplier: SupplierConfig,
    /// Recent signals kept for rolling performance stats.
    pub history_capacity: usize,
}

impl Default for ScorerConfig {
    fn default() -> Self {
        Self {
            rubric: RubricKind::Momentum,
            momentum: RubricConfig::momentum(),
            adaptive: RubricConfig::adaptive(),
            classifier: TierTable::default(),
            defaults: IndicatorDefaults::default(),
            filter: FilterConfig::default(),
            enhancement: EnhancementConfig::default(),
            sizing: SizingConfig::default(),
            supplier: SupplierConfig::default(),
            history_capacity: 100,
        }
    }
}

/// Lay `overlay` over `base`: objects merge key by key, anything else
/// replaces.
fn merge_json(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Object(base), Value::Object(overlay)) => {
            for (key, value) in overlay {
                merge_json(base.entry(key).or_insert(Value::Null), value);
            }
        }
        (base, overlay) => *base = overlay,
    }
}

fn overlay_on<'de, D, T>(deserializer: D, base: T) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Serialize + DeserializeOwned,
{
    let overlay = Value::deserialize(deserializer)?;
    let mut merged = serde_json::to_value(base).map_err(D::Error::custom)?;
    merge_json(&mut merged, overlay);
    serde_json::from_value(merged).map_err(D::Error::custom)
}

fn overlay_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Serialize + DeserializeOwned,
{
    overlay_on(deserializer, T::default())
}

fn overlay_adaptive<'de, D>(deserializer: D) -> std::result::Result<RubricConfig, D::Error>
where
    D: Deserializer<'de>,
{
    overlay_on(deserializer, RubricConfig::adaptive())
}

fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

impl ScorerConfig {
    /// Load configuration from the environment.
    ///
    /// `CONFLUENCE_CONFIG` may point at a JSON file providing the base
    /// configuration; individual `CONFLUENCE_*` variables override it.
    pub fn from_env() -> Result<Self> {
        let mut config = match env::var("CONFLUENCE_CONFIG") {
            Ok(path) => Self::from_json_file(&path)?,
            Err(_) => Self::default(),
        };

        if let Ok(rubric) = env::var("CONFLUENCE_RUBRIC") {
            config.rubric = rubric.parse()?;
        }
        if let Ok(level) = env::var("CONFLUENCE_RISK_LEVEL") {
            config.sizing.risk_level = level.parse()?;
        }
        if let Some(capacity) = env_parse("CONFLUENCE_HISTORY_CAPACITY") {
            config.history_capacity = capacity;
        }

        // Classifier score floors
        if let Some(score) = env_parse("CONFLUENCE_PREMIUM_MIN_SCORE") {
            config.classifier.premium.min_score = score;
        }
        if let Some(score) = env_parse("CONFLUENCE_MODERATE_MIN_SCORE") {
            config.classifier.moderate.min_score = score;
        }
        if let Some(score) = env_parse("CONFLUENCE_CONSERVATIVE_MIN_SCORE") {
            config.classifier.conservative.min_score = score;
        }

        // Enhancement overlay
        if let Some(enabled) = env_parse("CONFLUENCE_ENHANCEMENT_ENABLED") {
            config.enhancement.enabled = enabled;
        }
        if let Some(score) = env_parse("CONFLUENCE_ENHANCEMENT_MIN_SCORE") {
            config.enhancement.min_entry_score = score;
        }

        // Sizing
        if let Some(max) = env_parse("CONFLUENCE_MAX_POSITION_PERCENT") {
            config.sizing.max_position_percent = max;
        }
        if let Some(emit) = env_parse("CONFLUENCE_EMIT_SELL") {
            config.sizing.emit_sell_signals = emit;
        }

        // Supplier
        if let Ok(timeframe) = env::var("CONFLUENCE_TIMEFRAME") {
            config.supplier.timeframe = timeframe;
        }
        if let Ok(exchange) = env::var("CONFLUENCE_EXCHANGE") {
            config.supplier.exchange = exchange;
        }
        if let Some(ms) = env_parse("CONFLUENCE_SUPPLIER_TIMEOUT_MS") {
            config.supplier.request_timeout_ms = ms;
        }
        if let Some(ms) = env_parse("CONFLUENCE_RETRY_BACKOFF_MS") {
            config.supplier.retry_backoff_ms = ms;
        }
        if let Some(secs) = env_parse("CONFLUENCE_CACHE_TTL_SECS") {
            config.supplier.cache_ttl_secs = secs;
        }
        if let Some(ms) = env_parse("CONFLUENCE_BATCH_WINDOW_MS") {
            config.supplier.batch_window_ms = ms;
        }
        if let Some(size) = env_parse("CONFLUENCE_MAX_BATCH_SIZE") {
            config.supplier.max_batch_size = size;
        }

        config.validate()?;
        Ok(config)
    }

    /// Load and validate configuration from a JSON file. Missing fields take
    /// defaults.
    pub fn from_json_file(path: &str) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| ScoringError::Config(format!("cannot read {}: {}", path, e)))?;
        Self::from_json(&raw).map_err(|e| match e {
            ScoringError::Config(msg) => ScoringError::Config(format!("{}: {}", path, msg)),
            other => other,
        })
    }

    /// Parse and validate a JSON configuration.
    pub fn from_json(raw: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(raw)
            .map_err(|e| ScoringError::Config(format!("invalid config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// The rubric selected by `rubric`.
    pub fn rubric_config(&self) -> &RubricConfig {
        match self.rubric {
            RubricKind::Momentum => &self.momentum,
            RubricKind::Adaptive => &self.adaptive,
        }
    }

    /// Check invariants serde cannot enforce. Reports every violation at once.
    pub fn validate(&self) -> Result<()> {
        let mut errors: Vec<String> = Vec::new();

        validate_rubric("momentum", &self.momentum, &mut errors);
        validate_rubric("adaptive", &self.adaptive, &mut errors);
        validate_classifier(&self.classifier, &mut errors);
        validate_filter(&self.filter, &mut errors);
        validate_enhancement(&self.enhancement, &mut errors);
        validate_sizing(&self.sizing, &mut errors);

        if self.history_capacity == 0 {
            errors.push("history_capacity: must be at least 1".into());
        }
        if self.supplier.max_batch_size == 0 {
            errors.push("supplier.max_batch_size: must be at least 1".into());
        }
        if self.supplier.cache_ttl_secs == 0 {
            errors.push("supplier.cache_ttl_secs: must be at least 1".into());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ScoringError::Config(format!(
                "{} invalid setting{}: {}",
                errors.len(),
                if errors.len() == 1 { "" } else { "s" },
                errors.join("; ")
            )))
        }
    }
}

/// Bands must descend in threshold and never award more points for a lower
/// value, so raising the value never lowers the score.
fn validate_bands(name: &str, bands: &[PointBand], below: f64, errors: &mut Vec<String>) {
    for pair in bands.windows(2) {
        if pair[0].min <= pair[1].min {
            errors.push(format!("{}: band thresholds must strictly descend", name));
        }
        if pair[0].points < pair[1].points {
            errors.push(format!("{}: band points must not increase as thresholds fall", name));
        }
    }
    if let Some(last) = bands.last() {
        if below > last.points {
            errors.push(format!("{}: below-band points exceed the lowest band", name));
        }
    }
}

fn validate_rubric(name: &str, rubric: &RubricConfig, errors: &mut Vec<String>) {
    if rubric.rsi_sweet_low > rubric.rsi_sweet_high {
        errors.push(format!("{}: rsi sweet band is inverted", name));
    }
    if rubric.rsi_ok_low > rubric.rsi_ok_high {
        errors.push(format!("{}: rsi acceptable band is inverted", name));
    }
    if rubric.rsi_extreme_low > rubric.rsi_extreme_high {
        errors.push(format!("{}: rsi extremes are inverted", name));
    }
    if rubric.min_expected_move <= 0.0 {
        errors.push(format!("{}: min_expected_move must be positive", name));
    }
    validate_bands(
        &format!("{}.volume_bands", name),
        &rubric.volume_bands,
        rubric.volume_below_points,
        errors,
    );
    validate_bands(
        &format!("{}.adx_bands", name),
        &rubric.adx_bands,
        rubric.adx_below_points,
        errors,
    );
}

fn validate_classifier(classifier: &TierTable<TierRequirements>, errors: &mut Vec<String>) {
    if classifier.premium.min_score <= classifier.moderate.min_score
        || classifier.moderate.min_score <= classifier.conservative.min_score
    {
        errors.push("classifier: tier score floors must satisfy premium > moderate > conservative".into());
    }
    for (tier, req) in classifier.iter() {
        if req.rsi_low > req.rsi_high {
            errors.push(format!("classifier.{}: rsi band is inverted", tier));
        }
    }
}

fn validate_filter(filter: &FilterConfig, errors: &mut Vec<String>) {
    for (tier, gate) in filter.gates.iter() {
        if gate.confirm_rsi_low > gate.confirm_rsi_high {
            errors.push(format!("filter.gates.{}: confirmation rsi band is inverted", tier));
        }
        if gate.required_confirmations > 3 {
            errors.push(format!("filter.gates.{}: at most 3 confirmations exist", tier));
        }
    }
    validate_bands(
        "filter.volume_quality.volume_bands",
        &filter.volume_quality.volume_bands,
        0.0,
        errors,
    );
    if !(0.0..=1.0).contains(&filter.error_confidence_factor) {
        errors.push("filter.error_confidence_factor: must be within 0-1".into());
    }
}

fn validate_enhancement(enhancement: &EnhancementConfig, errors: &mut Vec<String>) {
    if enhancement.min_stop_percent > enhancement.max_stop_percent {
        errors.push("enhancement: min_stop_percent exceeds max_stop_percent".into());
    }
    if enhancement.min_hold_hours > enhancement.max_hold_hours {
        errors.push("enhancement: min_hold_hours exceeds max_hold_hours".into());
    }
    if enhancement.min_entry_score >= 100.0 {
        errors.push("enhancement: min_entry_score must be below 100".into());
    }
    if enhancement
        .target_fractions
        .iter()
        .any(|f| *f <= 0.0 || *f > 1.0)
    {
        errors.push("enhancement: target fractions must be within (0, 1]".into());
    }
}

fn validate_sizing(sizing: &SizingConfig, errors: &mut Vec<String>) {
    if sizing.max_position_percent <= 0.0 {
        errors.push("sizing.max_position_percent: must be positive".into());
    }
    for (tier, size) in sizing.base_position_percent.iter() {
        if *size <= 0.0 {
            errors.push(format!("sizing.base_position_percent.{}: must be positive", tier));
        }
    }
    for (tier, stop) in sizing.stop_loss_percent.iter() {
        if *stop <= 0.0 {
            errors.push(format!("sizing.stop_loss_percent.{}: must be positive", tier));
        }
    }
}
