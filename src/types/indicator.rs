use serde::{Deserialize, Serialize};

/// MACD line, signal line and histogram.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MacdValues {
    pub macd: f64,
    pub signal: f64,
    pub histogram: f64,
}

impl MacdValues {
    /// Histogram positive and MACD above its signal line.
    pub fn is_bullish(&self) -> bool {
        self.histogram > 0.0 && self.macd > self.signal
    }

    /// Exactly one of the bullish conditions holds.
    pub fn is_nearly_bullish(&self) -> bool {
        !self.is_bullish() && (self.histogram > 0.0 || self.macd > self.signal)
    }

    fn is_finite(&self) -> bool {
        self.macd.is_finite() && self.signal.is_finite() && self.histogram.is_finite()
    }
}

/// Bollinger band levels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BollingerBands {
    pub upper: f64,
    pub middle: f64,
    pub lower: f64,
}

impl BollingerBands {
    /// Position of `price` inside the band (0.0 = lower, 1.0 = upper).
    /// None for a degenerate band.
    pub fn position(&self, price: f64) -> Option<f64> {
        let width = self.upper - self.lower;
        if width > 0.0 && width.is_finite() {
            Some((price - self.lower) / width)
        } else {
            None
        }
    }
}

/// Where a snapshot came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotSource {
    /// Fresh from the indicator supplier.
    #[default]
    Live,
    /// Served from the snapshot cache.
    Cached,
    /// Degraded placeholder used when the supplier failed.
    Fallback,
}

/// Indicator values for a symbol and timeframe at a point in time.
///
/// Every indicator is optional; scoring rules apply an explicit neutral
/// default for anything missing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndicatorSnapshot {
    pub symbol: String,
    pub timeframe: String,
    /// Unix timestamp (milliseconds) the indicators were computed at.
    pub timestamp: i64,
    pub price: Option<f64>,
    pub rsi: Option<f64>,
    pub macd: Option<MacdValues>,
    pub ema20: Option<f64>,
    pub ema50: Option<f64>,
    pub ema200: Option<f64>,
    pub adx: Option<f64>,
    pub volume_ratio: Option<f64>,
    pub mfi: Option<f64>,
    pub atr: Option<f64>,
    pub bbands: Option<BollingerBands>,
    #[serde(default)]
    pub source: SnapshotSource,
    /// Why the snapshot is degraded, for fallback data.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl IndicatorSnapshot {
    /// Create an empty live snapshot.
    pub fn new(symbol: &str, timeframe: &str) -> Self {
        Self {
            symbol: symbol.to_uppercase(),
            timeframe: timeframe.to_string(),
            timestamp: chrono::Utc::now().timestamp_millis(),
            ..Default::default()
        }
    }

    /// Create a fallback snapshot with every indicator missing.
    pub fn fallback(symbol: &str, timeframe: &str, reason: &str) -> Self {
        Self {
            source: SnapshotSource::Fallback,
            note: Some(reason.to_string()),
            ..Self::new(symbol, timeframe)
        }
    }

    pub fn is_fallback(&self) -> bool {
        self.source == SnapshotSource::Fallback
    }

    /// Copy of this snapshot with every non-finite value treated as missing.
    pub fn sanitized(&self) -> Self {
        fn finite(v: Option<f64>) -> Option<f64> {
            v.filter(|x| x.is_finite())
        }

        Self {
            price: finite(self.price),
            rsi: finite(self.rsi),
            macd: self.macd.filter(MacdValues::is_finite),
            ema20: finite(self.ema20),
            ema50: finite(self.ema50),
            ema200: finite(self.ema200),
            adx: finite(self.adx),
            volume_ratio: finite(self.volume_ratio),
            mfi: finite(self.mfi),
            atr: finite(self.atr),
            bbands: self.bbands.filter(|b| {
                b.upper.is_finite() && b.middle.is_finite() && b.lower.is_finite()
            }),
            ..self.clone()
        }
    }

    /// ema20 < ema50 < ema200, when all three are known.
    pub fn has_bearish_ema_order(&self) -> bool {
        match (self.ema20, self.ema50, self.ema200) {
            (Some(e20), Some(e50), Some(e200)) => e20 < e50 && e50 < e200,
            _ => false,
        }
    }
}

/// Per-symbol answer from an indicator supplier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IndicatorData {
    Snapshot(IndicatorSnapshot),
    Fallback { reason: String },
}

impl IndicatorData {
    /// Resolve into a snapshot, building a fallback snapshot when needed.
    pub fn into_snapshot(self, symbol: &str, timeframe: &str) -> IndicatorSnapshot {
        match self {
            IndicatorData::Snapshot(snapshot) => snapshot,
            IndicatorData::Fallback { reason } => {
                IndicatorSnapshot::fallback(symbol, timeframe, &reason)
            }
        }
    }
}

/// Market data handed to the scorer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketData {
    pub current_price: f64,
    /// Pre-fetched indicators; fetched from the supplier when absent.
    #[serde(default)]
    pub technical_data: Option<IndicatorSnapshot>,
}

impl MarketData {
    pub fn new(current_price: f64) -> Self {
        Self {
            current_price,
            technical_data: None,
        }
    }

    pub fn with_snapshot(current_price: f64, snapshot: IndicatorSnapshot) -> Self {
        Self {
            current_price,
            technical_data: Some(snapshot),
        }
    }
}
