use serde::{Deserialize, Serialize};

/// One of the four assets the system reasons about. GOLD only ever appears
/// as cross-asset context, never as a position in `Allocation`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Asset {
    Dxy,
    Spx,
    Btc,
    Gold,
}

impl Asset {
    pub fn code(&self) -> &'static str {
        match self {
            Asset::Dxy => "DXY",
            Asset::Spx => "SPX",
            Asset::Btc => "BTC",
            Asset::Gold => "GOLD",
        }
    }

    pub fn is_risk_asset(&self) -> bool {
        matches!(self, Asset::Spx | Asset::Btc)
    }
}

/// Forward return horizon in trading days.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
pub enum Horizon {
    D30,
    D90,
    D180,
    D365,
}

impl Horizon {
    pub const ALL: [Horizon; 4] = [Horizon::D30, Horizon::D90, Horizon::D180, Horizon::D365];

    pub fn days(&self) -> i64 {
        match self {
            Horizon::D30 => 30,
            Horizon::D90 => 90,
            Horizon::D180 => 180,
            Horizon::D365 => 365,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Horizon::D30 => "30D",
            Horizon::D90 => "90D",
            Horizon::D180 => "180D",
            Horizon::D365 => "365D",
        }
    }

    /// Risk-band denominator used by tailRisk clamping (§4.9g).
    pub fn risk_band(&self) -> f64 {
        match self {
            Horizon::D30 => 0.04,
            Horizon::D90 => 0.08,
            Horizon::D180 => 0.12,
            Horizon::D365 => 0.18,
        }
    }

    pub fn from_label(s: &str) -> Option<Self> {
        match s {
            "30D" => Some(Horizon::D30),
            "90D" => Some(Horizon::D90),
            "180D" => Some(Horizon::D180),
            "365D" => Some(Horizon::D365),
            _ => None,
        }
    }
}

/// Quantile level for the forecaster. Fixed to {0.05, 0.50, 0.95}.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Quantile {
    Q05,
    Q50,
    Q95,
}

impl Quantile {
    pub const ALL: [Quantile; 3] = [Quantile::Q05, Quantile::Q50, Quantile::Q95];

    pub fn tau(&self) -> f64 {
        match self {
            Quantile::Q05 => 0.05,
            Quantile::Q50 => 0.50,
            Quantile::Q95 => 0.95,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Quantile::Q05 => "q05",
            Quantile::Q50 => "q50",
            Quantile::Q95 => "q95",
        }
    }
}
