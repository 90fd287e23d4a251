//! Three-tier qualitative reading of a disease probability.

use serde::Serialize;
use std::fmt;

/// Probabilities strictly above this are high risk.
pub const HIGH_RISK_THRESHOLD: f64 = 0.70;
/// Probabilities strictly above this (and not high) are moderate risk.
pub const MODERATE_RISK_THRESHOLD: f64 = 0.40;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskTier {
    Low,
    Moderate,
    High,
}

impl RiskTier {
    pub fn classify(probability: f64) -> Self {
        if probability > HIGH_RISK_THRESHOLD {
            RiskTier::High
        } else if probability > MODERATE_RISK_THRESHOLD {
            RiskTier::Moderate
        } else {
            RiskTier::Low
        }
    }

    pub fn headline(self) -> &'static str {
        match self {
            RiskTier::High => "HIGH RISK DETECTED",
            RiskTier::Moderate => "MODERATE RISK",
            RiskTier::Low => "LOW RISK",
        }
    }

    pub fn advice(self) -> &'static str {
        match self {
            RiskTier::High => {
                "The model finds patterns consistent with heart disease. Immediate referral is advised."
            }
            RiskTier::Moderate => "Risk factors are present. Monitoring is recommended.",
            RiskTier::Low => "Profile is compatible with a healthy patient.",
        }
    }
}

impl fmt::Display for RiskTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RiskTier::High => "high",
            RiskTier::Moderate => "moderate",
            RiskTier::Low => "low",
        };
        f.write_str(name)
    }
}

/// The outcome of scoring one patient.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RiskAssessment {
    pub probability: f64,
    pub predicted_class: u8,
    pub tier: RiskTier,
}

impl RiskAssessment {
    pub fn new(probability: f64, predicted_class: u8) -> Self {
        Self {
            probability,
            predicted_class,
            tier: RiskTier::classify(probability),
        }
    }

    pub fn percent(&self) -> f64 {
        self.probability * 100.0
    }
}

impl fmt::Display for RiskAssessment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {:.2}%", self.tier.headline(), self.percent())
    }
}
