//! Protection tiers.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::VaultError;

/// Which key and which gating path protect a stored identity.
///
/// Each tier has its own key, its own envelope file and its own gating rule.
/// Exactly one identity blob may be stored per tier; storing again overwrites.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProtectionTier {
    /// Decryptable without user interaction, gated only by device possession.
    Standard,
    /// Decryptable only after a live biometric authentication.
    Biometric,
}

impl ProtectionTier {
    pub const ALL: [ProtectionTier; 2] = [Self::Standard, Self::Biometric];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Standard => "standard",
            Self::Biometric => "biometric",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "standard" => Some(Self::Standard),
            "biometric" => Some(Self::Biometric),
            _ => None,
        }
    }
}

impl fmt::Display for ProtectionTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProtectionTier {
    type Err = VaultError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| VaultError::invalid(format!("unknown protection tier: {s}")))
    }
}
