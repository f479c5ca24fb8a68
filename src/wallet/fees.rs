//! Fee rate in sat/vB, the unit callers and estimators speak.

use crate::error::{WalletError, WalletResult};
use bdk_wallet::bitcoin::FeeRate;
use serde::Serialize;
use std::fmt;

/// Weight units per virtual byte.
const WU_PER_VB: f64 = 4.0;

#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize)]
pub struct SatPerVb(f32);

impl SatPerVb {
    /// Fixed low rate used when the caller gives none.
    pub const DEFAULT: SatPerVb = SatPerVb(1.0);

    pub fn new(rate: f32) -> WalletResult<Self> {
        if !rate.is_finite() || rate <= 0.0 {
            return Err(WalletError::InvalidFeeRate(format!("{} sat/vB", rate)));
        }
        Ok(SatPerVb(rate))
    }

    pub fn as_f32(&self) -> f32 { self.0 }

    /// Engine rate (sat per 1000 weight units), rounded up so the
    /// requested rate is never undershot.
    pub fn to_fee_rate(&self) -> FeeRate {
        let sat_per_kwu = (f64::from(self.0) * 1000.0 / WU_PER_VB).ceil() as u64;
        FeeRate::from_sat_per_kwu(sat_per_kwu)
    }
}

impl Default for SatPerVb {
    fn default() -> Self { Self::DEFAULT }
}

impl fmt::Display for SatPerVb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} sat/vB", self.0)
    }
}
