//! Percentile (d100) success levels used by `vs`, `sc` and `en`.

use serde::Serialize;

/// Outcome of a d100 roll against a target value. Ordered worst to best.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SuccessLevel {
    Fumble,
    Failure,
    Regular,
    Hard,
    Extreme,
    Critical,
}

impl SuccessLevel {
    pub fn is_success(self) -> bool {
        self >= SuccessLevel::Regular
    }

    pub fn label(self) -> &'static str {
        match self {
            SuccessLevel::Fumble => "fumble",
            SuccessLevel::Failure => "failure",
            SuccessLevel::Regular => "success",
            SuccessLevel::Hard => "hard success",
            SuccessLevel::Extreme => "extreme success",
            SuccessLevel::Critical => "critical success",
        }
    }
}

/// Classify a d100 `roll` against `target`.
///
/// 1 is always critical. 100 is always a fumble, as is 96+ when the target is
/// below 50. Otherwise the thresholds are target/5, target/2 and target.
pub fn coc_check(roll: u32, target: i64) -> SuccessLevel {
    let r = i64::from(roll);
    if roll == 1 {
        return SuccessLevel::Critical;
    }
    if roll >= 100 || (target < 50 && roll >= 96) {
        return SuccessLevel::Fumble;
    }
    if r <= target / 5 {
        SuccessLevel::Extreme
    } else if r <= target / 2 {
        SuccessLevel::Hard
    } else if r <= target {
        SuccessLevel::Regular
    } else {
        SuccessLevel::Failure
    }
}
