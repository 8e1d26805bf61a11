//! Pure grading and ledger computations.
//!
//! Nothing in here touches the database. Callers load a snapshot of the
//! collections they need (see `store`) and pass it in by reference; every
//! function filters on the requested `Period` itself before aggregating.

pub mod attendance;
pub mod broadsheet;
pub mod grade;
pub mod ledger;
pub mod rank;
pub mod subjects;

/// Two-decimal rounding used for averages and money on the wire.
pub fn round_off_2_decimals(x: f64) -> f64 {
    ((100.0 * x) + 0.5).floor() / 100.0
}

/// Percentage of `part` over `whole`, or 0 when `whole` is not positive.
pub fn percent_of(part: f64, whole: f64) -> f64 {
    if whole > 0.0 {
        100.0 * part / whole
    } else {
        0.0
    }
}
