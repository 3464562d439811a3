use serde::{Deserialize, Serialize};

/// Raw-to-engineering-units calibration, attached to analog values.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Calibration {
    pub raw_min: i64,
    pub raw_max: i64,
    pub cal_min: f64,
    pub cal_max: f64,
    pub precision: i32,
}

impl Calibration {
    pub fn new(raw_min: i64, raw_max: i64, cal_min: f64, cal_max: f64, precision: i32) -> Self {
        Self {
            raw_min,
            raw_max,
            cal_min,
            cal_max,
            precision,
        }
    }
}
