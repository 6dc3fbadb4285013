//! Conversion of raw sensor distances into fill-level percentages.

use crate::model::BinRecord;

/// Lowest reportable fill level.
pub const EMPTY: f64 = 0.0;
/// Highest reportable fill level.
pub const FULL: f64 = 100.0;

#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq)]
/// Inputs the fill-level computation cannot work with.
pub enum FillError {
    /// Fillable height is zero, negative, or not a finite number.
    #[error("Fillable height must be positive, got {0}")]
    NonPositiveHeight(f64),
    /// Buffer height is negative or not a finite number.
    #[error("Buffer height must not be negative, got {0}")]
    NegativeBuffer(f64),
    /// Sensor distance is negative or not a finite number.
    #[error("Distance must not be negative, got {0}")]
    NegativeDistance(f64),
}

/// Compute the fill level of a bin from a single distance reading.
///
/// The buffer height is subtracted from the reading first, so a reading equal
/// to the buffer means the bin is full and a reading of `buffer_height + height`
/// means it is empty. The result is clamped to `[0, 100]`. Bins without a
/// buffer pass `0.0`.
///
/// # Errors
///
/// Returns a [`FillError`] when any input violates its precondition.
pub fn fill_level(height: f64, buffer_height: f64, distance: f64) -> Result<f64, FillError> {
    if !height.is_finite() || height <= 0.0 {
        return Err(FillError::NonPositiveHeight(height));
    }
    if !buffer_height.is_finite() || buffer_height < 0.0 {
        return Err(FillError::NegativeBuffer(buffer_height));
    }
    if !distance.is_finite() || distance < 0.0 {
        return Err(FillError::NegativeDistance(distance));
    }

    let empty_space = distance - buffer_height;
    let percentage = ((height - empty_space) / height) * 100.0;

    Ok(percentage.clamp(EMPTY, FULL))
}

impl BinRecord {
    /// Fill level of this bin for the given distance reading.
    ///
    /// # Errors
    ///
    /// Returns a [`FillError`] when the stored metadata or the distance is invalid.
    pub fn fill_level(&self, distance: f64) -> Result<f64, FillError> {
        fill_level(self.height, self.buffer_height.unwrap_or(0.0), distance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::BinId;

    fn approx(left: f64, right: f64) -> bool {
        (left - right).abs() < 1e-9
    }

    #[test]
    fn computes_with_buffer() {
        let level = fill_level(200.0, 10.0, 50.0).expect("valid inputs");
        assert!(approx(level, 80.0), "got {level}");
    }

    #[test]
    fn buffer_free_bins_use_plain_ratio() {
        let level = fill_level(100.0, 0.0, 25.0).expect("valid inputs");
        assert!(approx(level, 75.0), "got {level}");
    }

    #[test]
    fn reading_at_buffer_is_full() {
        let level = fill_level(120.0, 15.0, 15.0).expect("valid inputs");
        assert!(approx(level, FULL), "got {level}");
    }

    #[test]
    fn reading_at_bottom_is_empty() {
        let level = fill_level(120.0, 15.0, 135.0).expect("valid inputs");
        assert!(approx(level, EMPTY), "got {level}");
    }

    #[test]
    fn clamps_out_of_range_readings() {
        let below = fill_level(120.0, 15.0, 400.0).expect("valid inputs");
        let inside_buffer = fill_level(120.0, 15.0, 3.0).expect("valid inputs");
        assert!(approx(below, EMPTY), "got {below}");
        assert!(approx(inside_buffer, FULL), "got {inside_buffer}");
    }

    #[test]
    fn stays_in_range_and_never_rises_with_distance() {
        for height in [1.0, 37.5, 200.0] {
            for buffer in [0.0, 4.0, 25.0] {
                let mut previous = FULL;
                for step in 0..=400_u32 {
                    let distance = f64::from(step) * 0.75;
                    let level = fill_level(height, buffer, distance).expect("valid inputs");
                    assert!((EMPTY..=FULL).contains(&level), "{level} out of range");
                    assert!(
                        level <= previous,
                        "level rose from {previous} to {level} at distance {distance}"
                    );
                    previous = level;
                }
            }
        }
    }

    #[test]
    fn rejects_bad_preconditions() {
        assert_eq!(
            fill_level(0.0, 0.0, 10.0),
            Err(FillError::NonPositiveHeight(0.0))
        );
        assert_eq!(
            fill_level(-5.0, 0.0, 10.0),
            Err(FillError::NonPositiveHeight(-5.0))
        );
        assert_eq!(
            fill_level(100.0, -1.0, 10.0),
            Err(FillError::NegativeBuffer(-1.0))
        );
        assert_eq!(
            fill_level(100.0, 0.0, -0.5),
            Err(FillError::NegativeDistance(-0.5))
        );
        assert!(matches!(
            fill_level(f64::NAN, 0.0, 10.0),
            Err(FillError::NonPositiveHeight(_))
        ));
        assert!(matches!(
            fill_level(f64::INFINITY, 0.0, 10.0),
            Err(FillError::NonPositiveHeight(_))
        ));
    }

    #[test]
    fn record_without_buffer_uses_zero() {
        let record = BinRecord {
            id: BinId::from("bin-1"),
            height: 100.0,
            buffer_height: None,
            token: "secret".to_owned(),
            fill_level_percentage: None,
        };
        let level = record.fill_level(25.0).expect("valid inputs");
        assert!(approx(level, 75.0), "got {level}");
    }
}
