//! Common utilities for the butterfly-osm toolkit

pub mod error;
pub mod units;

pub use error::{Error, Result};
pub use units::DistanceUnit;

#[cfg(test)]
mod tests {
    use crate::DistanceUnit;

    #[test]
    fn distance_unit_round_trips_through_its_name() {
        let unit: DistanceUnit = "mi".parse().unwrap();
        assert_eq!(unit, DistanceUnit::Miles);
        assert_eq!(unit.to_string(), "mi");
    }
}
