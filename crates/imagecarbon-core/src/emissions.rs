//! Transfer-based CO2 estimation.
//!
//! Implements the Sustainable Web Design model: bytes transferred are turned
//! into energy, the energy is split across the system segments that carry it,
//! and each segment is multiplied by a carbon intensity. A green host only
//! changes the data centre segment, which then runs on renewable intensity.

use serde::{Deserialize, Serialize};

/// Bytes in a gigabyte as used by the model (decimal).
pub const BYTES_PER_GIGABYTE: f64 = 1_000_000_000.0;

/// Energy needed to move one gigabyte, in kWh.
pub const KWH_PER_GIGABYTE: f64 = 0.81;

/// Global average grid intensity, grams CO2e per kWh.
pub const GLOBAL_GRID_INTENSITY: f64 = 442.0;

/// Renewable energy intensity, grams CO2e per kWh.
pub const RENEWABLES_GRID_INTENSITY: f64 = 50.0;

/// Segment weights of the energy use.
pub const DATA_CENTER_SHARE: f64 = 0.15;
pub const NETWORK_SHARE: f64 = 0.14;
pub const CONSUMER_DEVICE_SHARE: f64 = 0.52;
pub const PRODUCTION_SHARE: f64 = 0.19;

/// Share of visits made by first-time visitors.
pub const FIRST_TIME_VIEWING_SHARE: f64 = 0.75;

/// Share of visits made by returning visitors.
pub const RETURNING_VISITOR_SHARE: f64 = 0.25;

/// Fraction of bytes a returning visitor downloads again.
pub const RETURNING_DATA_RELOAD_RATIO: f64 = 0.02;

/// Parameters of the swept emissions model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EmissionsModel {
    pub kwh_per_gigabyte: f64,
    pub grid_intensity: f64,
    pub renewables_intensity: f64,
    pub data_center_share: f64,
    pub network_share: f64,
    pub consumer_device_share: f64,
    pub production_share: f64,
    pub first_time_viewing_share: f64,
    pub returning_visitor_share: f64,
    pub returning_data_reload_ratio: f64,
}

impl Default for EmissionsModel {
    fn default() -> Self {
        Self::sustainable_web_design()
    }
}

impl EmissionsModel {
    /// The published Sustainable Web Design coefficients.
    pub fn sustainable_web_design() -> Self {
        Self {
            kwh_per_gigabyte: KWH_PER_GIGABYTE,
            grid_intensity: GLOBAL_GRID_INTENSITY,
            renewables_intensity: RENEWABLES_GRID_INTENSITY,
            data_center_share: DATA_CENTER_SHARE,
            network_share: NETWORK_SHARE,
            consumer_device_share: CONSUMER_DEVICE_SHARE,
            production_share: PRODUCTION_SHARE,
            first_time_viewing_share: FIRST_TIME_VIEWING_SHARE,
            returning_visitor_share: RETURNING_VISITOR_SHARE,
            returning_data_reload_ratio: RETURNING_DATA_RELOAD_RATIO,
        }
    }

    /// Estimated grams of CO2 for a single page view transferring `bytes`.
    ///
    /// Weighs first-time and returning visitors. This is the estimate stored
    /// with every collected image.
    pub fn estimate(&self, bytes: u64, is_green_host: bool) -> f64 {
        self.per_visit(bytes, is_green_host)
    }

    /// Grams of CO2 for transferring `bytes` once, with no caching.
    pub fn per_byte(&self, bytes: u64, is_green_host: bool) -> f64 {
        self.grams_for_bytes(bytes as f64, is_green_host)
    }

    /// Grams of CO2 for a visit, weighting first-time and returning visitors.
    pub fn per_visit(&self, bytes: u64, is_green_host: bool) -> f64 {
        let visit_factor = self.first_time_viewing_share
            + self.returning_visitor_share * self.returning_data_reload_ratio;

        self.grams_for_bytes(bytes as f64 * visit_factor, is_green_host)
    }

    fn grams_for_bytes(&self, bytes: f64, is_green_host: bool) -> f64 {
        if bytes <= 0.0 {
            return 0.0;
        }

        let energy = bytes / BYTES_PER_GIGABYTE * self.kwh_per_gigabyte;

        let data_center_intensity = if is_green_host {
            self.renewables_intensity
        } else {
            self.grid_intensity
        };

        let data_center = energy * self.data_center_share * data_center_intensity;
        let rest = energy
            * (self.network_share + self.consumer_device_share + self.production_share)
            * self.grid_intensity;

        data_center + rest
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_zero_bytes_is_zero() {
        let model = EmissionsModel::default();
        assert_eq!(model.estimate(0, false), 0.0);
        assert_eq!(model.estimate(0, true), 0.0);
        assert_eq!(model.per_byte(0, true), 0.0);
    }

    #[test]
    fn test_green_host_is_lower() {
        let model = EmissionsModel::default();
        for bytes in [1, 2_000, 30_000, 5_000_000] {
            assert!(model.estimate(bytes, true) < model.estimate(bytes, false));
            assert!(model.per_byte(bytes, true) < model.per_byte(bytes, false));
        }
    }

    #[test]
    fn test_per_byte_one_gigabyte() {
        let model = EmissionsModel::default();
        // 0.81 kWh at 442 g/kWh
        assert!(close(model.per_byte(1_000_000_000, false), 358.02));
        // data centre share moves to 50 g/kWh
        let green = 0.81 * (0.15 * 50.0 + 0.85 * 442.0);
        assert!(close(model.per_byte(1_000_000_000, true), green));
    }

    #[test]
    fn test_per_visit_weights_returning_visitors() {
        let model = EmissionsModel::default();
        let expected = model.per_byte(1_000_000_000, false) * 0.755;
        assert!(close(model.per_visit(1_000_000_000, false), expected));
    }

    #[test]
    fn test_estimate_is_deterministic() {
        let model = EmissionsModel::default();
        assert_eq!(model.estimate(30_000, false), model.estimate(30_000, false));
    }
}
