//! Whole-site aggregation of a collection.
//!
//! Everything here is a pure function of an image set, so the live collection
//! flow and the cached-result flow produce identical numbers.

use std::cmp::Ordering;
use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{ImageRecord, Variant};
use crate::normalize::restore;

/// Images at or below this size are hidden from the display list.
pub const MIN_DISPLAY_SIZE: u64 = 5000;

/// Number of images shown before "show all".
pub const PREVIEW_COUNT: usize = 3;

/// Byte slack under which a site counts as already optimized.
pub const ALREADY_OPTIMIZED_SIZE_THRESHOLD: u64 = 5000;

/// Savings percentage at or under which a site counts as already optimized.
pub const ALREADY_OPTIMIZED_PERCENT_THRESHOLD: i64 = 5;

/// Grams of CO2 from burning one gallon of gasoline.
pub const CARBON_PER_GASOLINE_GALLON: f64 = 8887.0;

/// Grams of CO2 for one cup of coffee.
pub const CARBON_PER_COFFEE_CUP: f64 = 209.0;

/// Grams of CO2 for one slice of pizza (a 10.8 kg pie in eight slices).
pub const CARBON_PER_PIZZA_SLICE: f64 = 10800.0 / 8.0;

/// Aggregation thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportConfig {
    pub min_display_size: u64,
    pub preview_count: usize,
    pub size_threshold: u64,
    pub percent_threshold: i64,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            min_display_size: MIN_DISPLAY_SIZE,
            preview_count: PREVIEW_COUNT,
            size_threshold: ALREADY_OPTIMIZED_SIZE_THRESHOLD,
            percent_threshold: ALREADY_OPTIMIZED_PERCENT_THRESHOLD,
        }
    }
}

impl ReportConfig {
    /// Sets the number of preview images.
    pub fn with_preview_count(mut self, count: usize) -> Self {
        self.preview_count = count;
        self
    }

    /// Sets the minimum size for an image to be displayed.
    pub fn with_min_display_size(mut self, size: u64) -> Self {
        self.min_display_size = size;
        self
    }
}

/// Sum of known sizes for one variant. Images without a size are skipped.
pub fn total_bytes(images: &[ImageRecord], variant: Variant) -> u64 {
    images.iter().filter_map(|i| variant.size_of(i)).sum()
}

/// Sum of known CO2 estimates for one variant.
pub fn total_co2(images: &[ImageRecord], variant: Variant) -> f64 {
    images.iter().filter_map(|i| variant.co2_of(i)).sum()
}

/// Percentage saved going from `original` to `optimized`, rounded up.
///
/// `None` when either total is zero or not a finite number.
pub fn savings_percent(original: f64, optimized: f64) -> Option<i64> {
    if !original.is_finite() || !optimized.is_finite() || original == 0.0 || optimized == 0.0 {
        return None;
    }
    Some((100.0 - optimized / original * 100.0).ceil() as i64)
}

/// Whether a site is already well optimized.
///
/// Either condition is enough: the optimized total is within the byte
/// threshold of the original, or the savings are at most the percent
/// threshold. An unknown percentage never satisfies the second condition.
pub fn is_already_optimized(
    total_original_bytes: u64,
    total_optimized_bytes: u64,
    savings_percent: Option<i64>,
    config: &ReportConfig,
) -> bool {
    let bytes_optimized =
        total_original_bytes <= total_optimized_bytes.saturating_add(config.size_threshold);
    let percent_optimized = savings_percent.is_some_and(|p| p <= config.percent_threshold);

    bytes_optimized || percent_optimized
}

/// An image prepared for display with its individual savings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisplayImage {
    #[serde(flatten)]
    pub image: ImageRecord,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub savings_size: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub savings_carbon: Option<f64>,
    /// The optimized variant is within the size threshold of the original.
    #[serde(default)]
    pub already_optimized: bool,
}

impl DisplayImage {
    fn annotate(image: ImageRecord, config: &ReportConfig) -> Self {
        let already_optimized = match (image.original.size, image.optimized.size) {
            (Some(original), Some(optimized)) => {
                original <= optimized.saturating_add(config.size_threshold)
            }
            _ => false,
        };

        let (savings_size, savings_carbon) = match (image.original.size, image.original.co2) {
            (Some(size), Some(co2)) => (
                image.optimized.size.map(|o| size as i64 - o as i64),
                image.optimized.co2.map(|o| co2 - o),
            ),
            _ => (None, None),
        };

        Self {
            image,
            savings_size,
            savings_carbon,
            already_optimized,
        }
    }
}

/// Picks the images worth showing, biggest carbon savings first.
///
/// Duplicates by original URL are dropped (first wins), small images are
/// filtered unless their size is unknown, and the list is cut to the preview
/// count unless `show_all` is set. Images without a carbon saving sort last;
/// ties keep their input order.
pub fn select_display_images(
    images: &[ImageRecord],
    show_all: bool,
    config: &ReportConfig,
) -> Vec<DisplayImage> {
    let mut seen = HashSet::new();

    let mut selected: Vec<DisplayImage> = images
        .iter()
        .filter(|&image| seen.insert(image.original.url.as_str()))
        .filter(|image| match image.original.size {
            Some(size) => size > config.min_display_size,
            None => true,
        })
        .cloned()
        .map(|image| DisplayImage::annotate(image, config))
        .collect();

    selected.sort_by(|a, b| compare_savings(a.savings_carbon, b.savings_carbon));

    if !show_all {
        selected.truncate(config.preview_count);
    }

    selected
}

fn compare_savings(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => b.total_cmp(&a),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Emissions scaled to a traffic level.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct YearlyEstimate {
    pub monthly_requests: u64,
    pub yearly_requests: u64,
    /// Grams of CO2 per year.
    pub yearly: f64,
}

/// Scales a per-load CO2 figure to a year of `monthly_requests` loads.
///
/// The request count saturates at `u64::MAX`; the mass is computed in `f64`.
pub fn scale_to_requests(co2_per_load: f64, monthly_requests: u64) -> YearlyEstimate {
    YearlyEstimate {
        monthly_requests,
        yearly_requests: monthly_requests.saturating_mul(12),
        yearly: monthly_requests as f64 * 12.0 * co2_per_load,
    }
}

/// Everyday equivalents of a CO2 mass.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Equivalents {
    pub gasoline_gallons: f64,
    pub coffee_cups: f64,
    pub pizza_slices: f64,
}

impl Equivalents {
    /// Equivalents of `grams` of CO2.
    pub fn of(grams: f64) -> Self {
        Self {
            gasoline_gallons: grams / CARBON_PER_GASOLINE_GALLON,
            coffee_cups: grams / CARBON_PER_COFFEE_CUP,
            pizza_slices: grams / CARBON_PER_PIZZA_SLICE,
        }
    }
}

/// Monthly traffic assumption, adjusted in fixed steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthlyRequests(u64);

impl MonthlyRequests {
    pub const MIN: u64 = 1_000;
    pub const INITIAL: u64 = 10_000;
    pub const INCREMENT: u64 = 10_000;

    /// Creates a value, raising it to the minimum if needed.
    pub fn new(value: u64) -> Self {
        Self(value.max(Self::MIN))
    }

    pub fn get(&self) -> u64 {
        self.0
    }

    /// Next step up. From the minimum this jumps to the first increment.
    pub fn increment(self) -> Self {
        if self.0 == Self::MIN {
            return Self(Self::INCREMENT);
        }
        Self(self.0.saturating_add(Self::INCREMENT))
    }

    /// Next step down, never below the minimum.
    pub fn decrement(self) -> Self {
        if self.0 <= Self::INCREMENT {
            return Self(Self::MIN);
        }
        Self(self.0 - Self::INCREMENT)
    }
}

impl Default for MonthlyRequests {
    fn default() -> Self {
        Self(Self::INITIAL)
    }
}

/// Presentation choices for a report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReportOptions {
    pub show_all: bool,
    pub monthly_requests: MonthlyRequests,
}

/// Everything a results page needs for one site.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteReport {
    /// Normalized site URL.
    pub site_url: String,
    /// Fetchable form of the site URL.
    pub display_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_collected: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub screenshot: Option<String>,
    pub total_bytes_original: u64,
    pub total_bytes_optimized: u64,
    pub total_co2_original: f64,
    pub total_co2_optimized: f64,
    /// CO2 savings in percent, if computable.
    pub savings_percent: Option<i64>,
    pub already_optimized: bool,
    pub images: Vec<DisplayImage>,
    /// Collected images not in `images`.
    pub hidden_images: usize,
    pub yearly: YearlyEstimate,
    pub equivalents: Equivalents,
}

impl SiteReport {
    /// Aggregates an image set into a report.
    pub fn build(
        site_url: &str,
        date_collected: Option<DateTime<Utc>>,
        screenshot: Option<String>,
        images: &[ImageRecord],
        options: ReportOptions,
        config: &ReportConfig,
    ) -> Self {
        let total_bytes_original = total_bytes(images, Variant::Original);
        let total_bytes_optimized = total_bytes(images, Variant::Optimized);
        let total_co2_original = total_co2(images, Variant::Original);
        let total_co2_optimized = total_co2(images, Variant::Optimized);

        let savings = savings_percent(total_co2_original, total_co2_optimized);
        let already_optimized =
            is_already_optimized(total_bytes_original, total_bytes_optimized, savings, config);

        let display = select_display_images(images, options.show_all, config);
        let hidden_images = images.len().saturating_sub(display.len());

        let yearly = scale_to_requests(total_co2_original, options.monthly_requests.get());

        Self {
            site_url: site_url.to_string(),
            display_url: restore(site_url),
            date_collected,
            screenshot,
            total_bytes_original,
            total_bytes_optimized,
            total_co2_original,
            total_co2_optimized,
            savings_percent: savings,
            already_optimized,
            images: display,
            hidden_images,
            equivalents: Equivalents::of(yearly.yearly),
            yearly,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emissions::EmissionsModel;

    fn image(url: &str, size: Option<u64>, co2: Option<f64>) -> ImageRecord {
        let mut record = ImageRecord::from_url(url);
        record.original.size = size;
        record.original.co2 = co2;
        record
    }

    fn measured(url: &str, size: u64, optimized: u64) -> ImageRecord {
        let model = EmissionsModel::default();
        let mut record = image(url, Some(size), Some(model.estimate(size, false)));
        record.optimized.size = Some(optimized);
        record.optimized.co2 = Some(model.estimate(optimized, true));
        record
    }

    #[test]
    fn test_totals_ignore_missing() {
        let images = vec![
            image("a", Some(100), Some(1.0)),
            image("b", None, None),
            image("c", Some(50), Some(0.5)),
        ];
        assert_eq!(total_bytes(&images, Variant::Original), 150);
        assert_eq!(total_bytes(&images, Variant::Optimized), 0);
        assert!((total_co2(&images, Variant::Original) - 1.5).abs() < 1e-12);
    }

    #[test]
    fn test_savings_percent() {
        assert_eq!(savings_percent(100.0, 100.0), Some(0));
        assert_eq!(savings_percent(100.0, 50.0), Some(50));
        assert_eq!(savings_percent(100.0, 25.0), Some(75));
        assert_eq!(savings_percent(0.0, 50.0), None);
        assert_eq!(savings_percent(100.0, 0.0), None);
        assert_eq!(savings_percent(f64::NAN, 1.0), None);
    }

    #[test]
    fn test_already_optimized_by_size_only() {
        let config = ReportConfig::default();
        // 60% savings, but only 4000 bytes apart
        assert!(is_already_optimized(10_000, 6_000, Some(60), &config));
    }

    #[test]
    fn test_already_optimized_by_percent_only() {
        let config = ReportConfig::default();
        // 1 MB apart, but only 3% savings
        assert!(is_already_optimized(2_000_000, 1_000_000, Some(3), &config));
    }

    #[test]
    fn test_not_already_optimized() {
        let config = ReportConfig::default();
        assert!(!is_already_optimized(100_000, 20_000, Some(80), &config));
        assert!(!is_already_optimized(100_000, 20_000, None, &config));
    }

    #[test]
    fn test_select_dedupes_first_wins() {
        let mut first = measured("https://example.com/a.png", 30_000, 9_000);
        first.width = Some(1);
        let mut second = measured("https://example.com/a.png", 30_000, 9_000);
        second.width = Some(2);

        let selected = select_display_images(&[first, second], true, &ReportConfig::default());
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].image.width, Some(1));
    }

    #[test]
    fn test_select_filters_small_but_keeps_unknown() {
        let images = vec![
            measured("https://example.com/big.png", 30_000, 9_000),
            measured("https://example.com/small.png", 2_000, 1_000),
            measured("https://example.com/edge.png", 5_000, 1_000),
            image("https://example.com/unknown.png", None, None),
        ];

        let selected = select_display_images(&images, true, &ReportConfig::default());
        let urls: Vec<&str> = selected.iter().map(|d| d.image.original.url.as_str()).collect();
        assert_eq!(
            urls,
            vec!["https://example.com/big.png", "https://example.com/unknown.png"]
        );
    }

    #[test]
    fn test_select_sorts_by_carbon_savings() {
        let images = vec![
            image("https://example.com/unknown.png", None, None),
            measured("https://example.com/medium.png", 40_000, 30_000),
            measured("https://example.com/large.png", 400_000, 30_000),
            measured("https://example.com/small.png", 10_000, 9_000),
        ];

        let selected = select_display_images(&images, true, &ReportConfig::default());
        let urls: Vec<&str> = selected.iter().map(|d| d.image.original.url.as_str()).collect();
        assert_eq!(
            urls,
            vec![
                "https://example.com/large.png",
                "https://example.com/medium.png",
                "https://example.com/small.png",
                "https://example.com/unknown.png",
            ]
        );
        assert_eq!(selected[0].savings_size, Some(370_000));
        assert!(selected[0].savings_carbon.unwrap() > 0.0);
        assert_eq!(selected[3].savings_carbon, None);
    }

    #[test]
    fn test_select_truncates_unless_show_all() {
        let images: Vec<ImageRecord> = (0..5)
            .map(|i| measured(&format!("https://example.com/{}.png", i), 10_000 * (i + 1), 100))
            .collect();
        let config = ReportConfig::default();

        assert_eq!(select_display_images(&images, false, &config).len(), 3);
        assert_eq!(select_display_images(&images, true, &config).len(), 5);
    }

    #[test]
    fn test_select_properties() {
        let images = vec![
            measured("https://example.com/a.png", 30_000, 1_000),
            measured("https://example.com/a.png", 30_000, 1_000),
            measured("https://example.com/b.png", 3_000, 1_000),
            image("https://example.com/c.png", Some(0), None),
            image("https://example.com/d.png", None, Some(1.0)),
        ];
        let config = ReportConfig::default();
        let selected = select_display_images(&images, true, &config);

        assert!(selected.len() <= images.len());
        let mut urls = HashSet::new();
        for entry in &selected {
            assert!(urls.insert(entry.image.original.url.clone()));
            if let Some(size) = entry.image.original.size {
                assert!(size > config.min_display_size);
            }
        }
    }

    #[test]
    fn test_scale_to_requests() {
        let yearly = scale_to_requests(0.5, 10_000);
        assert_eq!(yearly.yearly_requests, 120_000);
        assert!((yearly.yearly - 60_000.0).abs() < 1e-9);
    }

    #[test]
    fn test_scale_to_requests_huge_traffic() {
        let yearly = scale_to_requests(0.5, u64::MAX / 4);
        assert_eq!(yearly.yearly_requests, u64::MAX);
        assert!(yearly.yearly.is_finite());
        assert!(yearly.yearly > 0.0);

        let top = MonthlyRequests::new(u64::MAX).increment();
        assert_eq!(top.get(), u64::MAX);
    }

    #[test]
    fn test_display_image_already_optimized() {
        let images = vec![
            measured("https://example.com/done.png", 12_000, 8_000),
            measured("https://example.com/heavy.png", 60_000, 9_000),
            image("https://example.com/unmeasured.png", Some(20_000), None),
        ];

        let selected = select_display_images(&images, true, &ReportConfig::default());
        let flag = |url: &str| {
            selected
                .iter()
                .find(|d| d.image.original.url == url)
                .map(|d| d.already_optimized)
        };
        assert_eq!(flag("https://example.com/done.png"), Some(true));
        assert_eq!(flag("https://example.com/heavy.png"), Some(false));
        assert_eq!(flag("https://example.com/unmeasured.png"), Some(false));
    }

    #[test]
    fn test_monthly_requests_stepper() {
        let start = MonthlyRequests::default();
        assert_eq!(start.get(), 10_000);
        assert_eq!(start.increment().get(), 20_000);
        assert_eq!(start.decrement().get(), 1_000);
        assert_eq!(start.decrement().decrement().get(), 1_000);
        assert_eq!(start.decrement().increment().get(), 10_000);
        assert_eq!(MonthlyRequests::new(10).get(), 1_000);
    }

    #[test]
    fn test_equivalents() {
        let eq = Equivalents::of(8887.0);
        assert!((eq.gasoline_gallons - 1.0).abs() < 1e-12);
        assert!((Equivalents::of(1350.0).pizza_slices - 1.0).abs() < 1e-12);
        assert!((Equivalents::of(418.0).coffee_cups - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_report_end_to_end_example() {
        let images = vec![
            measured("https://example.com/one.jpg", 30_000, 8_000),
            measured("https://example.com/two.jpg", 30_000, 7_000),
            measured("https://example.com/tiny.png", 2_000, 1_500),
        ];

        let report = SiteReport::build(
            "example.com",
            None,
            None,
            &images,
            ReportOptions::default(),
            &ReportConfig::default(),
        );

        assert_eq!(report.total_bytes_original, 62_000);
        assert_eq!(report.total_bytes_optimized, 16_500);
        assert_eq!(report.images.len(), 2);
        assert!(report
            .images
            .iter()
            .all(|d| d.image.original.url != "https://example.com/tiny.png"));
        assert_eq!(report.hidden_images, 1);

        let model = EmissionsModel::default();
        let expected_co2 = 2.0 * model.estimate(30_000, false) + model.estimate(2_000, false);
        assert!((report.total_co2_original - expected_co2).abs() < 1e-12);
        assert!(!report.already_optimized);
        assert_eq!(report.display_url, "https://example.com");
        assert_eq!(report.yearly.monthly_requests, 10_000);
    }

    #[test]
    fn test_report_serializes_flattened_images() {
        let images = vec![measured("https://example.com/one.jpg", 30_000, 8_000)];
        let report = SiteReport::build(
            "example.com",
            None,
            None,
            &images,
            ReportOptions::default(),
            &ReportConfig::default(),
        );

        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["images"][0]["original"]["url"], "https://example.com/one.jpg");
        assert_eq!(value["images"][0]["savingsSize"], 22_000);
        assert_eq!(value["totalBytesOriginal"], 30_000);
    }
}
