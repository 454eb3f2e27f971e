//! Plain-text rendering of a [`SiteReport`] for the terminal.

use std::fmt;

use imagecarbon_core::format::{add_commas, format_bytes, format_grams, format_number, FormatOptions};
use imagecarbon_core::{DisplayImage, SiteReport};

/// Renders the headline, the per-image table and the yearly estimate.
pub fn render_report(report: &SiteReport) -> String {
    ReportText(report).to_string()
}

/// Terminal layout of a report.
pub struct ReportText<'a>(pub &'a SiteReport);

impl fmt::Display for ReportText<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let report = self.0;

        writeln!(f, "{}", report.display_url)?;
        if let Some(date) = report.date_collected {
            writeln!(f, "Collected {}", date.format("%Y-%m-%d %H:%M UTC"))?;
        }
        writeln!(f)?;

        writeln!(
            f,
            "Images:    {} -> {}",
            bytes(report.total_bytes_original),
            bytes(report.total_bytes_optimized)
        )?;
        writeln!(
            f,
            "CO2/view:  {} -> {}",
            grams(report.total_co2_original),
            grams(report.total_co2_optimized)
        )?;

        if report.already_optimized {
            writeln!(f, "Images on this site are already well optimized.")?;
        } else if let Some(percent) = report.savings_percent {
            writeln!(f, "Optimizing could save {}% of image emissions.", percent)?;
        }

        if !report.images.is_empty() {
            writeln!(f)?;
            for image in &report.images {
                write_image_line(f, image)?;
            }
        }
        if report.hidden_images > 0 {
            writeln!(f, "... and {} more (use --all)", report.hidden_images)?;
        }

        writeln!(f)?;
        writeln!(
            f,
            "At {} requests a month: {} of CO2 a year",
            add_commas(&report.yearly.monthly_requests.to_string()),
            grams(report.yearly.yearly)
        )?;
        writeln!(
            f,
            "That is {} gallons of gasoline, {} cups of coffee or {} slices of pizza.",
            format_number(report.equivalents.gasoline_gallons, 1),
            format_number(report.equivalents.coffee_cups, 0),
            format_number(report.equivalents.pizza_slices, 1)
        )
    }
}

fn write_image_line(f: &mut fmt::Formatter<'_>, image: &DisplayImage) -> fmt::Result {
    let record = &image.image;
    let original = record.original.size.map(bytes).unwrap_or_else(|| "?".to_string());
    let optimized = record.optimized.size.map(bytes).unwrap_or_else(|| "?".to_string());

    write!(f, "  {}  {} -> {}", record.original.url, original, optimized)?;
    if image.already_optimized {
        write!(f, "  (already optimized)")?;
    } else if let Some(saved) = image.savings_carbon {
        write!(f, "  (saves {})", grams(saved))?;
    }
    writeln!(f)
}

fn bytes(value: u64) -> String {
    format_bytes(value as f64, FormatOptions::bytes())
}

fn grams(value: f64) -> String {
    format_grams(value, FormatOptions::grams().with_decimals(2))
}
