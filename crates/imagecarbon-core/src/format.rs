//! Human-readable number formatting for reports.

const BYTE_UNITS: &[&str] = &["B", "KB", "MB", "GB"];
const MASS_UNITS: &[&str] = &["g", "kg"];

/// Magnitude step between units (decimal, 1 KB = 1000 B).
const UNIT_STEP: f64 = 1000.0;

/// Options for the magnitude formatters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FormatOptions {
    /// Digits after the decimal point.
    pub decimals: usize,
    /// A value at or above this moves to the next unit.
    pub threshold: f64,
}

impl FormatOptions {
    /// Defaults for byte sizes: whole numbers.
    pub fn bytes() -> Self {
        Self {
            decimals: 0,
            threshold: UNIT_STEP,
        }
    }

    /// Defaults for CO2 masses: one decimal.
    pub fn grams() -> Self {
        Self {
            decimals: 1,
            threshold: UNIT_STEP,
        }
    }

    /// Sets the number of decimals.
    pub fn with_decimals(mut self, decimals: usize) -> Self {
        self.decimals = decimals;
        self
    }

    /// Sets the unit promotion threshold.
    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }
}

impl Default for FormatOptions {
    fn default() -> Self {
        Self::bytes()
    }
}

/// Formats a byte count as `B`, `KB`, `MB` or `GB`.
pub fn format_bytes(bytes: f64, options: FormatOptions) -> String {
    format_magnitude(bytes, BYTE_UNITS, options)
}

/// Formats a CO2 mass in grams as `g` or `kg`.
pub fn format_grams(grams: f64, options: FormatOptions) -> String {
    format_magnitude(grams, MASS_UNITS, options)
}

/// Rounds to `decimals` places and groups the integer part with commas.
pub fn format_number(value: f64, decimals: usize) -> String {
    if !value.is_finite() {
        return value.to_string();
    }
    add_commas(&format!("{:.*}", decimals, value))
}

/// Groups the integer part of a numeric string with thousands separators.
///
/// Anything that is not a plain decimal number is returned unchanged.
pub fn add_commas(value: &str) -> String {
    let (sign, unsigned) = match value.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", value),
    };

    let (integer, fraction) = match unsigned.split_once('.') {
        Some((integer, fraction)) => (integer, Some(fraction)),
        None => (unsigned, None),
    };

    let is_digits = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
    if !is_digits(integer) || fraction.is_some_and(|f| !is_digits(f)) {
        return value.to_string();
    }

    let mut grouped = String::with_capacity(integer.len() + integer.len() / 3);
    for (i, ch) in integer.chars().enumerate() {
        if i > 0 && (integer.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    match fraction {
        Some(fraction) => format!("{}{}.{}", sign, grouped, fraction),
        None => format!("{}{}", sign, grouped),
    }
}

fn format_magnitude(value: f64, units: &[&str], options: FormatOptions) -> String {
    if !value.is_finite() {
        return value.to_string();
    }

    let mut scaled = value;
    let mut unit = 0;
    while scaled.abs() >= options.threshold && unit + 1 < units.len() {
        scaled /= UNIT_STEP;
        unit += 1;
    }

    format!("{} {}", format_number(scaled, options.decimals), units[unit])
}
