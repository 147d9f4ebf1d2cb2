/// Counts wrap around at one trillion so the display never grows past a few characters.
const WRAP_AT: u64 = 1_000_000_000_000;

const UNITS: [(u64, &str); 3] = [
    (1_000_000_000, "B"),
    (1_000_000, "M"),
    (1_000, "k"),
];

/// Formats a count into a short human readable string, e.g. `1.5k` or `2.5M`.
///
/// Values are rounded half-up to a single decimal place. Rounding never promotes a value into the
/// next unit, so `999_950` is shown as `1000.0k`.
pub fn format_count(count: u64) -> String {
    let count = count % WRAP_AT;
    for (unit, suffix) in UNITS {
        if count >= unit {
            let tenths = (count * 10 + unit / 2) / unit;
            return format!("{}.{}{suffix}", tenths / 10, tenths % 10);
        }
    }
    count.to_string()
}
