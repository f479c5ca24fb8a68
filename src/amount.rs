//! Sat <-> BTC display helpers.

const SATS_PER_BTC: u64 = 100_000_000;
const MIN_FRACTION_DIGITS: usize = 5;

/// `1000` -> `"0.00001"`, `141` -> `"0.00000141"`, `150_000_000` -> `"1.50000"`.
pub fn format_btc(amount_sat: u64) -> String {
    let whole = amount_sat / SATS_PER_BTC;
    let frac = format!("{:08}", amount_sat % SATS_PER_BTC);
    let trimmed = frac.trim_end_matches('0');
    let digits = trimmed.len().max(MIN_FRACTION_DIGITS);
    format!("{}.{}", whole, &frac[..digits])
}

/// Parse a decimal BTC string to sats. At most 8 fraction digits.
pub fn parse_btc(value: &str) -> Option<u64> {
    let value = value.trim();
    let (whole, frac) = match value.split_once('.') {
        Some((w, f)) => (w, f),
        None => (value, ""),
    };
    if whole.is_empty() && frac.is_empty() {
        return None;
    }
    if frac.len() > 8 || !whole.bytes().chain(frac.bytes()).all(|b| b.is_ascii_digit()) {
        return None;
    }
    let whole: u64 = if whole.is_empty() { 0 } else { whole.parse().ok()? };
    let frac: u64 = if frac.is_empty() { 0 } else { format!("{:0<8}", frac).parse().ok()? };
    whole.checked_mul(SATS_PER_BTC)?.checked_add(frac)
}
