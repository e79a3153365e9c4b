//! Small text helpers for outbound card formatting.

use rust_decimal::Decimal;

/// Truncate to at most `limit` characters (not bytes; inbound text is
/// frequently Cyrillic). Truncated strings end with an ellipsis and still
/// fit within the limit.
pub fn truncate_chars(s: &str, limit: usize) -> String {
    if s.chars().count() <= limit {
        return s.to_string();
    }
    let mut out: String = s.chars().take(limit.saturating_sub(1)).collect();
    out.push('…');
    out
}

/// Format a price as "12,500₮" with thousands separators. Fractional parts
/// are dropped; tugrik prices are whole numbers in practice.
pub fn format_price(price: &Decimal) -> String {
    let whole = price.trunc().to_string();
    let (sign, digits) = match whole.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", whole.as_str()),
    };

    let mut grouped = String::new();
    let chars: Vec<char> = digits.chars().collect();
    for (i, c) in chars.iter().enumerate() {
        if i > 0 && (chars.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(*c);
    }

    format!("{}{}₮", sign, grouped)
}
