use chrono::Utc;
use once_cell::sync::Lazy;
use rand::Rng;
use regex::Regex;

/// Formats a whole-KES amount with thousands separators, e.g. `KES 25,300`.
pub fn format_kes(amount: i64) -> String {
    format!("KES {}", group_thousands(amount))
}

pub fn group_thousands(amount: i64) -> String {
    let negative = amount < 0;
    let digits = amount.unsigned_abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    if negative {
        format!("-{grouped}")
    } else {
        grouped
    }
}

const ORDER_SUFFIX_LEN: usize = 4;
const ORDER_SUFFIX_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Human-readable order number: `PREFIX-YYYYMMDD-XXXX` with a 4-char random
/// base36 suffix. Format-only guarantee; the internal order id is the
/// uniqueness key, never this number.
pub fn generate_order_number(prefix: &str) -> String {
    let date = Utc::now().format("%Y%m%d");
    let mut rng = rand::thread_rng();
    let suffix: String = (0..ORDER_SUFFIX_LEN)
        .map(|_| ORDER_SUFFIX_ALPHABET[rng.gen_range(0..ORDER_SUFFIX_ALPHABET.len())] as char)
        .collect();
    format!("{prefix}-{date}-{suffix}")
}

static KENYAN_PHONE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:\+?254|0)[17]\d{8}$").expect("valid phone regex"));

/// Accepts 07XXXXXXXX / 01XXXXXXXX, 254XXXXXXXXX and +254XXXXXXXXX.
pub fn is_valid_kenyan_phone(phone: &str) -> bool {
    let cleaned: String = phone.chars().filter(|c| !c.is_whitespace() && *c != '-').collect();
    KENYAN_PHONE.is_match(&cleaned)
}

/// Normalizes a Kenyan phone number to E.164.
pub fn format_phone_e164(phone: &str) -> String {
    let cleaned: String = phone.chars().filter(|c| !c.is_whitespace() && *c != '-').collect();
    if let Some(rest) = cleaned.strip_prefix("+254") {
        format!("+254{rest}")
    } else if let Some(rest) = cleaned.strip_prefix("254") {
        format!("+254{rest}")
    } else if let Some(rest) = cleaned.strip_prefix('0') {
        format!("+254{rest}")
    } else {
        format!("+254{cleaned}")
    }
}

/// wa.me deep link with a prefilled, already URL-encoded message.
pub fn whatsapp_link(phone_e164: &str, encoded_message: &str) -> String {
    let digits: String = phone_e164.chars().filter(|c| c.is_ascii_digit()).collect();
    format!("https://wa.me/{digits}?text={encoded_message}")
}
