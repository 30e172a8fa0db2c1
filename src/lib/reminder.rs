use rust_decimal::{Decimal, RoundingStrategy};

use crate::error::{LedgerError, LedgerResult};
use crate::types::{Customer, MonetaryAmount};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentReminder {
    pub phone: String,
    pub message: String,
    /// `sms:` link that opens the device's messaging app with the message filled in.
    pub sms_uri: String,
}

/// Formats an amount as US dollars, e.g. `$1,234.50` or `-$20.00`.
pub fn format_currency(amount: MonetaryAmount) -> String {
    let rounded = amount
        .value()
        .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    let sign = if rounded < Decimal::ZERO { "-" } else { "" };
    let fixed = format!("{:.2}", rounded.abs());
    let (whole, cents) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));
    format!("{sign}${}.{cents}", group_thousands(whole))
}

fn group_thousands(digits: &str) -> String {
    let len = digits.len();
    digits
        .chars()
        .enumerate()
        .fold(String::with_capacity(len + len / 3), |mut out, (i, c)| {
            if i > 0 && (len - i) % 3 == 0 {
                out.push(',');
            }
            out.push(c);
            out
        })
}

// Same unreserved set as JavaScript's encodeURIComponent.
fn encode_component(input: &str) -> String {
    input
        .bytes()
        .map(|b| match b {
            b'A'..=b'Z'
            | b'a'..=b'z'
            | b'0'..=b'9'
            | b'-'
            | b'_'
            | b'.'
            | b'!'
            | b'~'
            | b'*'
            | b'\''
            | b'('
            | b')' => (b as char).to_string(),
            _ => format!("%{b:02X}"),
        })
        .collect()
}

/// Builds the outstanding-balance reminder sent to a customer on behalf of `owner_name`.
pub fn payment_reminder(customer: &Customer, owner_name: &str) -> LedgerResult<PaymentReminder> {
    let phone = customer
        .phone()
        .ok_or_else(|| LedgerError::validation("no phone number saved for this customer"))?;
    if !customer.balance.is_positive() {
        return Err(LedgerError::validation(
            "customer has no outstanding balance",
        ));
    }

    let message = format!(
        "Hi {}, this is a friendly reminder from {} about your outstanding balance of {}. Thank you!",
        customer.name,
        owner_name,
        format_currency(customer.balance)
    );
    let sms_uri = format!("sms:{}?body={}", phone, encode_component(&message));

    Ok(PaymentReminder {
        phone: phone.to_string(),
        message,
        sms_uri,
    })
}
