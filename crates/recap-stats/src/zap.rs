//! Zap amount decoding (BOLT11 invoices) and zap receipt helpers.

use crate::event::RawEvent;
use bech32::primitives::decode::CheckedHrpstring;
use bech32::Checksum;

/// Bech32 checksum without the 90-character limit; BOLT11 invoices are
/// routinely longer.
pub enum Bolt11Checksum {}

impl Checksum for Bolt11Checksum {
    type MidstateRepr = u32;
    const CODE_LENGTH: usize = usize::MAX;
    const CHECKSUM_LENGTH: usize = 6;
    const GENERATOR_SH: [u32; 5] = [0x3b6a57b2, 0x26508e6d, 0x1ea119fa, 0x3d4233dd, 0x2a1462b3];
    const TARGET_RESIDUE: u32 = 1;
}

/// Millisatoshis per whole bitcoin.
const MSATS_PER_BTC: u64 = 100_000_000_000;

/// Decode the amount of a BOLT11 invoice in whole sats (floored).
///
/// Malformed invoices, amount-less invoices and overflowing amounts all
/// yield 0.
pub fn decode_invoice_amount_sats(invoice: &str) -> u64 {
    decode_invoice_msats(invoice).map(|msats| msats / 1000).unwrap_or(0)
}

fn decode_invoice_msats(invoice: &str) -> Option<u64> {
    let invoice = invoice.trim();
    let invoice = invoice
        .strip_prefix("lightning:")
        .or_else(|| invoice.strip_prefix("LIGHTNING:"))
        .unwrap_or(invoice);

    let checked = match CheckedHrpstring::new::<Bolt11Checksum>(invoice) {
        Ok(c) => c,
        Err(e) => {
            log::debug!("invalid bolt11 invoice: {e}");
            return None;
        }
    };
    parse_hrp_msats(&checked.hrp().to_lowercase())
}

/// Parse `ln<currency><amount><multiplier>` into millisats.
fn parse_hrp_msats(hrp: &str) -> Option<u64> {
    let rest = hrp.strip_prefix("ln")?;
    let amount_start = rest.find(|c: char| c.is_ascii_digit())?;
    let (currency, amount) = rest.split_at(amount_start);
    if currency.is_empty() {
        return None;
    }

    let (digits, multiplier) = match amount.char_indices().last()? {
        (_, c) if c.is_ascii_digit() => (amount, None),
        (idx, c) => (&amount[..idx], Some(c)),
    };
    if digits.is_empty()
        || !digits.bytes().all(|b| b.is_ascii_digit())
        || (digits.len() > 1 && digits.starts_with('0'))
    {
        return None;
    }
    let value: u64 = digits.parse().ok()?;

    match multiplier {
        None => value.checked_mul(MSATS_PER_BTC),
        Some('m') => value.checked_mul(MSATS_PER_BTC / 1_000),
        Some('u') => value.checked_mul(MSATS_PER_BTC / 1_000_000),
        Some('n') => value.checked_mul(MSATS_PER_BTC / 1_000_000_000),
        // 1 pico-BTC is a tenth of a millisat; only whole millisats are valid.
        Some('p') if value % 10 == 0 => Some(value / 10),
        _ => None,
    }
}

/// Amount of a zap receipt, decoded from its `bolt11` tag.
pub fn receipt_amount_sats(receipt: &RawEvent) -> u64 {
    receipt
        .first_tag_value("bolt11")
        .map(decode_invoice_amount_sats)
        .unwrap_or(0)
}

/// The zap request embedded in a receipt's `description` tag.
pub fn embedded_request(receipt: &RawEvent) -> Option<RawEvent> {
    let description = receipt.first_tag_value("description")?;
    match serde_json::from_str(description) {
        Ok(request) => Some(request),
        Err(e) => {
            log::debug!("zap receipt {} has malformed description: {e}", receipt.id);
            None
        }
    }
}

/// Who paid: the `P` tag, else the author of the embedded request.
pub fn zap_sender(receipt: &RawEvent) -> Option<String> {
    if let Some(sender) = receipt.first_tag_value("P") {
        return Some(sender.to_string());
    }
    embedded_request(receipt).map(|request| request.pubkey)
}

/// Who was paid: the receipt's `p` tag.
pub fn zap_recipient(receipt: &RawEvent) -> Option<&str> {
    receipt.first_tag_value("p")
}

/// Amount a zap request asked for, from its `amount` tag (millisats).
pub fn request_amount_sats(request: &RawEvent) -> u64 {
    request
        .first_tag_value("amount")
        .and_then(|msats| msats.trim().parse::<u64>().ok())
        .map(|msats| msats / 1000)
        .unwrap_or(0)
}

/// Build a checksum-valid invoice with the given human-readable part.
#[cfg(test)]
pub(crate) fn test_invoice(hrp: &str) -> String {
    let hrp = bech32::Hrp::parse(hrp).unwrap();
    bech32::encode::<Bolt11Checksum>(hrp, &[7u8; 80]).unwrap()
}
