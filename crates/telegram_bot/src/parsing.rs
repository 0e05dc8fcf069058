use ledger::Money;

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct EntryText {
    pub amount_minor: i64,
    pub description: Option<String>,
    pub wallet: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct TransferText {
    pub amount_minor: i64,
    pub from_wallet: String,
    pub to_wallet: String,
}

#[derive(Debug, thiserror::Error)]
pub(crate) enum ParseError {
    #[error("jumlah tidak valid")]
    InvalidAmount,
    #[error("format tidak lengkap")]
    Incomplete,
    #[error("teks kosong")]
    Empty,
}

/// Words that introduce a wallet name in a transaction message, as in
/// `50000 makan siang dari BCA`.
const WALLET_INDICATORS: &[&str] = &[
    "dari", "ke", "untuk", "pakai", "via", "lewat", "from", "with",
];

fn collapse_whitespace(input: &str) -> String {
    input.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn multiplier(word: &str) -> Option<f64> {
    match word {
        "rb" | "ribu" | "k" => Some(1_000.0),
        "jt" | "juta" | "m" => Some(1_000_000.0),
        "miliar" | "b" => Some(1_000_000_000.0),
        _ => None,
    }
}

/// Parses an amount with Indonesian shorthand: `500rb`, `1,5jt`, `2 juta`,
/// `Rp 10.500`. Dots are thousands separators, a comma is the decimal mark.
pub(crate) fn parse_amount(input: &str) -> Result<i64, ParseError> {
    let lowered = input.trim().to_lowercase();
    let stripped = lowered
        .strip_prefix("rp")
        .map(str::trim_start)
        .unwrap_or(&lowered);
    let compact: String = stripped.chars().filter(|c| !c.is_whitespace()).collect();
    if compact.is_empty() {
        return Err(ParseError::InvalidAmount);
    }

    let (number_part, mult) = match compact.find(|c: char| c.is_alphabetic()) {
        Some(idx) => {
            let mult = multiplier(&compact[idx..]).ok_or(ParseError::InvalidAmount)?;
            (&compact[..idx], mult)
        }
        None => (compact.as_str(), 1.0),
    };

    let normalized = number_part.replace('.', "").replace(',', ".");
    if normalized.is_empty() {
        return Err(ParseError::InvalidAmount);
    }
    let value: f64 = normalized.parse().map_err(|_| ParseError::InvalidAmount)?;
    let minor = (value * mult).round() as i64;
    if minor <= 0 {
        return Err(ParseError::InvalidAmount);
    }
    Ok(minor)
}

/// Splits the amount token off the front of `input`, merging a standalone
/// multiplier word (`500 rb`) into it.
fn take_amount(tokens: &[&str]) -> Result<(i64, usize), ParseError> {
    let first = tokens.first().ok_or(ParseError::Empty)?;
    if let Some(second) = tokens.get(1)
        && multiplier(&second.to_lowercase()).is_some()
        && let Ok(minor) = parse_amount(&format!("{first}{second}"))
    {
        return Ok((minor, 2));
    }
    Ok((parse_amount(first)?, 1))
}

/// Parses the body of `/in` and `/out` messages:
/// `50000 makan siang dari BCA` or `500rb gaji`.
pub(crate) fn parse_entry(input: &str) -> Result<EntryText, ParseError> {
    let trimmed = collapse_whitespace(input.trim());
    if trimmed.is_empty() {
        return Err(ParseError::Empty);
    }
    let tokens: Vec<&str> = trimmed.split(' ').collect();
    let (amount_minor, consumed) = take_amount(&tokens)?;
    let rest = &tokens[consumed..];

    let indicator = rest
        .iter()
        .position(|t| WALLET_INDICATORS.contains(&t.to_lowercase().as_str()));
    let (description_tokens, wallet_tokens) = match indicator {
        Some(idx) => (&rest[..idx], &rest[idx + 1..]),
        None => (rest, &[][..]),
    };

    let description = description_tokens.join(" ");
    let wallet = wallet_tokens.join(" ");
    Ok(EntryText {
        amount_minor,
        description: (!description.is_empty()).then_some(description),
        wallet: (!wallet.is_empty()).then_some(wallet),
    })
}

/// Parses the body of `/transfer`: `100000 BCA Tunai`. The first word after
/// the amount is the source; everything after it is the destination.
pub(crate) fn parse_transfer(input: &str) -> Result<TransferText, ParseError> {
    let trimmed = collapse_whitespace(input.trim());
    if trimmed.is_empty() {
        return Err(ParseError::Empty);
    }
    let tokens: Vec<&str> = trimmed.split(' ').collect();
    let (amount_minor, consumed) = take_amount(&tokens)?;
    let rest = &tokens[consumed..];
    if rest.len() < 2 {
        return Err(ParseError::Incomplete);
    }
    Ok(TransferText {
        amount_minor,
        from_wallet: rest[0].to_string(),
        to_wallet: rest[1..].join(" "),
    })
}

/// Quantity input for assets: `2` lots, `0,5` BTC.
pub(crate) fn parse_quantity(input: &str) -> Result<f64, ParseError> {
    let normalized = input.trim().replace(',', ".");
    let value: f64 = normalized.parse().map_err(|_| ParseError::InvalidAmount)?;
    if value <= 0.0 || !value.is_finite() {
        return Err(ParseError::InvalidAmount);
    }
    Ok(value)
}

pub(crate) fn format_amount(minor: i64) -> String {
    Money::new(minor).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_amount_with_separators() {
        assert_eq!(parse_amount("10.500").unwrap(), 10_500);
        assert_eq!(parse_amount("Rp 1.000.000").unwrap(), 1_000_000);
    }

    #[test]
    fn shorthand_multipliers() {
        assert_eq!(parse_amount("500rb").unwrap(), 500_000);
        assert_eq!(parse_amount("500 ribu").unwrap(), 500_000);
        assert_eq!(parse_amount("1,5jt").unwrap(), 1_500_000);
        assert_eq!(parse_amount("2 juta").unwrap(), 2_000_000);
        assert_eq!(parse_amount("1miliar").unwrap(), 1_000_000_000);
        assert_eq!(parse_amount("25k").unwrap(), 25_000);
    }

    #[test]
    fn rejects_garbage_and_zero() {
        assert!(parse_amount("abc").is_err());
        assert!(parse_amount("0").is_err());
        assert!(parse_amount("-5000").is_err());
    }

    #[test]
    fn entry_with_wallet_indicator() {
        let entry = parse_entry("50000 makan siang dari BCA").unwrap();
        assert_eq!(entry.amount_minor, 50_000);
        assert_eq!(entry.description.as_deref(), Some("makan siang"));
        assert_eq!(entry.wallet.as_deref(), Some("BCA"));
    }

    #[test]
    fn entry_with_split_multiplier() {
        let entry = parse_entry("500 rb gaji").unwrap();
        assert_eq!(entry.amount_minor, 500_000);
        assert_eq!(entry.description.as_deref(), Some("gaji"));
        assert_eq!(entry.wallet, None);
    }

    #[test]
    fn entry_without_description() {
        let entry = parse_entry("25000").unwrap();
        assert_eq!(entry.amount_minor, 25_000);
        assert_eq!(entry.description, None);
    }

    #[test]
    fn transfer_needs_two_wallets() {
        let transfer = parse_transfer("100rb BCA Tunai").unwrap();
        assert_eq!(transfer.amount_minor, 100_000);
        assert_eq!(transfer.from_wallet, "BCA");
        assert_eq!(transfer.to_wallet, "Tunai");

        assert!(matches!(
            parse_transfer("100rb BCA").unwrap_err(),
            ParseError::Incomplete
        ));
    }

    #[test]
    fn transfer_multiword_destination() {
        let transfer = parse_transfer("1jt BCA Dompet Harian").unwrap();
        assert_eq!(transfer.to_wallet, "Dompet Harian");
    }

    #[test]
    fn quantity_accepts_comma_decimal() {
        assert_eq!(parse_quantity("0,5").unwrap(), 0.5);
        assert!(parse_quantity("0").is_err());
    }
}
