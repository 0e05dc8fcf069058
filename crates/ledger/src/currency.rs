use serde::{Deserialize, Serialize};

use crate::LedgerError;

/// Currency code attached to wallets and transactions.
///
/// The bot is effectively mono-currency (default `IDR`), but the data model
/// keeps the currency explicit so the column never has to be retrofitted.
///
/// ## Minor units
///
/// Monetary values are stored as an `i64` number of **minor units** (see
/// [`Money`](crate::Money)). `minor_units()` reports how many fraction digits
/// a currency uses; IDR uses 0, so stored values are whole rupiah.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    #[default]
    Idr,
}

impl Currency {
    /// Canonical currency code.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Currency::Idr => "IDR",
        }
    }

    /// Number of fraction digits used when formatting/parsing amounts.
    #[must_use]
    pub const fn minor_units(self) -> u8 {
        match self {
            Currency::Idr => 0,
        }
    }
}

impl core::fmt::Display for Currency {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.code())
    }
}

impl TryFrom<&str> for Currency {
    type Error = LedgerError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.trim().to_ascii_uppercase().as_str() {
            "IDR" => Ok(Currency::Idr),
            other => Err(LedgerError::InvalidKind(format!(
                "unsupported currency: {other}"
            ))),
        }
    }
}
