//! Listed option contracts and OCC symbology.
//!
//! Vendors identify option contracts by their OCC symbol, e.g.
//! `AAPL250117C00150000`: the underlying root, the expiration as `YYMMDD`, the
//! contract side (`C`/`P`) and the strike multiplied by 1000, zero-padded to eight
//! digits. [`OccSymbol`] decodes that layout so providers only need to supply the
//! symbol and whatever quote fields they carry.

use std::{fmt, str::FromStr};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

const DATE_LEN: usize = 6;
const STRIKE_LEN: usize = 8;
const SUFFIX_LEN: usize = DATE_LEN + 1 + STRIKE_LEN;

/// Side of an option contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptionKind {
    Call,
    Put,
}

impl fmt::Display for OptionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptionKind::Call => f.write_str("call"),
            OptionKind::Put => f.write_str("put"),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum OccSymbolError {
    #[error("OCC symbol '{0}' is too short")]
    TooShort(String),

    #[error("OCC symbol '{0}' has no underlying root")]
    MissingRoot(String),

    #[error("OCC symbol '{symbol}' has invalid expiration '{raw}'")]
    InvalidExpiration { symbol: String, raw: String },

    #[error("OCC symbol '{symbol}' has invalid contract side '{raw}'")]
    InvalidKind { symbol: String, raw: char },

    #[error("OCC symbol '{symbol}' has invalid strike '{raw}'")]
    InvalidStrike { symbol: String, raw: String },
}

/// The decoded parts of an OCC option symbol.
#[derive(Debug, Clone, PartialEq)]
pub struct OccSymbol {
    pub root: String,
    pub expiration: NaiveDate,
    pub kind: OptionKind,
    pub strike: f64,
}

impl FromStr for OccSymbol {
    type Err = OccSymbolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let symbol = s.trim();
        if !symbol.is_ascii() || symbol.len() <= SUFFIX_LEN {
            return Err(OccSymbolError::TooShort(symbol.to_string()));
        }

        let (root, suffix) = symbol.split_at(symbol.len() - SUFFIX_LEN);
        let root = root.trim_end();
        if root.is_empty() {
            return Err(OccSymbolError::MissingRoot(symbol.to_string()));
        }

        let (date_raw, rest) = suffix.split_at(DATE_LEN);
        let (kind_raw, strike_raw) = rest.split_at(1);

        let expiration = NaiveDate::parse_from_str(&format!("20{date_raw}"), "%Y%m%d")
            .map_err(|_| OccSymbolError::InvalidExpiration {
                symbol: symbol.to_string(),
                raw: date_raw.to_string(),
            })?;

        let kind = match kind_raw {
            "C" => OptionKind::Call,
            "P" => OptionKind::Put,
            other => {
                return Err(OccSymbolError::InvalidKind {
                    symbol: symbol.to_string(),
                    raw: other.chars().next().unwrap_or('?'),
                });
            }
        };

        if !strike_raw.bytes().all(|b| b.is_ascii_digit()) {
            return Err(OccSymbolError::InvalidStrike {
                symbol: symbol.to_string(),
                raw: strike_raw.to_string(),
            });
        }
        let strike_milli: u64 =
            strike_raw
                .parse()
                .map_err(|_| OccSymbolError::InvalidStrike {
                    symbol: symbol.to_string(),
                    raw: strike_raw.to_string(),
                })?;

        Ok(Self {
            root: root.to_string(),
            expiration,
            kind,
            strike: strike_milli as f64 / 1000.0,
        })
    }
}

/// One listed option contract with the quote fields the screener cares about.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionContract {
    /// Vendor symbol, normally the OCC symbol.
    pub symbol: String,
    pub underlying: String,
    pub expiration: NaiveDate,
    pub kind: OptionKind,
    pub strike: f64,
    /// Implied volatility as a fraction (0.25 == 25%). Absent when the vendor has
    /// no recent quote to derive it from.
    pub implied_volatility: Option<f64>,
}

impl OptionContract {
    /// Builds a contract from an OCC symbol, taking underlying, expiration, side and
    /// strike from the symbol itself.
    pub fn from_occ(symbol: &str, implied_volatility: Option<f64>) -> Result<Self, OccSymbolError> {
        let occ: OccSymbol = symbol.parse()?;
        Ok(Self {
            symbol: symbol.trim().to_string(),
            underlying: occ.root,
            expiration: occ.expiration,
            kind: occ.kind,
            strike: occ.strike,
            implied_volatility,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_standard_symbol() {
        let occ: OccSymbol = "AAPL250117C00150000".parse().unwrap();
        assert_eq!(occ.root, "AAPL");
        assert_eq!(occ.expiration, NaiveDate::from_ymd_opt(2025, 1, 17).unwrap());
        assert_eq!(occ.kind, OptionKind::Call);
        assert_eq!(occ.strike, 150.0);
    }

    #[test]
    fn parses_fractional_strike_and_short_root() {
        let occ: OccSymbol = "F240621P00012500".parse().unwrap();
        assert_eq!(occ.root, "F");
        assert_eq!(occ.kind, OptionKind::Put);
        assert_eq!(occ.strike, 12.5);
    }

    #[test]
    fn parses_space_padded_root() {
        let occ: OccSymbol = "SPY   241220C00600000".parse().unwrap();
        assert_eq!(occ.root, "SPY");
        assert_eq!(occ.strike, 600.0);
    }

    #[test]
    fn rejects_malformed_symbols() {
        assert!(matches!(
            "C00150000".parse::<OccSymbol>(),
            Err(OccSymbolError::TooShort(_))
        ));
        assert!(matches!(
            "AAPL251317C00150000".parse::<OccSymbol>(),
            Err(OccSymbolError::InvalidExpiration { .. })
        ));
        assert!(matches!(
            "AAPL250117X00150000".parse::<OccSymbol>(),
            Err(OccSymbolError::InvalidKind { raw: 'X', .. })
        ));
        assert!(matches!(
            "AAPL250117C0015000A".parse::<OccSymbol>(),
            Err(OccSymbolError::InvalidStrike { .. })
        ));
    }

    #[test]
    fn contract_from_occ_keeps_iv() {
        let contract = OptionContract::from_occ("MSFT240920C00420000", Some(0.2314)).unwrap();
        assert_eq!(contract.underlying, "MSFT");
        assert_eq!(contract.strike, 420.0);
        assert_eq!(contract.implied_volatility, Some(0.2314));
    }
}
