//! Monetary amounts in US dollars, kept as whole cents.

use {
    std::str::FromStr,
    rocket::form::{
        self,
        FromFormField,
        ValueField,
    },
    serde::Serializer,
    crate::prelude::*,
};

/// The currency code sent to the payment provider. All amounts in the system are in this currency.
pub(crate) const CURRENCY: &str = "USD";

#[derive(Debug, thiserror::Error)]
#[error("amount out of range")]
pub(crate) struct Overflow;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub(crate) struct Money {
    cents: i64,
}

impl Money {
    pub(crate) const ZERO: Self = Self { cents: 0 };

    pub(crate) const fn from_cents(cents: i64) -> Self {
        Self { cents }
    }

    pub(crate) const fn cents(self) -> i64 {
        self.cents
    }

    pub(crate) const fn is_positive(self) -> bool {
        self.cents > 0
    }

    pub(crate) fn checked_add(self, rhs: Self) -> Result<Self, Overflow> {
        self.cents.checked_add(rhs.cents).map(Self::from_cents).ok_or(Overflow)
    }

    /// Formats the amount without a currency symbol, as the payment provider expects it.
    pub(crate) fn decimal(self) -> String {
        let sign = if self.cents < 0 { "-" } else { "" };
        let abs = self.cents.unsigned_abs();
        format!("{sign}{}.{:02}", abs / 100, abs % 100)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let decimal = self.decimal();
        if let Some(abs) = decimal.strip_prefix('-') {
            write!(f, "-${abs}")
        } else {
            write!(f, "${decimal}")
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub(crate) enum ParseError {
    #[error("amount is empty")]
    Empty,
    #[error("amount has more than two decimal places")]
    Precision,
    #[error("amount is not a number")]
    Syntax,
    #[error("amount is too large")]
    Overflow,
}

impl FromStr for Money {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, ParseError> {
        let s = s.trim();
        let (negative, s) = match s.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, s),
        };
        let s = s.strip_prefix('$').unwrap_or(s);
        if s.is_empty() {
            return Err(ParseError::Empty)
        }
        let (whole, frac) = s.split_once('.').unwrap_or((s, ""));
        if whole.is_empty() && frac.is_empty() {
            return Err(ParseError::Syntax)
        }
        if !whole.bytes().all(|b| b.is_ascii_digit()) || !frac.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ParseError::Syntax)
        }
        if frac.len() > 2 {
            return Err(ParseError::Precision)
        }
        let whole = if whole.is_empty() { 0 } else { whole.parse::<i64>().map_err(|_| ParseError::Overflow)? };
        let frac = match frac.len() {
            0 => 0,
            1 => frac.parse::<i64>().map_err(|_| ParseError::Syntax)? * 10,
            _ => frac.parse::<i64>().map_err(|_| ParseError::Syntax)?,
        };
        let cents = whole.checked_mul(100).and_then(|cents| cents.checked_add(frac)).ok_or(ParseError::Overflow)?;
        Ok(Self { cents: if negative { -cents } else { cents } })
    }
}

impl<'v> FromFormField<'v> for Money {
    fn from_value(field: ValueField<'v>) -> form::Result<'v, Self> {
        field.value.parse().map_err(|e: ParseError| form::Error::validation(e.to_string()).into())
    }
}

impl Serialize for Money {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&self.decimal())
    }
}
