use {
    std::{
        cmp::Ordering,
        hash::{
            Hash,
            Hasher,
        },
        marker::PhantomData,
        num::ParseIntError,
    },
    rocket::{
        http::uri::fmt::{
            self as uri_fmt,
            FromUriParam,
            Path,
            UriDisplay,
        },
        request::FromParam,
    },
    serde::{
        Deserializer,
        Serializer,
    },
    crate::prelude::*,
};

pub(crate) enum Users {}
pub(crate) enum Tournaments {}
pub(crate) enum Registrations {}
pub(crate) enum Matches {}
pub(crate) enum MatchResults {}
pub(crate) enum Donations {}
pub(crate) enum Sponsors {}
pub(crate) enum Payouts {}

/// A random 64-bit row identifier, tagged with the table it belongs to.
///
/// Stored as `BIGINT` in the database, so values above `i64::MAX` wrap into the negative range there.
pub(crate) struct Id<T> {
    inner: u64,
    _table: PhantomData<T>,
}

impl<T> Id<T> {
    pub(crate) fn new() -> Self {
        Self::from(rand::random::<u64>())
    }
}

impl<T> Clone for Id<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Id<T> {}

impl<T> PartialEq for Id<T> {
    fn eq(&self, other: &Self) -> bool {
        self.inner == other.inner
    }
}

impl<T> Eq for Id<T> {}

impl<T> PartialOrd for Id<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for Id<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.inner.cmp(&other.inner)
    }
}

impl<T> Hash for Id<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.inner.hash(state);
    }
}

impl<T> fmt::Debug for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Id({})", self.inner)
    }
}

impl<T> fmt::Display for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.inner, f)
    }
}

impl<T> From<u64> for Id<T> {
    fn from(inner: u64) -> Self {
        Self { inner, _table: PhantomData }
    }
}

impl<T> From<i64> for Id<T> {
    fn from(inner: i64) -> Self {
        Self::from(inner as u64)
    }
}

impl<T> From<Id<T>> for u64 {
    fn from(Id { inner, .. }: Id<T>) -> Self {
        inner
    }
}

impl<T> From<Id<T>> for i64 {
    fn from(Id { inner, .. }: Id<T>) -> Self {
        inner as Self
    }
}

impl<T> Serialize for Id<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.inner.serialize(serializer)
    }
}

impl<'de, T> Deserialize<'de> for Id<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        u64::deserialize(deserializer).map(Self::from)
    }
}

impl<'a, T> FromParam<'a> for Id<T> {
    type Error = ParseIntError;

    fn from_param(param: &'a str) -> Result<Self, Self::Error> {
        param.parse::<u64>().map(Self::from)
    }
}

impl<T> UriDisplay<Path> for Id<T> {
    fn fmt(&self, f: &mut uri_fmt::Formatter<'_, Path>) -> fmt::Result {
        f.write_value(self.inner)
    }
}

impl<T> FromUriParam<Path, Id<T>> for Id<T> {
    type Target = Self;

    fn from_uri_param(param: Self) -> Self {
        param
    }
}
