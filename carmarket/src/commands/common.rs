use std::str::FromStr;

use carmarket_types::{Envelope, Status};

/// A clap argument provided as a key/value pair separated by `SEPARATOR`, which by default is a '='
///
/// Only the first separator splits, so values may contain it.
#[derive(Debug, Clone)]
pub(crate) struct SeparatedKeyValue<K, V, const SEPARATOR: char = '='>(pub(crate) (K, V));

impl<K, V, const SEPARATOR: char> FromStr for SeparatedKeyValue<K, V, SEPARATOR>
where
    K: FromStr<Err: Into<anyhow::Error>>,
    V: FromStr<Err: Into<anyhow::Error>>,
{
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (key, value) = s
            .split_once(SEPARATOR)
            .ok_or_else(|| anyhow::anyhow!("missing value in '{s}', expected key{SEPARATOR}value"))?;
        anyhow::ensure!(!key.trim().is_empty(), "missing key in '{s}'");

        Ok(Self((
            key.trim().parse().map_err(Into::into)?,
            value.parse().map_err(Into::into)?,
        )))
    }
}

/// A clap argument provided as a list of items separated by `SEPARATOR`, which by default is a ','
#[derive(Debug, Clone)]
pub(crate) struct SeparatedList<T, const SEPARATOR: char = ','>(pub(crate) Vec<T>);

impl<T, const SEPARATOR: char> FromStr for SeparatedList<T, SEPARATOR>
where
    T: FromStr<Err: Into<anyhow::Error>>,
{
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(
            s.split(SEPARATOR)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(|s| s.parse::<T>().map_err(Into::into))
                .collect::<Result<Vec<T>, Self::Err>>()?,
        ))
    }
}

impl<T, const SEPARATOR: char> IntoIterator for SeparatedList<T, SEPARATOR> {
    type Item = T;

    type IntoIter = std::vec::IntoIter<Self::Item>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// The message of an `"error"` envelope
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub(crate) struct WarehouseError(String);

/// Print the message of a successful envelope, or turn an error envelope into an error
pub(crate) fn report(envelope: Envelope) -> Result<Envelope, WarehouseError> {
    match envelope.status {
        Status::Error => Err(WarehouseError(envelope.message.unwrap_or_default())),
        Status::Success | Status::Warning => {
            if let Some(message) = &envelope.message {
                println!("{message}");
            }
            Ok(envelope)
        }
    }
}
