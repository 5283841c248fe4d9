//! Lenient deserializers for hand-written YAML.
//!
//! Recipe and overlay authors write `port: 8080` as often as `port: "8080"`;
//! these helpers accept both and normalise to strings.

use serde::de::{Error, Visitor};
use serde::{Deserialize, Deserializer};
use std::fmt;

/// Deserialize an optional field that accepts both strings and numbers.
pub fn option_string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    struct StringOrNumberVisitor;

    impl<'de> Visitor<'de> for StringOrNumberVisitor {
        type Value = Option<String>;

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            formatter.write_str("a string, number, or null")
        }

        fn visit_none<E>(self) -> Result<Self::Value, E>
        where
            E: Error,
        {
            Ok(None)
        }

        fn visit_unit<E>(self) -> Result<Self::Value, E>
        where
            E: Error,
        {
            Ok(None)
        }

        fn visit_some<D>(self, deserializer: D) -> Result<Self::Value, D::Error>
        where
            D: Deserializer<'de>,
        {
            deserializer.deserialize_any(InnerVisitor).map(Some)
        }
    }

    deserializer.deserialize_option(StringOrNumberVisitor)
}

/// Deserialize a sequence whose items may be strings or numbers.
pub fn string_or_number_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let items: Option<Vec<StringOrNumber>> = Option::deserialize(deserializer)?;
    Ok(items
        .unwrap_or_default()
        .into_iter()
        .map(|item| item.0)
        .collect())
}

struct StringOrNumber(String);

impl<'de> Deserialize<'de> for StringOrNumber {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(InnerVisitor).map(StringOrNumber)
    }
}

struct InnerVisitor;

impl<'de> Visitor<'de> for InnerVisitor {
    type Value = String;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a string or number")
    }

    fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
    where
        E: Error,
    {
        Ok(value.to_string())
    }

    fn visit_string<E>(self, value: String) -> Result<Self::Value, E>
    where
        E: Error,
    {
        Ok(value)
    }

    fn visit_i64<E>(self, value: i64) -> Result<Self::Value, E>
    where
        E: Error,
    {
        Ok(value.to_string())
    }

    fn visit_u64<E>(self, value: u64) -> Result<Self::Value, E>
    where
        E: Error,
    {
        Ok(value.to_string())
    }

    fn visit_f64<E>(self, value: f64) -> Result<Self::Value, E>
    where
        E: Error,
    {
        Ok(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Deserialize)]
    struct Server {
        #[serde(default, deserialize_with = "option_string_or_number")]
        port: Option<String>,
        #[serde(default, deserialize_with = "string_or_number_list")]
        expose: Vec<String>,
    }

    #[test]
    fn test_numbers_become_strings() {
        let server: Server = serde_yaml_ng::from_str("port: 8080\nexpose: [4401, \"8081/udp\"]").unwrap();
        assert_eq!(server.port.as_deref(), Some("8080"));
        assert_eq!(server.expose, vec!["4401", "8081/udp"]);
    }

    #[test]
    fn test_missing_and_null_fields() {
        let server: Server = serde_yaml_ng::from_str("port: ~").unwrap();
        assert!(server.port.is_none());
        assert!(server.expose.is_empty());
    }
}
