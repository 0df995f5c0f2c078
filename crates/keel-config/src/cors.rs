use std::time::Duration;

use serde::{Deserialize, de};

/// Cross-origin policy applied before any request context exists
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CorsConfig {
    /// Allowed origins; `"*"` or an explicit allow-list
    #[serde(default)]
    pub origins: AnyOrList,
    #[serde(default)]
    pub methods: AnyOrList,
    #[serde(default)]
    pub headers: AnyOrList,
    /// Response headers readable by the browser
    #[serde(default)]
    pub expose_headers: Vec<String>,
    #[serde(default)]
    pub credentials: bool,
    /// Preflight cache lifetime in seconds
    #[serde(default)]
    pub max_age: Option<u64>,
}

impl CorsConfig {
    pub fn max_age_duration(&self) -> Option<Duration> {
        self.max_age.map(Duration::from_secs)
    }
}

/// Either the wildcard `"*"` or an explicit list of values
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum AnyOrList {
    #[default]
    Any,
    List(Vec<String>),
}

impl AnyOrList {
    pub const fn is_any(&self) -> bool {
        matches!(self, Self::Any)
    }
}

impl<'de> Deserialize<'de> for AnyOrList {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        struct Visitor;

        impl<'de> de::Visitor<'de> for Visitor {
            type Value = AnyOrList;

            fn expecting(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                formatter.write_str("\"*\" or an array of strings")
            }

            fn visit_str<E>(self, v: &str) -> Result<AnyOrList, E>
            where
                E: de::Error,
            {
                if v == "*" {
                    Ok(AnyOrList::Any)
                } else {
                    Ok(AnyOrList::List(vec![v.to_string()]))
                }
            }

            fn visit_seq<A>(self, mut seq: A) -> Result<AnyOrList, A::Error>
            where
                A: de::SeqAccess<'de>,
            {
                let mut values = Vec::new();
                while let Some(value) = seq.next_element::<String>()? {
                    if value == "*" {
                        return Ok(AnyOrList::Any);
                    }
                    values.push(value);
                }
                Ok(AnyOrList::List(values))
            }
        }

        deserializer.deserialize_any(Visitor)
    }
}
