use std::fmt;
use std::str::FromStr;

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::errors::Error;

/// One of the four declared processing stages (0-3) plus the special "ops"
/// namespace. Used to scope aliases and process declarations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tier {
    T0,
    T1,
    T2,
    T3,
    Ops,
}

impl Tier {
    /// The four numeric tiers, in numeric order.
    pub const NUMERIC: [Tier; 4] = [Tier::T0, Tier::T1, Tier::T2, Tier::T3];

    /// All tier namespaces, including "ops".
    pub const ALL: [Tier; 5] = [Tier::T0, Tier::T1, Tier::T2, Tier::T3, Tier::Ops];

    /// Alias table search order. Reflects real usage frequency, not numeric
    /// order.
    pub const ALIAS_SEARCH_ORDER: [Tier; 4] = [Tier::T0, Tier::T3, Tier::T1, Tier::T2];

    pub fn is_numeric(self) -> bool {
        !matches!(self, Tier::Ops)
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tier::T0 => write!(f, "t0"),
            Tier::T1 => write!(f, "t1"),
            Tier::T2 => write!(f, "t2"),
            Tier::T3 => write!(f, "t3"),
            Tier::Ops => write!(f, "ops"),
        }
    }
}

impl FromStr for Tier {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "0" | "t0" => Ok(Tier::T0),
            "1" | "t1" => Ok(Tier::T1),
            "2" | "t2" => Ok(Tier::T2),
            "3" | "t3" => Ok(Tier::T3),
            "ops" => Ok(Tier::Ops),
            other => Err(Error::config(format!("unknown tier: {other}"))),
        }
    }
}

// Tiers serialize the way process documents declare them: 0..3 as numbers,
// "ops" as a string.
impl Serialize for Tier {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Tier::T0 => serializer.serialize_u64(0),
            Tier::T1 => serializer.serialize_u64(1),
            Tier::T2 => serializer.serialize_u64(2),
            Tier::T3 => serializer.serialize_u64(3),
            Tier::Ops => serializer.serialize_str("ops"),
        }
    }
}

struct TierVisitor;

impl Visitor<'_> for TierVisitor {
    type Value = Tier;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "a tier number 0-3 or the string \"ops\"")
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Tier, E> {
        match v {
            0 => Ok(Tier::T0),
            1 => Ok(Tier::T1),
            2 => Ok(Tier::T2),
            3 => Ok(Tier::T3),
            other => Err(E::custom(format!("tier out of range: {other}"))),
        }
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Tier, E> {
        if v < 0 {
            return Err(E::custom(format!("tier out of range: {v}")));
        }
        self.visit_u64(v as u64)
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Tier, E> {
        Tier::from_str(v).map_err(|_| E::custom(format!("unknown tier: {v}")))
    }
}

impl<'de> Deserialize<'de> for Tier {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Tier, D::Error> {
        deserializer.deserialize_any(TierVisitor)
    }
}
