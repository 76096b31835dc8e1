//! Scrape target descriptor.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Which subscription service a target exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TargetKind {
    /// TiDB, serving `tipb.TopSQLPubSub`.
    #[serde(rename = "tidb")]
    TiDb,
    /// TiKV, serving `resource_usage_agent.ResourceMeteringPubSub`.
    #[serde(rename = "tikv")]
    TiKv,
}

impl TargetKind {
    /// Get the kind name as used in configuration.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TiDb => "tidb",
            Self::TiKv => "tikv",
        }
    }
}

impl fmt::Display for TargetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TargetKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "tidb" => Ok(Self::TiDb),
            "tikv" => Ok(Self::TiKv),
            other => Err(format!(
                "unrecognized target kind '{}', expected tidb or tikv",
                other
            )),
        }
    }
}

/// One monitored process: its kind and its gRPC address (`host:port`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Target {
    pub kind: TargetKind,
    pub address: String,
}

impl Target {
    pub fn new(kind: TargetKind, address: impl Into<String>) -> Self {
        Self {
            kind,
            address: address.into(),
        }
    }

    pub fn tidb(address: impl Into<String>) -> Self {
        Self::new(TargetKind::TiDb, address)
    }

    pub fn tikv(address: impl Into<String>) -> Self {
        Self::new(TargetKind::TiKv, address)
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.kind, self.address)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_kind_parse() {
        assert_eq!("tidb".parse::<TargetKind>().unwrap(), TargetKind::TiDb);
        assert_eq!("TiKV".parse::<TargetKind>().unwrap(), TargetKind::TiKv);
        assert_eq!(" tikv ".parse::<TargetKind>().unwrap(), TargetKind::TiKv);
    }

    #[test]
    fn test_target_kind_parse_unrecognized() {
        let err = "pd".parse::<TargetKind>().unwrap_err();
        assert!(err.contains("unrecognized target kind 'pd'"));
    }

    #[test]
    fn test_target_display() {
        assert_eq!(Target::tidb("127.0.0.1:10080").to_string(), "tidb(127.0.0.1:10080)");
        assert_eq!(Target::tikv("10.0.0.2:20160").to_string(), "tikv(10.0.0.2:20160)");
    }

    #[test]
    fn test_target_deserialize() {
        let target: Target = serde_yaml::from_str("kind: tikv\naddress: 127.0.0.1:20160").unwrap();
        assert_eq!(target, Target::tikv("127.0.0.1:20160"));

        let result: Result<Target, _> = serde_yaml::from_str("kind: pd\naddress: 127.0.0.1:2379");
        assert!(result.is_err());
    }
}
