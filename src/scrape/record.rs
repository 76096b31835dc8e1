//! Records delivered by a scrape stream.

use crate::proto::resource_usage_agent::ResourceUsageRecord;
use crate::proto::tipb::TopSqlSubResponse;
use crate::scrape::TargetKind;

/// A decoded record from either subscription service.
///
/// A stream is bound to one [`TargetKind`] for its whole life, so it only
/// ever produces the matching variant.
#[derive(Debug, Clone, PartialEq)]
pub enum Record {
    /// From a TiDB `TopSQLPubSub` stream.
    TopSql(TopSqlSubResponse),
    /// From a TiKV `ResourceMeteringPubSub` stream.
    ResourceUsage(ResourceUsageRecord),
}

impl Record {
    /// Kind of target that produced this record.
    pub fn kind(&self) -> TargetKind {
        match self {
            Self::TopSql(_) => TargetKind::TiDb,
            Self::ResourceUsage(_) => TargetKind::TiKv,
        }
    }
}

impl From<TopSqlSubResponse> for Record {
    fn from(value: TopSqlSubResponse) -> Self {
        Self::TopSql(value)
    }
}

impl From<ResourceUsageRecord> for Record {
    fn from(value: ResourceUsageRecord) -> Self {
        Self::ResourceUsage(value)
    }
}
