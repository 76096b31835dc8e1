//! Kind-specific subscribe calls over a gRPC channel.

use tonic::transport::Channel;

use crate::proto::resource_usage_agent::resource_metering_pub_sub_client::ResourceMeteringPubSubClient;
use crate::proto::resource_usage_agent::{ResourceMeteringRequest, ResourceUsageRecord};
use crate::proto::tipb::top_sql_pub_sub_client::TopSqlPubSubClient;
use crate::proto::tipb::{TopSqlSubRequest, TopSqlSubResponse};
use crate::scrape::{RecordStream, ScrapeError, Subscribe, TargetKind};

/// Subscribes to `tipb.TopSQLPubSub` on a TiDB instance.
#[derive(Debug, Clone, Copy, Default)]
pub struct TopSqlSubscriber;

#[async_trait::async_trait]
impl Subscribe<Channel> for TopSqlSubscriber {
    type Record = TopSqlSubResponse;

    fn kind(&self) -> TargetKind {
        TargetKind::TiDb
    }

    async fn subscribe(
        &self,
        channel: &Channel,
    ) -> Result<RecordStream<TopSqlSubResponse>, ScrapeError> {
        let mut client = TopSqlPubSubClient::new(channel.clone());
        let response = client
            .subscribe(TopSqlSubRequest::default())
            .await
            .map_err(ScrapeError::Subscribe)?;
        Ok(Box::pin(response.into_inner()))
    }
}

/// Subscribes to `resource_usage_agent.ResourceMeteringPubSub` on a TiKV
/// instance.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResourceMeteringSubscriber;

#[async_trait::async_trait]
impl Subscribe<Channel> for ResourceMeteringSubscriber {
    type Record = ResourceUsageRecord;

    fn kind(&self) -> TargetKind {
        TargetKind::TiKv
    }

    async fn subscribe(
        &self,
        channel: &Channel,
    ) -> Result<RecordStream<ResourceUsageRecord>, ScrapeError> {
        let mut client = ResourceMeteringPubSubClient::new(channel.clone());
        let response = client
            .subscribe(ResourceMeteringRequest::default())
            .await
            .map_err(ScrapeError::Subscribe)?;
        Ok(Box::pin(response.into_inner()))
    }
}
