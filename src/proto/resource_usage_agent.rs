//! `resource_usage_agent.ResourceMeteringPubSub`: resource usage records
//! streamed by TiKV.

/// Subscribe request. The server ignores its content.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ResourceMeteringRequest {}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ResourceUsageRecord {
    #[prost(oneof = "resource_usage_record::RecordOneof", tags = "1")]
    pub record_oneof: ::core::option::Option<resource_usage_record::RecordOneof>,
}

/// Nested types for [`ResourceUsageRecord`].
pub mod resource_usage_record {
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum RecordOneof {
        #[prost(message, tag = "1")]
        Record(super::GroupTagRecord),
    }
}

/// Usage samples attributed to one resource group tag.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct GroupTagRecord {
    #[prost(bytes = "vec", tag = "1")]
    pub resource_group_tag: ::prost::alloc::vec::Vec<u8>,
    #[prost(message, repeated, tag = "2")]
    pub items: ::prost::alloc::vec::Vec<GroupTagRecordItem>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct GroupTagRecordItem {
    #[prost(uint64, tag = "1")]
    pub timestamp_sec: u64,
    #[prost(uint32, tag = "2")]
    pub cpu_time_ms: u32,
    #[prost(uint32, tag = "3")]
    pub read_keys: u32,
    #[prost(uint32, tag = "4")]
    pub write_keys: u32,
}

/// Client for `resource_usage_agent.ResourceMeteringPubSub`.
pub mod resource_metering_pub_sub_client {
    use tonic::codegen::*;

    #[derive(Debug, Clone)]
    pub struct ResourceMeteringPubSubClient<T> {
        inner: tonic::client::Grpc<T>,
    }

    impl<T> ResourceMeteringPubSubClient<T>
    where
        T: tonic::client::GrpcService<tonic::body::BoxBody>,
        T::Error: Into<StdError>,
        T::ResponseBody: Body<Data = Bytes> + std::marker::Send + 'static,
        <T::ResponseBody as Body>::Error: Into<StdError> + std::marker::Send,
    {
        pub fn new(inner: T) -> Self {
            let inner = tonic::client::Grpc::new(inner);
            Self { inner }
        }

        /// Opens the server stream of resource usage records.
        pub async fn subscribe(
            &mut self,
            request: impl tonic::IntoRequest<super::ResourceMeteringRequest>,
        ) -> std::result::Result<
            tonic::Response<tonic::codec::Streaming<super::ResourceUsageRecord>>,
            tonic::Status,
        > {
            self.inner.ready().await.map_err(|e| {
                tonic::Status::unknown(format!("Service was not ready: {}", e.into()))
            })?;
            let codec = tonic::codec::ProstCodec::default();
            let path = http::uri::PathAndQuery::from_static(
                "/resource_usage_agent.ResourceMeteringPubSub/Subscribe",
            );
            let mut req = request.into_request();
            req.extensions_mut().insert(GrpcMethod::new(
                "resource_usage_agent.ResourceMeteringPubSub",
                "Subscribe",
            ));
            self.inner.server_streaming(req, path, codec).await
        }
    }
}
