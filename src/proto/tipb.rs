//! `tipb.TopSQLPubSub`: Top SQL records streamed by TiDB.

/// Subscribe request. The server ignores its content.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct TopSqlSubRequest {}

/// One message of the Top SQL subscription stream.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct TopSqlSubResponse {
    #[prost(oneof = "top_sql_sub_response::RespOneof", tags = "1, 2, 3")]
    pub resp_oneof: ::core::option::Option<top_sql_sub_response::RespOneof>,
}

/// Nested types for [`TopSqlSubResponse`].
pub mod top_sql_sub_response {
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum RespOneof {
        #[prost(message, tag = "1")]
        Record(super::TopSqlRecord),
        #[prost(message, tag = "2")]
        SqlMeta(super::SqlMeta),
        #[prost(message, tag = "3")]
        PlanMeta(super::PlanMeta),
    }
}

/// CPU and execution statistics of one (sql digest, plan digest) pair.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct TopSqlRecord {
    #[prost(bytes = "vec", tag = "1")]
    pub sql_digest: ::prost::alloc::vec::Vec<u8>,
    #[prost(bytes = "vec", tag = "2")]
    pub plan_digest: ::prost::alloc::vec::Vec<u8>,
    #[prost(message, repeated, tag = "3")]
    pub items: ::prost::alloc::vec::Vec<TopSqlRecordItem>,
    #[prost(bytes = "vec", tag = "4")]
    pub keyspace_name: ::prost::alloc::vec::Vec<u8>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct TopSqlRecordItem {
    #[prost(uint64, tag = "1")]
    pub timestamp_sec: u64,
    #[prost(uint32, tag = "2")]
    pub cpu_time_ms: u32,
    #[prost(uint64, tag = "3")]
    pub stmt_exec_count: u64,
    #[prost(map = "string, uint64", tag = "4")]
    pub stmt_kv_exec_count: ::std::collections::HashMap<::prost::alloc::string::String, u64>,
    #[prost(uint64, tag = "5")]
    pub stmt_duration_sum_ns: u64,
    #[prost(uint64, tag = "6")]
    pub stmt_duration_count: u64,
    #[prost(uint64, tag = "7")]
    pub stmt_network_in_bytes: u64,
    #[prost(uint64, tag = "8")]
    pub stmt_network_out_bytes: u64,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SqlMeta {
    #[prost(bytes = "vec", tag = "1")]
    pub sql_digest: ::prost::alloc::vec::Vec<u8>,
    #[prost(string, tag = "2")]
    pub normalized_sql: ::prost::alloc::string::String,
    #[prost(bool, tag = "3")]
    pub is_internal_sql: bool,
    #[prost(bytes = "vec", tag = "4")]
    pub keyspace_name: ::prost::alloc::vec::Vec<u8>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct PlanMeta {
    #[prost(bytes = "vec", tag = "1")]
    pub plan_digest: ::prost::alloc::vec::Vec<u8>,
    #[prost(string, tag = "2")]
    pub normalized_plan: ::prost::alloc::string::String,
    #[prost(string, tag = "3")]
    pub encoded_normalized_plan: ::prost::alloc::string::String,
    #[prost(bytes = "vec", tag = "4")]
    pub keyspace_name: ::prost::alloc::vec::Vec<u8>,
}

/// Client for `tipb.TopSQLPubSub`.
pub mod top_sql_pub_sub_client {
    use tonic::codegen::*;

    #[derive(Debug, Clone)]
    pub struct TopSqlPubSubClient<T> {
        inner: tonic::client::Grpc<T>,
    }

    impl<T> TopSqlPubSubClient<T>
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

        /// Opens the server stream of Top SQL records.
        pub async fn subscribe(
            &mut self,
            request: impl tonic::IntoRequest<super::TopSqlSubRequest>,
        ) -> std::result::Result<
            tonic::Response<tonic::codec::Streaming<super::TopSqlSubResponse>>,
            tonic::Status,
        > {
            self.inner.ready().await.map_err(|e| {
                tonic::Status::unknown(format!("Service was not ready: {}", e.into()))
            })?;
            let codec = tonic::codec::ProstCodec::default();
            let path = http::uri::PathAndQuery::from_static("/tipb.TopSQLPubSub/Subscribe");
            let mut req = request.into_request();
            req.extensions_mut()
                .insert(GrpcMethod::new("tipb.TopSQLPubSub", "Subscribe"));
            self.inner.server_streaming(req, path, codec).await
        }
    }
}
