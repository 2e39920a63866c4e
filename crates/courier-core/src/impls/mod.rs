//! Impls - port の実装
//!
//! - **HttpEndpoint**: reqwest ベースの RemoteEndpoint
//! - **JsonFileStore**: JSON ファイル（tmp -> fsync -> rename）の Store
//! - **MemoryStore**: テスト・dry-run 用のインメモリ Store

pub mod file_store;
pub mod http_endpoint;
pub mod memory_store;

pub use self::file_store::JsonFileStore;
pub use self::http_endpoint::HttpEndpoint;
pub use self::memory_store::MemoryStore;
