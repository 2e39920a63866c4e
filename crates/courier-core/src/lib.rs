//! courier-core
//!
//! SMS ゲートウェイのコア部品。
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（ids, task, state, status, reply, errors）
//! - **ports**: 抽象化レイヤー（RemoteEndpoint, MessageSender, Store, Clock, KeepAlive, IdGenerator）
//! - **app**: アプリケーションロジック（delivery, batcher, reply_queue, poller, intake, gateway, ...）
//! - **impls**: 実装（HttpEndpoint, JsonFileStore, MemoryStore）
//! - **config**: TOML 設定と clamp 済みアクセサ

pub mod app;
pub mod config;
pub mod domain;
pub mod impls;
pub mod ports;

#[cfg(test)]
pub(crate) mod testing;
