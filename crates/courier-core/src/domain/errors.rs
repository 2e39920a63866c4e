//! Errors - エラー型と分類
//!
//! 各関心ごとに thiserror の enum を持ち、`kind()` で運用分類（ErrorKind）に落とします。
//! ネットワーク・永続化のエラーはコンポーネント境界を越えて伝播させません。
//! ログを出して次のサイクルで回復するのが基本方針です。

use std::path::PathBuf;

use thiserror::Error;

/// ErrorKind は失敗の運用分類
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// timeout / connection refused / DNS。次の周期で再試行
    TransientNetwork,
    /// HTTP 401。このサイクルは何もしない（backoff もしない）
    Authentication,
    /// キャリアの送信失敗。そのタスクは終端
    Transmission,
    /// 配達確認が得られない。sent_unconfirmed で終端
    DeliveryAmbiguous,
    /// 永続ストアの読み書き失敗。空のコレクションで続行
    Persistence,
    /// 想定外のペイロード。このサイクルは破棄
    MalformedResponse,
}

/// Remote endpoint client errors.
#[derive(Debug, Error)]
pub enum EndpointError {
    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("authentication rejected (HTTP 401)")]
    Unauthorized,

    #[error("unexpected HTTP status {0}")]
    UnexpectedStatus(u16),

    #[error("malformed response: {0}")]
    Malformed(String),
}

impl EndpointError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            EndpointError::Timeout(_)
            | EndpointError::Transport(_)
            | EndpointError::UnexpectedStatus(_) => ErrorKind::TransientNetwork,
            EndpointError::Unauthorized => ErrorKind::Authentication,
            EndpointError::Malformed(_) => ErrorKind::MalformedResponse,
        }
    }
}

/// Durable store errors.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("store contents are not valid JSON: {0}")]
    Serde(#[from] serde_json::Error),
}

impl StoreError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::Persistence
    }
}

/// Failure raised by the sending collaborator while accepting a message.
#[derive(Debug, Error)]
pub enum SendError {
    #[error("sender rejected message: {0}")]
    Rejected(String),

    #[error("sender unavailable: {0}")]
    Unavailable(String),
}

impl SendError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::Transmission
    }
}

/// Configuration loading errors. The only errors surfaced to the binary.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config syntax: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}
