//! Ports - 抽象化レイヤー
//!
//! ゲートウェイが外部とやり取りする境界を trait として定義します。
//! - コーディネータ（HTTP）: RemoteEndpoint
//! - キャリア送信プリミティブ: MessageSender
//! - 永続ストア: Store
//! - 時刻 / ID 生成 / keep-alive

pub mod clock;
pub mod endpoint;
pub mod id_generator;
pub mod keep_alive;
pub mod sender;
pub mod store;

pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::endpoint::{FetchOutcome, RemoteEndpoint, encode_batch};
pub use self::id_generator::{IdGenerator, UlidGenerator};
pub use self::keep_alive::{KeepAlive, NoopKeepAlive};
pub use self::sender::{
    DeliveryResult, MessageSender, SendRequest, SendSignal, SignalSink, TransmissionResult,
};
pub use self::store::{Store, load_or_default};
