//! Domain model (ids, tasks, states, wire records, errors).

pub mod errors;
pub mod ids;
pub mod reply;
pub mod state;
pub mod status;
pub mod task;

pub use self::errors::{ConfigError, EndpointError, ErrorKind, SendError, StoreError};
pub use self::ids::{CorrelationId, Id, IdMarker, TaskId};
pub use self::reply::{DeviceInfo, ReplyRecord, ReplyType};
pub use self::state::DeliveryState;
pub use self::status::{SendErrorCode, StatusLabel, StatusReport, delivery_latency_secs};
pub use self::task::{SendTask, TaskPayload};
