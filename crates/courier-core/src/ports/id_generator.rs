//! IdGenerator port - デバイス ID 生成の抽象化
//!
//! デバイス ID は初回起動時に一度だけ生成され、永続化されて使い回されます。
//! ULID を使うので生成順にソートでき、調整なしで一意になります。

use ulid::Ulid;

use crate::ports::Clock;

/// IdGenerator はデバイス ID を生成
pub trait IdGenerator: Send + Sync {
    /// `dev-<ULID>` 形式の ID を生成
    fn generate_device_id(&self) -> String;
}

/// UlidGenerator は ULID ベースの ID 生成器
///
/// Clock を使って現在時刻ベースの ULID を生成します。
pub struct UlidGenerator<C> {
    clock: C,
}

impl<C: Clock> UlidGenerator<C> {
    pub fn new(clock: C) -> Self {
        Self { clock }
    }
}

impl<C: Clock> IdGenerator for UlidGenerator<C> {
    fn generate_device_id(&self) -> String {
        let timestamp_ms = self.clock.now().timestamp_millis() as u64;
        let ulid = Ulid::from_parts(timestamp_ms, rand::random());
        format!("dev-{ulid}")
    }
}
