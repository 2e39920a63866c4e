//! Store port - 永続ストアの抽象化
//!
//! 返信キュー・統計・追跡情報・ログ・デバイス ID はすべて
//! 「値全体を丸ごと保存／読み込み」する Store に載せます。
//! - 空または存在しないストアは `Ok(None)`
//! - 壊れたストアは `Err`（呼び出し側はログを出して空で続行）

use tracing::error;

use crate::domain::StoreError;

pub trait Store<T>: Send + Sync {
    fn load(&self) -> Result<Option<T>, StoreError>;

    fn save(&self, value: &T) -> Result<(), StoreError>;
}

/// Load a value, falling back to `T::default()` on a missing, empty or corrupt store.
pub fn load_or_default<T: Default>(store: &dyn Store<T>, what: &str) -> T {
    match store.load() {
        Ok(Some(value)) => value,
        Ok(None) => T::default(),
        Err(e) => {
            error!(store = what, kind = ?e.kind(), error = %e, "failed to load persisted state; starting empty");
            T::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::impls::MemoryStore;

    #[test]
    fn corrupt_store_falls_back_to_default() {
        let store = MemoryStore::<Vec<u32>>::with_raw("[1, 2");
        let loaded = load_or_default(&store, "numbers");
        assert!(loaded.is_empty());
    }

    #[test]
    fn missing_store_falls_back_to_default() {
        let store = MemoryStore::<Vec<u32>>::new();
        assert!(load_or_default(&store, "numbers").is_empty());
    }

    #[test]
    fn saved_value_is_loaded() {
        let store = MemoryStore::<Vec<u32>>::new();
        store.save(&vec![1, 2, 3]).unwrap();
        assert_eq!(load_or_default(&store, "numbers"), vec![1, 2, 3]);
    }
}
