//! JSON file store.
//!
//! 書き込みはアトミック（同じディレクトリの tmp ファイル -> fsync -> rename）。
//! クラッシュしても「前回の内容」か「今回の内容」のどちらかが残ります。

use std::fs;
use std::io::Write;
use std::marker::PhantomData;
use std::path::PathBuf;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::domain::StoreError;
use crate::ports::Store;

pub struct JsonFileStore<T> {
    path: PathBuf,
    _marker: PhantomData<fn() -> T>,
}

impl<T> JsonFileStore<T> {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            _marker: PhantomData,
        }
    }

    fn tmp_path(&self) -> PathBuf {
        let name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "store".to_string());
        self.path.with_file_name(format!(".{name}.tmp"))
    }
}

impl<T> Store<T> for JsonFileStore<T>
where
    T: Serialize + DeserializeOwned,
{
    fn load(&self) -> Result<Option<T>, StoreError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        if raw.trim().is_empty() {
            return Ok(None);
        }
        Ok(Some(serde_json::from_str(&raw)?))
    }

    fn save(&self, value: &T) -> Result<(), StoreError> {
        let json = serde_json::to_vec(value)?;
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let tmp_path = self.tmp_path();
        {
            let mut file = fs::File::create(&tmp_path)?;
            file.write_all(&json)?;
            file.sync_all()?;
        }
        fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    #[test]
    fn missing_file_loads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::<Vec<u32>>::new(dir.path().join("absent.json"));
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn empty_file_loads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.json");
        fs::write(&path, "\n").unwrap();
        let store = JsonFileStore::<Vec<u32>>::new(path);
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn corrupt_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("corrupt.json");
        fs::write(&path, "[1, 2,").unwrap();
        let store = JsonFileStore::<Vec<u32>>::new(path);
        assert!(matches!(store.load(), Err(StoreError::Serde(_))));
    }

    #[test]
    fn save_creates_parent_dirs_and_leaves_no_tmp_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("queue.json");
        let store = JsonFileStore::<VecDeque<String>>::new(&path);

        let queue: VecDeque<String> = ["a", "b"].into_iter().map(String::from).collect();
        store.save(&queue).unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), r#"["a","b"]"#);
        assert!(!dir.path().join("nested").join(".queue.json.tmp").exists());
        assert_eq!(store.load().unwrap(), Some(queue));
    }

    #[test]
    fn save_replaces_previous_contents() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::<Vec<u32>>::new(dir.path().join("n.json"));
        store.save(&vec![1, 2, 3]).unwrap();
        store.save(&vec![4]).unwrap();
        assert_eq!(store.load().unwrap(), Some(vec![4]));
    }
}
