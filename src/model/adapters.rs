// src/model/adapters.rs

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{AdError, Result};

/// 会话级键值存储（浏览器 sessionStorage 的抽象）
pub trait SessionStore: Send + Sync {
    fn get_item(&self, key: &str) -> Option<String>;
    fn set_item(&self, key: &str, value: String) -> Result<()>;
}

impl<T: SessionStore + ?Sized> SessionStore for Arc<T> {
    fn get_item(&self, key: &str) -> Option<String> {
        (**self).get_item(key)
    }

    fn set_item(&self, key: &str, value: String) -> Result<()> {
        (**self).set_item(key, value)
    }
}

/// 内存实现，测试与一次性会话使用
#[derive(Default)]
pub struct MemorySessionStore {
    items: Mutex<HashMap<String, String>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for MemorySessionStore {
    fn get_item(&self, key: &str) -> Option<String> {
        self.items
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(key)
            .cloned()
    }

    fn set_item(&self, key: &str, value: String) -> Result<()> {
        self.items
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(key.to_string(), value);
        Ok(())
    }
}

/// 文件实现：每个会话一个 JSON 文件，会话结束时删除
pub struct FileSessionStore {
    path: PathBuf,
    items: Mutex<HashMap<String, String>>,
}

impl FileSessionStore {
    /// 以新的会话 id 开启会话
    pub fn start(dir: impl AsRef<Path>) -> Result<Self> {
        let session_id = Uuid::new_v4();
        Self::open(dir, &session_id.to_string())
    }

    /// 打开（或继续）已有会话
    pub fn open(dir: impl AsRef<Path>, session_id: &str) -> Result<Self> {
        fs::create_dir_all(dir.as_ref())?;
        let path = dir.as_ref().join(format!("session-{}.json", session_id));
        let items = match fs::read_to_string(&path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                warn!(path = %path.display(), error = %e, "corrupt session file, starting empty");
                HashMap::new()
            }),
            Err(_) => HashMap::new(),
        };
        info!(path = %path.display(), "session storage opened");
        Ok(Self {
            path,
            items: Mutex::new(items),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 会话结束：清空存储
    pub fn end_session(&self) -> Result<()> {
        self.items
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clear();
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

impl SessionStore for FileSessionStore {
    fn get_item(&self, key: &str) -> Option<String> {
        self.items
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(key)
            .cloned()
    }

    fn set_item(&self, key: &str, value: String) -> Result<()> {
        let mut items = self.items.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        items.insert(key.to_string(), value);
        let content = serde_json::to_string(&*items)?;
        fs::write(&self.path, content)
            .map_err(|e| AdError::Storage(format!("{}: {}", self.path.display(), e)))
    }
}
