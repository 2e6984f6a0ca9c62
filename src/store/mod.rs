//! 永続化ストア
//!
//! フィルタ設定やセッションごとの再開位置を、プロセス再起動をまたいで
//! 保持するためのキーバリューストア。キーは `カテゴリ.名前` 形式で、
//! カテゴリ単位のTOMLファイルへ書き出す。値はJSON値として出し入れし、
//! ストア側は中身を解釈しない。

pub mod resume;
pub mod settings;

pub use resume::*;
pub use settings::*;

use async_trait::async_trait;
use directories::ProjectDirs;
use serde::{de::DeserializeOwned, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use tokio::fs;
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// ストア操作のエラー
#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("File access error: {0}")]
    FileAccess(String),
}

/// キーバリューストアの抽象インタフェース
#[async_trait]
pub trait KvStore: Send + Sync {
    /// 値をJSON値として取得
    async fn get_value(&self, key: &str) -> Result<Option<serde_json::Value>, StoreError>;

    /// 値をJSON値として保存
    async fn set_value(&self, key: &str, value: &serde_json::Value) -> Result<(), StoreError>;

    /// 値を削除
    async fn remove_value(&self, key: &str) -> Result<(), StoreError>;

    /// 全値を取得
    async fn all_values(&self) -> Result<HashMap<String, serde_json::Value>, StoreError>;
}

/// 型安全なストアアクセスのためのヘルパー関数
pub struct StoreHelper;

impl StoreHelper {
    /// 型安全な取得
    pub async fn get_typed<T, S>(store: &S, key: &str) -> Result<Option<T>, StoreError>
    where
        T: DeserializeOwned + Send,
        S: KvStore + ?Sized,
    {
        match store.get_value(key).await? {
            Some(json_value) => {
                let typed = serde_json::from_value(json_value).map_err(|e| {
                    StoreError::Serialization(format!("Deserialization failed: {}", e))
                })?;
                Ok(Some(typed))
            }
            None => Ok(None),
        }
    }

    /// 型安全な保存
    pub async fn set_typed<T, S>(store: &S, key: &str, value: &T) -> Result<(), StoreError>
    where
        T: Serialize + Send + Sync,
        S: KvStore + ?Sized,
    {
        let json_value = serde_json::to_value(value)
            .map_err(|e| StoreError::Serialization(format!("Serialization failed: {}", e)))?;
        store.set_value(key, &json_value).await
    }
}

/// 保存前のJSON値の妥当性検証
///
/// 非有限数はTOMLへ落とせないため弾く。サイズ上限は設定値の暴走対策。
pub fn validate_value(value: &serde_json::Value) -> Result<(), StoreError> {
    match value {
        serde_json::Value::Null => Ok(()),
        serde_json::Value::Bool(_) => Ok(()),
        serde_json::Value::Number(n) => {
            if let Some(f) = n.as_f64() {
                if f.is_finite() {
                    Ok(())
                } else {
                    Err(StoreError::Validation(
                        "Infinite or NaN number not allowed".to_string(),
                    ))
                }
            } else {
                Ok(())
            }
        }
        serde_json::Value::String(s) => {
            if s.len() > 10000 {
                Err(StoreError::Validation(
                    "String too long (max 10000 chars)".to_string(),
                ))
            } else {
                Ok(())
            }
        }
        serde_json::Value::Array(arr) => {
            if arr.len() > 1000 {
                Err(StoreError::Validation(
                    "Array too large (max 1000 elements)".to_string(),
                ))
            } else {
                for item in arr {
                    validate_value(item)?;
                }
                Ok(())
            }
        }
        serde_json::Value::Object(obj) => {
            if obj.len() > 100 {
                Err(StoreError::Validation(
                    "Object too large (max 100 keys)".to_string(),
                ))
            } else {
                for v in obj.values() {
                    validate_value(v)?;
                }
                Ok(())
            }
        }
    }
}

/// TOMLファイルバックエンドのストア
///
/// カテゴリごとに1ファイル（`player.toml` など）。読み書きはメモリ
/// キャッシュ越しに行い、変更済みカテゴリだけを
/// [`flush_dirty`](Self::flush_dirty) でディスクへ書き出す。
pub struct TomlKvStore {
    /// 設定ファイルのベースディレクトリ
    store_dir: PathBuf,
    /// メモリキャッシュ（カテゴリ → JSONオブジェクト）
    cache: RwLock<HashMap<String, serde_json::Value>>,
    /// 変更監視フラグ
    dirty_keys: RwLock<HashMap<String, bool>>,
}

impl TomlKvStore {
    /// XDGディレクトリ配下に新しいストアを作成
    pub async fn new() -> Result<Self, StoreError> {
        let store_dir = Self::default_store_directory()?;

        if !store_dir.exists() {
            fs::create_dir_all(&store_dir).await.map_err(|e| {
                StoreError::FileAccess(format!("Failed to create store directory: {}", e))
            })?;
        }

        let store = Self {
            store_dir,
            cache: RwLock::new(HashMap::new()),
            dirty_keys: RwLock::new(HashMap::new()),
        };

        store.load_all_categories().await?;

        debug!("✅ KV store initialized: {}", store.store_dir.display());
        Ok(store)
    }

    /// 既存のディレクトリからストアを作成
    pub async fn create_from_directory(store_dir: PathBuf) -> Result<Self, StoreError> {
        let store = Self {
            store_dir,
            cache: RwLock::new(HashMap::new()),
            dirty_keys: RwLock::new(HashMap::new()),
        };

        store.load_all_categories().await?;
        Ok(store)
    }

    fn default_store_directory() -> Result<PathBuf, StoreError> {
        let project_dirs = ProjectDirs::from("dev", "danrev", "danrev").ok_or_else(|| {
            StoreError::FileAccess("Failed to get project directories".to_string())
        })?;

        Ok(project_dirs.config_dir().to_path_buf())
    }

    fn category_file_path(&self, category: &str) -> PathBuf {
        self.store_dir.join(format!("{}.toml", category))
    }

    /// キーをカテゴリと名前に分割する。ドットなしは `app` カテゴリ扱い
    fn parse_key(&self, key: &str) -> (String, String) {
        if let Some(dot_pos) = key.find('.') {
            (key[..dot_pos].to_string(), key[dot_pos + 1..].to_string())
        } else {
            ("app".to_string(), key.to_string())
        }
    }

    async fn load_all_categories(&self) -> Result<(), StoreError> {
        if !self.store_dir.exists() {
            return Ok(());
        }

        let mut dir_entries = fs::read_dir(&self.store_dir).await.map_err(|e| {
            StoreError::FileAccess(format!("Failed to read store directory: {}", e))
        })?;

        let mut cache = self.cache.write().await;

        while let Some(entry) = dir_entries
            .next_entry()
            .await
            .map_err(|e| StoreError::FileAccess(format!("Failed to read directory entry: {}", e)))?
        {
            let path = entry.path();
            if path.extension().and_then(|s| s.to_str()) == Some("toml") {
                if let Some(category) = path.file_stem().and_then(|s| s.to_str()) {
                    match self.load_category(category).await {
                        Ok(value) => {
                            cache.insert(category.to_string(), value);
                            debug!("📁 Loaded store category: {}", category);
                        }
                        Err(e) => {
                            warn!("⚠️ Failed to load store category '{}': {}", category, e);
                        }
                    }
                }
            }
        }

        debug!("📋 Loaded {} store categories", cache.len());
        Ok(())
    }

    async fn load_category(&self, category: &str) -> Result<serde_json::Value, StoreError> {
        let file_path = self.category_file_path(category);

        if !file_path.exists() {
            return Ok(serde_json::Value::Object(serde_json::Map::new()));
        }

        let content = fs::read_to_string(&file_path).await.map_err(|e| {
            StoreError::FileAccess(format!(
                "Failed to read store file '{}': {}",
                file_path.display(),
                e
            ))
        })?;

        let toml_value: toml::Value = toml::from_str(&content).map_err(|e| {
            StoreError::Serialization(format!("Failed to parse TOML '{}': {}", category, e))
        })?;

        toml_to_json(toml_value)
    }

    async fn save_category(
        &self,
        category: &str,
        value: &serde_json::Value,
    ) -> Result<(), StoreError> {
        let file_path = self.category_file_path(category);

        let toml_value = json_to_toml(value.clone())?;
        let content = toml::to_string_pretty(&toml_value).map_err(|e| {
            StoreError::Serialization(format!("Failed to serialize TOML '{}': {}", category, e))
        })?;

        fs::write(&file_path, content).await.map_err(|e| {
            StoreError::FileAccess(format!(
                "Failed to write store file '{}': {}",
                file_path.display(),
                e
            ))
        })?;

        debug!("💾 Saved store category: {}", category);
        Ok(())
    }

    /// 変更されたカテゴリをディスクへ書き出す
    pub async fn flush_dirty(&self) -> Result<(), StoreError> {
        let dirty_keys = self.dirty_keys.read().await;

        let mut categories_to_save: std::collections::HashSet<String> =
            std::collections::HashSet::new();
        for (key, is_dirty) in dirty_keys.iter() {
            if *is_dirty {
                let (category, _) = self.parse_key(key);
                categories_to_save.insert(category);
            }
        }
        drop(dirty_keys);

        for category in categories_to_save {
            let cache = self.cache.read().await;
            if let Some(value) = cache.get(&category) {
                let value = value.clone();
                drop(cache);
                self.save_category(&category, &value).await?;
            }
        }

        let mut dirty_keys = self.dirty_keys.write().await;
        dirty_keys.clear();

        Ok(())
    }

    /// 型安全な取得のショートカット
    pub async fn get_typed<T>(&self, key: &str) -> Result<Option<T>, StoreError>
    where
        T: DeserializeOwned + Send,
    {
        StoreHelper::get_typed(self, key).await
    }

    /// 型安全な保存のショートカット
    pub async fn set_typed<T>(&self, key: &str, value: &T) -> Result<(), StoreError>
    where
        T: Serialize + Send + Sync,
    {
        StoreHelper::set_typed(self, key, value).await
    }
}

#[async_trait]
impl KvStore for TomlKvStore {
    async fn get_value(&self, key: &str) -> Result<Option<serde_json::Value>, StoreError> {
        let (category, name) = self.parse_key(key);

        let cache = self.cache.read().await;
        if let Some(category_value) = cache.get(&category) {
            if let Some(object) = category_value.as_object() {
                return Ok(object.get(&name).cloned());
            }
        }
        Ok(None)
    }

    async fn set_value(&self, key: &str, value: &serde_json::Value) -> Result<(), StoreError> {
        validate_value(value)?;
        let (category, name) = self.parse_key(key);

        let mut cache = self.cache.write().await;
        let category_value = cache
            .entry(category.clone())
            .or_insert_with(|| serde_json::Value::Object(serde_json::Map::new()));
        if let Some(object) = category_value.as_object_mut() {
            object.insert(name, value.clone());
        }
        drop(cache);

        let mut dirty_keys = self.dirty_keys.write().await;
        dirty_keys.insert(key.to_string(), true);

        debug!("📝 Store updated: {}", key);
        Ok(())
    }

    async fn remove_value(&self, key: &str) -> Result<(), StoreError> {
        let (category, name) = self.parse_key(key);

        let mut cache = self.cache.write().await;
        if let Some(category_value) = cache.get_mut(&category) {
            if let Some(object) = category_value.as_object_mut() {
                object.remove(&name);
            }
        }
        drop(cache);

        let mut dirty_keys = self.dirty_keys.write().await;
        dirty_keys.insert(key.to_string(), true);

        debug!("🗑️ Store key removed: {}", key);
        Ok(())
    }

    async fn all_values(&self) -> Result<HashMap<String, serde_json::Value>, StoreError> {
        let cache = self.cache.read().await;
        let mut result = HashMap::new();

        for (category, value) in cache.iter() {
            if let Some(object) = value.as_object() {
                for (name, v) in object.iter() {
                    result.insert(format!("{}.{}", category, name), v.clone());
                }
            }
        }

        Ok(result)
    }
}

/// インメモリストア（テストおよびストア未設定時のフォールバック）
#[derive(Default)]
pub struct MemoryStore {
    values: RwLock<HashMap<String, serde_json::Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KvStore for MemoryStore {
    async fn get_value(&self, key: &str) -> Result<Option<serde_json::Value>, StoreError> {
        Ok(self.values.read().await.get(key).cloned())
    }

    async fn set_value(&self, key: &str, value: &serde_json::Value) -> Result<(), StoreError> {
        validate_value(value)?;
        self.values
            .write()
            .await
            .insert(key.to_string(), value.clone());
        Ok(())
    }

    async fn remove_value(&self, key: &str) -> Result<(), StoreError> {
        self.values.write().await.remove(key);
        Ok(())
    }

    async fn all_values(&self) -> Result<HashMap<String, serde_json::Value>, StoreError> {
        Ok(self.values.read().await.clone())
    }
}

fn toml_to_json(toml_value: toml::Value) -> Result<serde_json::Value, StoreError> {
    let json_str = serde_json::to_string(&toml_value)
        .map_err(|e| StoreError::Serialization(format!("TOML to JSON conversion failed: {}", e)))?;

    serde_json::from_str(&json_str)
        .map_err(|e| StoreError::Serialization(format!("JSON parsing failed: {}", e)))
}

fn json_to_toml(json_value: serde_json::Value) -> Result<toml::Value, StoreError> {
    let json_str = serde_json::to_string(&json_value)
        .map_err(|e| StoreError::Serialization(format!("JSON serialization failed: {}", e)))?;

    serde_json::from_str::<toml::Value>(&json_str)
        .map_err(|e| StoreError::Serialization(format!("JSON to TOML conversion failed: {}", e)))
}
