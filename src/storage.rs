//! Local key-value persistence and the generated-image gallery

use crate::constants::{GALLERY_STORAGE_KEY, MAX_GALLERY_ITEMS};
use crate::models::GalleryItem;
use anyhow::Result;
use std::collections::{BTreeMap, VecDeque};
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;

/// String key-value storage, the shape browser local storage has
pub trait KeyValueStore: Send + Sync {
    fn keys(&self) -> Vec<String>;
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: String) -> Result<()>;
    fn remove(&self, key: &str) -> Result<()>;
}

/// Key-value store persisted as one JSON object on disk
pub struct FileStore {
    path: PathBuf,
    entries: Mutex<BTreeMap<String, String>>,
}

impl FileStore {
    /// Store under `~/.meebot/storage.json`
    pub fn new() -> Self {
        let dir = dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".meebot");
        Self::open(dir.join("storage.json"))
    }

    /// Open a store at `path`; a missing or unreadable file starts empty
    pub fn open(path: PathBuf) -> Self {
        let entries = fs::read_to_string(&path)
            .ok()
            .and_then(|content| serde_json::from_str(&content).ok())
            .unwrap_or_default();
        FileStore {
            path,
            entries: Mutex::new(entries),
        }
    }

    fn entries(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, String>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn flush(&self, entries: &BTreeMap<String, String>) -> Result<()> {
        if let Some(dir) = self.path.parent() {
            if !dir.exists() {
                fs::create_dir_all(dir)?;
            }
        }
        let content = serde_json::to_string_pretty(entries)?;
        fs::write(&self.path, content)?;
        Ok(())
    }
}

impl Default for FileStore {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyValueStore for FileStore {
    fn keys(&self) -> Vec<String> {
        self.entries().keys().cloned().collect()
    }

    fn get(&self, key: &str) -> Option<String> {
        self.entries().get(key).cloned()
    }

    fn set(&self, key: &str, value: String) -> Result<()> {
        let mut entries = self.entries();
        entries.insert(key.to_string(), value);
        self.flush(&entries)
    }

    fn remove(&self, key: &str) -> Result<()> {
        let mut entries = self.entries();
        if entries.remove(key).is_some() {
            self.flush(&entries)?;
        }
        Ok(())
    }
}

/// In-memory store, for tests and ephemeral sessions
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<BTreeMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, String>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl KeyValueStore for MemoryStore {
    fn keys(&self) -> Vec<String> {
        self.entries().keys().cloned().collect()
    }

    fn get(&self, key: &str) -> Option<String> {
        self.entries().get(key).cloned()
    }

    fn set(&self, key: &str, value: String) -> Result<()> {
        self.entries().insert(key.to_string(), value);
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.entries().remove(key);
        Ok(())
    }
}

/// Capped list of generated images, newest first
pub struct Gallery {
    items: VecDeque<GalleryItem>,
}

impl Gallery {
    /// Load the gallery from `store`; corrupt data starts an empty gallery
    pub fn load(store: &dyn KeyValueStore) -> Self {
        let mut items: VecDeque<GalleryItem> = store
            .get(GALLERY_STORAGE_KEY)
            .and_then(|raw| serde_json::from_str(&raw).ok())
            .unwrap_or_default();
        items.truncate(MAX_GALLERY_ITEMS);
        Gallery { items }
    }

    /// Add an item at the head, evicting the oldest past the cap
    pub fn add(&mut self, item: GalleryItem) {
        if self.items.len() >= MAX_GALLERY_ITEMS {
            self.items.pop_back();
        }
        self.items.push_front(item);
    }

    /// Write the whole gallery back; the last writer wins
    pub fn save(&self, store: &dyn KeyValueStore) -> Result<()> {
        let content = serde_json::to_string(&self.items)?;
        store.set(GALLERY_STORAGE_KEY, content)
    }

    pub fn items(&self) -> impl Iterator<Item = &GalleryItem> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn item(n: usize) -> GalleryItem {
        GalleryItem {
            id: format!("img-{}", n),
            prompt: format!("meebot #{}", n),
            mime_type: "image/png".into(),
            image: "aGVsbG8=".into(),
            created_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn test_file_store_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("storage.json");

        let store = FileStore::open(path.clone());
        store.set("wagmi.store", "{}".into()).unwrap();
        store.set("theme", "dark".into()).unwrap();
        store.remove("wagmi.store").unwrap();

        let reopened = FileStore::open(path);
        assert_eq!(reopened.keys(), vec!["theme".to_string()]);
        assert_eq!(reopened.get("theme").as_deref(), Some("dark"));
    }

    #[test]
    fn test_gallery_is_capped_and_persisted() {
        let dir = tempdir().unwrap();
        let store = FileStore::open(dir.path().join("storage.json"));

        let mut gallery = Gallery::load(&store);
        for n in 0..MAX_GALLERY_ITEMS + 3 {
            gallery.add(item(n));
        }
        gallery.save(&store).unwrap();

        let reloaded = Gallery::load(&FileStore::open(dir.path().join("storage.json")));
        assert_eq!(reloaded.len(), MAX_GALLERY_ITEMS);
        let newest = reloaded.items().next().unwrap();
        assert_eq!(newest.id, format!("img-{}", MAX_GALLERY_ITEMS + 2));
        assert!(reloaded.items().all(|i| i.id != "img-0"));
    }

    #[test]
    fn test_gallery_ignores_corrupt_data() {
        let store = MemoryStore::new();
        store.set(GALLERY_STORAGE_KEY, "not json".into()).unwrap();
        assert!(Gallery::load(&store).is_empty());
    }
}
