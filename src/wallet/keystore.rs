// On-disk key storage

use crate::wallet::keys::Keypair;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// One stored key file
#[derive(Serialize, Deserialize)]
struct KeyFile {
    secret_key: String,
}

/// Keystore - named keys persisted under a data directory, one JSON file
/// per key.
pub struct Keystore {
    dir: PathBuf,
}

impl Keystore {
    /// Open (creating if needed) a keystore directory
    pub fn open<P: AsRef<Path>>(dir: P) -> Result<Self, String> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)
            .map_err(|e| format!("Failed to create keystore directory: {}", e))?;
        Ok(Self { dir })
    }

    fn path_for(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{}.json", name))
    }

    /// Generate and store a new named key
    pub fn create(&self, name: &str) -> Result<Keypair, String> {
        let keys = Keypair::generate();
        self.store(name, &keys)?;
        Ok(keys)
    }

    /// Store a keypair under a name, overwriting any previous key
    pub fn store(&self, name: &str, keys: &Keypair) -> Result<(), String> {
        let file = KeyFile {
            secret_key: hex::encode(keys.secret_key.secret_bytes()),
        };
        let json = serde_json::to_string_pretty(&file)
            .map_err(|e| format!("Failed to serialize key: {}", e))?;

        fs::write(self.path_for(name), json)
            .map_err(|e| format!("Failed to write key file: {}", e))?;

        Ok(())
    }

    /// Load a named key
    pub fn load(&self, name: &str) -> Result<Keypair, String> {
        let json = fs::read_to_string(self.path_for(name))
            .map_err(|e| format!("Failed to read key file '{}': {}", name, e))?;

        let file: KeyFile = serde_json::from_str(&json)
            .map_err(|e| format!("Failed to parse key file '{}': {}", name, e))?;

        let bytes = hex::decode(&file.secret_key)
            .map_err(|e| format!("Corrupt key file '{}': {}", name, e))?;

        Keypair::from_secret_bytes(&bytes)
    }

    /// Load a named key, creating it on first use
    pub fn load_or_create(&self, name: &str) -> Result<Keypair, String> {
        if self.path_for(name).exists() {
            self.load(name)
        } else {
            log::info!("creating new key '{}'", name);
            self.create(name)
        }
    }

    /// Names of all stored keys
    pub fn list(&self) -> Result<Vec<String>, String> {
        let entries =
            fs::read_dir(&self.dir).map_err(|e| format!("Failed to read keystore: {}", e))?;

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| format!("Failed to read keystore entry: {}", e))?;
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) == Some("json") {
                if let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) {
                    names.push(stem.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let keystore = Keystore::open(dir.path()).unwrap();

        let keys = keystore.create("alice").unwrap();
        let loaded = keystore.load("alice").unwrap();
        assert_eq!(keys.address(), loaded.address());
    }

    #[test]
    fn test_load_missing_key_fails() {
        let dir = tempfile::tempdir().unwrap();
        let keystore = Keystore::open(dir.path()).unwrap();
        assert!(keystore.load("nobody").is_err());
    }

    #[test]
    fn test_load_or_create_is_stable() {
        let dir = tempfile::tempdir().unwrap();
        let keystore = Keystore::open(dir.path()).unwrap();

        let first = keystore.load_or_create("miner").unwrap();
        let second = keystore.load_or_create("miner").unwrap();
        assert_eq!(first.address(), second.address());
    }

    #[test]
    fn test_list() {
        let dir = tempfile::tempdir().unwrap();
        let keystore = Keystore::open(dir.path()).unwrap();

        keystore.create("bob").unwrap();
        keystore.create("alice").unwrap();

        assert_eq!(keystore.list().unwrap(), vec!["alice", "bob"]);
    }
}
