//! On-disk cache of raw contract bars.
//!
//! One JSON file per symbol, `<dir>/<SYMBOL>.json`, mapping the expiry
//! string (`DD-Mon-YYYY`) to that contract's bars.

use crate::error::Result;
use calspread_core::{ContractBar, Expiry};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::debug;

type CacheFile = BTreeMap<String, Vec<ContractBar>>;

#[derive(Debug)]
pub struct ContractCache {
    dir: PathBuf,
    write_lock: Mutex<()>,
}

impl ContractCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            write_lock: Mutex::new(()),
        }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, symbol: &str) -> PathBuf {
        self.dir.join(format!("{}.json", symbol.to_uppercase()))
    }

    /// Cached bars for one contract, `None` when never stored.
    ///
    /// # Errors
    /// Returns `NseError::Cache` or `NseError::Serialization` if the file is
    /// unreadable or corrupt.
    pub async fn load(&self, symbol: &str, expiry: Expiry) -> Result<Option<Vec<ContractBar>>> {
        let file = read_file(&self.path_for(symbol)).await?;
        Ok(file.and_then(|mut contracts| contracts.remove(&expiry.to_string())))
    }

    /// Stores bars for one contract, replacing any previous entry.
    ///
    /// Writes go through a temporary file and a rename so readers never see
    /// a partial file.
    ///
    /// # Errors
    /// Returns an error if the directory or file cannot be written.
    pub async fn store(&self, symbol: &str, expiry: Expiry, bars: &[ContractBar]) -> Result<()> {
        let _guard = self.write_lock.lock().await;

        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.path_for(symbol);
        let mut contracts = read_file(&path).await?.unwrap_or_default();
        contracts.insert(expiry.to_string(), bars.to_vec());

        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, serde_json::to_vec(&contracts)?).await?;
        tokio::fs::rename(&tmp, &path).await?;

        debug!(symbol, expiry = %expiry, bars = bars.len(), "Cached contract");
        Ok(())
    }
}

async fn read_file(path: &Path) -> Result<Option<CacheFile>> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(err) => Err(err.into()),
    }
}
