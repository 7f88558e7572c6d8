//! Shared cache of parsed descriptor tables
//!
//! Tables are immutable once parsed, so readers share them through `Arc`.

use crate::descriptor_table::DescriptorTable;
use crate::errors::{SafeReadLock, SafeWriteLock, ScreenResult};
use crate::project_context::ProjectContext;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::{debug, info};

#[derive(Debug, Default)]
pub struct TableCache {
    tables: RwLock<HashMap<String, Arc<DescriptorTable>>>,
}

impl TableCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> ScreenResult<Option<Arc<DescriptorTable>>> {
        let tables = self.tables.safe_read()?;
        Ok(tables.get(key).cloned())
    }

    pub fn insert(&self, key: &str, table: DescriptorTable) -> ScreenResult<Arc<DescriptorTable>> {
        let table = Arc::new(table);
        let mut tables = self.tables.safe_write()?;
        tables.insert(key.to_string(), Arc::clone(&table));
        Ok(table)
    }

    /// Cached table for a project, parsing it from disk on a miss
    pub fn get_or_load(&self, ctx: &ProjectContext) -> ScreenResult<Arc<DescriptorTable>> {
        let key = ctx.cache_key();
        if let Some(table) = self.get(&key)? {
            debug!("Descriptor cache hit for {}", ctx.project);
            return Ok(table);
        }

        info!("Descriptor cache miss for {}; loading {}", ctx.project, ctx.descriptor_path().display());
        let table = DescriptorTable::load(&ctx.descriptor_path())?;

        let mut tables = self.tables.safe_write()?;
        // another caller may have loaded it while we parsed
        let entry = tables.entry(key).or_insert_with(|| Arc::new(table));
        Ok(Arc::clone(entry))
    }

    /// Drop one entry; true when something was cached
    pub fn invalidate(&self, key: &str) -> ScreenResult<bool> {
        let mut tables = self.tables.safe_write()?;
        Ok(tables.remove(key).is_some())
    }

    pub fn clear(&self) -> ScreenResult<()> {
        self.tables.safe_write()?.clear();
        Ok(())
    }

    pub fn len(&self) -> ScreenResult<usize> {
        Ok(self.tables.safe_read()?.len())
    }

    pub fn is_empty(&self) -> ScreenResult<bool> {
        Ok(self.len()? == 0)
    }
}
