use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use log::{info, warn};
use parking_lot::RwLock;

use super::{Scene, SceneBuffers};
use crate::Result;

/// Published buffers together with the rebuild that produced them.
#[derive(Clone, Debug, Default)]
pub struct SceneSnapshot {
    /// 0 for the initial empty buffers, incremented by every published rebuild.
    pub generation: u64,
    pub buffers: Arc<SceneBuffers>,
}

/// Holds the buffers consumers read while rebuilds happen on the side.
///
/// A rebuild runs to completion before anything is published; readers only
/// ever see the previous complete buffers or the new complete buffers, each
/// paired with its own generation.
#[derive(Debug)]
pub struct SceneCache {
    current: RwLock<SceneSnapshot>,
    dirty: AtomicBool,
}

impl Default for SceneCache {
    fn default() -> Self {
        Self::new()
    }
}

impl SceneCache {
    /// Starts with empty buffers, marked dirty.
    pub fn new() -> Self {
        Self {
            current: RwLock::new(SceneSnapshot::default()),
            dirty: AtomicBool::new(true),
        }
    }

    /// Geometry or transforms changed; the next `rebuild_if_dirty` rebuilds.
    pub fn mark_dirty(&self) {
        self.dirty.store(true, Ordering::Release);
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::Acquire)
    }

    pub fn generation(&self) -> u64 {
        self.current.read().generation
    }

    /// Current buffers and their generation, read under one lock.
    pub fn snapshot(&self) -> SceneSnapshot {
        self.current.read().clone()
    }

    /// Rebuilds when marked dirty. Returns whether new buffers were published.
    /// On failure the old buffers stay current and the cache stays dirty.
    pub fn rebuild_if_dirty(&self, scene: &Scene) -> Result<bool> {
        if !self.dirty.swap(false, Ordering::AcqRel) {
            return Ok(false);
        }
        match self.rebuild(scene) {
            Ok(_) => Ok(true),
            Err(err) => {
                warn!("Scene rebuild failed, keeping previous buffers: {err}");
                self.dirty.store(true, Ordering::Release);
                Err(err)
            }
        }
    }

    /// Rebuilds unconditionally and returns the published generation.
    pub fn rebuild(&self, scene: &Scene) -> Result<u64> {
        let buffers = Arc::new(scene.build()?);
        let generation = {
            let mut current = self.current.write();
            current.generation += 1;
            current.buffers = buffers;
            current.generation
        };
        info!("Published scene buffers, generation {generation}");
        Ok(generation)
    }
}
