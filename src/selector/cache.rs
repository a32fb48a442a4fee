use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use crate::selector::{AnalysisMode, SelectionResult};
use crate::story::{NarrativeStyle, StylePreset};

/// Bumped whenever analyzer internals change, so stale entries never
/// survive a detector revision.
pub const CACHE_VERSION: u32 = 2;

/// Cache key: clip identity plus every input that shapes the result
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub clip_path: PathBuf,
    pub story_style: NarrativeStyle,
    pub style_preset: StylePreset,
    pub mode: AnalysisMode,
    pub version: u32,
}

impl CacheKey {
    pub fn new(
        clip_path: &std::path::Path,
        story_style: NarrativeStyle,
        style_preset: StylePreset,
        mode: AnalysisMode,
    ) -> Self {
        Self {
            clip_path: clip_path.to_path_buf(),
            story_style,
            style_preset,
            mode,
            version: CACHE_VERSION,
        }
    }
}

/// Per-process selection cache. Entries are whole-value inserts behind a
/// mutex, so readers never observe torn results. No TTL; `clear` is the
/// only invalidation besides the version tag.
#[derive(Debug, Default)]
pub struct AnalysisCache {
    entries: Mutex<HashMap<CacheKey, Arc<SelectionResult>>>,
}

impl AnalysisCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &CacheKey) -> Option<Arc<SelectionResult>> {
        self.entries.lock().unwrap().get(key).cloned()
    }

    pub fn insert(&self, key: CacheKey, result: SelectionResult) -> Arc<SelectionResult> {
        let result = Arc::new(result);
        self.entries.lock().unwrap().insert(key, result.clone());
        result
    }

    pub fn clear(&self) {
        self.entries.lock().unwrap().clear();
        tracing::info!("Analysis cache cleared");
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn key(path: &str, mode: AnalysisMode) -> CacheKey {
        CacheKey::new(
            Path::new(path),
            NarrativeStyle::Traditional,
            StylePreset::Romantic,
            mode,
        )
    }

    #[test]
    fn test_mode_separates_entries() {
        let full = key("/clips/a.mp4", AnalysisMode::Full);
        let fast = key("/clips/a.mp4", AnalysisMode::Fast);
        assert_ne!(full, fast);
    }

    #[test]
    fn test_version_tag_in_key() {
        let k = key("/clips/a.mp4", AnalysisMode::Full);
        assert_eq!(k.version, CACHE_VERSION);
    }

    #[test]
    fn test_clear_empties_cache() {
        let cache = AnalysisCache::new();
        assert!(cache.is_empty());
        // insert is exercised through the selector tests; clear on empty is
        // still a no-op that must not panic
        cache.clear();
        assert!(cache.is_empty());
    }
}
