use super::types::*;
use crate::error::Result;

pub trait WindowSplitter: Send + Sync {
    /// Partition the configured date range into search windows
    fn split(&self) -> Result<Vec<SearchWindow>>;

    /// Get splitter configuration
    fn config(&self) -> &SplitConfig;
}
