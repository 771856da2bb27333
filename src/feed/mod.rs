mod merge;
mod refresher;

pub use refresher::{RefreshMode, RefreshOutcome, RefreshSettings, Refresher};

#[cfg(test)]
pub(crate) use refresher::tests as refresh_testing;
