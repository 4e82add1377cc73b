use std::future::Future;

use anyhow::Result;

use crate::db::{Database, ScrewRecord};

/// Where each tick reads the full measurement list from.
pub trait RecordSource: Send + Sync + 'static {
    /// Every record currently stored, in any order.
    fn fetch_records(&self) -> impl Future<Output = Result<Vec<ScrewRecord>>> + Send;
}

impl RecordSource for Database {
    fn fetch_records(&self) -> impl Future<Output = Result<Vec<ScrewRecord>>> + Send {
        self.fetch_screw_records()
    }
}
