//! Per-entry runtime context

use std::sync::Arc;

use crate::client::ProjectorClient;
use crate::executor::Executor;
use crate::options::SdcpOptions;

/// Everything a loaded entry owns: its projector client, the executor its
/// blocking calls run on, and the resolved options.
#[derive(Clone)]
pub struct EntryContext {
    pub entry_id: String,
    pub host: String,
    pub unique_id: String,
    pub client: Arc<dyn ProjectorClient>,
    pub executor: Executor,
    pub options: SdcpOptions,
}

impl std::fmt::Debug for EntryContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntryContext")
            .field("entry_id", &self.entry_id)
            .field("host", &self.host)
            .field("unique_id", &self.unique_id)
            .field("executor", &self.executor)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}
