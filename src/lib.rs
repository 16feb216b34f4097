//! civic-rag: document chunking, vector indexing, and policy-gated
//! retrieval-augmented answering for a civic-information assistant.

pub mod audit;
pub mod chunking;
pub mod clients;
pub mod config;
pub mod error;
pub mod index;
pub mod materialize;
pub mod orchestrator;
pub mod retrieve;
pub mod store;
pub mod telemetry;
pub mod types;

use std::sync::Arc;

use clients::{Embedder, Generator};
use config::Config;
use store::{ObjectStore, VectorRowStore};

/// Owns every lazily-initialized, `Arc`-shared external collaborator handle
/// the pipelines need: the object store, the vector row store, and the
/// embedder/generator HTTP clients (§5 "Shared resources", §9 "Cyclic
/// graphs / global state").
///
/// Unlike the sources' process-wide cached globals, every component that
/// needs a collaborator receives its handle explicitly — nothing reaches
/// into ambient process state.
#[derive(Clone)]
pub struct Core {
    pub config: Arc<Config>,
    pub object_store: Arc<dyn ObjectStore>,
    pub vector_store: Arc<dyn VectorRowStore>,
    pub embedder: Arc<dyn Embedder>,
    pub generator: Arc<dyn Generator>,
}

impl Core {
    pub fn new(
        config: Config,
        object_store: Arc<dyn ObjectStore>,
        vector_store: Arc<dyn VectorRowStore>,
        embedder: Arc<dyn Embedder>,
        generator: Arc<dyn Generator>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            object_store,
            vector_store,
            embedder,
            generator,
        }
    }
}
