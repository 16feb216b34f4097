//! Data model shared across every pipeline stage (§3).

pub mod audit;
pub mod chunk;
pub mod index_row;
pub mod raw;
pub mod request;
pub mod response;

pub use audit::AuditRecord;
pub use chunk::{Chunk, ChunkType, Provenance, SemanticRegion, TokenRange};
pub use index_row::IndexRow;
pub use raw::{ChunkFile, ChunkedMeta, RawManifest, RawObject};
pub use request::{Channel, Language, RawRequest, Request};
pub use response::{AnswerLine, Citation, Resolution, Response};
