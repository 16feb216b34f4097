//! External storage collaborators: the Object Store (OS) and the Vector
//! Row Store (VRS) — §2, §5.

pub mod object_store;
pub mod vector;

pub use object_store::{LocalObjectStore, ObjectStore, S3ObjectStore};
pub use vector::pg::PgVectorRowStore;
pub use vector::sqlite::SqliteVectorRowStore;
pub use vector::{Candidate, VectorRowStore, is_valid_filter_key, vector_literal};
