pub mod retrieval;

pub use retrieval::RetrievalContextBuilder;
