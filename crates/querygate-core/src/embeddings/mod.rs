pub mod local;
pub mod util;

pub use local::LocalEmbedding;
