mod loading;
mod sync;

pub use loading::LoadingCache;
pub use sync::Cache;
