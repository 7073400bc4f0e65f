pub mod defaults;
pub mod paths;
pub mod service;
pub mod settings;
pub mod validation;

pub use paths::AppPaths;
pub use service::{redacted, ConfigService};
pub use settings::{
    AppConfig, FallbackConfig, IdStrategy, IngestConfig, LlmConfig, RetrievalConfig,
    SearchConfig, SearchProvider, VectorStoreConfig, VectorStoreProvider,
};
pub use validation::ConfigScope;
