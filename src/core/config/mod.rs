pub mod defaults;
pub mod paths;
pub mod service;
pub mod settings;
pub mod types;
pub mod validation;

pub use paths::AppPaths;
pub use service::{ConfigService, ConfigSource};
pub use settings::Settings;
pub use types::{
    AgentConfig, ColumnMap, LlmConfig, RetrievalConfig, RetrieverKind, VectorSearchConfig,
};
