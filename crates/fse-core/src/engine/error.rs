use super::config::ConfigError;
use super::dispatcher::DispatchError;
use super::enumerator::EnumerationError;
use crate::core::fragspace::space::FragmentSpaceError;
use crate::core::io::layer_store::LayerStoreError;
use crate::core::models::graph::GraphError;
use crate::core::rings::geometry::GeometryError;
use crate::core::rings::registry::RegistryError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Invalid configuration: {source}")]
    Config {
        #[from]
        source: ConfigError,
    },

    #[error("Fragment space error: {source}")]
    FragmentSpace {
        #[from]
        source: FragmentSpaceError,
    },

    #[error("Layer store error: {source}")]
    LayerStore {
        #[from]
        source: LayerStoreError,
    },

    #[error("Ring-closure registry error: {source}")]
    Registry {
        #[from]
        source: RegistryError,
    },

    #[error("Enumeration aborted: {source}")]
    Enumeration {
        #[from]
        source: EnumerationError,
    },

    #[error("Ring geometry error: {source}")]
    Geometry {
        #[from]
        source: GeometryError,
    },

    #[error("Task dispatch error: {source}")]
    Dispatch {
        #[from]
        source: DispatchError,
    },

    #[error("Invalid root graph: {source}")]
    Graph {
        #[from]
        source: GraphError,
    },

    #[error("Internal logic error: {0}")]
    Internal(String),
}
