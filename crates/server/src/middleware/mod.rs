pub mod model_loaders;

pub use model_loaders::load_pod_middleware;
