//! Local sensing: periodic analog sampling and debounced button edges

pub mod debounce;
pub mod sampler;

pub use debounce::{DebounceState, EdgeDetector, DEFAULT_REFRACTORY_WINDOW_MS};
pub use sampler::{PeriodicSampler, DEFAULT_SAMPLE_INTERVAL_MS};
