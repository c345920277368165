//! Bindery Dev Utils
//!
//! Internal helpers shared by the integration tests, benchmarks and demo apps:
//!
//! - [`RecordingFactory`] / [`FactoryProbe`]: a mock native factory that
//!   records every call and can be told to fail
//! - [`fixtures`]: caller-side handles and a ready-made store

pub mod fixtures;
mod recording;

pub use recording::{FactoryCounts, FactoryProbe, RecordingFactory};
