//! # vimage
//!
//! Image handles and by-name operation invocation. A [`VImage`] is a cheap,
//! reference-counted handle on an immutable image; every processing step is
//! an *operation* looked up by name in a registry and run with a list of
//! named, typed, directional arguments.
//!
//! ```no_run
//! use vimage::{VImage, VOption};
//!
//! # fn main() -> vimage::Result<()> {
//! let image = VImage::new_from_file("photo.jpg[shrink=2]", None)?;
//!
//! // Typed convenience method...
//! let small = image.resize(0.5, None)?;
//!
//! // ...or the same operation called by name.
//! let mut out = VImage::default();
//! VImage::call(
//!     "resize",
//!     Some(VOption::new().set("in", &image).set("scale", 0.5).set_output("out", &mut out)),
//! )?;
//! assert_eq!(small.width(), out.width());
//!
//! let bytes = (&out * 1.2)?.write_to_buffer(".png", None)?;
//! # let _ = bytes;
//! # Ok(())
//! # }
//! ```
//!
//! # Layers
//!
//! ```text
//! VImage methods / operators     typed wrappers, one per operation
//!          │
//!     call / VOption             name → instance, inputs in, outputs out
//!          │
//!  Registry / Operation          argument declarations + build
//!          │
//!        ops::*                  pixel loops on the rayon pool
//! ```
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`object`] | `Handle<T>`: the shared, nullable, reference-counted handle |
//! | [`image`] | `VImage`, its header, metadata, constructors, methods and operators |
//! | [`connection`] | `VSource` / `VTarget` byte streams |
//! | [`interpolate`] | `VInterpolate` resampling kernels |
//! | [`value`] | `Value`, `ValueType`, `Blob`: everything an argument can hold |
//! | [`enums`] | `BandFormat`, `Interpretation` and the other enumerations |
//! | [`option`] | `VOption`, the argument list |
//! | [`option_string`] | `file.png[name=value,...]` parsing |
//! | [`operation`] | the `Operation` trait, argument declarations, instances |
//! | [`registry`] | name → operation lookup and introspection |
//! | [`call`] | generic invocation |
//! | [`ops`] | the built-in operations |
//! | [`config`] | engine configuration (`vimage.toml`) |
//! | [`error`] | the crate error type |
//! | [`output`] | CLI output formatting |
//!
//! # Errors
//!
//! Constructors, metadata access and every operation return [`Result`];
//! when a call fails, none of the caller's output storage has been touched.
//! Metadata access on a null image is [`Error::NullImage`]. The plain header
//! accessors (`width`, `pixels`, ...) panic on a null image.

pub mod call;
pub mod config;
pub mod connection;
pub mod enums;
pub mod error;
pub mod image;
pub mod interpolate;
pub mod object;
pub mod operation;
pub mod ops;
pub mod option;
pub mod option_string;
pub mod output;
pub mod registry;
pub mod value;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use config::{ConfigError, EngineConfig};
pub use connection::{VSource, VTarget};
pub use enums::{
    Angle, BandFormat, Direction, EnumType, Extend, Interpretation, Kernel, OperationBoolean,
    OperationMath, OperationMath2, OperationRelational, OperationRound,
};
pub use error::{Error, Result};
pub use image::VImage;
pub use interpolate::VInterpolate;
pub use option::VOption;
pub use registry::Registry;
pub use value::{Blob, Value, ValueType};

/// Validate and install an engine configuration.
///
/// Sizes the global rayon pool from `processing.max_threads`. The pool can
/// only be built once per process; later calls still replace the limits and
/// saver defaults but keep the existing pool.
pub fn init(config: &EngineConfig) -> std::result::Result<(), ConfigError> {
    config.validate()?;
    let threads = config::effective_threads(&config.processing);
    if rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .is_err()
    {
        tracing::debug!(threads, "thread pool already initialised");
    }
    config::install(config.clone());
    tracing::debug!(threads, "engine initialised");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_installs_config() {
        init(&EngineConfig::default()).unwrap();
        assert_eq!(config::current(), EngineConfig::default());
        // a second init keeps the pool and still succeeds
        init(&EngineConfig::default()).unwrap();
    }

    #[test]
    fn init_rejects_invalid_config() {
        let mut config = EngineConfig::default();
        config.limits.max_pixels = 0;
        assert!(init(&config).is_err());
    }
}
