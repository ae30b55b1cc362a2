//! Measure sequential-read throughput of a file by summing it as `f64`s.
//!
//! Three interchangeable ways of getting at the bytes are compared under the same workload:
//!
//! - [`backend::StandardRead`]: blocking reads through a [`dfs_client::FileSystem`] into one
//!   reusable buffer.
//! - [`backend::ZeroCopy`]: zero-copy reads through the same client, borrowing one buffer at a time.
//! - [`backend::LocalMap`]: a read-only memory mapping of a local file.
//!
//! Every chunk is folded with [`reduce::vecsum`], and a [`stopwatch::Stopwatch`] brackets the
//! whole run. [`driver::execute`] ties it together.
//!
//! # Usage
//!
//! ```no_run
//! use dfs_client::local::LocalFileSystem;
//!
//! let report = vecsum::driver::execute::<LocalFileSystem, _>(
//!     vecsum::config::env_lookup,
//!     &mut std::io::stdout(),
//! )
//! .unwrap();
//! println!("{:?}", report.pass_sums);
//! ```

pub mod backend;
pub mod chunk;
pub mod config;
pub mod driver;
mod error;
pub mod reduce;
pub mod session;
pub mod stopwatch;

#[cfg(test)]
pub(crate) mod test_util;

pub use config::{BackendKind, Config};
pub use driver::RunReport;
pub use error::Error;
