//! Offline render-state packaging.
//!
//! The packager materializes *every* object declared by a set of notation
//! files for one or more target backends at once, hands the results to an
//! [`Archiver`](vermilion_device::Archiver), and optionally dumps the
//! per-backend shader artifacts to disk.
//!
//! Construction runs in two parallel phases over a shared
//! [`ThreadPool`](vermilion_core::ThreadPool):
//!
//! ```text
//! parse_files        Phase 1 (parallel)          Phase 2 (parallel)
//! JSON -> parser --> shaders  ---\                pipelines, resolving
//!                    passes   ----+-- barrier --> names against the     --> archive
//!                    signatures -/                Phase-1 caches            + dump
//! ```
//!
//! Phase 1 objects have no inter-dependencies; pipelines depend only on
//! Phase-1 results, so two barriers replace a general dependency
//! scheduler. The caches are written strictly between the barriers and
//! read-only afterwards.

pub mod dump;
pub mod environment;
pub mod packager;

pub use dump::{dump_bytecode, DumpError};
pub use environment::{EnvironmentCreateInfo, EnvironmentError, ParsingEnvironment};
pub use packager::{PackageError, RenderStatePackager};
