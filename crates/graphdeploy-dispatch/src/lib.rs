//! # graphdeploy-dispatch
//!
//! Entry point linked into a deployment's compute function. Every delegate
//! resolver of the API invokes the same function; the [`Dispatcher`] reads
//! the parent type and field from the [`ResolverEvent`] and calls the matching
//! handler of the [`ResolverRegistry`].
//!
//! ```ignore
//! let registry = ResolverRegistry::new()
//!     .register("Query", "hello", |args, _event| async move {
//!         Ok(serde_json::json!(format!("Hello {}", args["name"])))
//!     });
//!
//! // At build time: write the export manifest next to the schema.
//! std::fs::write(MANIFEST, serde_json::to_string_pretty(&registry.exports())?)?;
//!
//! // At invocation time:
//! let result = Dispatcher::new(Some(registry)).dispatch_json(payload).await?;
//! ```

mod dispatcher;
mod error;
mod event;
mod registry;

pub use dispatcher::Dispatcher;
pub use error::{DispatchError, ResolverError};
pub use event::{ResolverEvent, ResolverInfo};
pub use registry::{FUNCTION_MARKER, ResolverFuture, ResolverHandler, ResolverRegistry};

/// File name of the export manifest inside a source bundle.
pub const MANIFEST: &str = "resolvers.json";
