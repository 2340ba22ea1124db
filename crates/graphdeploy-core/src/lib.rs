//! # graphdeploy-core
//!
//! Reconciliation engine for declarative GraphQL backend deployments.
//!
//! A deployment is described by a [`DesiredState`]. The [`Reconciler`]
//! converges it into a set of provider resources (role, compute function,
//! API, schema, data source, resolvers, API key and optional distribution)
//! through a [`ResourceClient`], and records what it achieved in a
//! [`ConvergedState`] that the caller persists with a [`StateStore`].
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use graphdeploy_core::{DesiredState, FileStateStore, LocalSourceProvider, Reconciler};
//!
//! async fn deploy(client: graphdeploy_core::DynResourceClient) -> graphdeploy_core::Result<()> {
//!     let store = FileStateStore::new(".graphdeploy/state.json");
//!     let reconciler = Reconciler::new(client, Arc::new(LocalSourceProvider::new(".graphdeploy/stage")));
//!     let report = reconciler
//!         .deploy_stored(&DesiredState::new("graphql-app").with_src("./app"), &store)
//!         .await?;
//!     println!("{:?}", report.output.url);
//!     Ok(())
//! }
//! ```
//!
//! ## Implementing a provider
//!
//! Implement [`ResourceClient`] for the target platform. Every method must be
//! idempotent: deploying an existing resource updates it and removing a
//! missing resource succeeds.

pub mod client;
pub mod error;
pub mod events;
pub mod fingerprint;
pub mod merger;
pub mod model;
pub mod policy;
pub mod reconciler;
pub mod resolver;
pub mod source;
pub mod state;

pub use client::{DynResourceClient, ResourceClient, ResourceKind};
pub use error::{DeployError, ErrorCategory, ProviderError, ResolverOrigin, Result};
pub use events::{DeployEvent, DynEventSink, EventSink, RecordingSink, TracingSink};
pub use fingerprint::{ChangeDetector, Fingerprint};
pub use merger::{MergedResolvers, ResolverMerger};
pub use model::{
    ApiUrls, AuthMode, ConvergedState, DEFAULT_REGION, DeployOutput, DesiredState,
    FunctionSettings, SourcePolicy, VpcConfig,
};
pub use policy::PolicyStatement;
pub use reconciler::{DeployReport, DeployStep, Reconciler, RemoveReport, StepOutcome, StepReport};
pub use resolver::{ExportKind, ModuleExports, RESOLVER_MANIFEST, ResolverDefinition, ResolverMap};
pub use source::{LocalSourceProvider, SCHEMA_FILE, SourceProvider, WorkingDir};
pub use state::{DynStateStore, FileStateStore, MemoryStateStore, StateError, StateStore};
