//! Unleash-compatible feature flag client for Rust.

#![warn(missing_docs)]

mod bootstrap;
mod builder;
mod cache;
mod client;
mod constants;
mod context;
mod errors;
mod eval;
mod fetch;
mod metrics;
mod model;
mod modes;
mod repository;
mod strategy;
mod switch;
mod utils;
mod variant;

pub use bootstrap::{file::FileBootstrap, BootstrapSource, StaticBootstrap};
pub use cache::ConfigCache;
pub use client::Client;
pub use constants::PKG_VERSION;
pub use context::Context;
pub use errors::{ClientError, ErrorKind};
pub use eval::details::{EvaluationDetails, FeatureState};
pub use strategy::CustomStrategy;
pub use switch::Switch;
pub use variant::{Payload, Variant};

pub use model::enums::{Operator, StrategyKind};
pub use model::feature::{
    Constraint, FlagDefinition, Override, RepositorySnapshot, Strategy, VariantDefinition,
};

pub use builder::ClientBuilder;
pub use modes::PollingMode;
