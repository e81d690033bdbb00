//! Client side of campus-edge.
//!
//! This crate provides the upstream fetch pipeline and the cache controller
//! that routes each request to a caching strategy.

pub mod controller;
pub mod fetch;

pub use controller::{
    Backoff, CacheController, ControllerConfig, Interception, LifecycleState, PassReason, Route, RouteRules, Strategy,
};

pub use fetch::{FetchClient, FetchConfig, FetchError, Fetcher};
