//! # Template Fragment Library
//!
//! Pure builders for every infrastructure primitive a deployment needs. Each
//! builder returns a [`Fragment`](crate::template::Fragment) keyed by a
//! deterministically derived logical id; none of them perform I/O. Values
//! that are only known remotely (account id, region, stack name) are always
//! written as intrinsic references for the control plane to bind.
//!
//! ## Builders
//!
//! - `api`: REST root, deployment marker, stage, account logging role
//! - `compute`: function, execution identity, invoke permission
//! - `routing`: method binding, shared content model, authorizer
//! - `cdn`: CDN distribution in `api` or `assets` root layout
//! - `dns`: alias record for a custom domain
//! - `storage`: static website bucket with public-read policy
//! - `nested`: the outer-layer wrapper around the inner document
//! - `support`: the support stack holding templates and artifacts
//!
//! Routing nodes are emitted by [`crate::path::PathResolver`].

pub mod api;
pub mod cdn;
pub mod compute;
pub mod dns;
pub mod nested;
pub mod routing;
pub mod storage;
pub mod support;
