//! cellhost — a capability-scoped runtime for untrusted components.
//!
//! A host embeds small "cells": bundles of markup and scripts supplied
//! by untrusted parties. Each cell renders into an isolated subtree,
//! its markup is sanitized on entry and resanitized on every mutation,
//! and its scripts can only reach what the host explicitly granted
//! through capability scopes.

pub mod cell;
pub mod config;
pub mod error;
pub mod host;
pub mod markup;
pub mod sanitize;
pub mod scope;
pub mod script;
pub mod style;

pub use cell::{AppCell, CellParams, CodeParams, SessionHandle, SessionOutcome};
pub use config::HostConfig;
pub use error::CellError;
pub use host::Host;
pub use scope::{Scope, Value};
