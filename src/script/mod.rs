//! Interpreter collaborator seam.
//!
//! The runtime never depends on a particular script language: it
//! compiles source text through [`Interpreter`], binds the result
//! against an ordered capability scope list, and runs the bound unit.
//! [`mini`] ships a deliberately small reference implementation so the
//! runtime is executable and testable out of the box.

pub mod mini;

use thiserror::Error;

use crate::scope::Scope;

/// Error raised by a running script unit. Terminates the execution
/// session it belongs to; never unwinds into the host.
#[derive(Error, Debug, Clone)]
pub enum ScriptError {
    #[error("type error: {0}")]
    Type(String),

    #[error("unknown name `{0}`")]
    Name(String),

    #[error("{0}")]
    Fault(String),
}

/// Compiles source text into an unbound script.
pub trait Interpreter: Send + Sync {
    fn compile(&self, source: &str) -> anyhow::Result<Box<dyn CompiledScript>>;
}

/// A compiled script awaiting its capability scopes.
///
/// `scopes` is ordered: resolution searches it front to back and the
/// first binding wins, so earlier scopes shadow later ones.
pub trait CompiledScript: Send + Sync {
    fn bind(&self, scopes: &[Scope]) -> anyhow::Result<Box<dyn ExecutableUnit>>;
}

impl std::fmt::Debug for dyn CompiledScript {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("dyn CompiledScript")
    }
}

/// A bound, runnable script unit. `run` executes synchronously to
/// completion or fails; the runtime treats it as uninterruptible.
pub trait ExecutableUnit: Send + Sync {
    fn run(&self) -> Result<(), ScriptError>;
}

impl std::fmt::Debug for dyn ExecutableUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("dyn ExecutableUnit")
    }
}

pub use mini::MiniInterpreter;
