//! The sandboxed component.
//!
//! An [`AppCell`] owns an isolated render subtree, compiles untrusted
//! script source against an explicit capability scope list, sanitizes
//! markup before and continuously after insertion, and runs scripts in
//! cancellable execution sessions so re-entrant activation never lets
//! two generations of scripts run concurrently against the same
//! subtree.

pub mod session;
mod store;
pub mod view;
mod watcher;

use std::sync::Arc;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::CellError;
use crate::sanitize::{AllowListSanitizer, Sanitizer};
use crate::scope::{builtins, is_valid_name, Scope, Value};
use crate::script::{Interpreter, MiniInterpreter};

use session::ExecutionSession;
use store::CodeStore;
use view::View;
use watcher::MutationWatcher;

pub use session::{SessionHandle, SessionOutcome};

/// Raw code bundle: markup plus an ordered script sequence.
#[derive(Debug, Clone)]
pub struct CodeParams {
    pub markup: String,
    pub scripts: Vec<String>,
}

impl Default for CodeParams {
    fn default() -> Self {
        Self {
            markup: String::new(),
            scripts: vec![String::new()],
        }
    }
}

/// Construction parameters. Everything is optional: the default is an
/// empty cell with no host capabilities.
#[derive(Default)]
pub struct CellParams {
    pub code: CodeParams,
    /// Host capability scopes, in shadowing order (first wins).
    pub scopes: Vec<Scope>,
}

/// A sandboxed component instance.
pub struct AppCell {
    id: Uuid,
    view: View,
    /// Full ordered scope list: host scopes first (highest shadowing
    /// priority), then the component's own `view` scope, then the
    /// built-in default scope last (lowest priority). Fixed for the
    /// cell's lifetime.
    scopes: Vec<Scope>,
    store: CodeStore,
    interpreter: Arc<dyn Interpreter>,
    sanitizer: Arc<dyn Sanitizer>,
    active_token: Option<CancellationToken>,
    passes: watch::Receiver<u64>,
}

impl AppCell {
    /// Builds a cell with the reference interpreter and sanitizer.
    pub fn new(params: CellParams) -> Result<Self, CellError> {
        Self::with_collaborators(
            params,
            Arc::new(MiniInterpreter::new()),
            Arc::new(AllowListSanitizer::default()),
        )
    }

    /// Builds a cell around explicit collaborator implementations.
    pub fn with_collaborators(
        params: CellParams,
        interpreter: Arc<dyn Interpreter>,
        sanitizer: Arc<dyn Sanitizer>,
    ) -> Result<Self, CellError> {
        for scope in &params.scopes {
            for name in scope.names() {
                if !is_valid_name(name) {
                    return Err(CellError::Construction(format!(
                        "scope binding `{name}` is not a valid identifier"
                    )));
                }
            }
        }

        // The subtree and its watcher exist for the cell's whole
        // lifetime; activation never recreates them.
        let (view, mutations) = View::new();
        let passes = MutationWatcher::spawn(view.downgrade(), sanitizer.clone(), mutations);

        let mut scopes = params.scopes;
        scopes.push(Scope::new().with("view", Value::Node(view.root())));
        scopes.push(builtins::default_scope(&view));

        let mut store = CodeStore::new();
        store.set_markup(&params.code.markup, sanitizer.as_ref());
        store.set_scripts(params.code.scripts, interpreter.as_ref(), &scopes)?;

        let cell = Self {
            id: Uuid::new_v4(),
            view,
            scopes,
            store,
            interpreter,
            sanitizer,
            active_token: None,
            passes,
        };
        debug!(cell = %cell.id, "cell constructed");
        Ok(cell)
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn markup(&self) -> &str {
        self.store.markup()
    }

    /// Stores raw markup and synchronously derives its sanitized form.
    /// The live subtree is untouched until the next activation.
    pub fn set_markup(&mut self, text: &str) {
        self.store.set_markup(text, self.sanitizer.as_ref());
    }

    pub fn compiled_markup(&self) -> &str {
        self.store.compiled_markup()
    }

    pub fn scripts(&self) -> &[String] {
        self.store.scripts()
    }

    /// Stores raw scripts and compiles each against the cell's scope
    /// list, index-aligned. The first failure in source order is
    /// surfaced; previously compiled units survive a failed write.
    pub fn set_scripts(&mut self, scripts: Vec<String>) -> Result<(), CellError> {
        self.store
            .set_scripts(scripts, self.interpreter.as_ref(), &self.scopes)
    }

    /// The "inserted into the visible surface" entry point.
    ///
    /// Cancels the previous session (if any), synchronously installs
    /// the compiled markup, then starts a fresh session over the
    /// current compiled units. The returned handle distinguishes a
    /// completed run from a superseded or failed one.
    pub fn activate(&mut self) -> SessionHandle {
        if let Some(token) = self.active_token.take() {
            token.cancel();
        }
        if let Err(e) = self.view.set_content(self.store.compiled_markup()) {
            // Sanitizer output always parses; if it somehow does not,
            // keep the cell alive and let the watcher catch up.
            warn!(cell = %self.id, "failed to install compiled markup: {e}");
        }
        let token = CancellationToken::new();
        self.active_token = Some(token.clone());
        debug!(cell = %self.id, "starting execution session");
        ExecutionSession::spawn(self.store.compiled_units(), token)
    }

    /// Cancels the current session without starting a new one.
    pub fn deactivate(&mut self) {
        if let Some(token) = self.active_token.take() {
            token.cancel();
        }
    }

    /// Serialized snapshot of the subtree's current content. The
    /// subtree itself stays unreachable.
    pub fn content(&self) -> String {
        self.view.content()
    }

    /// Counter ticking once per watcher pass; lets the host observe
    /// resanitization activity.
    pub fn sanitize_passes(&self) -> watch::Receiver<u64> {
        self.passes.clone()
    }
}
