//! The code store: raw markup/scripts and their derived counterparts.
//!
//! Derivation is synchronous: a raw write recomputes its derivative
//! before returning, so no stale state is observable between a write
//! and the next read. Compiled units are bound against the scope list
//! current at `set_scripts` time; later scope changes never rebind
//! them retroactively.

use std::sync::Arc;

use crate::error::CellError;
use crate::sanitize::Sanitizer;
use crate::scope::Scope;
use crate::script::{ExecutableUnit, Interpreter};

pub(crate) struct CodeStore {
    markup: String,
    scripts: Vec<String>,
    compiled_markup: String,
    compiled_units: Arc<Vec<Box<dyn ExecutableUnit>>>,
}

impl CodeStore {
    pub(crate) fn new() -> Self {
        Self {
            markup: String::new(),
            scripts: Vec::new(),
            compiled_markup: String::new(),
            compiled_units: Arc::new(Vec::new()),
        }
    }

    pub(crate) fn markup(&self) -> &str {
        &self.markup
    }

    pub(crate) fn compiled_markup(&self) -> &str {
        &self.compiled_markup
    }

    pub(crate) fn scripts(&self) -> &[String] {
        &self.scripts
    }

    pub(crate) fn compiled_units(&self) -> Arc<Vec<Box<dyn ExecutableUnit>>> {
        self.compiled_units.clone()
    }

    pub(crate) fn set_markup(&mut self, text: &str, sanitizer: &dyn Sanitizer) {
        self.markup = text.to_string();
        self.compiled_markup = sanitizer.sanitize(text);
    }

    /// Records the raw scripts and recompiles them all, index-aligned.
    ///
    /// Every entry is attempted even after a failure, but only the
    /// first failure (in source order) is surfaced. On failure the
    /// previously compiled units are left in place untouched.
    pub(crate) fn set_scripts(
        &mut self,
        scripts: Vec<String>,
        interpreter: &dyn Interpreter,
        scopes: &[Scope],
    ) -> Result<(), CellError> {
        self.scripts = scripts;
        let mut units = Vec::with_capacity(self.scripts.len());
        let mut first_failure = None;
        for (index, source) in self.scripts.iter().enumerate() {
            match interpreter
                .compile(source)
                .and_then(|script| script.bind(scopes))
            {
                Ok(unit) => units.push(unit),
                Err(e) => {
                    if first_failure.is_none() {
                        first_failure = Some(CellError::Compile {
                            index,
                            message: e.to_string(),
                        });
                    }
                }
            }
        }
        if let Some(failure) = first_failure {
            return Err(failure);
        }
        self.compiled_units = Arc::new(units);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sanitize::AllowListSanitizer;
    use crate::script::MiniInterpreter;
    use crate::scope::Value;

    fn fixture() -> (CodeStore, AllowListSanitizer, MiniInterpreter, Vec<Scope>) {
        (
            CodeStore::new(),
            AllowListSanitizer::default(),
            MiniInterpreter::new(),
            vec![Scope::new().with("x", Value::Number(1.0))],
        )
    }

    #[test]
    fn test_markup_derivation_is_synchronous() {
        let (mut store, sanitizer, _, _) = fixture();
        store.set_markup("<div><script>x</script></div>", &sanitizer);
        assert_eq!(store.markup(), "<div><script>x</script></div>");
        assert_eq!(store.compiled_markup(), "<div/>");
    }

    #[test]
    fn test_scripts_compile_index_aligned() {
        let (mut store, _, interp, scopes) = fixture();
        store
            .set_scripts(
                vec!["let a = 1".to_string(), "let b = x".to_string(), String::new()],
                &interp,
                &scopes,
            )
            .unwrap();
        assert_eq!(store.scripts().len(), 3);
        assert_eq!(store.compiled_units().len(), 3);
    }

    #[test]
    fn test_first_failure_reported_by_position() {
        let (mut store, _, interp, scopes) = fixture();
        let err = store
            .set_scripts(
                vec![
                    "let a = 1".to_string(),
                    "nope(".to_string(),
                    "also bad(".to_string(),
                ],
                &interp,
                &scopes,
            )
            .unwrap_err();
        match err {
            CellError::Compile { index, .. } => assert_eq!(index, 1),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_failure_keeps_previous_units_and_records_raw() {
        let (mut store, _, interp, scopes) = fixture();
        store
            .set_scripts(vec!["let a = 1".to_string()], &interp, &scopes)
            .unwrap();
        let err = store.set_scripts(
            vec!["broken(".to_string(), "let ok = 1".to_string()],
            &interp,
            &scopes,
        );
        assert!(err.is_err());
        // Raw fields reflect the attempted write, derived units do not.
        assert_eq!(store.scripts().len(), 2);
        assert_eq!(store.compiled_units().len(), 1);
    }

    #[test]
    fn test_bind_failure_is_a_compile_error() {
        let (mut store, _, interp, scopes) = fixture();
        let err = store
            .set_scripts(vec!["unbound_name(1)".to_string()], &interp, &scopes)
            .unwrap_err();
        match err {
            CellError::Compile { index, message } => {
                assert_eq!(index, 0);
                assert!(message.contains("unknown name"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
