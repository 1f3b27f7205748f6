//! C4 — Transformation Context: per-translation mutable state (spec.md
//! §4.4).
//!
//! Guaranteed release (spec.md Invariant 3: "a failed emission must still
//! pop") is implemented the way the Design Notes suggest for a language
//! without try/finally-style scope guards baked into every call site: each
//! stack-shaped piece of state is pushed/popped by a `with_*` method that
//! takes a closure, so a pop always runs immediately after the closure
//! returns, Ok or Err, without the caller having to remember it.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use crate::diagnostics::Diagnostic;
use crate::outer_join::OuterJoinContext;
use crate::rownum::RownumContext;

#[derive(Debug, Clone, PartialEq)]
pub enum AliasTarget {
    Table(String),
    Cte(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct VariableInfo {
    pub oracle_type: String,
    pub pg_type: String,
    pub is_constant: bool,
    /// Name of a registered inline type, if this variable's declared type
    /// is `TYPE ... IS RECORD/TABLE OF/VARRAY/INDEX BY` rather than a
    /// scalar.
    pub inline_type: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ExceptionState {
    Declared,
    Linked { sqlstate_suffix: u32, auto: bool },
}

#[derive(Debug)]
pub struct TransformationContext {
    current_schema: String,
    aliases: HashMap<String, AliasTarget>,
    ctes: HashSet<String>,
    /// Innermost scope last.
    scopes: Vec<HashMap<String, VariableInfo>>,
    exceptions: HashMap<String, ExceptionState>,
    next_auto_sqlstate: u32,
    /// Cursor name (lower-cased; `"sql"` for the implicit cursor) -> was
    /// any `%attr` reference ever seen. A `BTreeMap`, not a `HashMap`, so
    /// `tracked_cursors` iterates in a deterministic order regardless of
    /// hasher seed (spec.md §8 property 1: repeated rewrites of the same
    /// input must be byte-identical).
    cursor_attribute_uses: BTreeMap<String, bool>,
    /// `BTreeSet`, not `HashSet`, for the same reason: `loop_records` below
    /// iterates these to emit `RECORD` declarations, and emission order must
    /// be deterministic (spec.md §8 property 1).
    loop_records: BTreeSet<String>,
    assignment_target: bool,
    outer_join_stack: Vec<OuterJoinContext>,
    rownum_stack: Vec<RownumContext>,
}

const AUTO_SQLSTATE_START: u32 = 9001;
const AUTO_SQLSTATE_END: u32 = 9999;

impl TransformationContext {
    pub fn new(current_schema: impl Into<String>) -> Self {
        TransformationContext {
            current_schema: current_schema.into(),
            aliases: HashMap::new(),
            ctes: HashSet::new(),
            scopes: vec![HashMap::new()],
            exceptions: HashMap::new(),
            next_auto_sqlstate: AUTO_SQLSTATE_START,
            cursor_attribute_uses: BTreeMap::new(),
            loop_records: BTreeSet::new(),
            assignment_target: false,
            outer_join_stack: Vec::new(),
            rownum_stack: Vec::new(),
        }
    }

    pub fn current_schema(&self) -> &str {
        &self.current_schema
    }

    // --- alias / CTE maps (flat per translation unit, spec.md Invariant 1) ---

    pub fn register_alias(&mut self, alias: &str, target: AliasTarget) {
        self.aliases.insert(alias.to_lowercase(), target);
    }

    pub fn resolve_alias(&self, alias: &str) -> Option<&AliasTarget> {
        self.aliases.get(&alias.to_lowercase())
    }

    pub fn register_cte(&mut self, name: &str) {
        self.ctes.insert(name.to_lowercase());
    }

    pub fn is_cte(&self, name: &str) -> bool {
        self.ctes.contains(&name.to_lowercase())
    }

    // --- scope chain ---

    /// Pushes a new innermost scope, runs `f`, then pops — on every path,
    /// satisfying Invariant 3 without the caller managing the pop.
    pub fn with_scope<T>(&mut self, f: impl FnOnce(&mut Self) -> T) -> T {
        self.scopes.push(HashMap::new());
        let result = f(self);
        self.scopes.pop();
        result
    }

    pub fn register_variable(&mut self, name: &str, info: VariableInfo) {
        self.scopes
            .last_mut()
            .expect("at least one scope always present")
            .insert(name.to_lowercase(), info);
    }

    /// Searches the scope chain innermost-first.
    pub fn lookup_variable(&self, name: &str) -> Option<&VariableInfo> {
        let key = name.to_lowercase();
        self.scopes.iter().rev().find_map(|scope| scope.get(&key))
    }

    // --- exceptions (spec.md §4.4, §4.9 state machine) ---

    pub fn declare_exception(&mut self, name: &str) {
        self.exceptions
            .entry(name.to_lowercase())
            .or_insert(ExceptionState::Declared);
    }

    /// `PRAGMA EXCEPTION_INIT(name, -200NN)`. Returns a diagnostic (no
    /// linkage) when `oracle_code` is out of range, per spec.md §4.9.
    pub fn link_exception_to_code(&mut self, name: &str, oracle_code: i32) -> Option<Diagnostic> {
        match crate::exceptions::sqlstate_from_pragma_code(oracle_code) {
            Some(sqlstate) => {
                let suffix: u32 = sqlstate[1..].parse().expect("formula always yields 4 digits");
                self.exceptions.insert(
                    name.to_lowercase(),
                    ExceptionState::Linked { sqlstate_suffix: suffix, auto: false },
                );
                None
            }
            None => Some(Diagnostic::warning(format!(
                "PRAGMA EXCEPTION_INIT({name}, {oracle_code}) is outside -20000..-20999, no SQLSTATE linked"
            ))),
        }
    }

    /// Looks up (and, on first use of an undeclared/unlinked name,
    /// auto-assigns) the SQLSTATE for `name`. Stable across repeated calls
    /// within the same translation unit (spec.md §8 property 9).
    pub fn lookup_sqlstate(&mut self, name: &str) -> Result<String, crate::diagnostics::TranspileError> {
        let key = name.to_lowercase();
        match self.exceptions.get(&key) {
            Some(ExceptionState::Linked { sqlstate_suffix, .. }) => {
                Ok(format!("P{sqlstate_suffix:04}"))
            }
            Some(ExceptionState::Declared) | None => {
                if self.next_auto_sqlstate > AUTO_SQLSTATE_END {
                    return Err(crate::diagnostics::TranspileError::TransformationBug(format!(
                        "exhausted auto-assigned SQLSTATE range (P{AUTO_SQLSTATE_START}..P{AUTO_SQLSTATE_END}) while linking '{name}'"
                    )));
                }
                let suffix = self.next_auto_sqlstate;
                self.next_auto_sqlstate += 1;
                self.exceptions
                    .insert(key, ExceptionState::Linked { sqlstate_suffix: suffix, auto: true });
                Ok(format!("P{suffix:04}"))
            }
        }
    }

    // --- cursor attribute tracking (spec.md §4.4, §4.9 state machine) ---

    /// The special name `"sql"` denotes the implicit cursor.
    pub fn register_cursor_attribute_use(&mut self, cursor: &str) {
        self.cursor_attribute_uses.insert(cursor.to_lowercase(), true);
    }

    /// A cursor that was declared/opened but never had its tracking flipped
    /// on is recorded as `false` so `cursor_needs_tracking` can distinguish
    /// "never seen" from "seen, not tracked".
    pub fn note_cursor_seen(&mut self, cursor: &str) {
        self.cursor_attribute_uses
            .entry(cursor.to_lowercase())
            .or_insert(false);
    }

    pub fn cursor_needs_tracking(&self, cursor: &str) -> bool {
        self.cursor_attribute_uses
            .get(&cursor.to_lowercase())
            .copied()
            .unwrap_or(false)
    }

    /// Every cursor name (lower-cased) whose tracking flipped on, in the
    /// order first seen. Used once, after the whole body has been
    /// rewritten, to inject the `c__found`/`c__rowcount`/`c__isopen`
    /// declarations (spec.md §8 property 8).
    pub fn tracked_cursors(&self) -> Vec<String> {
        self.cursor_attribute_uses
            .iter()
            .filter(|(_, &tracked)| tracked)
            .map(|(name, _)| name.clone())
            .collect()
    }

    // --- loop record registry ---

    pub fn register_loop_record(&mut self, name: &str) {
        self.loop_records.insert(name.to_lowercase());
    }

    pub fn is_loop_record(&self, name: &str) -> bool {
        self.loop_records.contains(&name.to_lowercase())
    }

    /// Every cursor FOR-loop record variable registered so far, in sorted
    /// order. Used once, after the whole body has been rewritten, to inject
    /// each one's `RECORD` declaration (spec.md §4.9, §4.4).
    pub fn loop_records(&self) -> Vec<String> {
        self.loop_records.iter().cloned().collect()
    }

    // --- assignment-target flag ---

    pub fn with_assignment_target<T>(&mut self, f: impl FnOnce(&mut Self) -> T) -> T {
        let previous = self.assignment_target;
        self.assignment_target = true;
        let result = f(self);
        self.assignment_target = previous;
        result
    }

    pub fn is_assignment_target(&self) -> bool {
        self.assignment_target
    }

    // --- outer-join / ROWNUM context stacks (spec.md Invariant 4) ---

    pub fn with_outer_join_context<T>(
        &mut self,
        ctx: OuterJoinContext,
        f: impl FnOnce(&mut Self) -> T,
    ) -> T {
        self.outer_join_stack.push(ctx);
        let result = f(self);
        self.outer_join_stack.pop();
        result
    }

    pub fn current_outer_join_context(&self) -> Option<&OuterJoinContext> {
        self.outer_join_stack.last()
    }

    pub fn with_rownum_context<T>(
        &mut self,
        ctx: RownumContext,
        f: impl FnOnce(&mut Self) -> T,
    ) -> T {
        self.rownum_stack.push(ctx);
        let result = f(self);
        self.rownum_stack.pop();
        result
    }

    pub fn current_rownum_context(&self) -> Option<&RownumContext> {
        self.rownum_stack.last()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scope_pops_even_when_closure_errs() {
        let mut ctx = TransformationContext::new("hr");
        let result: Result<(), ()> = ctx.with_scope(|ctx| {
            ctx.register_variable(
                "v",
                VariableInfo {
                    oracle_type: "NUMBER".into(),
                    pg_type: "numeric".into(),
                    is_constant: false,
                    inline_type: None,
                },
            );
            Err(())
        });
        assert!(result.is_err());
        assert!(ctx.lookup_variable("v").is_none());
    }

    #[test]
    fn variable_shadowing_resolves_innermost_first() {
        let mut ctx = TransformationContext::new("hr");
        ctx.register_variable(
            "v",
            VariableInfo {
                oracle_type: "NUMBER".into(),
                pg_type: "numeric".into(),
                is_constant: false,
                inline_type: None,
            },
        );
        ctx.with_scope(|ctx| {
            ctx.register_variable(
                "v",
                VariableInfo {
                    oracle_type: "VARCHAR2".into(),
                    pg_type: "text".into(),
                    is_constant: false,
                    inline_type: None,
                },
            );
            assert_eq!(ctx.lookup_variable("v").unwrap().pg_type, "text");
        });
        assert_eq!(ctx.lookup_variable("v").unwrap().pg_type, "numeric");
    }

    #[test]
    fn sqlstate_lookup_is_stable_and_auto_assigns() {
        let mut ctx = TransformationContext::new("hr");
        let first = ctx.lookup_sqlstate("my_exc").unwrap();
        let second = ctx.lookup_sqlstate("my_exc").unwrap();
        assert_eq!(first, second);
        assert!(first.starts_with('P'));
    }

    #[test]
    fn pragma_link_then_lookup_uses_linked_code() {
        let mut ctx = TransformationContext::new("hr");
        ctx.declare_exception("bad_state");
        let diag = ctx.link_exception_to_code("bad_state", -20055);
        assert!(diag.is_none());
        assert_eq!(ctx.lookup_sqlstate("bad_state").unwrap(), "P0055");
    }

    #[test]
    fn cursor_tracking_flips_on_attribute_use_only() {
        let mut ctx = TransformationContext::new("hr");
        ctx.note_cursor_seen("c");
        assert!(!ctx.cursor_needs_tracking("c"));
        ctx.register_cursor_attribute_use("c");
        assert!(ctx.cursor_needs_tracking("c"));
    }
}
