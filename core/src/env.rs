//! Bundles the pieces every visitor needs so `expr`, `sql`, and
//! `procedural` don't each thread four separate parameters through every
//! function. Not a spec.md component in its own right — a plumbing
//! convenience over C3/C4 plus the C2 registry and the diagnostics sink.

use crate::context::TransformationContext;
use crate::diagnostics::Diagnostic;
use crate::indices::Indices;
use crate::inline_types::InlineTypeRegistry;

pub struct Env<'a> {
    pub ctx: &'a mut TransformationContext,
    pub indices: &'a Indices,
    pub inline_types: &'a mut InlineTypeRegistry,
    pub diagnostics: &'a mut Vec<Diagnostic>,
}

impl<'a> Env<'a> {
    pub fn push_diag(&mut self, diag: Diagnostic) {
        self.diagnostics.push(diag);
    }
}
