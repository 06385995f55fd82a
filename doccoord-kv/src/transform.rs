//! The external Operational Transformation collaborator (spec §1: "the OT
//! transform function itself, treated as a pure library `transform(op,
//! context) → op`").
//!
//! REDESIGN FLAGS: the original in-place mutation of operation objects is
//! expressed here as a pure function returning a new value, so the pipeline
//! can re-transform against a fresh context on retry without aliasing the
//! operation it started with.

use crate::error::CResult;
use crate::model::Operation;

/// A prior operation followed by the operation under transformation, in the
/// exact order `transform` should fold them.
pub struct TransformContext<'a> {
    pub prior_ops: &'a [Operation],
}

/// Pure OT transform: given `op` and the ordered prior operations it was
/// not yet aware of, return the equivalent operation rebased onto them.
pub trait OtTransform: Send + Sync {
    fn transform(&self, op: Operation, context: TransformContext<'_>) -> CResult<Operation>;
}

/// Reference transform used by tests and local development: OT semantics
/// are out of scope (spec §1 Non-goals), so this collaborator is a no-op
/// that only stamps `is_transformed`. A real deployment injects the
/// editor's actual OT implementation here.
pub struct IdentityTransform;

impl OtTransform for IdentityTransform {
    fn transform(&self, mut op: Operation, _context: TransformContext<'_>) -> CResult<Operation> {
        op.is_transformed = true;
        Ok(op)
    }
}

/// The external OT *apply* collaborator (spec §4.4: "applies every committed
/// operation ... through the external OT apply function"). Distinct from
/// [`OtTransform`]: that one rebases an incoming op onto a context of prior
/// ops before commit; this one folds an already-committed op into a
/// document's exchange-format state during import.
pub trait OtApply: Send + Sync {
    fn apply(&self, sfdt: serde_json::Value, op: &Operation) -> CResult<serde_json::Value>;
}

/// Reference apply used by tests and local development, mirroring
/// [`IdentityTransform`]'s stance that OT semantics are out of scope here.
pub struct IdentityApply;

impl OtApply for IdentityApply {
    fn apply(&self, sfdt: serde_json::Value, _op: &Operation) -> CResult<serde_json::Value> {
        Ok(sfdt)
    }
}
