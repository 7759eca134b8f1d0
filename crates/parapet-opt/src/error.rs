/// Contract violations inside the predicate algebra.
///
/// These mark misuse by the surrounding analysis, not bad input programs;
/// the driver reports them and leaves the offending procedure untouched,
/// which is always the conservative outcome.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum OptError {
    /// A predicate was inserted into a set holding a different subscript
    /// identity.
    #[error("predicate identity mismatch on set insertion: {predicate}")]
    IdentityMismatch { predicate: String },
    /// Arithmetic was requested on expressions with incompatible bases.
    #[error("arithmetic on incompatible subscript expressions")]
    IncompatibleExpr,
}
