use enum_as_inner::EnumAsInner;
use thiserror::Error;

/// An error raised while evaluating a path against an entry.
#[derive(Error, Debug, Clone, PartialEq, Eq, EnumAsInner)]
pub enum EvalError {
    #[error("Cannot read attribute `{attr}` of a value of type `{ty}`")]
    NotAnObject { attr: Box<str>, ty: &'static str },
    #[error("`{def}` does not evaluate to a collection, found a value of type `{ty}`")]
    NotACollection { def: String, ty: &'static str },
    #[error("Iterator `index_iter{0}` is not bound")]
    UnboundIterator(usize),
}

impl EvalError {
    pub fn not_an_object(attr: &str, ty: &'static str) -> Self {
        Self::NotAnObject { attr: attr.into(), ty }
    }
}

/// An error raised while parsing or validating canonical definitions.
#[derive(Error, Debug, Clone, PartialEq, Eq, EnumAsInner)]
pub enum ParseError {
    #[error("A from clause must have at least one iteration definition")]
    Empty,
    #[error("`{0}` is not a well-formed iteration definition")]
    MalformedDef(String),
    #[error("`{0}` is not a well-formed path expression")]
    MalformedPath(String),
    #[error("The first iteration definition must name a region, found `{0}`")]
    LeadingNotRegion(String),
    #[error("Definition {pos} refers to `index_iter{iter}`, which is not an earlier iterator")]
    ForwardReference { pos: usize, iter: usize },
    #[error("Duplicate alias `{0}`")]
    DuplicateAlias(String),
}

impl ParseError {
    pub fn malformed_def(s: &str) -> Self {
        Self::MalformedDef(s.to_owned())
    }

    pub fn malformed_path(s: &str) -> Self {
        Self::MalformedPath(s.to_owned())
    }
}
