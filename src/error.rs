use std::fmt;

#[derive(Debug)]
pub enum Error {
    /// Insertion needs a parent the reference node no longer has.
    InsertNode,
    RemoveNode,
    InjectStylesheet,
    Storage,
    #[cfg(feature = "web")]
    JsError,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InsertNode => write!(f, "failed to insert node"),
            Error::RemoveNode => write!(f, "failed to remove node"),
            Error::InjectStylesheet => write!(f, "failed to inject stylesheet"),
            Error::Storage => write!(f, "storage unavailable"),
            #[cfg(feature = "web")]
            Error::JsError => write!(f, "javascript exception"),
        }
    }
}

impl std::error::Error for Error {}
