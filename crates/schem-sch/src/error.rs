use schem_eda::LibraryError;
use std::path::PathBuf;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors raised while reading, editing or analysing a schematic.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The text is not a well-formed schematic.
    #[error("malformed schematic: {0}")]
    Format(String),

    /// A section the operation depends on is missing.
    #[error("schematic structure: {0}")]
    Structure(String),

    #[error(transparent)]
    NotFound(#[from] NotFound),

    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid input: {0}")]
    InvalidInput(String),
}

/// What could not be found.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum NotFound {
    #[error("no symbol definition named '{0}' in lib_symbols")]
    Definition(String),

    #[error("library '{library}' not found (tried {} paths)", .attempted.len())]
    Library {
        library: String,
        attempted: Vec<PathBuf>,
    },

    #[error("symbol '{symbol}' not found in library '{library}' ({})", .path.display())]
    Symbol {
        library: String,
        symbol: String,
        path: PathBuf,
    },

    #[error("symbol '{symbol}' extends '{parent}', which is not in its library")]
    Parent { symbol: String, parent: String },

    #[error("no component with reference '{0}'")]
    Instance(String),

    #[error("pin '{pin}' not found on '{owner}' (available: {})", .available.join(", "))]
    Pin {
        owner: String,
        pin: String,
        available: Vec<String>,
    },
}

impl From<LibraryError> for Error {
    fn from(err: LibraryError) -> Self {
        match err {
            LibraryError::LibraryNotFound { library, attempted } => {
                NotFound::Library { library, attempted }.into()
            }
            LibraryError::SymbolNotFound {
                library,
                symbol,
                path,
            } => NotFound::Symbol {
                library,
                symbol,
                path,
            }
            .into(),
            LibraryError::MissingParent { symbol, parent } => {
                NotFound::Parent { symbol, parent }.into()
            }
            LibraryError::Io { path, source } => Error::Io { path, source },
            other => Error::Format(other.to_string()),
        }
    }
}

impl From<schem_sexpr::ParseError> for Error {
    fn from(err: schem_sexpr::ParseError) -> Self {
        Error::Format(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn library_errors_map_to_not_found() {
        let err: Error = LibraryError::LibraryNotFound {
            library: "Audio".into(),
            attempted: vec![PathBuf::from("/a/Audio.kicad_sym")],
        }
        .into();
        assert!(matches!(
            err,
            Error::NotFound(NotFound::Library { ref library, .. }) if library == "Audio"
        ));

        let err: Error = LibraryError::MissingParent {
            symbol: "R_US".into(),
            parent: "R".into(),
        }
        .into();
        assert!(matches!(
            err,
            Error::NotFound(NotFound::Parent { ref parent, .. }) if parent == "R"
        ));

        let err: Error = LibraryError::ExtendsCycle {
            symbol: "X".into(),
        }
        .into();
        assert!(matches!(err, Error::Format(_)));
    }

    #[test]
    fn pin_not_found_lists_available_pins() {
        let err = Error::from(NotFound::Pin {
            owner: "R1".into(),
            pin: "3".into(),
            available: vec!["1".into(), "2".into()],
        });
        assert_eq!(
            err.to_string(),
            "pin '3' not found on 'R1' (available: 1, 2)"
        );
    }
}
