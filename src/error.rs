// License: MIT
// Copyright © 2024 Frequenz Energy-as-a-Service GmbH

//! This module defines the `Error` struct and the `ErrorKind` enum, which are
//! used to represent errors that can occur in the library.

/// A macro for defining the `ErrorKind` enum, the `Display` implementation for
/// it, and the constructors for the `Error` struct.
macro_rules! ErrorKind {
    ($(
        ($kind:ident, $ctor:ident)
    ),*) => {
        /// The kind of error that occurred.
        #[derive(Clone, Copy, Debug, PartialEq, Eq)]
        pub enum ErrorKind {
            $(
                $kind,
            )*
        }

        impl std::fmt::Display for ErrorKind {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                match self {
                    $(
                        Self::$kind => write!(f, "{}", stringify!($kind)),
                    )*
                }
            }
        }

        /// Constructors for [`Error`].
        impl Error {
            $(
                #[doc = concat!(
                    "Creates a new [`Error`] with the `",
                    stringify!($kind),
                    "` kind and the given description."
                )]
                pub(crate) fn $ctor(desc: impl Into<String>) -> crate::Error {
                    Self {
                        kind: ErrorKind::$kind,
                        desc: desc.into(),
                    }
                }
            )*
        }
    };
}

ErrorKind!(
    (DuplicateId, duplicate_id),
    (ElementNotFound, element_not_found),
    (Internal, internal),
    (InvalidTopology, invalid_topology),
    (InvalidVariant, invalid_variant),
    (UnsupportedView, unsupported_view),
    (Validation, validation)
);

/// An error that can occur while building, mutating or querying a
/// [Network][crate::Network].
///
/// `Validation` errors reject bad input before anything is applied.
/// `DuplicateId`, `Internal` and `UnsupportedView` errors point at a bug in
/// the calling code rather than at bad data.
#[derive(Clone, Debug, PartialEq)]
pub struct Error {
    kind: ErrorKind,
    desc: String,
}

impl Error {
    /// Returns the kind of the error.
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns the human readable description of the error.
    pub fn description(&self) -> &str {
        &self.desc
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind, self.desc)
    }
}

impl std::error::Error for Error {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let err = Error::duplicate_id("The network already contains an object 'L1'");
        assert_eq!(
            err.to_string(),
            "DuplicateId: The network already contains an object 'L1'"
        );
        assert_eq!(err.kind(), ErrorKind::DuplicateId);
        assert_eq!(
            err.description(),
            "The network already contains an object 'L1'"
        );
    }
}
