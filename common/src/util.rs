//! Miscellaneous utilities.

use std::io;

/// Extensions for [`io::Result`].
pub trait IoResultExt: Sized {
    /// The success type of the result.
    type Ok;

    /// Map an [`io::ErrorKind::UnexpectedEof`] error to another error type with `fun`, converting all other errors to
    /// `E` with [`From`].
    fn map_eof<E: From<io::Error>, F: FnOnce(io::Error) -> E>(self, fun: F) -> Result<Self::Ok, E>;
}

impl<T> IoResultExt for io::Result<T> {
    type Ok = T;

    fn map_eof<E: From<io::Error>, F: FnOnce(io::Error) -> E>(self, fun: F) -> Result<T, E> {
        self.map_err(|err| match err.kind() {
            io::ErrorKind::UnexpectedEof => fun(err),
            _ => err.into(),
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[derive(Debug, PartialEq, Eq)]
    enum TestError {
        Eof,
        Other(io::ErrorKind),
    }

    impl From<io::Error> for TestError {
        fn from(err: io::Error) -> Self {
            Self::Other(err.kind())
        }
    }

    #[test]
    fn map_eof() {
        let eof: io::Result<()> = Err(io::ErrorKind::UnexpectedEof.into());
        assert_eq!(eof.map_eof(|_| TestError::Eof), Err(TestError::Eof));

        let other: io::Result<()> = Err(io::ErrorKind::PermissionDenied.into());
        assert_eq!(
            other.map_eof(|_| TestError::Eof),
            Err(TestError::Other(io::ErrorKind::PermissionDenied))
        );
    }
}
