//! Errors shared by the decoding and encoding halves of the codec.
//!
//! Every failure other than an IO error is a [`Report`]: an error kind plus a trail of context messages, each tagged
//! with the source location that attached it. The kind is what callers branch on; the trail is what gets logged.

use std::any::type_name;
use std::fmt;
use std::fmt::{Debug, Display};
use std::io;
use std::panic::Location;
use std::result::Result as StdResult;

use derive_more::Display;

//
// public types
//

/// Error type returned by the `webpmux` crates.
#[derive(Debug, thiserror::Error)]
pub enum Error<E: ReportableError> {
    /// Reading the source or writing the sink failed.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// The data could not be decoded, or the request could not be encoded.
    #[error("Codec error: {0}")]
    Codec(#[from] Report<E>),
}

/// An error kind `E` together with the context trail explaining how it came about.
///
/// [`Display`] prints only the kind, which is safe to show to a user. [`Debug`] adds the trail, one context message
/// per line, each with the location that attached it.
#[derive(thiserror::Error)]
#[error("{error}")]
pub struct Report<E: ReportableError> {
    #[source]
    error: E,
    trail: E::Trail,
}

/// A trait for error kinds which can be carried by a [`Report`].
pub trait ReportableError: Display {
    /// How much context reports of this kind keep.
    type Trail: Trail;
}

/// Storage for the context messages attached to a [`Report`].
pub trait Trail: Display {
    #[track_caller]
    /// Start an empty trail at the caller's location.
    fn begin() -> Self;

    #[track_caller]
    /// Append a context message, tagged with the caller's location.
    fn push<P: Display + Send + Sync + 'static>(&mut self, message: P);
}

/// A [`Trail`] which keeps every context message.
pub struct DiagnosticTrail {
    origin: &'static Location<'static>,
    context: Vec<Context>,
}

/// A [`Trail`] which discards all context, for builds where report size matters more than diagnostics.
#[derive(Clone, Copy, Debug, Default, Display)]
#[display(fmt = "")]
pub struct NoTrail;

/// Which half of the codec was running when an error occurred.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Display)]
pub enum Direction {
    /// Decoding a container from a source.
    #[display(fmt = "parsing")]
    Parsing,
    /// Encoding a container to a sink.
    #[display(fmt = "writing")]
    Writing,
}

/// A context message naming what was being parsed or written.
#[derive(Clone, Copy, Debug, Display)]
#[display(fmt = "while {direction} {subject}")]
#[display(bound = "T: Display")]
pub struct WhileCoding<T> {
    direction: Direction,
    subject: T,
}

/// The name of a Rust type, as the subject of a [`WhileCoding`].
#[derive(Clone, Copy, Debug, Display)]
#[display(fmt = "value of type `{_0}`")]
pub struct TypeName(&'static str);

/// A context message indicating bytes were left over after a value was parsed.
#[derive(Clone, Copy, Debug, Display)]
#[display(fmt = "extra unparsed input")]
pub struct ExtraUnparsedInput;

/// A [`Result`](std::result::Result) whose error is a bare [`Report`], before it has been lifted into an [`Error`].
pub type Result<T, E> = StdResult<T, Report<E>>;

/// Extensions attaching context to the error of a [`Result`](std::result::Result).
///
/// Implemented both for [`Result`] and for results over [`Error`], where IO errors pass through untouched.
pub trait ResultExt: Sized {
    #[track_caller]
    /// Attach a context message to the error, if any.
    fn attach_printable<P: Display + Send + Sync + 'static>(self, printable: P) -> Self;

    #[track_caller]
    /// Attach "while parsing value of type `T`", where `T` is the success type.
    fn while_parsing_type(self) -> Self;

    #[track_caller]
    /// Attach "while parsing `subject`".
    fn while_parsing<S: Display + Send + Sync + 'static>(self, subject: S) -> Self {
        self.attach_printable(WhileCoding::parsing(subject))
    }

    #[track_caller]
    /// Attach "while writing `subject`".
    fn while_writing<S: Display + Send + Sync + 'static>(self, subject: S) -> Self {
        self.attach_printable(WhileCoding::writing(subject))
    }
}

//
// private types
//

#[derive(Display)]
#[display(fmt = "{message} at {location}")]
struct Context {
    message: Box<dyn Display + Send + Sync + 'static>,
    location: &'static Location<'static>,
}

//
// Error impls
//

impl<E: ReportableError> Error<E> {
    /// The error kind, or [`None`] for an IO error.
    pub fn kind(&self) -> Option<&E> {
        self.report().map(Report::get_ref)
    }

    /// The [`Report`] of a codec error.
    pub fn report(&self) -> Option<&Report<E>> {
        match self {
            Self::Io(_) => None,
            Self::Codec(report) => Some(report),
        }
    }

    /// Whether repeating the operation may succeed. Only IO errors are retryable; codec errors are a property of the
    /// data or of the calls made.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Io(_))
    }
}

//
// Report impls
//

impl<E: ReportableError> Report<E> {
    /// The error kind.
    pub fn get_ref(&self) -> &E {
        &self.error
    }

    /// Discard the trail, returning the error kind.
    pub fn into_inner(self) -> E {
        self.error
    }

    #[track_caller]
    /// Append a context message to the trail.
    pub fn attach_printable<P: Display + Send + Sync + 'static>(mut self, message: P) -> Self {
        self.trail.push(message);
        self
    }
}

impl<E: ReportableError> From<E> for Report<E> {
    #[track_caller]
    fn from(error: E) -> Self {
        Self { error, trail: E::Trail::begin() }
    }
}

impl<E: ReportableError> Debug for Report<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{error}{trail}", error = self.error, trail = self.trail)
    }
}

//
// DiagnosticTrail impls
//

impl Trail for DiagnosticTrail {
    #[track_caller]
    fn begin() -> Self {
        Self { origin: Location::caller(), context: Vec::new() }
    }

    #[track_caller]
    fn push<P: Display + Send + Sync + 'static>(&mut self, message: P) {
        self.context.push(Context { message: Box::new(message), location: Location::caller() });
    }
}

impl Display for DiagnosticTrail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, " at {origin}", origin = self.origin)?;
        self.context.iter().try_for_each(|context| write!(f, "\n - {context}"))
    }
}

//
// NoTrail impls
//

impl Trail for NoTrail {
    fn begin() -> Self {
        Self
    }

    fn push<P: Display + Send + Sync + 'static>(&mut self, _message: P) {}
}

//
// WhileCoding impls
//

impl<T> WhileCoding<T> {
    /// "while parsing `subject`".
    pub fn parsing(subject: T) -> Self {
        Self { direction: Direction::Parsing, subject }
    }

    /// "while writing `subject`".
    pub fn writing(subject: T) -> Self {
        Self { direction: Direction::Writing, subject }
    }

    #[allow(missing_docs)]
    pub fn direction(&self) -> Direction {
        self.direction
    }
}

//
// TypeName impls
//

impl TypeName {
    /// The name of `T`.
    pub fn of<T: ?Sized>() -> Self {
        Self(type_name::<T>())
    }
}

//
// ResultExt impls
//

impl<T, E: ReportableError> ResultExt for Result<T, E> {
    #[track_caller]
    fn attach_printable<P: Display + Send + Sync + 'static>(self, printable: P) -> Self {
        match self {
            Ok(value) => Ok(value),
            Err(report) => Err(report.attach_printable(printable)),
        }
    }

    #[track_caller]
    fn while_parsing_type(self) -> Self {
        self.while_parsing(TypeName::of::<T>())
    }
}

impl<T, E: ReportableError> ResultExt for StdResult<T, Error<E>> {
    #[track_caller]
    fn attach_printable<P: Display + Send + Sync + 'static>(self, printable: P) -> Self {
        match self {
            Err(Error::Codec(report)) => Err(Error::Codec(report.attach_printable(printable))),
            other => other,
        }
    }

    #[track_caller]
    fn while_parsing_type(self) -> Self {
        self.while_parsing(TypeName::of::<T>())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[derive(Debug, thiserror::Error)]
    #[error("bad data")]
    struct TestError;

    impl ReportableError for TestError {
        type Trail = DiagnosticTrail;
    }

    #[derive(Debug, thiserror::Error)]
    #[error("bad data")]
    struct TerseError;

    impl ReportableError for TerseError {
        type Trail = NoTrail;
    }

    #[test]
    fn display_hides_trail() {
        let report = report_attach!(TestError, "chunk 3");
        assert_eq!(report.to_string(), "bad data");
    }

    #[test]
    fn debug_lists_context_in_order() {
        let report = report_attach!(TestError, "first", WhileCoding::writing("`VP8X` chunk"));
        let debug = format!("{report:?}");
        assert!(debug.starts_with("bad data at "), "{debug}");
        let first = debug.find(" - first at ").unwrap();
        let second = debug.find(" - while writing `VP8X` chunk at ").unwrap();
        assert!(first < second, "{debug}");
    }

    #[test]
    fn no_trail() {
        let report = report_attach!(TerseError, "dropped");
        assert_eq!(format!("{report:?}"), "bad data");
    }

    #[test]
    fn while_parsing_type() {
        let result: Result<u16, TestError> = Err(TestError.into());
        let debug = format!("{:?}", result.while_parsing_type().unwrap_err());
        assert!(debug.contains("while parsing value of type `u16`"), "{debug}");
    }

    #[test]
    fn error_kind() {
        let error = Error::from(report_attach!(TestError));
        assert!(matches!(error.kind(), Some(TestError)));
        assert!(!error.is_retryable());

        let error = Error::<TestError>::from(io::Error::from(io::ErrorKind::WriteZero));
        assert!(error.kind().is_none());
        assert!(error.report().is_none());
        assert!(error.is_retryable());
    }

    #[test]
    fn io_errors_pass_through() {
        let result: StdResult<(), Error<TestError>> = Err(io::Error::from(io::ErrorKind::BrokenPipe).into());
        let error = result.while_writing("`RIFF` chunk").unwrap_err();
        assert!(matches!(error, Error::Io(ref io) if io.kind() == io::ErrorKind::BrokenPipe));

        let result: StdResult<(), Error<TestError>> = Err(report_attach!(TestError).into());
        let error = result.while_writing("`RIFF` chunk").unwrap_err();
        assert!(format!("{error:?}").contains("while writing `RIFF` chunk"));
    }
}
