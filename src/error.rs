//! A dedicated error for all possible failures in the DNS codec and server:
//! I/O, malformed packets, protocol errors carrying a DNS response code.
use std::fmt;
use std::io;
use std::str;

use crate::rfc1035::ResponseCode;

#[derive(Debug)]
pub enum DNSError {
    Io(io::Error),
    FromUtf8(std::string::FromUtf8Error),
    Utf8(str::Utf8Error),
    LoggerError(log::SetLoggerError),
    Db(sled::Error),
    Regex(regex::Error),
    Malformed(String),
    Protocol(DNSException),
    DNSInternalError(InternalError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InternalError {
    DnsDomainNameTooLong,
    EmptyDomainName,
    BlobTooLong,
    ExtendedRcodeWithoutOpt,
}

/// Protocol-level outcomes. Each one maps to the response code put on the
/// wire when the error surfaces in a reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DNSException {
    ServerFailure,
    FormatError,
    NoSuchDomain,
    NotImplemented,
    Refused,
    DomainExists,
    RequisiteExists,
    NoSuchRequisite,
    NotAuthorized,
    NotInZone,
    BadOPTVersion,
    BadKey,
    BadTime,
    BadMode,
    BadName,
    BadAlgorithm,
}

impl DNSException {
    pub fn code(&self) -> ResponseCode {
        match self {
            DNSException::ServerFailure => ResponseCode::ServerFailure,
            DNSException::FormatError => ResponseCode::FormatError,
            DNSException::NoSuchDomain => ResponseCode::NXDomain,
            DNSException::NotImplemented => ResponseCode::NotImplemented,
            DNSException::Refused => ResponseCode::Refused,
            DNSException::DomainExists => ResponseCode::YXDomain,
            DNSException::RequisiteExists => ResponseCode::YXRRSet,
            DNSException::NoSuchRequisite => ResponseCode::NXRRSet,
            DNSException::NotAuthorized => ResponseCode::NotAuthorized,
            DNSException::NotInZone => ResponseCode::NotInZone,
            DNSException::BadOPTVersion => ResponseCode::BadOPTVersion,
            DNSException::BadKey => ResponseCode::BadKey,
            DNSException::BadTime => ResponseCode::BadTime,
            DNSException::BadMode => ResponseCode::BadMode,
            DNSException::BadName => ResponseCode::BadName,
            DNSException::BadAlgorithm => ResponseCode::BadAlgorithm,
        }
    }
}

impl DNSError {
    // Helper function to create a new format error from a string
    pub fn malformed(s: &str) -> Self {
        DNSError::Malformed(String::from(s))
    }

    /// Response code to put on the wire when this error surfaces in a reply.
    /// Anything unclassified is a plain server failure.
    pub fn response_code(&self) -> ResponseCode {
        match self {
            DNSError::Malformed(_) => ResponseCode::FormatError,
            DNSError::Utf8(_) | DNSError::FromUtf8(_) => ResponseCode::FormatError,
            DNSError::Protocol(e) => e.code(),
            _ => ResponseCode::ServerFailure,
        }
    }
}

/// A specific custom `Result` for all functions
pub type DNSResult<T> = Result<T, DNSError>;

// All conversions from internal errors to DNSError
impl From<io::Error> for DNSError {
    fn from(err: io::Error) -> Self {
        DNSError::Io(err)
    }
}

impl From<String> for DNSError {
    fn from(err: String) -> Self {
        DNSError::Malformed(err)
    }
}

impl From<std::string::FromUtf8Error> for DNSError {
    fn from(err: std::string::FromUtf8Error) -> Self {
        DNSError::FromUtf8(err)
    }
}

impl From<str::Utf8Error> for DNSError {
    fn from(err: str::Utf8Error) -> Self {
        DNSError::Utf8(err)
    }
}

impl From<log::SetLoggerError> for DNSError {
    fn from(err: log::SetLoggerError) -> Self {
        DNSError::LoggerError(err)
    }
}

impl From<sled::Error> for DNSError {
    fn from(err: sled::Error) -> Self {
        DNSError::Db(err)
    }
}

impl From<regex::Error> for DNSError {
    fn from(err: regex::Error) -> Self {
        DNSError::Regex(err)
    }
}

impl From<DNSException> for DNSError {
    fn from(err: DNSException) -> Self {
        DNSError::Protocol(err)
    }
}

impl From<InternalError> for DNSError {
    fn from(err: InternalError) -> Self {
        DNSError::DNSInternalError(err)
    }
}

impl fmt::Display for DNSError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DNSError::Io(e) => write!(f, "i/o error: {}", e),
            DNSError::FromUtf8(e) => write!(f, "utf8 error: {}", e),
            DNSError::Utf8(e) => write!(f, "utf8 error: {}", e),
            DNSError::LoggerError(e) => write!(f, "logger error: {}", e),
            DNSError::Db(e) => write!(f, "database error: {}", e),
            DNSError::Regex(e) => write!(f, "regex error: {}", e),
            DNSError::Malformed(s) => write!(f, "malformed packet: {}", s),
            DNSError::Protocol(e) => write!(f, "dns error: {:?}", e),
            DNSError::DNSInternalError(e) => write!(f, "internal error: {:?}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exception_codes() {
        assert_eq!(DNSException::FormatError.code(), ResponseCode::FormatError);
        assert_eq!(DNSException::NoSuchDomain.code(), ResponseCode::NXDomain);
        assert_eq!(DNSException::NotInZone.code(), ResponseCode::NotInZone);
        assert_eq!(DNSException::BadAlgorithm.code(), ResponseCode::BadAlgorithm);
    }

    #[test]
    fn response_code_resolution() {
        let e = DNSError::malformed("bad label");
        assert_eq!(e.response_code(), ResponseCode::FormatError);

        let e = DNSError::from(DNSException::Refused);
        assert_eq!(e.response_code(), ResponseCode::Refused);

        let e = DNSError::from(io::Error::new(io::ErrorKind::Other, "boom"));
        assert_eq!(e.response_code(), ResponseCode::ServerFailure);
    }
}
