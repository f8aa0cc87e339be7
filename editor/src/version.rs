//! Target server versions.

use std::fmt;
use std::str::FromStr;

/// A `major.minor.release` server version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ServerVersion {
    pub major: u32,
    pub minor: u32,
    pub release: u32,
}

impl ServerVersion {
    pub const fn new(major: u32, minor: u32, release: u32) -> Self {
        Self {
            major,
            minor,
            release,
        }
    }

    /// Returns `true` if this version is `major.minor` or newer.
    pub fn is_at_least(&self, major: u32, minor: u32) -> bool {
        (self.major, self.minor) >= (major, minor)
    }
}

impl fmt::Display for ServerVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.release)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid server version '{0}'")]
pub struct ParseVersionError(pub String);

impl FromStr for ServerVersion {
    type Err = ParseVersionError;

    /// Parses `8`, `8.0` or `8.0.16`; missing parts are zero.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ParseVersionError(s.to_owned());
        let mut parts = s.trim().split('.');
        let mut next = |required: bool| -> Result<u32, ParseVersionError> {
            match parts.next() {
                Some(part) => part.trim().parse().map_err(|_| invalid()),
                None if required => Err(invalid()),
                None => Ok(0),
            }
        };
        let version = Self::new(next(true)?, next(false)?, next(false)?);
        if parts.next().is_some() {
            return Err(invalid());
        }
        Ok(version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_full_and_partial() {
        assert_eq!("8.0.16".parse(), Ok(ServerVersion::new(8, 0, 16)));
        assert_eq!("5.7".parse(), Ok(ServerVersion::new(5, 7, 0)));
        assert!("".parse::<ServerVersion>().is_err());
        assert!("8.x".parse::<ServerVersion>().is_err());
        assert!("1.2.3.4".parse::<ServerVersion>().is_err());
    }

    #[test]
    fn comparison() {
        let v = ServerVersion::new(8, 0, 16);
        assert!(v.is_at_least(8, 0));
        assert!(v.is_at_least(5, 7));
        assert!(!v.is_at_least(8, 1));
        assert_eq!(v.to_string(), "8.0.16");
    }
}
