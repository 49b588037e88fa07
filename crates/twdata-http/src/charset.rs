//! Response charset normalization.
//!
//! The exchanges serve their CSV reports in Big5 (MS950). Everything past the
//! fetcher works on UTF-8.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use twdata_core::DataError;

/// Charset a destination serves its responses in.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Charset {
    /// Already UTF-8.
    Utf8,
    /// Big5 / MS950.
    #[default]
    Big5,
}

impl Charset {
    fn encoding(self) -> &'static encoding_rs::Encoding {
        match self {
            Self::Utf8 => encoding_rs::UTF_8,
            Self::Big5 => encoding_rs::BIG5,
        }
    }

    /// Converts a response body to UTF-8.
    ///
    /// A leading byte order mark is honored and removed. Malformed sequences
    /// become U+FFFD.
    #[must_use]
    pub fn to_utf8(self, body: &[u8]) -> String {
        let (text, _, _) = self.encoding().decode(body);
        text.into_owned()
    }
}

impl fmt::Display for Charset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Utf8 => write!(f, "utf8"),
            Self::Big5 => write!(f, "big5"),
        }
    }
}

impl FromStr for Charset {
    type Err = DataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace(['-', '_'], "").as_str() {
            "utf8" => Ok(Self::Utf8),
            "big5" | "ms950" | "cp950" => Ok(Self::Big5),
            other => Err(DataError::InvalidParameter(format!(
                "unsupported charset: {other}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_big5_to_utf8() {
        let (big5, _, _) = encoding_rs::BIG5.encode("證券代號,證券名稱");
        assert_eq!(Charset::Big5.to_utf8(&big5), "證券代號,證券名稱");
    }

    #[test]
    fn test_utf8_strips_bom() {
        let body = b"\xEF\xBB\xBFcode,name";
        assert_eq!(Charset::Utf8.to_utf8(body), "code,name");
    }

    #[test]
    fn test_parse_labels() {
        assert_eq!("BIG5".parse::<Charset>().unwrap(), Charset::Big5);
        assert_eq!("ms950".parse::<Charset>().unwrap(), Charset::Big5);
        assert_eq!("utf-8".parse::<Charset>().unwrap(), Charset::Utf8);
        assert!("latin1".parse::<Charset>().is_err());
    }
}
