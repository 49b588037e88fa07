//! Report kinds, report requests and the HTTP requests derived from them.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The two exchanges reports are fetched from.
///
/// Each destination is paced independently by the rate limiter.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Destination {
    /// Taiwan Stock Exchange.
    Primary,
    /// Taipei Exchange.
    Secondary,
}

impl Destination {
    /// Both destinations.
    pub const ALL: [Self; 2] = [Self::Primary, Self::Secondary];
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Primary => write!(f, "twse"),
            Self::Secondary => write!(f, "tpex"),
        }
    }
}

/// A published daily report.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ReportKind {
    /// TWSE margin trading and short selling balances (MI_MARGN).
    TwseMarginShort,
    /// TWSE foreign investor trading (TWT38U).
    TwseForeign,
    /// TWSE dealer trading (TWT43U).
    TwseDealer,
    /// TWSE investment trust trading (TWT44U).
    TwseTrust,
    /// TWSE three major institutional investors (T86).
    TwseInstitutional,
    /// TWSE institutional trading value by investor type (BFI82U).
    TwseAmountSummary,
    /// TPEx foreign investor trading.
    TpexForeign,
    /// TPEx investment trust trading.
    TpexTrust,
    /// TPEx dealer trading.
    TpexDealer,
}

impl ReportKind {
    /// Every supported kind.
    pub const ALL: [Self; 9] = [
        Self::TwseMarginShort,
        Self::TwseForeign,
        Self::TwseDealer,
        Self::TwseTrust,
        Self::TwseInstitutional,
        Self::TwseAmountSummary,
        Self::TpexForeign,
        Self::TpexTrust,
        Self::TpexDealer,
    ];

    /// Short report code used by the exchange.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::TwseMarginShort => "MI_MARGN",
            Self::TwseForeign => "TWT38U",
            Self::TwseDealer => "TWT43U",
            Self::TwseTrust => "TWT44U",
            Self::TwseInstitutional => "T86",
            Self::TwseAmountSummary => "BFI82U",
            Self::TpexForeign => "TPEX_FOREIGN",
            Self::TpexTrust => "TPEX_TRUST",
            Self::TpexDealer => "TPEX_DEALER",
        }
    }

    /// Exchange publishing this report.
    #[must_use]
    pub const fn destination(self) -> Destination {
        match self {
            Self::TpexForeign | Self::TpexTrust | Self::TpexDealer => Destination::Secondary,
            _ => Destination::Primary,
        }
    }
}

impl fmt::Display for ReportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// A request for one report on one day.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReportRequest {
    /// Report kind.
    pub kind: ReportKind,
    /// Calendar day in exchange-local time.
    pub day: NaiveDate,
    /// Category filter passed to the exchange. `None` uses the kind's default.
    pub filter: Option<String>,
}

impl ReportRequest {
    /// Creates a request with the default category filter.
    #[must_use]
    pub const fn new(kind: ReportKind, day: NaiveDate) -> Self {
        Self {
            kind,
            day,
            filter: None,
        }
    }

    /// Sets the category filter.
    #[must_use]
    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    /// Same request for a different day.
    #[must_use]
    pub fn on(&self, day: NaiveDate) -> Self {
        Self {
            kind: self.kind,
            day,
            filter: self.filter.clone(),
        }
    }
}

/// The outbound HTTP form of a [`ReportRequest`].
///
/// Requests without a form are sent as `GET`, requests with a form as a
/// URL-encoded `POST`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HttpRequest {
    /// Full request URL.
    pub url: String,
    /// Form fields for a `POST`, in submission order.
    pub form: Option<Vec<(String, String)>>,
    /// Exchange the request goes to.
    pub destination: Destination,
}

impl HttpRequest {
    /// Creates a `GET` request.
    #[must_use]
    pub fn get(url: impl Into<String>, destination: Destination) -> Self {
        Self {
            url: url.into(),
            form: None,
            destination,
        }
    }

    /// Creates a form `POST` request.
    #[must_use]
    pub fn post<K, V>(
        url: impl Into<String>,
        destination: Destination,
        form: impl IntoIterator<Item = (K, V)>,
    ) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            url: url.into(),
            form: Some(
                form.into_iter()
                    .map(|(k, v)| (k.into(), v.into()))
                    .collect(),
            ),
            destination,
        }
    }

    /// URL-encoded form body, if any.
    #[must_use]
    pub fn encoded_body(&self) -> Option<String> {
        self.form.as_ref().map(|fields| {
            url::form_urlencoded::Serializer::new(String::new())
                .extend_pairs(fields.iter())
                .finish()
        })
    }
}
