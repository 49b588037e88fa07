//! URL and form construction for each report kind.

use chrono::{Datelike, NaiveDate};
use twdata_core::{HttpRequest, ReportKind, ReportRequest};
use twdata_http::FetchConfig;

/// Offset between the Gregorian and ROC calendar years.
pub const ROC_YEAR_OFFSET: i32 = 1911;

const TPEX_INSTITUTIONAL_PATH: &str = "web/stock/3insti/daily_trade/3itrade_hedge_result.php";

/// Day formatted as `YYYYMMDD`.
#[must_use]
pub fn compact_date(day: NaiveDate) -> String {
    day.format("%Y%m%d").to_string()
}

/// Day formatted as an ROC date, `YYY/MM/DD`.
#[must_use]
pub fn roc_date(day: NaiveDate) -> String {
    format!(
        "{}/{:02}/{:02}",
        day.year() - ROC_YEAR_OFFSET,
        day.month(),
        day.day()
    )
}

/// Base URLs of both exchanges.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Endpoints {
    twse: String,
    tpex: String,
}

impl Endpoints {
    /// Creates endpoints from two base URLs.
    #[must_use]
    pub fn new(twse: impl Into<String>, tpex: impl Into<String>) -> Self {
        Self {
            twse: with_trailing_slash(twse.into()),
            tpex: with_trailing_slash(tpex.into()),
        }
    }

    /// Takes the base URLs from fetch settings.
    #[must_use]
    pub fn from_config(config: &FetchConfig) -> Self {
        Self::new(&config.primary.base_url, &config.secondary.base_url)
    }

    /// Builds the HTTP request for a report request.
    #[must_use]
    pub fn request(&self, request: &ReportRequest) -> HttpRequest {
        let kind = request.kind;
        let destination = kind.destination();
        let date = compact_date(request.day);
        let filter = request.filter.as_deref();

        match kind {
            ReportKind::TwseMarginShort => HttpRequest::post(
                format!("{}exchangeReport/MI_MARGN", self.twse),
                destination,
                [
                    ("response", "csv"),
                    ("date", date.as_str()),
                    ("selectType", filter.unwrap_or("ALL")),
                ],
            ),
            ReportKind::TwseInstitutional => HttpRequest::post(
                format!("{}fund/T86", self.twse),
                destination,
                [
                    ("response", "csv"),
                    ("date", date.as_str()),
                    ("selectType", filter.unwrap_or("ALLBUT0999")),
                ],
            ),
            ReportKind::TwseAmountSummary => HttpRequest::post(
                format!("{}fund/BFI82U", self.twse),
                destination,
                [
                    ("response", "csv"),
                    ("dayDate", date.as_str()),
                    ("type", "day"),
                ],
            ),
            ReportKind::TwseForeign | ReportKind::TwseDealer | ReportKind::TwseTrust => {
                HttpRequest::post(
                    format!("{}fund/{}", self.twse, kind.code()),
                    destination,
                    [("response", "csv"), ("date", date.as_str())],
                )
            }
            ReportKind::TpexForeign | ReportKind::TpexTrust | ReportKind::TpexDealer => {
                HttpRequest::get(
                    format!(
                        "{}{}?l=zh-tw&o=csv&se={}&t=D&d={}&s=0,asc",
                        self.tpex,
                        TPEX_INSTITUTIONAL_PATH,
                        filter.unwrap_or("EW"),
                        roc_date(request.day)
                    ),
                    destination,
                )
            }
        }
    }
}

impl Default for Endpoints {
    fn default() -> Self {
        Self::from_config(&FetchConfig::default())
    }
}

fn with_trailing_slash(mut base: String) -> String {
    if !base.ends_with('/') {
        base.push('/');
    }
    base
}
