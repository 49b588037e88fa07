//! Table decoder for exchange CSV reports.
//!
//! Every report kind is the same shape: some preamble lines, a header row,
//! data rows, and some footnote lines. A [`TableDescriptor`] pins down the
//! kind-specific parts of that shape and [`decode`] does the rest.
//!
//! Input is split on `\n`, so a trailing newline yields one final empty
//! line. The line offsets below count that line, matching how the exchanges
//! terminate their files.
//!
//! Numeric cells have thousands separators removed before parsing. A cell
//! that is missing or does not parse reads as zero: downstream checks treat
//! zero as "no signal", so one garbled cell never discards a whole row.

use chrono::NaiveDate;
use tracing::{debug, instrument};
use twdata_core::{BuySellVolume, DataError, Record, Report, ReportKind, Result, VolumeField};

/// How a field's total is obtained.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TotalRule {
    /// Read from a transmitted column.
    Column(usize),
    /// Buy minus sell.
    BuyMinusSell,
    /// Sell minus buy.
    SellMinusBuy,
}

/// Column positions of one buy/sell group.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FieldSpec {
    /// Field the columns populate.
    pub field: VolumeField,
    /// Buy column.
    pub buy: usize,
    /// Sell column.
    pub sell: usize,
    /// Total column or derivation.
    pub total: TotalRule,
}

impl FieldSpec {
    const fn new(field: VolumeField, buy: usize, sell: usize, total: TotalRule) -> Self {
        Self {
            field,
            buy,
            sell,
            total,
        }
    }
}

/// Layout of one report kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TableDescriptor {
    /// Fewer lines than this means the day has no report.
    pub min_lines: usize,
    /// Leading lines dropped before the header row.
    pub head_skip: usize,
    /// Trailing lines dropped.
    pub tail_skip: usize,
    /// Expected header labels by column, compared with spaces removed.
    pub header: &'static [(usize, &'static str)],
    /// Security code column.
    pub code_column: usize,
    /// Display name column.
    pub name_column: usize,
    /// Buy/sell groups.
    pub fields: &'static [FieldSpec],
    /// Net difference column, if the report carries one.
    pub net_column: Option<usize>,
    /// Data rows read after the header; the rest is ignored.
    pub max_rows: Option<usize>,
}

impl TableDescriptor {
    /// Rows with fewer cells than this are skipped.
    #[must_use]
    pub fn min_columns(&self) -> usize {
        let field_max = self.fields.iter().map(|f| {
            let total = match f.total {
                TotalRule::Column(c) => c,
                _ => 0,
            };
            f.buy.max(f.sell).max(total)
        });
        field_max
            .chain([self.code_column, self.name_column])
            .chain(self.net_column)
            .max()
            .unwrap_or(0)
            + 1
    }
}

use TotalRule::{BuyMinusSell, Column, SellMinusBuy};
use VolumeField::{Amount, Dealer, DealerHedge, DealerSelf, Foreign, Margin, Short, Trust};

const MARGIN_SHORT: TableDescriptor = TableDescriptor {
    min_lines: 14,
    head_skip: 7,
    tail_skip: 8,
    header: &[
        (0, "股票代號"),
        (1, "股票名稱"),
        (2, "買進"),
        (3, "賣出"),
        (8, "買進"),
        (9, "賣出"),
    ],
    code_column: 0,
    name_column: 1,
    fields: &[
        FieldSpec::new(Margin, 2, 3, BuyMinusSell),
        FieldSpec::new(Short, 8, 9, SellMinusBuy),
    ],
    net_column: None,
    max_rows: None,
};

const TWSE_FOREIGN: TableDescriptor = TableDescriptor {
    min_lines: 9,
    head_skip: 3,
    tail_skip: 9,
    header: &[(1, "證券代號"), (2, "證券名稱")],
    code_column: 1,
    name_column: 2,
    fields: &[FieldSpec::new(Foreign, 3, 4, Column(5))],
    net_column: None,
    max_rows: None,
};

const TWSE_DEALER: TableDescriptor = TableDescriptor {
    min_lines: 5,
    head_skip: 3,
    tail_skip: 5,
    header: &[(0, "證券代號"), (1, "證券名稱")],
    code_column: 0,
    name_column: 1,
    fields: &[
        FieldSpec::new(DealerSelf, 2, 3, Column(4)),
        FieldSpec::new(DealerHedge, 5, 6, Column(7)),
        FieldSpec::new(Dealer, 8, 9, Column(10)),
    ],
    net_column: None,
    max_rows: None,
};

const TWSE_TRUST: TableDescriptor = TableDescriptor {
    min_lines: 9,
    head_skip: 2,
    tail_skip: 9,
    header: &[(1, "證券代號"), (2, "證券名稱")],
    code_column: 1,
    name_column: 2,
    fields: &[FieldSpec::new(Trust, 3, 4, Column(5))],
    net_column: None,
    max_rows: None,
};

const TWSE_INSTITUTIONAL: TableDescriptor = TableDescriptor {
    min_lines: 12,
    head_skip: 3,
    tail_skip: 8,
    header: &[(0, "證券代號"), (1, "證券名稱")],
    code_column: 0,
    name_column: 1,
    fields: &[
        FieldSpec::new(Foreign, 2, 3, BuyMinusSell),
        FieldSpec::new(Trust, 4, 5, BuyMinusSell),
        FieldSpec::new(DealerSelf, 6, 7, BuyMinusSell),
        FieldSpec::new(DealerHedge, 8, 9, BuyMinusSell),
    ],
    net_column: Some(10),
    max_rows: None,
};

/// Keyed by investor type rather than security code. Only the five
/// investor rows are kept; the grand total and notes follow them.
const AMOUNT_SUMMARY: TableDescriptor = TableDescriptor {
    min_lines: 7,
    head_skip: 1,
    tail_skip: 0,
    header: &[
        (0, "單位名稱"),
        (1, "買進金額"),
        (2, "賣出金額"),
        (3, "買賣差額"),
    ],
    code_column: 0,
    name_column: 0,
    fields: &[FieldSpec::new(Amount, 1, 2, Column(3))],
    net_column: None,
    max_rows: Some(5),
};

const TPEX_FOREIGN: TableDescriptor = TableDescriptor {
    min_lines: 3,
    head_skip: 1,
    tail_skip: 0,
    header: &[
        (0, "代號"),
        (1, "名稱"),
        (8, "外資及陸資-買進股數"),
        (9, "外資及陸資-賣出股數"),
        (10, "外資及陸資-買賣超股數"),
        (23, "三大法人買賣超股數合計"),
    ],
    code_column: 0,
    name_column: 1,
    fields: &[FieldSpec::new(Foreign, 8, 9, Column(10))],
    net_column: None,
    max_rows: None,
};

const TPEX_TRUST: TableDescriptor = TableDescriptor {
    min_lines: 3,
    head_skip: 1,
    tail_skip: 0,
    header: &[
        (0, "代號"),
        (1, "名稱"),
        (11, "投信-買進股數"),
        (12, "投信-賣出股數"),
        (13, "投信-買賣超股數"),
        (23, "三大法人買賣超股數合計"),
    ],
    code_column: 0,
    name_column: 1,
    fields: &[FieldSpec::new(Trust, 11, 12, Column(13))],
    net_column: None,
    max_rows: None,
};

const TPEX_DEALER: TableDescriptor = TableDescriptor {
    min_lines: 3,
    head_skip: 1,
    tail_skip: 0,
    header: &[
        (0, "代號"),
        (1, "名稱"),
        (20, "自營商-買進股數"),
        (21, "自營商-賣出股數"),
        (22, "自營商-買賣超股數"),
        (23, "三大法人買賣超股數合計"),
    ],
    code_column: 0,
    name_column: 1,
    fields: &[FieldSpec::new(Dealer, 20, 21, Column(22))],
    net_column: None,
    max_rows: None,
};

/// Layout for a report kind.
#[must_use]
pub const fn descriptor(kind: ReportKind) -> &'static TableDescriptor {
    match kind {
        ReportKind::TwseMarginShort => &MARGIN_SHORT,
        ReportKind::TwseForeign => &TWSE_FOREIGN,
        ReportKind::TwseDealer => &TWSE_DEALER,
        ReportKind::TwseTrust => &TWSE_TRUST,
        ReportKind::TwseInstitutional => &TWSE_INSTITUTIONAL,
        ReportKind::TwseAmountSummary => &AMOUNT_SUMMARY,
        ReportKind::TpexForeign => &TPEX_FOREIGN,
        ReportKind::TpexTrust => &TPEX_TRUST,
        ReportKind::TpexDealer => &TPEX_DEALER,
    }
}

fn strip_spaces(cell: &str) -> String {
    cell.chars().filter(|c| !c.is_whitespace()).collect()
}

fn number(row: &csv::StringRecord, column: usize) -> i64 {
    row.get(column)
        .map(|cell| cell.trim().replace(',', ""))
        .and_then(|cell| cell.parse().ok())
        .unwrap_or(0)
}

fn check_header(kind: ReportKind, desc: &TableDescriptor, row: &csv::StringRecord) -> Result<()> {
    for &(column, label) in desc.header {
        let found = row.get(column).map(strip_spaces);
        if found.as_deref() != Some(label) {
            return Err(DataError::FormatMismatch {
                kind,
                reason: format!(
                    "expected header {label:?} in column {column}, found {:?}",
                    found.unwrap_or_default()
                ),
            });
        }
    }
    Ok(())
}

fn parse_row(desc: &TableDescriptor, row: &csv::StringRecord) -> Option<Record> {
    if row.len() < desc.min_columns() {
        return None;
    }
    let code = strip_spaces(row.get(desc.code_column)?);
    if code.is_empty() {
        return None;
    }
    let name = strip_spaces(row.get(desc.name_column)?);

    let mut record = Record::new(code, name);
    for spec in desc.fields {
        let buy = number(row, spec.buy);
        let sell = number(row, spec.sell);
        let total = match spec.total {
            Column(c) => number(row, c),
            BuyMinusSell => buy - sell,
            SellMinusBuy => sell - buy,
        };
        record = record.with_volume(spec.field, BuySellVolume::new(buy, sell, total));
    }
    record.net = desc.net_column.map(|c| number(row, c));
    Some(record)
}

/// Decodes a raw report body for a kind and day.
///
/// # Errors
/// - [`DataError::NoDataForDay`] when the body has fewer lines than the
///   kind's minimum, or nothing is left once preamble and footnotes are
///   dropped.
/// - [`DataError::FormatMismatch`] when the header row does not carry the
///   expected labels or the CSV is malformed.
#[instrument(skip(raw), fields(kind = %kind, day = %day, bytes = raw.len()))]
pub fn decode(kind: ReportKind, day: NaiveDate, raw: &[u8]) -> Result<Report> {
    let desc = descriptor(kind);
    let text = String::from_utf8_lossy(raw);
    let lines: Vec<&str> = text.split('\n').collect();
    if lines.len() < desc.min_lines {
        debug!(lines = lines.len(), "Report too short");
        return Err(DataError::NoDataForDay { kind, day });
    }

    let end = lines.len().saturating_sub(desc.tail_skip);
    let body: Vec<String> = lines
        .get(desc.head_skip..end)
        .unwrap_or_default()
        .iter()
        .map(|line| line.trim_end_matches('\r').replace('=', ""))
        .filter(|line| !line.trim().is_empty())
        .collect();
    if body.is_empty() {
        debug!("No table rows after trimming");
        return Err(DataError::NoDataForDay { kind, day });
    }

    let joined = body.join("\n");
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(joined.as_bytes());
    let mut rows = reader.records();

    let mismatch = |e: csv::Error| DataError::FormatMismatch {
        kind,
        reason: e.to_string(),
    };

    let header = match rows.next() {
        Some(row) => row.map_err(mismatch)?,
        None => return Err(DataError::NoDataForDay { kind, day }),
    };
    check_header(kind, desc, &header)?;

    let mut report = Report::new(kind, day);
    for row in rows.take(desc.max_rows.unwrap_or(usize::MAX)) {
        let row = row.map_err(mismatch)?;
        if let Some(record) = parse_row(desc, &row) {
            report.insert(record);
        }
    }

    debug!(records = report.len(), "Decoded report");
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 5).unwrap()
    }

    /// Lays out a body as the exchange does: preamble, rows, footnotes, and a
    /// trailing newline.
    fn body(head: usize, rows: &[&str], tail: usize) -> Vec<u8> {
        let mut lines: Vec<String> = (0..head).map(|i| format!("\"preamble {i}\"")).collect();
        lines.extend(rows.iter().map(|r| (*r).to_string()));
        // The trailing newline supplies the last tail line.
        lines.extend((0..tail.saturating_sub(1)).map(|i| format!("\"note {i}\"")));
        let mut text = lines.join("\n");
        text.push('\n');
        text.into_bytes()
    }

    const MARGIN_HEADER: &str =
        "股票 代號,股票名稱,買進,賣出,現金償還,前日餘額,今日餘額,限額,買進,賣出,現券償還,前日餘額,今日餘額,限額,資券互抵,註記";

    #[test]
    fn test_margin_short_totals() {
        let raw = body(
            7,
            &[
                MARGIN_HEADER,
                "=\"2330\",\"台積電  \",\"1,200\",\"200\",\"0\",\"0\",\"0\",\"0\",\"30\",\"50\",\"0\",\"0\",\"0\",\"0\",\"0\",\"\"",
                "=\"2317\",\"鴻海\",\"100\",\"400\",\"0\",\"0\",\"0\",\"0\",\"5\",\"1\",\"0\",\"0\",\"0\",\"0\",\"0\",\"\"",
            ],
            8,
        );
        let report = decode(ReportKind::TwseMarginShort, day(), &raw).unwrap();

        assert_eq!(report.len(), 2);
        let tsmc = report.get("2330").unwrap();
        assert_eq!(tsmc.name, "台積電");
        assert_eq!(
            tsmc.volume(VolumeField::Margin),
            Some(BuySellVolume::new(1200, 200, 1000))
        );
        assert_eq!(
            tsmc.volume(VolumeField::Short),
            Some(BuySellVolume::new(30, 50, 20))
        );
        assert_eq!(report.total_for("2317", VolumeField::Margin), -300);
        assert_eq!(report.total_for("2317", VolumeField::Short), -4);
    }

    #[test]
    fn test_short_body_is_no_data() {
        let raw = "\"查詢日期無資料\"\n".as_bytes();
        let err = decode(ReportKind::TwseMarginShort, day(), raw).unwrap_err();
        assert!(matches!(
            err,
            DataError::NoDataForDay {
                kind: ReportKind::TwseMarginShort,
                ..
            }
        ));

        assert!(decode(ReportKind::TpexForeign, day(), b"").unwrap_err().is_no_data());
    }

    #[test]
    fn test_header_mismatch() {
        let raw = body(
            3,
            &[
                "\"\",\"代號\",\"名稱\",\"買進股數\",\"賣出股數\",\"買賣超股數\"",
                "\" \",\"2330\",\"台積電\",\"10\",\"5\",\"5\"",
            ],
            9,
        );
        let err = decode(ReportKind::TwseForeign, day(), &raw).unwrap_err();
        match err {
            DataError::FormatMismatch { kind, reason } => {
                assert_eq!(kind, ReportKind::TwseForeign);
                assert!(reason.contains("證券代號"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_foreign_transmitted_total_and_garbled_cells() {
        let raw = body(
            3,
            &[
                "\"\",\"證券代號\",\"證券名稱\",\"買進股數\",\"賣出股數\",\"買賣超股數\"",
                "\" \",\"2330\",\"台積電\",\"12,000\",\"2,000\",\"9,999\"",
                "\" \",\"2317\",\"鴻海\",\"--\",\"300\",\"x\"",
                "\" \",\"\",\"合計\",\"1\",\"1\",\"0\"",
                "\"short row\"",
            ],
            9,
        );
        let report = decode(ReportKind::TwseForeign, day(), &raw).unwrap();
        assert_eq!(report.len(), 2);
        // Total comes from its own column, not buy - sell.
        assert_eq!(report.total_for("2330", VolumeField::Foreign), 9999);
        assert_eq!(
            report.get("2317").unwrap().volume(VolumeField::Foreign),
            Some(BuySellVolume::new(0, 300, 0))
        );
    }

    #[test]
    fn test_trust_layout() {
        let raw = body(
            2,
            &[
                "\"\",\"證券代號\",\"證券名稱\",\"買進股數\",\"賣出股數\",\"買賣超股數\"",
                "\" \",\"0050\",\"元大台灣50\",\"500\",\"100\",\"400\"",
            ],
            9,
        );
        let report = decode(ReportKind::TwseTrust, day(), &raw).unwrap();
        assert_eq!(report.total_for("0050", VolumeField::Trust), 400);
    }

    #[test]
    fn test_dealer_groups() {
        let raw = body(
            3,
            &[
                "\"證券代號\",\"證券名稱\",\"自買\",\"自賣\",\"自超\",\"避買\",\"避賣\",\"避超\",\"買\",\"賣\",\"超\"",
                "\"2330\",\"台積電\",\"10\",\"4\",\"6\",\"7\",\"9\",\"-2\",\"17\",\"13\",\"4\"",
            ],
            5,
        );
        let report = decode(ReportKind::TwseDealer, day(), &raw).unwrap();
        let r = report.get("2330").unwrap();
        assert_eq!(r.total(VolumeField::DealerSelf), 6);
        assert_eq!(r.total(VolumeField::DealerHedge), -2);
        assert_eq!(r.volume(VolumeField::Dealer), Some(BuySellVolume::new(17, 13, 4)));
    }

    #[test]
    fn test_institutional_derived_totals_and_net() {
        let raw = body(
            3,
            &[
                "\"證券代號\",\"證券名稱\",\"外資買\",\"外資賣\",\"投信買\",\"投信賣\",\"自營買\",\"自營賣\",\"避險買\",\"避險賣\",\"三大法人買賣超股數\"",
                "\"2330\",\"台積電\",\"1,000\",\"400\",\"50\",\"80\",\"3\",\"1\",\"0\",\"2\",\"570\"",
            ],
            8,
        );
        let report = decode(ReportKind::TwseInstitutional, day(), &raw).unwrap();
        let r = report.get("2330").unwrap();
        assert_eq!(r.total(VolumeField::Foreign), 600);
        assert_eq!(r.total(VolumeField::Trust), -30);
        assert_eq!(r.total(VolumeField::DealerSelf), 2);
        assert_eq!(r.total(VolumeField::DealerHedge), -2);
        assert_eq!(r.net, Some(570));
    }

    fn tpex_header() -> String {
        let mut cells: Vec<String> = (0..24).map(|i| format!("c{i}")).collect();
        cells[0] = "代號".into();
        cells[1] = "名稱".into();
        cells[8] = "外資及陸資-買進股數".into();
        cells[9] = "外資及陸資-賣出股數".into();
        cells[10] = "外資及陸資-買賣超股數".into();
        cells[11] = "投信-買進股數".into();
        cells[12] = "投信-賣出股數".into();
        cells[13] = "投信-買賣超股數".into();
        cells[20] = "自營商-買進股數".into();
        cells[21] = "自營商-賣出股數".into();
        cells[22] = "自營商-買賣超股數".into();
        cells[23] = "三大法人買賣超股數合計".into();
        cells.join(",")
    }

    fn tpex_row(code: &str) -> String {
        let mut cells: Vec<String> = (0..24).map(|i| i.to_string()).collect();
        cells[0] = code.into();
        cells[1] = "元太".into();
        cells[10] = "\"1,010\"".into();
        cells.join(",")
    }

    #[test]
    fn test_amount_summary_keeps_investor_rows() {
        let raw = body(
            1,
            &[
                "單位名稱,買進金額,賣出金額,買賣差額",
                "自營商(自行買賣),\"1,000\",\"400\",\"600\"",
                "自營商(避險),\"2,000\",\"2,500\",\"-500\"",
                "投信,\"300\",\"100\",\"200\"",
                "外資及陸資(不含外資自營商),\"9,000\",\"8,000\",\"1,000\"",
                "外資自營商,\"0\",\"0\",\"0\"",
                "合計,\"12,300\",\"11,000\",\"1,300\"",
                "\"說明：\"",
            ],
            1,
        );
        let report = decode(ReportKind::TwseAmountSummary, day(), &raw).unwrap();

        assert_eq!(report.len(), 5);
        assert!(report.get("合計").is_none());
        assert_eq!(
            report.get("自營商(避險)").unwrap().volume(VolumeField::Amount),
            Some(BuySellVolume::new(2000, 2500, -500))
        );
        assert_eq!(
            report.total_for("外資及陸資(不含外資自營商)", VolumeField::Amount),
            1000
        );
    }

    #[test]
    fn test_amount_summary_short_body_is_no_data() {
        let raw = body(1, &["單位名稱,買進金額,賣出金額,買賣差額"], 1);
        assert!(
            decode(ReportKind::TwseAmountSummary, day(), &raw)
                .unwrap_err()
                .is_no_data()
        );
    }

    #[test]
    fn test_tpex_kinds_share_body() {
        let header = tpex_header();
        let row = tpex_row("8069");
        let raw = body(1, &[&header, &row], 0);

        let foreign = decode(ReportKind::TpexForeign, day(), &raw).unwrap();
        assert_eq!(
            foreign.get("8069").unwrap().volume(VolumeField::Foreign),
            Some(BuySellVolume::new(8, 9, 1010))
        );

        let trust = decode(ReportKind::TpexTrust, day(), &raw).unwrap();
        assert_eq!(
            trust.get("8069").unwrap().volume(VolumeField::Trust),
            Some(BuySellVolume::new(11, 12, 13))
        );

        let dealer = decode(ReportKind::TpexDealer, day(), &raw).unwrap();
        assert_eq!(dealer.total_for("8069", VolumeField::Dealer), 22);
    }

    #[test]
    fn test_min_columns() {
        assert_eq!(descriptor(ReportKind::TwseMarginShort).min_columns(), 10);
        assert_eq!(descriptor(ReportKind::TwseForeign).min_columns(), 6);
        assert_eq!(descriptor(ReportKind::TwseInstitutional).min_columns(), 11);
        assert_eq!(descriptor(ReportKind::TpexForeign).min_columns(), 11);
    }
}
