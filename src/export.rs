//! Writing records to disk.
//!
//! JSON and XML carry full records. CSV, Excel and HTML carry one summary row
//! per record. Every format is written independently: a failure leaves the
//! files written before it in place.

use crate::errors::{self, Result};
use crate::output::TrendRecord;
use crate::summary::{self, Cell, HEADERS, SummaryRow};
use itertools::Itertools;
use log::{info, warn};
use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use rust_xlsxwriter::Workbook;
use serde_json::Value;
use std::fmt;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;

pub const DEFAULT_FORMATS: [Format; 2] = [Format::Json, Format::Csv];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Format {
    Json,
    Csv,
    Excel,
    Xml,
    Html,
}

impl Format {
    pub fn extension(&self) -> &'static str {
        match self {
            Format::Json => "json",
            Format::Csv => "csv",
            Format::Excel => "xlsx",
            Format::Xml => "xml",
            Format::Html => "html",
        }
    }

    /// Is this written from summary rows rather than full records?
    pub fn is_flat(&self) -> bool {
        matches!(self, Format::Csv | Format::Excel | Format::Html)
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Format::Json => write!(f, "JSON"),
            Format::Csv => write!(f, "CSV"),
            Format::Excel => write!(f, "Excel"),
            Format::Xml => write!(f, "XML"),
            Format::Html => write!(f, "HTML"),
        }
    }
}

impl FromStr for Format {
    type Err = errors::InvalidArgument;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(Format::Json),
            "csv" => Ok(Format::Csv),
            "excel" | "xlsx" => Ok(Format::Excel),
            "xml" => Ok(Format::Xml),
            "html" => Ok(Format::Html),
            other => Err(errors::InvalidArgument(format!(
                "unknown export format '{other}', expected json, csv, excel, xml or html"
            ))),
        }
    }
}

/// Parse a comma-separated list of formats, ignoring blanks and repeats.
pub fn parse_formats(list: &str) -> Result<Vec<Format>> {
    let mut formats = vec![];
    for name in list.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let f: Format = name.parse()?;
        if !formats.contains(&f) {
            formats.push(f);
        }
    }
    Ok(formats)
}

fn create(path: &Path) -> Result<io::BufWriter<fs::File>> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir)?;
    }
    Ok(io::BufWriter::new(fs::File::create(path)?))
}

/// Full records as a pretty-printed JSON list.
pub fn write_json(records: &[TrendRecord], path: &Path) -> Result<PathBuf> {
    let mut writer = create(path)?;
    serde_json::to_writer_pretty(&mut writer, records)?;
    writer.flush()?;
    Ok(path.to_owned())
}

fn needs_quotes(field: &str) -> bool {
    field.contains([',', '"', '\n', '\r'])
}

fn csv_field(field: &str) -> String {
    if needs_quotes(field) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_owned()
    }
}

fn write_csv_row<W: Write>(w: &mut W, row: &[String]) -> io::Result<()> {
    writeln!(w, "{}", row.iter().map(|f| csv_field(f)).join(","))
}

pub fn write_csv(rows: &[SummaryRow], path: &Path) -> Result<PathBuf> {
    let mut writer = create(path)?;
    write_csv_row(&mut writer, &HEADERS.map(str::to_owned))?;
    for row in rows {
        let cells = row.cells().iter().map(Cell::render).collect_vec();
        write_csv_row(&mut writer, &cells)?;
    }
    writer.flush()?;
    Ok(path.to_owned())
}

pub fn write_excel(rows: &[SummaryRow], path: &Path) -> Result<PathBuf> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir)?;
    }
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    for (col, header) in HEADERS.iter().enumerate() {
        sheet.write_string(0, col as u16, *header)?;
    }
    for (i, row) in rows.iter().enumerate() {
        let r = i as u32 + 1;
        for (col, cell) in row.cells().iter().enumerate() {
            let col = col as u16;
            match cell {
                Cell::Text(s) => {
                    sheet.write_string(r, col, s)?;
                }
                Cell::Number(x) => {
                    sheet.write_number(r, col, *x)?;
                }
                Cell::Blank => (),
            }
        }
    }
    workbook.save(path)?;
    Ok(path.to_owned())
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

pub fn write_html(rows: &[SummaryRow], path: &Path) -> Result<PathBuf> {
    let mut w = create(path)?;
    writeln!(w, "<table border=\"1\" class=\"dataframe\">")?;
    writeln!(w, "  <thead>")?;
    writeln!(w, "    <tr style=\"text-align: right;\">")?;
    for h in HEADERS {
        writeln!(w, "      <th>{}</th>", escape_html(h))?;
    }
    writeln!(w, "    </tr>")?;
    writeln!(w, "  </thead>")?;
    writeln!(w, "  <tbody>")?;
    for row in rows {
        writeln!(w, "    <tr>")?;
        for cell in row.cells() {
            writeln!(w, "      <td>{}</td>", escape_html(&cell.render()))?;
        }
        writeln!(w, "    </tr>")?;
    }
    writeln!(w, "  </tbody>")?;
    writeln!(w, "</table>")?;
    w.flush()?;
    Ok(path.to_owned())
}

/// Text of one top-level record field: nested values are embedded as JSON.
fn xml_text(v: &Value) -> Result<String> {
    Ok(match v {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Array(_) | Value::Object(_) => serde_json::to_string(v)?,
        other => other.to_string(),
    })
}

pub fn write_xml(records: &[TrendRecord], path: &Path) -> Result<PathBuf> {
    let mut writer = Writer::new_with_indent(create(path)?, b' ', 2);
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
    writer.write_event(Event::Start(BytesStart::new("GoogleTrendsResults")))?;
    for record in records {
        writer.write_event(Event::Start(BytesStart::new("Result")))?;
        if let Value::Object(fields) = serde_json::to_value(record)? {
            for (key, value) in &fields {
                writer.write_event(Event::Start(BytesStart::new(key.as_str())))?;
                writer.write_event(Event::Text(BytesText::new(&xml_text(value)?)))?;
                writer.write_event(Event::End(BytesEnd::new(key.as_str())))?;
            }
        }
        writer.write_event(Event::End(BytesEnd::new("Result")))?;
    }
    writer.write_event(Event::End(BytesEnd::new("GoogleTrendsResults")))?;
    writer.into_inner().flush()?;
    Ok(path.to_owned())
}

/// Write every requested format next to `base`, e.g. `base.json`, `base.csv`.
///
/// JSON comes first, then the flat formats, then XML. The flat formats are
/// skipped with a warning when there are no records to summarize.
pub fn write_all(records: &[TrendRecord], formats: &[Format], base: &Path) -> Result<Vec<PathBuf>> {
    let path = |f: Format| {
        let mut p = base.as_os_str().to_owned();
        p.push(".");
        p.push(f.extension());
        PathBuf::from(p)
    };
    let mut written = vec![];
    let mut done = |f: Format, p: PathBuf| {
        info!("wrote {f}: {}", p.display());
        written.push(p);
    };

    if formats.contains(&Format::Json) {
        done(Format::Json, write_json(records, &path(Format::Json))?);
    }
    let rows = summary::summarize(records);
    if rows.is_empty() {
        if formats.iter().any(Format::is_flat) {
            warn!("no tabular data available for CSV/Excel/HTML export");
        }
    } else {
        for &f in formats.iter().filter(|f| f.is_flat()) {
            let p = path(f);
            let p = match f {
                Format::Csv => write_csv(&rows, &p)?,
                Format::Excel => write_excel(&rows, &p)?,
                _ => write_html(&rows, &p)?,
            };
            done(f, p);
        }
    }
    if formats.contains(&Format::Xml) {
        done(Format::Xml, write_xml(records, &path(Format::Xml))?);
    }
    Ok(written)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::options::OptionSet;
    use crate::output::{RelatedQueryItem, TimelinePoint};

    fn record(input: &str) -> TrendRecord {
        TrendRecord {
            input: input.to_owned(),
            search_term: "coffee, tea".to_owned(),
            options: OptionSet::default(),
            timeline: vec![TimelinePoint {
                time: 1704585600,
                formatted_time: "Jan 07, 2024".to_owned(),
                value: vec![50, 25],
                formatted_value: vec!["50".to_owned(), "25".to_owned()],
            }],
            subregions: vec![],
            cities: vec![],
            topics_top: vec![],
            topics_rising: vec![],
            queries_top: vec![RelatedQueryItem {
                query: "coffee \"beans\"".to_owned(),
                value: 100,
                formatted_value: "100".to_owned(),
                term: "coffee".to_owned(),
            }],
            queries_rising: vec![],
        }
    }

    #[test]
    fn parse_format_list() {
        assert_eq!(
            parse_formats("json, CSV,,xlsx,json").unwrap(),
            [Format::Json, Format::Csv, Format::Excel]
        );
        assert!(parse_formats("").unwrap().is_empty());
        assert!(parse_formats("json,pdf").is_err());
    }

    #[test]
    fn csv_quoting() {
        assert_eq!(csv_field("plain"), "plain");
        assert_eq!(csv_field("a, b"), "\"a, b\"");
        assert_eq!(csv_field("say \"hi\""), "\"say \"\"hi\"\"\"");
        assert_eq!(csv_field("two\nlines"), "\"two\nlines\"");
    }

    #[test]
    fn csv_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        write_csv(&summary::summarize(&[record("coffee")]), &path).unwrap();
        let text = fs::read_to_string(&path).unwrap();
        assert_eq!(
            text,
            "input,searchTerm,geo,timeframe,avgInterest,topRelatedQuery,topRelatedQueryValue,risingRelatedQuery,risingRelatedQueryValue\n\
             coffee,\"coffee, tea\",,today 12-m,37.5,\"coffee \"\"beans\"\"\",100,,\n"
        );
    }

    #[test]
    fn html_escapes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.html");
        write_html(&summary::summarize(&[record("<b>&</b>")]), &path).unwrap();
        let text = fs::read_to_string(&path).unwrap();
        assert!(text.contains("<td>&lt;b&gt;&amp;&lt;/b&gt;</td>"));
        assert!(text.contains("<th>avgInterest</th>"));
    }

    #[test]
    fn xml_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.xml");
        write_xml(&[record("coffee")], &path).unwrap();
        let text = fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
        assert!(text.contains("<inputUrlOrTerm>coffee</inputUrlOrTerm>"));
        assert!(text.contains("<searchTerm>coffee, tea</searchTerm>"));
        assert!(text.contains("<interestBySubregion>[]</interestBySubregion>"));
        assert!(text.contains("&quot;hl&quot;:&quot;en-US&quot;"));
    }

    #[test]
    fn write_all_formats() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("nested").join("google_trends_test");
        let formats = parse_formats("xml,html,excel,csv,json").unwrap();
        let written = write_all(&[record("coffee")], &formats, &base).unwrap();
        let names = written
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect_vec();
        assert_eq!(
            names,
            [
                "google_trends_test.json",
                "google_trends_test.html",
                "google_trends_test.xlsx",
                "google_trends_test.csv",
                "google_trends_test.xml",
            ]
        );
        assert!(written.iter().all(|p| p.exists()));
    }

    #[test]
    fn write_all_skips_flat_formats_without_records() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("empty");
        let written = write_all(&[], &[Format::Json, Format::Csv, Format::Excel], &base).unwrap();
        assert_eq!(written, [dir.path().join("empty.json")]);
        assert_eq!(fs::read_to_string(&written[0]).unwrap(), "[]");
        assert!(!dir.path().join("empty.csv").exists());
    }
}
