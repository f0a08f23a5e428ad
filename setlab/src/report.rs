//! Reading and writing the text reports produced by the table generator.
//!
//! The layout is line oriented and identified by literal marker lines:
//!
//! ```text
//! # Parameters:
//! Number of cards: 12
//! Number of attributes: 4
//! Number of tables: 3
//!
//! # Number of SETs in each Table
//!
//! 0 1 3
//!
//! # Number of Tables with 0 SETs: 1/3
//!
//! # Probability of no SETs: 33.3333%
//!
//! # Average number of SETs: 1.33333
//!
//! # Tables considered
//! ...
//! ```

use std::{
    fmt,
    fs,
    path::{Path, PathBuf},
    str::FromStr,
};

use serde::{Deserialize, Serialize};

use crate::{error::Error, tables::Table};

/// Marker preceding the line with the per-table SET counts
pub const SET_COUNTS_MARKER: &str = "# Number of SETs in each Table";
/// Marker of the percentage of tables without SETs
pub const PROBABILITY_MARKER: &str = "# Probability of no SETs:";
/// Marker of the average SET count
pub const AVERAGE_MARKER: &str = "# Average number of SETs:";
/// Marker preceding the listing of all tables
pub const TABLES_MARKER: &str = "# Tables considered";

const CARDS_LABEL: &str = "Number of cards:";
const ATTRIBUTES_LABEL: &str = "Number of attributes:";
const TABLES_LABEL: &str = "Number of tables:";

/// Distance between [SET_COUNTS_MARKER] and the line holding the counts.
const SET_COUNTS_OFFSET: usize = 2;

/// Summary of one generator run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationReport {
    /// Number of SETs in each table, in generation order
    pub set_counts: Vec<u32>,
    /// Percentage of tables without any SET
    pub prob_no_sets: f64,
    /// Average number of SETs per table
    pub avg_sets: f64,
}

impl SimulationReport {
    /// Builds the summary the generator would report for the given counts.
    pub fn from_counts(set_counts: Vec<u32>) -> Self {
        let total = set_counts.len();
        let (prob_no_sets, avg_sets) = if total == 0 {
            (0.0, 0.0)
        } else {
            let zeros = set_counts.iter().filter(|&&count| count == 0).count();
            let sum: u64 = set_counts.iter().map(|&count| u64::from(count)).sum();
            (
                100.0 * zeros as f64 / total as f64,
                sum as f64 / total as f64,
            )
        };

        Self {
            set_counts,
            prob_no_sets,
            avg_sets,
        }
    }

    /// Number of tables in this run.
    pub fn num_tables(&self) -> usize {
        self.set_counts.len()
    }

    /// Fraction of tables with at least one SET, in `[0, 1]`.
    pub fn prob_at_least_one(&self) -> f64 {
        0.01 * (100.0 - self.prob_no_sets)
    }
}

/// Parameters echoed in the report header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportParameters {
    /// Cards per table
    pub num_cards: usize,
    /// Attributes per card
    pub num_attributes: usize,
    /// Number of generated tables
    pub num_tables: usize,
}

/// A fully parsed report: header and summary.
#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    /// Header parameters
    pub parameters: ReportParameters,
    /// Per-table counts and aggregates
    pub summary: SimulationReport,
}

impl Report {
    /// Parse header and summary, checking that both agree on the number of tables.
    pub fn parse(text: &str) -> Result<Self, Error> {
        let parameters = parse_parameters(text)?;
        let summary = parse_report(text)?;

        if summary.set_counts.len() != parameters.num_tables {
            return Err(Error::CountMismatch {
                expected: parameters.num_tables,
                found: summary.set_counts.len(),
            });
        }

        Ok(Self {
            parameters,
            summary,
        })
    }

    /// Read and parse the report stored at `path`.
    pub fn read<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        Self::parse(&read_text(path)?)
    }
}

/// Read a report file into memory.
pub fn read_text<P: AsRef<Path>>(path: P) -> Result<String, Error> {
    let path = path.as_ref();
    fs::read_to_string(path).map_err(|error| Error::IOReading {
        error,
        filename: path.to_path_buf(),
    })
}

/// Read the report at `path` and extract its [SimulationReport].
pub fn read_report<P: AsRef<Path>>(path: P) -> Result<SimulationReport, Error> {
    let path = path.as_ref();
    log::info!("Opening report {}", path.display());
    let report = parse_report(&read_text(path)?)?;
    log::debug!(
        "{} tables, {}% without SETs, {} SETs on average",
        report.num_tables(),
        report.prob_no_sets,
        report.avg_sets
    );
    Ok(report)
}

/// Extract SET counts, probability of no SETs and average SET count.
pub fn parse_report(text: &str) -> Result<SimulationReport, Error> {
    let lines: Vec<&str> = text.lines().collect();

    let marker = find_marker(&lines, SET_COUNTS_MARKER)?;
    let counts_index = marker + SET_COUNTS_OFFSET;
    let counts_line = lines.get(counts_index).ok_or(Error::MissingLine {
        marker: SET_COUNTS_MARKER,
        line: counts_index + 1,
    })?;
    let set_counts = parse_numbers(counts_line, counts_index)?;

    let mut prob_no_sets = None;
    let mut avg_sets = None;
    for (index, line) in lines.iter().enumerate() {
        if let Some(rest) = line.strip_prefix(PROBABILITY_MARKER) {
            let token = rest.trim().trim_end_matches('%').trim_end();
            prob_no_sets = Some(parse_number::<f64>(token, index)?);
        } else if let Some(rest) = line.strip_prefix(AVERAGE_MARKER) {
            avg_sets = Some(parse_number::<f64>(rest.trim(), index)?);
        }
    }

    Ok(SimulationReport {
        set_counts,
        prob_no_sets: prob_no_sets.ok_or(Error::MissingMarker {
            marker: PROBABILITY_MARKER,
        })?,
        avg_sets: avg_sets.ok_or(Error::MissingMarker {
            marker: AVERAGE_MARKER,
        })?,
    })
}

/// Extract the card, attribute and table counts from the header.
pub fn parse_parameters(text: &str) -> Result<ReportParameters, Error> {
    let mut num_cards = None;
    let mut num_attributes = None;
    let mut num_tables = None;

    for (index, line) in text.lines().enumerate() {
        if line.starts_with('#') && index > 0 {
            // The header ends at the first section after "# Parameters:".
            break;
        }

        let slot = if let Some(rest) = line.strip_prefix(CARDS_LABEL) {
            Some((&mut num_cards, rest))
        } else if let Some(rest) = line.strip_prefix(ATTRIBUTES_LABEL) {
            Some((&mut num_attributes, rest))
        } else if let Some(rest) = line.strip_prefix(TABLES_LABEL) {
            Some((&mut num_tables, rest))
        } else {
            None
        };

        if let Some((target, rest)) = slot {
            *target = Some(parse_number::<usize>(rest.trim(), index)?);
        }
    }

    Ok(ReportParameters {
        num_cards: num_cards.ok_or(Error::MissingMarker {
            marker: CARDS_LABEL,
        })?,
        num_attributes: num_attributes.ok_or(Error::MissingMarker {
            marker: ATTRIBUTES_LABEL,
        })?,
        num_tables: num_tables.ok_or(Error::MissingMarker {
            marker: TABLES_LABEL,
        })?,
    })
}

/// Index of the line that is exactly `marker`.
pub(crate) fn find_marker(lines: &[&str], marker: &'static str) -> Result<usize, Error> {
    lines
        .iter()
        .position(|line| line.trim_end() == marker)
        .ok_or(Error::MissingMarker { marker })
}

/// Parse a single token, reporting the zero-based `index` as a one-based line.
pub(crate) fn parse_number<T: FromStr>(token: &str, index: usize) -> Result<T, Error> {
    token.parse::<T>().map_err(|_| Error::InvalidNumber {
        token: token.to_owned(),
        line: index + 1,
    })
}

/// Parse all whitespace separated tokens of a line.
pub(crate) fn parse_numbers<T: FromStr>(line: &str, index: usize) -> Result<Vec<T>, Error> {
    line.split_whitespace()
        .map(|token| parse_number(token, index))
        .collect()
}

/// Format a float the way a C++ stream does with default settings,
/// i.e. like `%g` with six significant digits.
fn format_general(value: f64) -> String {
    if value == 0.0 || !value.is_finite() {
        return if value.is_nan() {
            "nan".to_owned()
        } else {
            format!("{value}")
        };
    }

    let exponent = value.abs().log10().floor() as i32;
    if !(-5..6).contains(&exponent) {
        let formatted = format!("{value:.5e}");
        let (mantissa, exp) = formatted.split_once('e').unwrap_or((&formatted, "0"));
        let exp: i32 = exp.parse().unwrap_or(0);
        let sign = if exp < 0 { '-' } else { '+' };
        return format!("{}e{sign}{:02}", trim_fraction(mantissa), exp.abs());
    }

    let decimals = usize::try_from(5 - exponent).unwrap_or(0);
    trim_fraction(&format!("{value:.decimals$}")).to_owned()
}

fn trim_fraction(number: &str) -> &str {
    if number.contains('.') {
        number.trim_end_matches('0').trim_end_matches('.')
    } else {
        number
    }
}

/// A report in the generator's text layout, tables optional.
struct RenderedReport<'a> {
    parameters: ReportParameters,
    set_counts: &'a [u32],
    tables: Option<&'a [Table]>,
}

impl fmt::Display for RenderedReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let summary = SimulationReport::from_counts(self.set_counts.to_vec());
        let zeros = self.set_counts.iter().filter(|&&count| count == 0).count();

        writeln!(f, "# Parameters:")?;
        writeln!(f, "{CARDS_LABEL} {}", self.parameters.num_cards)?;
        writeln!(f, "{ATTRIBUTES_LABEL} {}", self.parameters.num_attributes)?;
        writeln!(f, "{TABLES_LABEL} {}\n", self.parameters.num_tables)?;

        writeln!(f, "{SET_COUNTS_MARKER}\n")?;
        for count in self.set_counts {
            write!(f, "{count} ")?;
        }
        writeln!(f, "\n")?;

        writeln!(
            f,
            "# Number of Tables with 0 SETs: {zeros}/{}\n",
            self.set_counts.len()
        )?;
        writeln!(
            f,
            "{PROBABILITY_MARKER} {}% \n",
            format_general(summary.prob_no_sets)
        )?;
        writeln!(f, "{AVERAGE_MARKER} {}\n", format_general(summary.avg_sets))?;

        if let Some(tables) = self.tables {
            writeln!(f, "{TABLES_MARKER}\n")?;
            for table in tables {
                for card in table.cards() {
                    for value in card {
                        write!(f, "{value} ")?;
                    }
                    writeln!(f)?;
                }
                writeln!(f)?;
            }
        }
        Ok(())
    }
}

/// Renders reports in the generator's text layout.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReportWriter {
    /// Whether the `# Tables considered` section is written
    skip_tables: bool,
}

impl ReportWriter {
    /// Constructor.
    pub fn new() -> Self {
        Default::default()
    }

    /// Leave out the table listing.
    pub fn skip_tables(mut self, skip: bool) -> Self {
        self.skip_tables = skip;
        self
    }

    /// Render a report for `tables` with the given SET counts.
    ///
    /// The parameters are taken from `parameters`; the aggregates are
    /// recomputed from `set_counts`.
    pub fn render(
        &self,
        parameters: ReportParameters,
        set_counts: &[u32],
        tables: &[Table],
    ) -> String {
        RenderedReport {
            parameters,
            set_counts,
            tables: (!self.skip_tables).then_some(tables),
        }
        .to_string()
    }

    /// Render and write a report to `path`.
    pub fn write<P: AsRef<Path>>(
        &self,
        path: P,
        parameters: ReportParameters,
        set_counts: &[u32],
        tables: &[Table],
    ) -> Result<PathBuf, Error> {
        let path = path.as_ref();
        fs::write(path, self.render(parameters, set_counts, tables)).map_err(|error| {
            Error::IOWriting {
                error,
                filename: path.to_path_buf(),
            }
        })?;
        log::info!("Results saved to {}", path.display());
        Ok(path.to_path_buf())
    }
}

#[cfg(test)]
pub(crate) mod test {
    use test_log::test;

    use super::*;

    pub(crate) const SMALL_REPORT: &str = "# Parameters:
Number of cards: 2
Number of attributes: 2
Number of tables: 3

# Number of SETs in each Table

0 1 3

# Number of Tables with 0 SETs: 1/3

# Probability of no SETs: 33.33%

# Average number of SETs: 1.33

# Tables considered

0 1
1 0

1 1
0 0

-1 0
0 -1

";

    #[test]
    fn parse_summary() {
        let report = parse_report(SMALL_REPORT).unwrap();
        assert_eq!(report.set_counts, vec![0, 1, 3]);
        assert_eq!(report.prob_no_sets, 33.33);
        assert_eq!(report.avg_sets, 1.33);
    }

    #[test]
    fn parse_header() {
        let parameters = parse_parameters(SMALL_REPORT).unwrap();
        assert_eq!(
            parameters,
            ReportParameters {
                num_cards: 2,
                num_attributes: 2,
                num_tables: 3
            }
        );
        assert_eq!(Report::parse(SMALL_REPORT).unwrap().parameters, parameters);
    }

    #[test]
    fn missing_counts_marker() {
        let text = SMALL_REPORT.replace(SET_COUNTS_MARKER, "# Something else");
        assert!(matches!(
            parse_report(&text),
            Err(Error::MissingMarker {
                marker: SET_COUNTS_MARKER
            })
        ));
    }

    #[test]
    fn missing_aggregates() {
        let text = SMALL_REPORT.replace(AVERAGE_MARKER, "# Mean:");
        assert!(matches!(
            parse_report(&text),
            Err(Error::MissingMarker {
                marker: AVERAGE_MARKER
            })
        ));
    }

    #[test]
    fn truncated_after_marker() {
        let text = "# Number of SETs in each Table\n\n";
        assert!(matches!(
            parse_report(text),
            Err(Error::MissingLine { line: 3, .. })
        ));
    }

    #[test]
    fn malformed_count() {
        let text = SMALL_REPORT.replace("0 1 3\n", "0 x 3\n");
        match parse_report(&text) {
            Err(Error::InvalidNumber { token, line }) => {
                assert_eq!(token, "x");
                assert_eq!(line, 8);
            }
            other => panic!("unexpected result {other:?}"),
        }
    }

    #[test]
    fn count_mismatch() {
        let text = SMALL_REPORT.replace("Number of tables: 3", "Number of tables: 4");
        assert!(matches!(
            Report::parse(&text),
            Err(Error::CountMismatch {
                expected: 4,
                found: 3
            })
        ));
    }

    #[test]
    fn general_format() {
        assert_eq!(format_general(100.0 / 3.0), "33.3333");
        assert_eq!(format_general(4.0 / 3.0), "1.33333");
        assert_eq!(format_general(25.0), "25");
        assert_eq!(format_general(0.0), "0");
        assert_eq!(format_general(1234567.0), "1.23457e+06");
        assert_eq!(format_general(0.5), "0.5");
    }

    #[test]
    fn writer_layout_is_parseable() {
        let parameters = parse_parameters(SMALL_REPORT).unwrap();
        let tables = vec![
            Table::new(vec![vec![0, 1], vec![1, 0]]),
            Table::new(vec![vec![1, 1], vec![0, 0]]),
            Table::new(vec![vec![-1, 0], vec![0, -1]]),
        ];
        let text = ReportWriter::new().render(parameters, &[0, 1, 3], &tables);

        assert!(text.contains("# Probability of no SETs: 33.3333% \n"));
        assert!(text.contains("# Number of Tables with 0 SETs: 1/3\n"));

        let report = Report::parse(&text).unwrap();
        assert_eq!(report.summary.set_counts, vec![0, 1, 3]);
        assert_eq!(report.summary.avg_sets, 1.33333);
    }

    #[test]
    fn writer_exact_layout() {
        let parameters = parse_parameters(SMALL_REPORT).unwrap();
        let tables = vec![Table::new(vec![vec![0, -1], vec![1, 0]])];

        let summary_only = ReportWriter::new()
            .skip_tables(true)
            .render(parameters, &[0, 1, 3], &tables);
        assert_eq!(
            summary_only,
            "# Parameters:\nNumber of cards: 2\nNumber of attributes: 2\nNumber of tables: 3\n\n\
             # Number of SETs in each Table\n\n0 1 3 \n\n\
             # Number of Tables with 0 SETs: 1/3\n\n\
             # Probability of no SETs: 33.3333% \n\n\
             # Average number of SETs: 1.33333\n\n"
        );

        let full = ReportWriter::new().render(parameters, &[0, 1, 3], &tables);
        assert_eq!(
            full.strip_prefix(summary_only.as_str()),
            Some("# Tables considered\n\n0 -1 \n1 0 \n\n")
        );
    }
}
