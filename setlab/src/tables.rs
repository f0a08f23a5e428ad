//! Reconstruction of the attribute matrices listed at the end of a report.

use std::{fmt, path::Path};

use crate::{
    error::Error,
    report::{self, find_marker, parse_numbers, ReportParameters, TABLES_MARKER},
};

/// Dimensions of a collection of tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Shape {
    /// Number of tables
    pub tables: usize,
    /// Cards per table
    pub cards: usize,
    /// Attributes per card
    pub attributes: usize,
}

impl Shape {
    /// Constructor.
    pub fn new(tables: usize, cards: usize, attributes: usize) -> Self {
        Self {
            tables,
            cards,
            attributes,
        }
    }
}

impl From<ReportParameters> for Shape {
    fn from(parameters: ReportParameters) -> Self {
        Self::new(
            parameters.num_tables,
            parameters.num_cards,
            parameters.num_attributes,
        )
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.tables, self.cards, self.attributes)
    }
}

/// One table: an ordered list of cards, each an ordered list of attribute values.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Table {
    cards: Vec<Vec<i32>>,
}

impl Table {
    /// Create a table from its rows.
    pub fn new(cards: Vec<Vec<i32>>) -> Self {
        Self { cards }
    }

    /// The rows of this table.
    pub fn cards(&self) -> &[Vec<i32>] {
        &self.cards
    }

    /// Number of cards.
    pub fn num_cards(&self) -> usize {
        self.cards.len()
    }

    /// Number of attributes of the first card, 0 for an empty table.
    pub fn num_attributes(&self) -> usize {
        self.cards.first().map_or(0, Vec::len)
    }

    /// Row-major attribute values.
    pub fn values(&self) -> impl Iterator<Item = i32> + '_ {
        self.cards.iter().flatten().copied()
    }

    /// A new table with the rows taken in the order given by `order`.
    pub fn permuted(&self, order: &[usize]) -> Self {
        Self {
            cards: order.iter().map(|&row| self.cards[row].clone()).collect(),
        }
    }
}

/// Reconstruct all tables of a report and validate them against `expected`.
pub fn reconstruct_tables(text: &str, expected: Shape) -> Result<Vec<Table>, Error> {
    let lines: Vec<&str> = text.lines().collect();
    let marker = find_marker(&lines, TABLES_MARKER)?;

    let mut rows = Vec::new();
    for (offset, line) in lines[marker + 1..].iter().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        rows.push(parse_numbers::<i32>(line, marker + 1 + offset)?);
    }

    // A zero card count cannot be chunked; it only matches an empty listing.
    let chunk = expected.cards.max(1);
    let tables: Vec<Table> = rows
        .chunks(chunk)
        .map(|cards| Table::new(cards.to_vec()))
        .collect();

    let actual = actual_shape(&tables, expected);
    if actual != expected {
        return Err(Error::ShapeMismatch { expected, actual });
    }

    log::info!("Reconstructed {} tables of shape {actual}", tables.len());
    Ok(tables)
}

/// Shape of `tables`; where tables or cards are ragged, the first size that
/// deviates from `expected` is reported.
fn actual_shape(tables: &[Table], expected: Shape) -> Shape {
    if tables.is_empty() {
        return Shape::default();
    }

    let cards = tables
        .iter()
        .map(Table::num_cards)
        .find(|&cards| cards != expected.cards)
        .unwrap_or(expected.cards);
    let attributes = tables
        .iter()
        .flat_map(|table| table.cards().iter().map(Vec::len))
        .find(|&attributes| attributes != expected.attributes)
        .unwrap_or(expected.attributes);

    Shape::new(tables.len(), cards, attributes)
}

/// Tables together with their SET counts.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LabeledTables {
    /// Cards per table
    pub num_cards: usize,
    /// Attributes per card
    pub num_attributes: usize,
    /// The tables
    pub tables: Vec<Table>,
    /// Number of SETs in each table
    pub set_counts: Vec<u32>,
}

impl LabeledTables {
    /// Parse header, SET counts and tables of a full report.
    pub fn from_report_text(text: &str) -> Result<Self, Error> {
        let report = report::Report::parse(text)?;
        let tables = reconstruct_tables(text, report.parameters.into())?;

        Ok(Self {
            num_cards: report.parameters.num_cards,
            num_attributes: report.parameters.num_attributes,
            tables,
            set_counts: report.summary.set_counts,
        })
    }

    /// Read and parse a full report from `path`.
    pub fn read<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let path = path.as_ref();
        log::info!("Opening input file {}", path.display());
        let text = report::read_text(path)?;
        log::info!("Done opening file.");
        Self::from_report_text(&text)
    }

    /// Number of labeled tables.
    pub fn len(&self) -> usize {
        self.tables.len()
    }

    /// Whether there are no tables.
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Shape of the contained tables.
    pub fn shape(&self) -> Shape {
        Shape::new(self.tables.len(), self.num_cards, self.num_attributes)
    }

    /// Iterate over tables and their counts.
    pub fn iter(&self) -> impl Iterator<Item = (&Table, u32)> + '_ {
        self.tables.iter().zip(self.set_counts.iter().copied())
    }
}

#[cfg(test)]
mod test {
    use test_log::test;

    use super::*;
    use crate::report::test::SMALL_REPORT;

    #[test]
    fn two_by_two() {
        let text = "# Tables considered\n\n0 1\n1 0\n\n1 1\n0 0";
        let tables = reconstruct_tables(text, Shape::new(2, 2, 2)).unwrap();

        assert_eq!(
            tables,
            vec![
                Table::new(vec![vec![0, 1], vec![1, 0]]),
                Table::new(vec![vec![1, 1], vec![0, 0]]),
            ]
        );
    }

    #[test]
    fn wrong_table_count() {
        let text = "# Tables considered\n\n0 1\n1 0\n\n1 1\n0 0";
        match reconstruct_tables(text, Shape::new(3, 2, 2)) {
            Err(Error::ShapeMismatch { expected, actual }) => {
                assert_eq!(expected, Shape::new(3, 2, 2));
                assert_eq!(actual, Shape::new(2, 2, 2));
            }
            other => panic!("unexpected result {other:?}"),
        }
    }

    #[test]
    fn ragged_rows() {
        let text = "# Tables considered\n\n0 1\n1 0 1\n";
        let err = reconstruct_tables(text, Shape::new(1, 2, 2)).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Shape mismatch: expected (1, 2, 2), got (1, 2, 3)"
        );
    }

    #[test]
    fn missing_tables_marker() {
        assert!(matches!(
            reconstruct_tables("0 1\n", Shape::new(1, 1, 2)),
            Err(Error::MissingMarker {
                marker: TABLES_MARKER
            })
        ));
    }

    #[test]
    fn labeled_from_report() {
        let labeled = LabeledTables::from_report_text(SMALL_REPORT).unwrap();

        assert_eq!(labeled.shape(), Shape::new(3, 2, 2));
        assert_eq!(labeled.set_counts, vec![0, 1, 3]);
        assert_eq!(labeled.tables[2].cards(), &[vec![-1, 0], vec![0, -1]]);
    }

    #[test]
    fn permuted_rows() {
        let table = Table::new(vec![vec![0], vec![1], vec![2]]);
        assert_eq!(
            table.permuted(&[2, 0, 1]),
            Table::new(vec![vec![2], vec![0], vec![1]])
        );
    }
}
