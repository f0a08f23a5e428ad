//! Collection of simulation reports keyed by card count, and its JSON form.

use std::{
    collections::BTreeMap,
    fs::File,
    io::{BufReader, BufWriter, Write},
    path::Path,
};

use serde::{Deserialize, Serialize};

use crate::{error::Error, report::SimulationReport};

/// Reports of a sweep over card counts.
///
/// Serialized as a JSON object whose keys are the card counts as strings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResultsCollection {
    reports: BTreeMap<usize, SimulationReport>,
}

impl ResultsCollection {
    /// Empty collection.
    pub fn new() -> Self {
        Default::default()
    }

    /// Store the report for `cards`, returning a previous one.
    pub fn insert(&mut self, cards: usize, report: SimulationReport) -> Option<SimulationReport> {
        self.reports.insert(cards, report)
    }

    /// Report for `cards`.
    pub fn get(&self, cards: usize) -> Result<&SimulationReport, Error> {
        self.reports
            .get(&cards)
            .ok_or(Error::ResultsMissing { cards })
    }

    /// Whether a report for `cards` exists.
    pub fn contains(&self, cards: usize) -> bool {
        self.reports.contains_key(&cards)
    }

    /// Card counts in increasing order.
    pub fn card_counts(&self) -> impl Iterator<Item = usize> + '_ {
        self.reports.keys().copied()
    }

    /// Reports in increasing order of card count.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &SimulationReport)> + '_ {
        self.reports.iter().map(|(&cards, report)| (cards, report))
    }

    /// Number of stored reports.
    pub fn len(&self) -> usize {
        self.reports.len()
    }

    /// Whether no report is stored.
    pub fn is_empty(&self) -> bool {
        self.reports.is_empty()
    }

    /// Serialize as indented JSON.
    pub fn to_json(&self) -> Result<String, Error> {
        let mut buffer = Vec::new();
        self.write_json(&mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }

    /// Parse a collection from JSON text.
    pub fn from_json(text: &str) -> Result<Self, Error> {
        Ok(serde_json::from_str(text)?)
    }

    fn write_json<W: Write>(&self, writer: W) -> Result<(), Error> {
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut serializer = serde_json::Serializer::with_formatter(writer, formatter);
        self.serialize(&mut serializer)?;
        Ok(())
    }

    /// Write the collection to `path`.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), Error> {
        let path = path.as_ref();
        let io_error = |error| Error::IOWriting {
            error,
            filename: path.to_path_buf(),
        };

        let mut writer = BufWriter::new(File::create(path).map_err(io_error)?);
        self.write_json(&mut writer)?;
        writer.flush().map_err(io_error)?;

        log::info!("Saved {} reports to {}", self.len(), path.display());
        Ok(())
    }

    /// Load a collection from `path`.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|error| Error::IOReading {
            error,
            filename: path.to_path_buf(),
        })?;
        let results: Self = serde_json::from_reader(BufReader::new(file))?;

        log::info!("Loaded {} reports from {}", results.len(), path.display());
        Ok(results)
    }
}
