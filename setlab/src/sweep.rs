//! Sequential generator runs over a range of card counts.

use std::path::Path;

use crate::{
    error::Error,
    generator::{Generator, GeneratorRequest},
    results::ResultsCollection,
};

/// Where a [ResultsCollection] comes from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ResultsSource {
    /// Run the generator for every card count.
    #[default]
    Compute,
    /// Only load a previously saved collection.
    Load,
    /// Load a saved collection if present and run the missing card counts.
    LoadOrCompute,
}

/// Runs the generator for card counts `1..=max_cards`.
#[derive(Debug, Clone)]
pub struct Sweep {
    generator: Generator,
    max_cards: usize,
    num_attributes: usize,
    num_tables: usize,
}

impl Sweep {
    /// Constructor.
    pub fn new(
        generator: Generator,
        max_cards: usize,
        num_attributes: usize,
        num_tables: usize,
    ) -> Self {
        Self {
            generator,
            max_cards,
            num_attributes,
            num_tables,
        }
    }

    /// Add a report for every card count that `results` does not have yet.
    pub fn run(&self, mut results: ResultsCollection) -> Result<ResultsCollection, Error> {
        for cards in 1..=self.max_cards {
            if results.contains(cards) {
                log::info!("Reusing results for {cards} cards");
                continue;
            }

            log::info!("Running for {cards} cards...");
            let request = GeneratorRequest::new(cards, self.num_attributes, self.num_tables);
            let report = self.generator.run(request)?;
            results.insert(cards, report);
        }

        Ok(results)
    }

    /// Obtain results according to `source`, saving newly computed ones to `path`.
    pub fn obtain<P: AsRef<Path>>(
        &self,
        source: ResultsSource,
        path: P,
    ) -> Result<ResultsCollection, Error> {
        let path = path.as_ref();

        let results = match source {
            ResultsSource::Load => return ResultsCollection::load(path),
            ResultsSource::LoadOrCompute if path.exists() => {
                self.run(ResultsCollection::load(path)?)?
            }
            ResultsSource::LoadOrCompute | ResultsSource::Compute => {
                self.run(ResultsCollection::new())?
            }
        };

        results.save(path)?;
        Ok(results)
    }
}
