//! SVG charts of sweep results and training runs.

use std::{
    error::Error,
    fs,
    path::{Path, PathBuf},
};

use plotters::prelude::*;
use setlab::{
    probability::SetProbabilityModel,
    statistics::{self, ProbabilityPoint},
    ResultsCollection, SimulationReport,
};
use setlab_learn::TrainingHistory;

use crate::error::CliError;

type PlotResult = Result<(), Box<dyn Error>>;

const SIZE: (u32, u32) = (1000, 600);
const CAPTION_FONT: (&str, u32) = ("sans-serif", 22);

fn svg_root(path: &Path, size: (u32, u32)) -> SVGBackend<'_> {
    log::info!("Writing {}", path.display());
    SVGBackend::new(path, size)
}

fn render<F: FnOnce(&Path) -> PlotResult>(path: PathBuf, draw: F) -> Result<PathBuf, CliError> {
    draw(&path).map_err(|error| CliError::Plotting {
        filename: path.clone(),
        message: error.to_string(),
    })?;
    Ok(path)
}

fn max_of(values: impl IntoIterator<Item = f64>) -> f64 {
    values.into_iter().fold(0.0, f64::max)
}

/// Normalized SET-count histogram with fitted Gaussian and binomial reference.
fn draw_histogram(path: &Path, cards: usize, report: &SimulationReport) -> PlotResult {
    let density = statistics::normalized_histogram(&report.set_counts);
    let reference = statistics::binomial_reference(&report.set_counts);
    let fit = statistics::fit_histogram(&report.set_counts);
    let total = report.num_tables().max(1) as f64;

    let x_max = density.len() as f64 - 0.5;
    let y_max = max_of(density.iter().copied()).max(1e-3) * 1.2;

    let root = svg_root(path, SIZE).into_drawing_area();
    root.fill(&WHITE)?;
    let mut chart = ChartBuilder::on(&root)
        .caption(format!("Distribution of SETs with {cards} cards"), CAPTION_FONT)
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(-0.5f64..x_max.max(0.5), 0.0f64..y_max)?;

    chart
        .configure_mesh()
        .x_desc("Number of SETs")
        .y_desc("Fraction of tables")
        .draw()?;

    chart
        .draw_series(density.iter().enumerate().map(|(k, &d)| {
            let x = k as f64;
            Rectangle::new([(x - 0.4, 0.0), (x + 0.4, d)], BLUE.mix(0.5).filled())
        }))?
        .label("Simulation")
        .legend(|(x, y)| {
            Rectangle::new([(x, y - 5), (x + 20, y + 5)], BLUE.mix(0.5).filled())
        });

    chart
        .draw_series(LineSeries::new(
            reference
                .iter()
                .enumerate()
                .map(|(k, &expected)| (k as f64, expected / total)),
            GREEN,
        ))?
        .label("Binomial reference")
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], GREEN));

    match fit {
        Some(fit) => {
            let steps = 200;
            let curve = (0..=steps).map(|i| {
                let x = -0.5 + (x_max + 0.5) * f64::from(i) / f64::from(steps);
                (x, fit.evaluate(x))
            });
            chart
                .draw_series(LineSeries::new(curve, RED))?
                .label(format!(
                    "Gaussian fit (mean {:.2}, sigma {:.2})",
                    fit.mean, fit.sigma
                ))
                .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], RED));
        }
        None => log::warn!("No Gaussian fit for {cards} cards, the SET counts do not vary"),
    }

    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()?;

    root.present()?;
    Ok(())
}

/// Average number of SETs per card count.
fn draw_averages(path: &Path, series: &[(usize, f64)]) -> PlotResult {
    let x_max = series.iter().map(|&(cards, _)| cards).max().unwrap_or(1) as f64 + 1.0;
    let y_max = max_of(series.iter().map(|&(_, avg)| avg)).max(1e-3) * 1.1;

    let root = svg_root(path, SIZE).into_drawing_area();
    root.fill(&WHITE)?;
    let mut chart = ChartBuilder::on(&root)
        .caption("Average number of SETs", CAPTION_FONT)
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(0.0f64..x_max, 0.0f64..y_max)?;

    chart
        .configure_mesh()
        .x_desc("Number of cards")
        .y_desc("Average number of SETs")
        .draw()?;

    let points: Vec<(f64, f64)> = series
        .iter()
        .map(|&(cards, avg)| (cards as f64, avg))
        .collect();
    chart.draw_series(LineSeries::new(points.iter().copied(), BLUE.mix(0.4)))?;
    chart.draw_series(
        points
            .iter()
            .map(|&point| Circle::new(point, 4, BLUE.filled())),
    )?;

    root.present()?;
    Ok(())
}

/// Simulated probability of at least one SET against the model, with residuals.
fn draw_probability(path: &Path, points: &[ProbabilityPoint]) -> PlotResult {
    let max_cards = points.iter().map(|point| point.cards).max().unwrap_or(1);
    let x_max = max_cards as f64 + 1.0;
    let expected = SetProbabilityModel::new().curve(max_cards);

    let root = svg_root(path, (1000, 900)).into_drawing_area();
    root.fill(&WHITE)?;
    let panels = root.split_evenly((2, 1));

    let mut chart = ChartBuilder::on(&panels[0])
        .caption("Probability of at least one SET", CAPTION_FONT)
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(0.0f64..x_max, 0.0f64..1.05)?;

    chart
        .configure_mesh()
        .x_desc("Number of cards")
        .y_desc("Probability")
        .draw()?;

    chart
        .draw_series(LineSeries::new(
            expected
                .iter()
                .enumerate()
                .map(|(index, &p)| ((index + 1) as f64, p)),
            RED,
        ))?
        .label("Model")
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], RED));

    chart.draw_series(points.iter().map(|point| {
        let x = point.cards as f64;
        PathElement::new(
            vec![
                (x, point.simulated - point.std_error),
                (x, point.simulated + point.std_error),
            ],
            BLUE,
        )
    }))?;
    chart
        .draw_series(
            points
                .iter()
                .map(|point| Circle::new((point.cards as f64, point.simulated), 4, BLUE)),
        )?
        .label("Simulation")
        .legend(|(x, y)| Circle::new((x + 10, y), 4, BLUE.filled()));

    chart
        .configure_series_labels()
        .position(SeriesLabelPosition::LowerRight)
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()?;

    let spread = max_of(
        points
            .iter()
            .map(|point| point.residual().abs() + point.std_error),
    );
    let spread = spread.max(1e-3) * 1.2;

    let mut residuals = ChartBuilder::on(&panels[1])
        .caption("Simulation minus model", CAPTION_FONT)
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(0.0f64..x_max, -spread..spread)?;

    residuals
        .configure_mesh()
        .x_desc("Number of cards")
        .y_desc("Residual")
        .draw()?;

    residuals.draw_series(std::iter::once(PathElement::new(
        vec![(0.0, 0.0), (x_max, 0.0)],
        BLACK.mix(0.6),
    )))?;
    residuals.draw_series(points.iter().map(|point| {
        let x = point.cards as f64;
        PathElement::new(
            vec![
                (x, point.residual() - point.std_error),
                (x, point.residual() + point.std_error),
            ],
            BLUE,
        )
    }))?;
    residuals.draw_series(
        points
            .iter()
            .map(|point| Circle::new((point.cards as f64, point.residual()), 4, BLUE)),
    )?;

    root.present()?;
    Ok(())
}

/// Training and validation loss per epoch on a logarithmic scale.
fn draw_loss(path: &Path, history: &TrainingHistory) -> PlotResult {
    let epochs = history.epochs().max(2);
    let positive: Vec<f64> = history
        .train_loss
        .iter()
        .chain(&history.validation_loss)
        .copied()
        .filter(|loss| *loss > 0.0 && loss.is_finite())
        .collect();
    let low = positive.iter().copied().fold(f64::INFINITY, f64::min);
    let high = max_of(positive.iter().copied());
    let (low, high) = if positive.is_empty() {
        (1e-3, 1.0)
    } else {
        (low * 0.9, high * 1.1)
    };

    let root = svg_root(path, SIZE).into_drawing_area();
    root.fill(&WHITE)?;
    let mut chart = ChartBuilder::on(&root)
        .caption("Model loss", CAPTION_FONT)
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(70)
        .build_cartesian_2d(1usize..epochs, (low..high).log_scale())?;

    chart
        .configure_mesh()
        .x_desc("Epoch")
        .y_desc("Loss")
        .draw()?;

    let series = |losses: &[f64]| -> Vec<(usize, f64)> {
        losses
            .iter()
            .enumerate()
            .filter(|(_, loss)| **loss > 0.0)
            .map(|(epoch, &loss)| (epoch + 1, loss))
            .collect()
    };

    chart
        .draw_series(LineSeries::new(series(&history.train_loss), BLUE))?
        .label("Training")
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], BLUE));
    if !history.validation_loss.is_empty() {
        chart
            .draw_series(LineSeries::new(series(&history.validation_loss), RED))?
            .label("Validation")
            .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], RED));
    }

    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()?;

    root.present()?;
    Ok(())
}

/// Render the histograms of `histograms` (all card counts if empty), the
/// average SET counts and the probability comparison into `directory`.
pub(crate) fn plot_results(
    results: &ResultsCollection,
    directory: &Path,
    histograms: &[usize],
) -> Result<Vec<PathBuf>, CliError> {
    fs::create_dir_all(directory)?;
    let mut written = Vec::new();

    let histograms: Vec<usize> = if histograms.is_empty() {
        results.card_counts().collect()
    } else {
        histograms.to_vec()
    };
    for cards in histograms {
        let report = results.get(cards)?;
        written.push(render(
            directory.join(format!("bar{cards}cards.svg")),
            |path| draw_histogram(path, cards, report),
        )?);
    }

    let averages = statistics::average_series(results);
    written.push(render(directory.join("avg_sets.svg"), |path| {
        draw_averages(path, &averages)
    })?);

    let comparison = statistics::probability_comparison(results);
    written.push(render(directory.join("prob_set.svg"), |path| {
        draw_probability(path, &comparison)
    })?);

    Ok(written)
}

/// Render the loss curves of a training run into `directory`.
pub(crate) fn plot_history(
    history: &TrainingHistory,
    directory: &Path,
) -> Result<PathBuf, CliError> {
    fs::create_dir_all(directory)?;
    render(directory.join("loss.svg"), |path| draw_loss(path, history))
}
