//! Binary for analysing the card game SET: generator sweeps, report checks,
//! the probability model, plots and neural networks.

#![deny(
    missing_debug_implementations,
    missing_copy_implementations,
    trivial_casts,
    trivial_numeric_casts
)]
#![warn(
    missing_docs,
    unused_import_braces,
    unused_qualifications,
    unused_extern_crates,
    variant_size_differences
)]

pub(crate) mod cli;
pub(crate) mod error;
pub(crate) mod plot;

use std::{path::Path, time::Instant};

use candle_core::Device;
use clap::Parser;
use cli::{
    CliApp, Command, EvaluateArgs, ModelArgs, ParseArgs, PlotArgs, ProbabilityArgs, SweepArgs,
    TrainArgs, VerifyArgs,
};
use colored::Colorize;
use error::CliError;
use setlab::{
    augment::augment,
    probability::SetProbabilityModel,
    report::Report,
    rule::verify_counts,
    sweep::Sweep,
    LabeledTables, ResultsCollection,
};
use setlab_learn::{evaluate, train, Dataset, EvaluationReport, Network};

fn print_evaluation(report: &EvaluationReport) {
    println!(
        "Evaluated {} tables in {}ms: {} mismatches, accuracy {}.",
        report.evaluated.to_string().green().bold(),
        report.elapsed.as_millis().to_string().green().bold(),
        report.mismatches.len().to_string().green().bold(),
        format!("{:.2}%", report.accuracy() * 100.0).green().bold(),
    );
    log::debug!("Mismatched tables: {:?}", report.mismatches);
}

fn run_sweep(args: SweepArgs) -> Result<(), CliError> {
    let sweep = Sweep::new(
        args.generator.generator(),
        args.max_cards,
        args.attributes,
        args.tables,
    );
    let results = sweep.obtain(args.source(), &args.output)?;

    println!(
        "All simulations completed! Stored {} card counts in {}.",
        results.len().to_string().green().bold(),
        args.output.display()
    );

    if let Some(directory) = &args.plot_directory {
        for path in plot::plot_results(&results, directory, &[])? {
            println!("   {}", path.display());
        }
    }
    Ok(())
}

fn run_parse(args: ParseArgs) -> Result<(), CliError> {
    let text = setlab::report::read_text(&args.report)?;
    let report = Report::parse(&text)?;
    let parameters = report.parameters;
    let summary = &report.summary;

    println!(
        "{} cards, {} attributes, {} tables",
        parameters.num_cards, parameters.num_attributes, parameters.num_tables
    );
    println!(
        "   {0: <22} {1}%",
        "Tables without SETs:", summary.prob_no_sets
    );
    println!("   {0: <22} {1}", "Average SETs:", summary.avg_sets);
    println!(
        "   {0: <22} {1}",
        "Most SETs:",
        summary.set_counts.iter().max().copied().unwrap_or(0)
    );

    if args.tables {
        let tables = LabeledTables::from_report_text(&text)?;
        println!("   {0: <22} {1}", "Table shape:", tables.shape());
    }
    Ok(())
}

fn run_verify(args: VerifyArgs) -> Result<(), CliError> {
    let tables = LabeledTables::read(&args.report)?;
    let discrepancies = verify_counts(tables.iter());

    for discrepancy in &discrepancies {
        log::error!(
            "Table {} lists {} SETs, recount finds {}",
            discrepancy.index,
            discrepancy.reported,
            discrepancy.recounted
        );
    }
    if !discrepancies.is_empty() {
        return Err(CliError::CountsDiffer {
            count: discrepancies.len(),
        });
    }

    println!(
        "All {} SET counts confirmed.",
        tables.len().to_string().green().bold()
    );
    Ok(())
}

fn run_probability(args: ProbabilityArgs) {
    let mut model = SetProbabilityModel::new();
    let cards = args.cards.get();
    let certain = model.saturation();

    for (index, probability) in model.curve(cards.min(certain)).into_iter().enumerate() {
        println!("{:>4}  {probability:.6}", index + 1);
    }
    if cards > certain {
        println!("{:>4}  {:.6}", format!("{}-{cards}", certain + 1), 1.0);
    }
}

fn run_plot(args: PlotArgs) -> Result<(), CliError> {
    let results = ResultsCollection::load(&args.results)?;
    for path in plot::plot_results(&results, &args.output_directory, &args.histograms)? {
        println!("{}", path.display());
    }
    Ok(())
}

fn load_dataset(report: &Path, model: &ModelArgs) -> Result<Dataset, CliError> {
    let tables = LabeledTables::read(report)?;
    Ok(Dataset::from_tables(&tables, model.labels.into())?)
}

fn new_network(model: &ModelArgs, dataset: &Dataset) -> Result<Network, CliError> {
    Ok(Network::new(
        model.architecture.into(),
        model.loss.into(),
        dataset.num_cards(),
        dataset.num_attributes(),
        &Device::Cpu,
    )?)
}

fn run_train(args: TrainArgs) -> Result<(), CliError> {
    let start = Instant::now();

    let mut tables = LabeledTables::read(&args.report)?;
    if !args.no_augment {
        let (augmented, summary) = augment(&tables, args.permutation_policy());
        log::info!("{summary:?}");
        tables = augmented;
    }
    let dataset = Dataset::from_tables(&tables, args.model.labels.into())?;
    let network = new_network(&args.model, &dataset)?;

    let history = train(&network, &dataset, &args.train_config())?;
    network.save(&args.model.weights)?;
    let loss_plot = plot::plot_history(&history, &args.plot_directory)?;

    println!(
        "Training completed in {}{} after {} epochs.",
        start.elapsed().as_millis().to_string().green().bold(),
        "ms".green().bold(),
        history.epochs().to_string().green().bold(),
    );
    println!("   {0: <9} {1}", "Weights:", args.model.weights.display());
    println!("   {0: <9} {1}", "Loss:", loss_plot.display());

    if let Some(test) = &args.test {
        let test_set = load_dataset(test, &args.model)?;
        print_evaluation(&evaluate(&network, &test_set, args.sample.sampling())?);
    }
    Ok(())
}

fn run_evaluate(args: EvaluateArgs) -> Result<(), CliError> {
    let dataset = load_dataset(&args.report, &args.model)?;
    let mut network = new_network(&args.model, &dataset)?;
    network.load(&args.model.weights)?;

    print_evaluation(&evaluate(&network, &dataset, args.sample.sampling())?);
    Ok(())
}

fn run(cli: CliApp) -> Result<(), CliError> {
    match cli.command {
        Command::Sweep(args) => run_sweep(args),
        Command::Parse(args) => run_parse(args),
        Command::Verify(args) => run_verify(args),
        Command::Probability(args) => {
            run_probability(args);
            Ok(())
        }
        Command::Plot(args) => run_plot(args),
        Command::Train(args) => run_train(args),
        Command::Evaluate(args) => run_evaluate(args),
    }
}

fn main() {
    let cli = CliApp::parse();

    cli.logging.initialize_logging();
    log::info!("Version: {}", clap::crate_version!());
    log::debug!("Command: {:?}", cli.command);

    run(cli).unwrap_or_else(|err| {
        log::error!("{} {err}", "error:".red().bold());
        std::process::exit(1)
    })
}
