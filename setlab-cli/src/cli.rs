//! Contains structures and functionality for the binary
use std::{path::PathBuf, time::Duration};

use setlab::{
    augment::PermutationPolicy,
    generator::{Generator, DEFAULT_REPORT_FILE},
    probability::CardCount,
    sweep::ResultsSource,
};
use setlab_learn::{Architecture, LabelKind, Loss, Sampling, TrainConfig};

/// Default file for the results of a sweep.
pub(crate) const DEFAULT_RESULTS_FILE: &str = "set_results.json";
/// Default directory for rendered plots.
const DEFAULT_PLOT_DIRECTORY: &str = "Images";
/// Default file for trained weights.
const DEFAULT_WEIGHTS_FILE: &str = "model.safetensors";

/// Cli Arguments related to logging
#[derive(clap::Args, Debug)]
pub(crate) struct LoggingArgs {
    /// Increase log verbosity (multiple uses increase verbosity further)
    #[arg(short, long, action = clap::builder::ArgAction::Count, group = "verbosity")]
    verbose: u8,
    /// Reduce log verbosity to show only errors (equivalent to --log error)
    #[arg(short, long, group = "verbosity")]
    quiet: bool,
    /// Set log verbosity (default is "warn")
    #[arg(long = "log", value_parser=clap::builder::PossibleValuesParser::new(["error", "warn", "info", "debug", "trace"]), group = "verbosity")]
    log_level: Option<String>,
}

impl LoggingArgs {
    /// Initialising Logging
    ///
    /// Sets the logging verbosity to the given log-level in the following order:
    ///  * `Info`, `Debug`, `Trace`; depending on the count of `-v`
    ///  * `Error` when `-q` is used
    ///  * The `SETLAB_LOG` environment variable value
    ///  * `Warn` otherwise
    pub(crate) fn initialize_logging(&self) {
        let mut builder = env_logger::Builder::new();

        // Default log level
        builder.filter_level(log::LevelFilter::Warn);

        builder.parse_env("SETLAB_LOG");
        if let Some(ref level) = self.log_level {
            builder.parse_filters(level);
        } else if self.quiet {
            builder.filter_level(log::LevelFilter::Error);
        } else if self.verbose > 0 {
            builder.filter_level(match self.verbose {
                1 => log::LevelFilter::Info,
                2 => log::LevelFilter::Debug,
                3 => log::LevelFilter::Trace,
                _ => log::LevelFilter::Warn,
            });
        }
        builder.init();
    }
}

/// Cli arguments describing the generator executable
#[derive(clap::Args, Debug)]
pub(crate) struct GeneratorArgs {
    /// Path of the compiled table generator
    #[arg(long = "generator", env = "SETLAB_GENERATOR")]
    executable: PathBuf,
    /// Directory the generator runs in (default is working directory)
    #[arg(long = "work-dir")]
    working_directory: Option<PathBuf>,
    /// Report file written by the generator, relative to its working directory
    #[arg(long = "report-file", default_value = DEFAULT_REPORT_FILE)]
    report_file: PathBuf,
    /// Use the exhaustive instead of the optimized SET search
    #[arg(long = "no-optimize")]
    no_optimize: bool,
    /// Milliseconds to wait for a complete report after the generator exited
    #[arg(long = "settle-ms", default_value_t = 500)]
    settle_ms: u64,
}

impl GeneratorArgs {
    /// Configured generator handle.
    pub(crate) fn generator(&self) -> Generator {
        let mut generator = Generator::new(&self.executable)
            .report_file(&self.report_file)
            .optimized(!self.no_optimize)
            .settle_timeout(Duration::from_millis(self.settle_ms));
        if let Some(directory) = &self.working_directory {
            generator = generator.working_directory(directory);
        }
        generator
    }
}

/// Cli arguments of the sweep
#[derive(clap::Args, Debug)]
pub(crate) struct SweepArgs {
    /// Largest number of cards per table
    #[arg(short = 'n', long = "cards")]
    pub(crate) max_cards: usize,
    /// Number of attributes per card
    #[arg(short, long, default_value_t = 4)]
    pub(crate) attributes: usize,
    /// Number of tables per card count
    #[arg(short, long, default_value_t = 1000)]
    pub(crate) tables: usize,
    /// Generator settings
    #[command(flatten)]
    pub(crate) generator: GeneratorArgs,
    /// File the results are stored in
    #[arg(short, long, default_value = DEFAULT_RESULTS_FILE)]
    pub(crate) output: PathBuf,
    /// Keep the results already stored in the output file and only run missing card counts
    #[arg(long, conflicts_with = "load")]
    pub(crate) reuse: bool,
    /// Only load the output file without running the generator
    #[arg(long)]
    pub(crate) load: bool,
    /// Also render the plots into this directory
    #[arg(long = "plot-dir")]
    pub(crate) plot_directory: Option<PathBuf>,
}

impl SweepArgs {
    pub(crate) fn source(&self) -> ResultsSource {
        if self.load {
            ResultsSource::Load
        } else if self.reuse {
            ResultsSource::LoadOrCompute
        } else {
            ResultsSource::Compute
        }
    }
}

/// Cli arguments for inspecting a report
#[derive(clap::Args, Debug)]
pub(crate) struct ParseArgs {
    /// Report written by the generator
    pub(crate) report: PathBuf,
    /// Also reconstruct and check the listed tables
    #[arg(long)]
    pub(crate) tables: bool,
}

/// Cli arguments for recounting the SETs of a report
#[derive(clap::Args, Debug)]
pub(crate) struct VerifyArgs {
    /// Report written by the generator
    pub(crate) report: PathBuf,
}

/// Cli arguments of the probability model
#[derive(clap::Args, Debug)]
pub(crate) struct ProbabilityArgs {
    /// Largest number of cards
    #[arg(allow_negative_numbers = true)]
    pub(crate) cards: CardCount,
}

/// Cli arguments for rendering plots
#[derive(clap::Args, Debug)]
pub(crate) struct PlotArgs {
    /// Results of a sweep
    #[arg(short, long, default_value = DEFAULT_RESULTS_FILE)]
    pub(crate) results: PathBuf,
    /// Directory for the images
    #[arg(short, long = "output-dir", default_value = DEFAULT_PLOT_DIRECTORY)]
    pub(crate) output_directory: PathBuf,
    /// Card counts to draw histograms for (default is all)
    #[arg(long = "histogram", value_delimiter = ',')]
    pub(crate) histograms: Vec<usize>,
}

/// Topology choice on the command line.
#[derive(clap::ValueEnum, Clone, Copy, Default, Debug, PartialEq, Eq)]
pub(crate) enum ArchitectureArg {
    /// Fully connected network
    #[default]
    Dense,
    /// Convolutional network
    Conv,
}

impl From<ArchitectureArg> for Architecture {
    fn from(val: ArchitectureArg) -> Self {
        match val {
            ArchitectureArg::Dense => Architecture::Dense,
            ArchitectureArg::Conv => Architecture::Conv,
        }
    }
}

/// Loss choice on the command line.
#[derive(clap::ValueEnum, Clone, Copy, Default, Debug, PartialEq, Eq)]
pub(crate) enum LossArg {
    /// Binary cross entropy
    #[default]
    Bce,
    /// Mean squared error
    Mse,
    /// Huber loss
    Huber,
}

impl From<LossArg> for Loss {
    fn from(val: LossArg) -> Self {
        match val {
            LossArg::Bce => Loss::BinaryCrossEntropy,
            LossArg::Mse => Loss::MeanSquaredError,
            LossArg::Huber => Loss::Huber,
        }
    }
}

/// Label choice on the command line.
#[derive(clap::ValueEnum, Clone, Copy, Default, Debug, PartialEq, Eq)]
pub(crate) enum LabelArg {
    /// Whether the table contains a SET
    #[default]
    Presence,
    /// Number of SETs on the table
    Count,
}

impl From<LabelArg> for LabelKind {
    fn from(val: LabelArg) -> Self {
        match val {
            LabelArg::Presence => LabelKind::Presence,
            LabelArg::Count => LabelKind::Count,
        }
    }
}

/// Cli arguments describing the network
#[derive(clap::Args, Debug)]
pub(crate) struct ModelArgs {
    /// Network topology
    #[arg(long, value_enum, default_value_t)]
    pub(crate) architecture: ArchitectureArg,
    /// Training objective
    #[arg(long, value_enum, default_value_t)]
    pub(crate) loss: LossArg,
    /// What the network predicts
    #[arg(long, value_enum, default_value_t)]
    pub(crate) labels: LabelArg,
    /// File holding the weights
    #[arg(short, long, default_value = DEFAULT_WEIGHTS_FILE)]
    pub(crate) weights: PathBuf,
}

/// Cli arguments selecting evaluation examples
#[derive(clap::Args, Debug)]
pub(crate) struct SampleArgs {
    /// Number of tables to evaluate (default is all)
    #[arg(long = "sample-size")]
    pub(crate) size: Option<usize>,
    /// Draw the tables at random with this seed instead of taking the first ones
    #[arg(id = "sample_seed", long = "sample-seed", requires = "size")]
    pub(crate) seed: Option<u64>,
}

impl SampleArgs {
    pub(crate) fn sampling(&self) -> Sampling {
        match (self.size, self.seed) {
            (None, _) => Sampling::All,
            (Some(size), None) => Sampling::Prefix(size),
            (Some(size), Some(seed)) => Sampling::Random { size, seed },
        }
    }
}

/// Cli arguments of a training run
#[derive(clap::Args, Debug)]
pub(crate) struct TrainArgs {
    /// Report with the training tables
    pub(crate) report: PathBuf,
    /// Network settings
    #[command(flatten)]
    pub(crate) model: ModelArgs,
    /// Use the tables as they are instead of rebalancing them
    #[arg(long = "no-augment")]
    pub(crate) no_augment: bool,
    /// Draw this many random card orders per single-SET table instead of all of them
    #[arg(long = "orderings")]
    pub(crate) orderings: Option<usize>,
    /// Maximal number of epochs
    #[arg(long, default_value_t = 150)]
    pub(crate) epochs: usize,
    /// Examples per gradient step
    #[arg(long = "batch-size", default_value_t = 512)]
    pub(crate) batch_size: usize,
    /// Initial learning rate
    #[arg(long = "learning-rate", default_value_t = 1e-3)]
    pub(crate) learning_rate: f64,
    /// Fraction of the examples held out for validation
    #[arg(long = "validation-split", default_value_t = 0.2)]
    pub(crate) validation_split: f64,
    /// Seed for shuffling and sampling
    #[arg(long, default_value_t = 0)]
    pub(crate) seed: u64,
    /// Directory for the loss plot
    #[arg(long = "plot-dir", default_value = DEFAULT_PLOT_DIRECTORY)]
    pub(crate) plot_directory: PathBuf,
    /// Report with tables to evaluate the trained network on
    #[arg(long)]
    pub(crate) test: Option<PathBuf>,
    /// Selection of test tables
    #[command(flatten)]
    pub(crate) sample: SampleArgs,
}

impl TrainArgs {
    pub(crate) fn permutation_policy(&self) -> PermutationPolicy {
        match self.orderings {
            Some(samples) => PermutationPolicy::Random {
                samples,
                seed: self.seed,
            },
            None => PermutationPolicy::All,
        }
    }

    pub(crate) fn train_config(&self) -> TrainConfig {
        TrainConfig {
            learning_rate: self.learning_rate,
            batch_size: self.batch_size,
            epochs: self.epochs,
            validation_split: self.validation_split,
            seed: self.seed,
            ..Default::default()
        }
    }
}

/// Cli arguments for evaluating stored weights
#[derive(clap::Args, Debug)]
pub(crate) struct EvaluateArgs {
    /// Report with the tables to evaluate
    pub(crate) report: PathBuf,
    /// Network settings
    #[command(flatten)]
    pub(crate) model: ModelArgs,
    /// Selection of tables
    #[command(flatten)]
    pub(crate) sample: SampleArgs,
}

/// Subcommands of the binary
#[derive(clap::Subcommand, Debug)]
pub(crate) enum Command {
    /// Run the generator for 1 up to n cards and store the results
    Sweep(SweepArgs),
    /// Print the summary of a report
    Parse(ParseArgs),
    /// Recount the SETs of every table in a report
    Verify(VerifyArgs),
    /// Print the probability that a table of k cards contains a SET
    Probability(ProbabilityArgs),
    /// Render the plots of a stored sweep
    Plot(PlotArgs),
    /// Train a network on the tables of a report
    Train(TrainArgs),
    /// Evaluate stored weights on the tables of a report
    Evaluate(EvaluateArgs),
}

/// SET analysis CLI
#[derive(clap::Parser, Debug)]
#[command(author, version, about)]
pub(crate) struct CliApp {
    /// Arguments related to logging
    #[command(flatten)]
    pub(crate) logging: LoggingArgs,
    /// Task to perform
    #[command(subcommand)]
    pub(crate) command: Command,
}
