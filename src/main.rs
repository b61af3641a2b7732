use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crosscheck::ai::GenerationParams;
use crosscheck::cli::commands;
use crosscheck::cli::commands::crosscheck::CrossCheckOptions;
use crosscheck::cli::commands::review::ReviewOptions;
use crosscheck::cli::{CommandContext, OutputFormat};
use crosscheck::config::{Config, ConfigLoader, LogFormat};
use crosscheck::{CrossCheckMode, CrossCheckStatus};

/// Exit code when every provider in a cross-check failed
const EXIT_ALL_FAILED: u8 = 2;

#[derive(Parser)]
#[command(name = "crosscheck")]
#[command(
    version,
    about = "Cross-check LLM responses across multiple providers"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(long, short, global = true, help = "Extra config file layered over the others")]
    config: Option<PathBuf>,

    #[arg(long, global = true)]
    verbose: bool,

    #[arg(long, short, global = true)]
    quiet: bool,

    #[arg(
        long,
        short = 'f',
        global = true,
        value_enum,
        default_value_t = OutputFormat::Text,
        help = "Output format"
    )]
    format: OutputFormat,
}

#[derive(Subcommand)]
enum Commands {
    /// Ask providers to validate one or more responses to a query
    Validate {
        #[command(flatten)]
        common: QueryArgs,
        #[arg(long = "response", short = 'r', help = "Response to validate (repeatable)")]
        responses: Vec<String>,
        #[arg(long = "response-file", help = "Read a response to validate from a file")]
        response_files: Vec<PathBuf>,
        #[arg(long, short = 's', help = "Model that produced the responses")]
        source: Option<String>,
    },

    /// Ask providers to answer a query directly, for side-by-side comparison
    Compare {
        #[command(flatten)]
        common: QueryArgs,
    },

    /// Render a template and send it to one provider
    Generate {
        #[arg(help = "Template name, e.g. system/assistant")]
        template: String,
        #[arg(long, short, help = "Provider to send the prompt to")]
        provider: String,
        #[arg(long = "var", short = 'v', help = "Template variable as key=value (repeatable)")]
        vars: Vec<String>,
        #[command(flatten)]
        params: ParamArgs,
    },

    /// Review a source file with one provider
    Review {
        #[arg(help = "Source file to review")]
        file: PathBuf,
        #[arg(long, short, help = "Provider performing the review")]
        provider: String,
        #[arg(long, short, help = "Language (inferred from the extension when omitted)")]
        language: Option<String>,
        #[arg(long = "focus", help = "Area to focus on (repeatable)")]
        focus: Vec<String>,
        #[arg(long, help = "Lowest severity worth reporting")]
        severity: Option<String>,
        #[arg(long, help = "Only report issues, no suggested fixes")]
        no_suggestions: bool,
    },

    /// Render a template locally without contacting a provider
    Render {
        #[arg(help = "Template name")]
        template: String,
        #[arg(long = "var", short = 'v', help = "Template variable as key=value (repeatable)")]
        vars: Vec<String>,
        #[arg(long, short, help = "Show template metadata above the output")]
        metadata: bool,
    },

    /// List available templates
    Templates {
        #[arg(long, help = "Only templates in this category")]
        category: Option<String>,
    },

    /// Probe every configured provider
    Health,

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Args)]
struct QueryArgs {
    #[arg(long, short = 'Q', help = "The original query")]
    query: String,
    #[arg(long = "target", short = 't', help = "Provider to consult (repeatable, default: all)")]
    targets: Vec<String>,
    #[arg(long = "criterion", help = "Extra aspect to check (repeatable)")]
    criteria: Vec<String>,
    #[arg(long, help = "Template overriding the configured one")]
    template: Option<String>,
    #[arg(long, help = "Overall deadline in seconds")]
    deadline_secs: Option<f64>,
    #[arg(long, help = "Per-provider timeout in seconds")]
    timeout_secs: Option<f64>,
    #[command(flatten)]
    params: ParamArgs,
}

#[derive(Args)]
struct ParamArgs {
    #[arg(long, help = "Model override")]
    model: Option<String>,
    #[arg(long, help = "Sampling temperature")]
    temperature: Option<f32>,
    #[arg(long, help = "Maximum tokens to generate")]
    max_tokens: Option<u32>,
}

impl ParamArgs {
    fn into_params(self) -> GenerationParams {
        GenerationParams {
            model: self.model,
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            timeout_secs: None,
        }
    }
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show current configuration (merged from all sources)
    Show,
    /// Show configuration file paths
    Path,
    /// Initialize configuration
    Init {
        #[arg(long, short, help = "Initialize global config")]
        global: bool,
        #[arg(long, help = "Overwrite existing config")]
        force: bool,
    },
}

/// Set up panic handler for graceful error reporting
fn setup_panic_handler() {
    let default_hook = std::panic::take_hook();

    std::panic::set_hook(Box::new(move |panic_info| {
        let message = if let Some(s) = panic_info.payload().downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = panic_info.payload().downcast_ref::<String>() {
            s.clone()
        } else {
            "Unknown panic".to_string()
        };

        eprintln!("\n\x1b[1;31m━━━ PANIC ━━━\x1b[0m");
        eprintln!("\x1b[31mcrosscheck encountered an unexpected error:\x1b[0m");
        eprintln!("  {}", message);

        if let Some(location) = panic_info.location() {
            eprintln!(
                "\x1b[90mLocation: {}:{}:{}\x1b[0m",
                location.file(),
                location.line(),
                location.column()
            );
        }
        eprintln!();

        // Default hook prints the backtrace when RUST_BACKTRACE=1
        default_hook(panic_info);
    }));
}

fn main() -> ExitCode {
    setup_panic_handler();

    match run_cli() {
        Ok(code) => code,
        Err(e) => {
            eprintln!("\x1b[31mError:\x1b[0m {}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(cli: &Cli, config: &Config) {
    let level = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else {
        config.logging.level.as_str()
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    // Logs go to stderr so that JSON output on stdout stays parseable
    let registry = tracing_subscriber::registry().with(filter);
    match config.logging.format {
        LogFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init(),
        LogFormat::Text => registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init(),
    }
}

fn run_cli() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    let config = ConfigLoader::load_with(cli.config.as_deref())?;
    init_tracing(&cli, &config);
    let format = cli.format;

    match cli.command {
        // Config commands must work even when a provider cannot be built
        Commands::Config { action } => {
            run_config(action, &config, format)?;
            Ok(ExitCode::SUCCESS)
        }
        command => {
            let ctx = CommandContext::from_config(config)?;
            run_command(&ctx, command, format)
        }
    }
}

fn run_config(action: ConfigAction, config: &Config, format: OutputFormat) -> anyhow::Result<()> {
    match action {
        ConfigAction::Show => commands::config::show(config, format)?,
        ConfigAction::Path => commands::config::path()?,
        ConfigAction::Init { global, force } => commands::config::init(global, force)?,
    }
    Ok(())
}

fn run_command(
    ctx: &CommandContext,
    command: Commands,
    format: OutputFormat,
) -> anyhow::Result<ExitCode> {
    match command {
        Commands::Validate {
            common,
            responses,
            response_files,
            source,
        } => {
            let options = CrossCheckOptions {
                mode: CrossCheckMode::Validate,
                responses,
                response_files,
                source,
                ..query_options(common, format)
            };
            return Ok(status_code(commands::crosscheck::run(ctx, options)?));
        }
        Commands::Compare { common } => {
            let options = CrossCheckOptions {
                mode: CrossCheckMode::Compare,
                ..query_options(common, format)
            };
            return Ok(status_code(commands::crosscheck::run(ctx, options)?));
        }
        Commands::Generate {
            template,
            provider,
            vars,
            params,
        } => {
            commands::generate::run(
                ctx,
                &template,
                &provider,
                &vars,
                params.into_params(),
                format,
            )?;
        }
        Commands::Review {
            file,
            provider,
            language,
            focus,
            severity,
            no_suggestions,
        } => {
            commands::review::run(
                ctx,
                ReviewOptions {
                    file: &file,
                    provider: &provider,
                    language,
                    focus,
                    severity,
                    no_suggestions,
                    format,
                },
            )?;
        }
        Commands::Render {
            template,
            vars,
            metadata,
        } => {
            commands::render::run(ctx, &template, &vars, metadata, format)?;
        }
        Commands::Templates { category } => {
            commands::templates::run(ctx, category.as_deref(), format)?;
        }
        Commands::Health => {
            if !commands::health::run(ctx, format)? {
                return Ok(ExitCode::FAILURE);
            }
        }
        Commands::Config { action } => run_config(action, &ctx.config, format)?,
    }

    Ok(ExitCode::SUCCESS)
}

fn query_options(args: QueryArgs, format: OutputFormat) -> CrossCheckOptions {
    let params = args.params.into_params();
    CrossCheckOptions {
        query: args.query,
        targets: args.targets,
        criteria: args.criteria,
        template: args.template,
        model: params.model,
        temperature: params.temperature,
        max_tokens: params.max_tokens,
        deadline_secs: args.deadline_secs,
        timeout_secs: args.timeout_secs,
        format,
        ..Default::default()
    }
}

fn status_code(status: CrossCheckStatus) -> ExitCode {
    match status {
        CrossCheckStatus::Failed => ExitCode::from(EXIT_ALL_FAILED),
        CrossCheckStatus::Complete | CrossCheckStatus::Partial => ExitCode::SUCCESS,
    }
}
