use std::process::ExitCode;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use gicat_driver::client::GiCatClient;
use gicat_driver::clock::SystemClock;
use gicat_driver::config::{ConfigLoader, ConfigOverrides, DriverConfig};
use gicat_driver::domain::ProfileId;
use gicat_driver::error::GiCatError;
use gicat_driver::harvest::Harvester;
use gicat_driver::http::ReqwestTransport;
use gicat_driver::opensearch;
use gicat_driver::output::{ConsoleOutput, JsonOutput, OutputMode};

#[derive(Parser)]
#[command(name = "gicat")]
#[command(about = "Drive a GI-Cat catalog broker: profiles, Lucene ranking, interfaces and harvests")]
#[command(version, author)]
struct Cli {
    /// Path to a JSON config file (defaults to ./gicat.json)
    #[arg(long, global = true)]
    config: Option<String>,

    #[arg(long, global = true)]
    url: Option<String>,

    #[arg(long, global = true)]
    username: Option<String>,

    #[arg(long, global = true)]
    password: Option<String>,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Check whether GI-Cat answers")]
    Ping,
    #[command(about = "Manage broker configuration profiles")]
    Profile(ProfileArgs),
    #[command(about = "Toggle Lucene relevance ranking for the active profile")]
    Lucene(LuceneArgs),
    #[command(about = "Run an ESIP OpenSearch query and report the total results")]
    Search(SearchArgs),
    #[command(about = "Publish or unpublish access interfaces")]
    Interface(InterfaceArgs),
    #[command(about = "Create or delete accessors (feed resources)")]
    Accessor(AccessorArgs),
    #[command(about = "List the harvestable resources of a profile")]
    Resources(ResourcesArgs),
    #[command(about = "Harvest every resource of the active profile")]
    Harvest(HarvestArgs),
}

#[derive(Args)]
struct ProfileArgs {
    #[command(subcommand)]
    command: ProfileCommand,
}

#[derive(Subcommand)]
enum ProfileCommand {
    List,
    Create { name: String },
    Delete { name: String },
    Find { name: String },
    Active,
    Enable { name: String },
}

#[derive(Args)]
struct LuceneArgs {
    #[command(subcommand)]
    command: LuceneCommand,
}

#[derive(Subcommand)]
enum LuceneCommand {
    Enable,
    Disable,
    Status,
}

#[derive(Args)]
struct SearchArgs {
    term: String,
}

#[derive(Args)]
struct InterfaceArgs {
    #[command(subcommand)]
    command: InterfaceCommand,
}

#[derive(Subcommand)]
enum InterfaceCommand {
    Publish {
        profile: String,
        /// Form parameters as key=value, e.g. profiler=OAI-PMH path=oaipmh
        #[arg(value_parser = parse_param)]
        params: Vec<(String, String)>,
    },
    Unpublish {
        profile: String,
        interface: String,
    },
}

#[derive(Args)]
struct AccessorArgs {
    #[command(subcommand)]
    command: AccessorCommand,
}

#[derive(Subcommand)]
enum AccessorCommand {
    Create {
        profile: String,
        #[arg(value_parser = parse_param)]
        params: Vec<(String, String)>,
    },
    Delete {
        profile: String,
        accessor: String,
    },
}

#[derive(Args)]
struct ResourcesArgs {
    /// Profile name; the active profile when omitted
    #[arg(long)]
    profile: Option<String>,
}

#[derive(Args)]
struct HarvestArgs {
    /// Overall wait budget in seconds
    #[arg(long)]
    timeout: Option<u64>,

    /// Seconds between status polls
    #[arg(long)]
    poll_interval: Option<u64>,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(error) = report.downcast_ref::<GiCatError>() {
            return ExitCode::from(map_exit_code(error));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &GiCatError) -> u8 {
    match error {
        GiCatError::MissingConfig
        | GiCatError::ConfigRead(_)
        | GiCatError::ProfileNotFound(_) => 2,
        GiCatError::Http(_)
        | GiCatError::Status { .. }
        | GiCatError::Xml(_)
        | GiCatError::OpenSearch(_)
        | GiCatError::Discovery(_) => 3,
        GiCatError::HarvestStart { .. } | GiCatError::HarvestFailed { .. } => 4,
        _ => 1,
    }
}

fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let output_mode = if cli.json {
        OutputMode::Json
    } else {
        OutputMode::Text
    };

    let (timeout, poll_interval) = match &cli.command {
        Commands::Harvest(args) => (args.timeout, args.poll_interval),
        _ => (None, None),
    };
    let config = ConfigLoader::resolve(
        cli.config.as_deref(),
        ConfigOverrides {
            base_url: cli.url,
            username: cli.username,
            password: cli.password,
            harvest_timeout_secs: timeout,
            poll_interval_secs: poll_interval,
        },
    )?;
    let transport = ReqwestTransport::new(config.request_timeout)?;
    let client = GiCatClient::new(config.endpoint(), transport);

    match cli.command {
        Commands::Ping => {
            let running = client.is_running()?;
            emit(output_mode, &Running { running }, || {
                if running {
                    println!("GI-Cat is running at {}", config.base_url);
                } else {
                    println!("GI-Cat is not reachable at {}", config.base_url);
                }
            })?;
            if !running {
                return Err(GiCatError::Http(format!("{} is not reachable", config.base_url)).into());
            }
            Ok(())
        }
        Commands::Profile(args) => run_profile(args.command, &client, output_mode),
        Commands::Lucene(args) => run_lucene(args.command, &client, output_mode),
        Commands::Search(args) => {
            let results = client.query_esip_opensearch(&args.term)?;
            let total = opensearch::total_results(&results);
            emit(output_mode, &SearchSummary { term: args.term.clone(), total_results: total }, || {
                println!("{total} result(s) for '{}'", args.term)
            })
        }
        Commands::Interface(args) => match args.command {
            InterfaceCommand::Publish { profile, params } => {
                let body = client.publish_interface(&profile, &params)?;
                emit(output_mode, &Message { message: body.clone() }, || {
                    println!("Published interface on {profile}: {}", body.trim())
                })
            }
            InterfaceCommand::Unpublish { profile, interface } => {
                client.unpublish_interface(&profile, &interface)?;
                emit(output_mode, &Message { message: interface.clone() }, || {
                    println!("Unpublished interface {interface} from {profile}")
                })
            }
        },
        Commands::Accessor(args) => match args.command {
            AccessorCommand::Create { profile, params } => {
                let accessor_id = client.create_accessor(&profile, &params)?;
                emit(output_mode, &Message { message: accessor_id.clone() }, || {
                    println!("Created accessor {accessor_id} on {profile}")
                })
            }
            AccessorCommand::Delete { profile, accessor } => {
                client.delete_accessor(&profile, &accessor)?;
                emit(output_mode, &Message { message: accessor.clone() }, || {
                    println!("Deleted accessor {accessor} from {profile}")
                })
            }
        },
        Commands::Resources(args) => {
            let profile_id = match args.profile {
                Some(name) => client.find_profile_id(&name)?,
                None => client.active_profile_id()?,
            };
            let resources = client.list_resources(&profile_id)?;
            emit(output_mode, &resources, || {
                for resource in &resources {
                    println!("{}\t{}", resource.id, resource.title);
                }
            })
        }
        Commands::Harvest(_) => run_harvest(&client, &config, output_mode),
    }
}

fn run_profile(
    command: ProfileCommand,
    client: &GiCatClient<ReqwestTransport>,
    output_mode: OutputMode,
) -> miette::Result<()> {
    match command {
        ProfileCommand::List => {
            let profiles = client.list_profiles()?;
            emit(output_mode, &profiles, || {
                for profile in &profiles {
                    println!("{}\t{}", profile.id, profile.name);
                }
            })
        }
        ProfileCommand::Create { name } => {
            let id = client.create_profile(&name)?;
            emit(output_mode, &Message { message: id.clone() }, || {
                println!("Created profile {name} with id {id}")
            })
        }
        ProfileCommand::Delete { name } => {
            client.delete_profile(&name)?;
            emit(output_mode, &Message { message: name.clone() }, || {
                println!("Deleted profile {name}")
            })
        }
        ProfileCommand::Find { name } => {
            let id = client.find_profile_id(&name)?;
            print_profile_id(output_mode, &id)
        }
        ProfileCommand::Active => {
            let id = client.active_profile_id()?;
            print_profile_id(output_mode, &id)
        }
        ProfileCommand::Enable { name } => {
            client.enable_profile(&name)?;
            emit(output_mode, &Message { message: name.clone() }, || {
                println!("Enabled profile {name}")
            })
        }
    }
}

fn run_lucene(
    command: LuceneCommand,
    client: &GiCatClient<ReqwestTransport>,
    output_mode: OutputMode,
) -> miette::Result<()> {
    let enabled = match command {
        LuceneCommand::Enable => {
            client.enable_lucene()?;
            true
        }
        LuceneCommand::Disable => {
            client.disable_lucene()?;
            false
        }
        LuceneCommand::Status => client.is_lucene_enabled()?,
    };
    emit(output_mode, &LuceneState { enabled }, || {
        println!("Lucene indexing is {}", if enabled { "on" } else { "off" })
    })
}

fn run_harvest(
    client: &GiCatClient<ReqwestTransport>,
    config: &DriverConfig,
    output_mode: OutputMode,
) -> miette::Result<()> {
    let harvester = Harvester::new(client, SystemClock, config.harvest.poll_interval);
    let timeout: Duration = config.harvest.timeout;
    match output_mode {
        OutputMode::Json => {
            let report = harvester.harvest_all_active(timeout, &JsonOutput)?;
            JsonOutput::print_report(&report).into_diagnostic()
        }
        OutputMode::Text => {
            let report = harvester.harvest_all_active(timeout, &ConsoleOutput)?;
            ConsoleOutput::print_report(&report);
            Ok(())
        }
    }
}

fn print_profile_id(output_mode: OutputMode, id: &ProfileId) -> miette::Result<()> {
    emit(output_mode, id, || println!("{id}"))
}

fn emit<T: Serialize>(
    output_mode: OutputMode,
    value: &T,
    text: impl FnOnce(),
) -> miette::Result<()> {
    match output_mode {
        OutputMode::Json => JsonOutput::print_json(value).into_diagnostic(),
        OutputMode::Text => {
            text();
            Ok(())
        }
    }
}

fn parse_param(value: &str) -> Result<(String, String), String> {
    value
        .split_once('=')
        .map(|(key, value)| (key.trim().to_string(), value.to_string()))
        .filter(|(key, _)| !key.is_empty())
        .ok_or_else(|| format!("expected key=value, got '{value}'"))
}

#[derive(Serialize)]
struct Running {
    running: bool,
}

#[derive(Serialize)]
struct LuceneState {
    enabled: bool,
}

#[derive(Serialize)]
struct SearchSummary {
    term: String,
    total_results: u64,
}

#[derive(Serialize)]
struct Message {
    message: String,
}
