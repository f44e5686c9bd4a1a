use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use city_weather::app::App;
use city_weather::config::{ApiKey, ConfigLoader, ResolvedConfig};
use city_weather::error::WeatherError;
use city_weather::favorites::FavoritesStore;
use city_weather::geocode::{Geocoder, OpenWeatherGeocoder};
use city_weather::output::{FavoritesResult, JsonOutput, ValidateResult};
use city_weather::registry::CityRegistry;
use city_weather::tui::Tui;
use city_weather::weather::OpenWeatherClient;

#[derive(Parser)]
#[command(name = "city-weather")]
#[command(about = "Fetch current weather for a list of cities and keep favorites")]
#[command(version, author)]
struct Cli {
    /// Path to a JSON config file (default: ./city-weather.json if present)
    #[arg(long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Fetch weather for the given cities, or for all favorites")]
    Fetch(FetchArgs),
    #[command(about = "Show or edit the favorites list")]
    Favorites(FavoritesArgs),
    #[command(about = "Resolve a city name to coordinates")]
    Validate(ValidateArgs),
}

#[derive(Args)]
struct FetchArgs {
    cities: Vec<String>,
}

#[derive(Args)]
struct FavoritesArgs {
    #[command(subcommand)]
    command: Option<FavoritesCommand>,
}

#[derive(Subcommand)]
enum FavoritesCommand {
    #[command(about = "List favorites")]
    List,
    #[command(about = "Add cities to favorites")]
    Add { cities: Vec<String> },
    #[command(about = "Remove cities from favorites")]
    Remove { cities: Vec<String> },
}

#[derive(Args)]
struct ValidateArgs {
    name: String,
}

type LiveApp = App<OpenWeatherGeocoder, OpenWeatherClient>;

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(error) = report.downcast_ref::<WeatherError>() {
            return ExitCode::from(map_exit_code(error));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &WeatherError) -> u8 {
    match error {
        WeatherError::Credential { .. }
        | WeatherError::ConfigRead(_)
        | WeatherError::ConfigParse(_) => 2,
        WeatherError::CityNotFound(_) => 2,
        WeatherError::WeatherHttp(_)
        | WeatherError::WeatherStatus { .. }
        | WeatherError::WeatherParse(_)
        | WeatherError::GeocodeHttp(_) => 3,
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
    let config = ConfigLoader::resolve(cli.config.as_deref())?;
    let api_key = ApiKey::from_file(&config.key_file)?;

    match cli.command {
        None => {
            let mut app = build_app(&config, api_key)?;
            app.load_favorites();
            Tui::new().run(&mut app)
        }
        Some(Commands::Fetch(args)) => run_fetch(args, &config, api_key),
        Some(Commands::Favorites(args)) => run_favorites(args, &config, api_key),
        Some(Commands::Validate(args)) => {
            let geocoder = OpenWeatherGeocoder::new(&config, api_key)?;
            let coordinates = geocoder.validate(&args.name)?;
            JsonOutput::print_validate(&ValidateResult {
                name: args.name,
                coordinates,
            })
            .into_diagnostic()
        }
    }
}

fn build_app(config: &ResolvedConfig, api_key: ApiKey) -> Result<LiveApp, WeatherError> {
    let geocoder = OpenWeatherGeocoder::new(config, api_key.clone())?;
    let weather = OpenWeatherClient::new(config, api_key)?;
    Ok(App::new(
        CityRegistry::seeded(),
        FavoritesStore::new(config.favorites_file.clone()),
        geocoder,
        weather,
    ))
}

fn run_fetch(args: FetchArgs, config: &ResolvedConfig, api_key: ApiKey) -> miette::Result<()> {
    let mut app = build_app(config, api_key)?;
    app.load_favorites();

    if args.cities.is_empty() {
        let favorites: Vec<String> = app.favorites().iter().cloned().collect();
        for name in favorites {
            app.mark(&name);
        }
    } else {
        app.select_names(&args.cities);
    }

    let report = app.fetch_blocking(&JsonOutput)?;
    JsonOutput::print_fetch(&report).into_diagnostic()
}

fn run_favorites(
    args: FavoritesArgs,
    config: &ResolvedConfig,
    api_key: ApiKey,
) -> miette::Result<()> {
    let mut app = build_app(config, api_key)?;
    app.load_favorites();

    let result = match args.command.unwrap_or(FavoritesCommand::List) {
        FavoritesCommand::List => FavoritesResult::new(0, app.favorites()),
        FavoritesCommand::Add { cities } => {
            app.select_names(&cities);
            let added = app.add_favorites()?;
            FavoritesResult::new(added, app.favorites())
        }
        FavoritesCommand::Remove { cities } => {
            for name in &cities {
                if !app.mark(name) {
                    tracing::warn!(city = %name, "not a known city");
                }
            }
            let removed = app.remove_favorites()?;
            FavoritesResult::new(removed, app.favorites())
        }
    };
    JsonOutput::print_favorites(&result).into_diagnostic()
}
