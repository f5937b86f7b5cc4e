use anyhow::Result;
use structopt::StructOpt;

#[derive(Debug)]
pub struct Config {
    /// Enables verbose logging of error causes
    pub debug: bool,

    /// The color label value identifying the time series to write
    pub color: String,

    /// The size label value identifying the time series to write
    pub size: String,

    /// The number of shirts of this color and size in inventory
    pub count: i64,

    /// The base url of the cloud monitoring api
    pub monitoring_url: String,

    /// The base url of the instance metadata service
    pub metadata_url: String,
}

impl Config {
    /// Loads configuration from arguments, env and dotenv
    pub fn load() -> Result<Config> {
        // Attempts to find a `.env` file to initialize/extend the environment
        dotenv::dotenv().ok();

        Config::from_env(Environment::from_args())
    }

    fn from_env(env: Environment) -> Result<Config> {
        if env.color.is_empty() {
            return Err(anyhow::format_err!("invalid COLOR"));
        }
        if env.size.is_empty() {
            return Err(anyhow::format_err!("invalid SIZE"));
        }
        Ok(Config {
            debug: env.debug,
            color: env.color,
            size: env.size,
            count: env.count,
            monitoring_url: env.monitoring_url,
            metadata_url: env.metadata_url,
        })
    }
}

#[derive(Debug, StructOpt)]
#[structopt(name = "inventory-metric")]
struct Environment {
    /// Enables verbose logging of error causes
    #[structopt(short, long)]
    debug: bool,

    /// The color of shirt being counted
    #[structopt(long)]
    color: String,

    /// The size of shirt being counted
    #[structopt(long)]
    size: String,

    /// The number of shirts of this color and size in inventory
    #[structopt(long)]
    count: i64,

    /// The base url of the cloud monitoring api
    #[structopt(
        long,
        env = "MONITORING_URL",
        default_value = "https://www.googleapis.com/cloudmonitoring/v2beta2"
    )]
    monitoring_url: String,

    /// The base url of the instance metadata service
    #[structopt(
        long,
        env = "METADATA_URL",
        default_value = "http://metadata.google.internal"
    )]
    metadata_url: String,
}
