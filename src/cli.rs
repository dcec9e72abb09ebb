use clap::Parser;
use std::path::PathBuf;

/// Entities extracted when neither the command line nor the config names any
pub const DEFAULT_ENTITIES: &str = "account,contact,customeraddress";

#[derive(Parser, Debug)]
#[command(name = "dyn365-schema", version)]
#[command(about = "Extract Dynamics 365 entity metadata into XML files for source control")]
pub struct Cli {
    /// Path to the output folder (defaults to the current directory)
    #[arg(short = 'f', long = "source-folder", value_name = "PATH")]
    pub source_folder: Option<PathBuf>,

    /// Connection string, e.g. "AuthType=OAuth;Url=https://org.crm.dynamics.com;Username=...;Password=...;ClientId=..."
    #[arg(short = 'c', long = "connection-string", value_name = "STRING")]
    pub connection_string: Option<String>,

    /// Comma-separated entity logical names [default: account,contact,customeraddress]
    #[arg(short = 'e', long = "entities", value_name = "LIST")]
    pub entities: Option<String>,

    /// Config file to read instead of the default location
    #[arg(long = "config", value_name = "PATH")]
    pub config: Option<PathBuf>,
}
