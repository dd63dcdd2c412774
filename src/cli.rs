use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// YAML config file. Database credentials can also come from
    /// DB_USERNAME, DB_PASSWORD, DB_NAME, DB_HOST, DB_PORT and DB_DRIVER.
    #[clap(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create the place, admin code and alternate name tables.
    InitSchema {},

    /// Append GeoNames place dumps (e.g. cities15000.txt).
    /// Each file goes to geoname_<file name>.
    LoadPlaces {
        #[clap(required = true)]
        files: Vec<PathBuf>,
    },

    /// Append admin1CodesASCII.txt into admin_codes.
    LoadAdminCodes { file: PathBuf },

    /// Append alternateNamesV2.txt into alternate_names.
    LoadAlternateNames { file: PathBuf },

    /// Resolve city names to the closest known cities.
    Search {
        /// One or more city names, any language
        #[clap(required = true)]
        names: Vec<String>,

        /// Number of matches per name
        #[clap(short = 'k', long)]
        top_k: Option<usize>,
    },

    /// Build the index once, then resolve names typed at a prompt.
    Interactive {
        /// Number of matches per name
        #[clap(short = 'k', long)]
        top_k: Option<usize>,
    },
}
