use clap::{ArgAction, Args, Parser, Subcommand};

use crate::forms::CustomerPatch;
use crate::model::{CustomerId, FilmId};

#[derive(Parser, Debug, Clone)]
#[command(
    name = "dvdadmin",
    version,
    about = "DVD rental store admin client",
    long_about = "dvdadmin manages customers, films and rentals of a DVD rental store through its REST backend.\n\nExamples:\n  dvdadmin customers list -q smith\n  dvdadmin customers show 1\n  dvdadmin customers return 1 76\n  dvdadmin films rent 12 1\n  dvdadmin -b http://films.local/api overview\n\nTip: Use `dvdadmin config init` to write ~/.dvdadmin/config.yml and keep invocations short."
)]
pub struct CliArgs {
    #[arg(
        short = 'v',
        long = "verbose",
        visible_alias = "vb",
        action = ArgAction::Count,
        global = true,
        help_heading = "Output",
        help = "Increase log verbosity (-v, -vv, -vvv)."
    )]
    pub verbose: u8,

    #[arg(
        long = "no-color",
        visible_alias = "nc",
        global = true,
        help_heading = "Output",
        help = "Disable colored output."
    )]
    pub no_color: bool,

    #[arg(
        short = 'o',
        long = "output-format",
        visible_alias = "of",
        value_name = "FORMAT",
        global = true,
        help_heading = "Output",
        help = "Output format: text or json."
    )]
    pub output_format: Option<String>,

    #[arg(
        short = 'C',
        long = "config",
        visible_alias = "cfg",
        value_name = "FILE",
        global = true,
        help_heading = "Input",
        help = "Path to config file (defaults to ~/.dvdadmin/config.yml)."
    )]
    pub config: Option<String>,

    #[arg(
        short = 'b',
        long = "base-url",
        visible_alias = "url",
        value_name = "URL",
        global = true,
        help_heading = "Backend",
        help = "Backend API base URL (default http://localhost:8080/api)."
    )]
    pub base_url: Option<String>,

    #[arg(
        short = 'T',
        long = "timeout",
        visible_alias = "to",
        value_name = "SECONDS",
        global = true,
        help_heading = "Backend",
        help = "Request timeout in seconds."
    )]
    pub timeout: Option<u64>,

    #[arg(
        short = 'p',
        long = "proxy",
        visible_alias = "px",
        value_name = "URL",
        global = true,
        help_heading = "Backend",
        help = "Route requests through this proxy."
    )]
    pub proxy: Option<String>,

    #[arg(
        short = 'n',
        long = "page-size",
        visible_alias = "per-page",
        value_name = "N",
        global = true,
        help_heading = "Listing",
        help = "Rows per page."
    )]
    pub page_size: Option<usize>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Search, view and maintain customers.
    #[command(subcommand)]
    Customers(CustomerCommand),

    /// Browse films, check availability and rent.
    #[command(subcommand)]
    Films(FilmCommand),

    /// Actor rankings.
    #[command(subcommand)]
    Actors(ActorCommand),

    /// Top films and top actors side by side.
    Overview,

    /// Manage the config file.
    #[command(subcommand)]
    Config(ConfigCommand),
}

#[derive(Args, Debug, Clone)]
pub struct ListArgs {
    #[arg(
        short = 'q',
        long = "query",
        visible_alias = "search",
        value_name = "TEXT",
        help = "Case-insensitive search text."
    )]
    pub query: Option<String>,

    #[arg(
        short = 'P',
        long = "page",
        value_name = "N",
        default_value_t = 1,
        help = "Page to show (clamped into range)."
    )]
    pub page: usize,
}

#[derive(Args, Debug, Clone, Default)]
pub struct CustomerFields {
    #[arg(long = "first-name", value_name = "NAME", help_heading = "Customer")]
    pub first_name: Option<String>,

    #[arg(long = "last-name", value_name = "NAME", help_heading = "Customer")]
    pub last_name: Option<String>,

    #[arg(long = "email", value_name = "EMAIL", help_heading = "Customer")]
    pub email: Option<String>,

    #[arg(long = "address", value_name = "TEXT", help_heading = "Customer")]
    pub address: Option<String>,

    #[arg(long = "city", value_name = "TEXT", help_heading = "Customer")]
    pub city: Option<String>,

    #[arg(long = "district", value_name = "TEXT", help_heading = "Customer")]
    pub district: Option<String>,

    #[arg(long = "country", value_name = "TEXT", help_heading = "Customer")]
    pub country: Option<String>,

    #[arg(
        long = "postal-code",
        visible_alias = "zip",
        value_name = "TEXT",
        help_heading = "Customer"
    )]
    pub postal_code: Option<String>,

    #[arg(long = "phone", value_name = "TEXT", help_heading = "Customer")]
    pub phone: Option<String>,

    #[arg(
        short = 'f',
        long = "from-file",
        visible_alias = "ff",
        value_name = "FILE",
        help_heading = "Customer",
        help = "Read the customer from a JSON or YAML file instead of flags."
    )]
    pub from_file: Option<String>,
}

impl CustomerFields {
    pub fn has_field_flags(&self) -> bool {
        let patch = self.to_patch();
        patch != CustomerPatch::default()
    }

    pub fn to_patch(&self) -> CustomerPatch {
        CustomerPatch {
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            email: self.email.clone(),
            address: self.address.clone(),
            city: self.city.clone(),
            district: self.district.clone(),
            country: self.country.clone(),
            postal_code: self.postal_code.clone(),
            phone: self.phone.clone(),
        }
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum CustomerCommand {
    /// List customers, filtered by id or name.
    List(ListArgs),

    /// Show one customer with rental history.
    Show {
        #[arg(value_name = "CUSTOMER_ID")]
        id: CustomerId,
    },

    /// Create a customer.
    Add(CustomerFields),

    /// Update a customer; omitted fields are kept and empty ones are cleared.
    Edit {
        #[arg(value_name = "CUSTOMER_ID")]
        id: CustomerId,

        #[command(flatten)]
        fields: CustomerFields,
    },

    /// Delete a customer.
    Delete {
        #[arg(value_name = "CUSTOMER_ID")]
        id: CustomerId,

        #[arg(short = 'y', long = "yes", help = "Skip the confirmation prompt.")]
        yes: bool,
    },

    /// Return an outstanding rental of a customer.
    Return {
        #[arg(value_name = "CUSTOMER_ID")]
        customer_id: CustomerId,

        #[arg(value_name = "RENTAL_ID")]
        rental_id: String,
    },

    /// Page through customers interactively.
    Browse {
        #[arg(
            short = 'q',
            long = "query",
            visible_alias = "search",
            value_name = "TEXT"
        )]
        query: Option<String>,
    },
}

#[derive(Subcommand, Debug, Clone)]
pub enum FilmCommand {
    /// List films, filtered by title, category or actor.
    List(ListArgs),

    /// Show one film with its full details.
    Show {
        #[arg(value_name = "FILM_ID")]
        film_id: FilmId,
    },

    /// Top five most rented films.
    Top,

    /// Rented and available copies of a film.
    Availability {
        #[arg(value_name = "FILM_ID")]
        film_id: FilmId,
    },

    /// Rent a film to a customer.
    Rent {
        #[arg(value_name = "FILM_ID")]
        film_id: FilmId,

        #[arg(value_name = "CUSTOMER_ID")]
        customer_id: CustomerId,

        #[arg(
            short = 's',
            long = "staff-id",
            visible_alias = "staff",
            value_name = "ID",
            help = "Staff member recording the rental (defaults to config staff_id or 1)."
        )]
        staff_id: Option<i64>,
    },
}

#[derive(Subcommand, Debug, Clone)]
pub enum ActorCommand {
    /// Top five actors by rentals.
    Top,
}

#[derive(Subcommand, Debug, Clone)]
pub enum ConfigCommand {
    /// Write the default config file if it does not exist yet.
    Init {
        #[arg(value_name = "PATH")]
        path: Option<String>,
    },
}
