//! ELA Wallet CLI Application
//!
//! Offline multi-signature wallet client: build, sign, exchange and
//! broadcast transfer transactions.

use clap::{ArgGroup, Args, Parser, Subcommand};
use ela_wallet::cli::{self, InfoQuery, Payment};
use ela_wallet::config::WalletConfig;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "ela-wallet")]
#[command(version = "0.1.0")]
#[command(about = "Offline multi-signature wallet client", long_about = None)]
struct Cli {
    /// Data directory holding the keystore and config.json
    #[arg(short, long, env = "ELA_WALLET_DATA_DIR", default_value = ".wallet_data")]
    data_dir: PathBuf,

    /// Node JSON-RPC endpoint
    #[arg(long, env = "ELA_WALLET_RPC_URL")]
    rpc_url: Option<String>,

    /// Directory transaction files are written to
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Account management
    Account {
        #[command(subcommand)]
        action: AccountCommands,
    },

    /// Transaction operations
    Tx {
        #[command(subcommand)]
        action: TxCommands,
    },

    /// Query the node
    Info(InfoArgs),

    /// Derive the cross-chain address of a side chain genesis block
    Genesis {
        /// Genesis block hash (hex)
        #[arg(long)]
        hash: String,
    },
}

#[derive(Subcommand)]
enum AccountCommands {
    /// Create a new standard account
    New {
        #[arg(short, long)]
        label: Option<String>,
    },

    /// Import a private key (hex)
    Import {
        #[arg(short, long)]
        key: String,

        #[arg(short, long)]
        label: Option<String>,
    },

    /// Register an M-of-N multisig account
    Multisig {
        /// Required signatures
        #[arg(short)]
        m: usize,

        /// Participant public keys (hex, comma separated)
        #[arg(long, value_delimiter = ',', required = true)]
        pubkeys: Vec<String>,

        #[arg(short, long)]
        label: Option<String>,
    },

    /// List all accounts
    List,

    /// Show account balance
    Balance {
        /// Address or label (all accounts if omitted)
        #[arg(short, long)]
        address: Option<String>,
    },
}

#[derive(Args)]
struct TxInput {
    /// Transaction file
    #[arg(short, long, conflicts_with = "hex")]
    file: Option<PathBuf>,

    /// Transaction hex string
    #[arg(long)]
    hex: Option<String>,
}

#[derive(Subcommand)]
enum TxCommands {
    /// Build an unsigned transaction
    Create {
        /// Sender address or label
        #[arg(long)]
        from: Option<String>,

        /// Receiver address
        #[arg(long, requires = "amount", conflicts_with = "file")]
        to: Option<String>,

        /// Amount to transfer
        #[arg(long, requires = "to")]
        amount: Option<String>,

        /// Multi-output batch file (address,amount per line)
        #[arg(short, long)]
        file: Option<PathBuf>,

        /// Transaction fee
        #[arg(long)]
        fee: String,

        /// Output lock height
        #[arg(long)]
        lock: Option<String>,
    },

    /// Add a signature
    Sign {
        /// Signing account address or label
        #[arg(short, long)]
        identity: String,

        #[command(flatten)]
        input: TxInput,
    },

    /// Broadcast a fully signed transaction
    Send {
        #[command(flatten)]
        input: TxInput,
    },

    /// Show transaction contents and signing progress
    Decode {
        #[command(flatten)]
        input: TxInput,
    },
}

#[derive(Args)]
#[command(group(ArgGroup::new("query").required(true)))]
struct InfoArgs {
    /// Number of connected peers
    #[arg(long, group = "query")]
    connections: bool,

    /// Neighbor nodes
    #[arg(long, alias = "nbr", group = "query")]
    neighbor: bool,

    /// Node state
    #[arg(long, group = "query")]
    state: bool,

    /// Current block count
    #[arg(long, alias = "currentheight", group = "query")]
    height: bool,

    /// Block by height or hash
    #[arg(long, group = "query")]
    block: Option<String>,

    /// Block hash at height
    #[arg(long, group = "query")]
    blockhash: Option<u32>,

    /// Transaction by hash
    #[arg(long, group = "query")]
    tx: Option<String>,

    /// Latest block hash
    #[arg(long, alias = "bbh", group = "query")]
    bestblockhash: bool,

    /// Transactions in the node's pool
    #[arg(long, group = "query")]
    txpool: bool,
}

impl InfoArgs {
    fn query(self) -> Option<InfoQuery> {
        if self.connections {
            Some(InfoQuery::Connections)
        } else if self.neighbor {
            Some(InfoQuery::Neighbors)
        } else if self.state {
            Some(InfoQuery::State)
        } else if self.height {
            Some(InfoQuery::Height)
        } else if let Some(block) = self.block {
            Some(InfoQuery::Block(block))
        } else if let Some(height) = self.blockhash {
            Some(InfoQuery::BlockHash(height))
        } else if let Some(hash) = self.tx {
            Some(InfoQuery::Transaction(hash))
        } else if self.bestblockhash {
            Some(InfoQuery::BestBlockHash)
        } else if self.txpool {
            Some(InfoQuery::TxPool)
        } else {
            None
        }
    }
}

fn run(cli: Cli) -> cli::CliResult<()> {
    let config =
        WalletConfig::load(&cli.data_dir)?.with_overrides(cli.rpc_url, cli.output_dir);

    match cli.command {
        Commands::Account { action } => match action {
            AccountCommands::New { label } => cli::cmd_account_new(&config, label),
            AccountCommands::Import { key, label } => {
                cli::cmd_account_import(&config, &key, label)
            }
            AccountCommands::Multisig { m, pubkeys, label } => {
                cli::cmd_account_multisig(&config, m, &pubkeys, label)
            }
            AccountCommands::List => cli::cmd_account_list(&config),
            AccountCommands::Balance { address } => {
                cli::cmd_account_balance(&config, address.as_deref())
            }
        },

        Commands::Tx { action } => match action {
            TxCommands::Create {
                from,
                to,
                amount,
                file,
                fee,
                lock,
            } => {
                let payment = match (file, to, amount) {
                    (Some(path), _, _) => Payment::Batch(path),
                    (None, Some(to), Some(amount)) => Payment::Single { to, amount },
                    _ => return Err("use --to and --amount, or --file for multiple outputs".into()),
                };
                cli::cmd_tx_create(&config, from.as_deref(), &fee, lock.as_deref(), payment)
            }
            TxCommands::Sign { identity, input } => {
                let source = cli::tx_source(input.file.as_deref(), input.hex.as_deref())?;
                cli::cmd_tx_sign(&config, &identity, &source)
            }
            TxCommands::Send { input } => {
                let source = cli::tx_source(input.file.as_deref(), input.hex.as_deref())?;
                cli::cmd_tx_send(&config, &source)
            }
            TxCommands::Decode { input } => {
                let source = cli::tx_source(input.file.as_deref(), input.hex.as_deref())?;
                cli::cmd_tx_decode(&source)
            }
        },

        Commands::Info(args) => match args.query() {
            Some(query) => cli::cmd_info(&config, query),
            None => Err("choose one query flag, see --help".into()),
        },

        Commands::Genesis { hash } => cli::cmd_genesis(&hash),
    }
}

fn main() {
    let cli = Cli::parse();

    // Initialize logger
    let filter = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(filter)).init();

    if let Err(e) = run(cli) {
        eprintln!("❌ Error: {}", e);
        std::process::exit(1);
    }
}
