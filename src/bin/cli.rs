//! ruledb CLI
//!
//! Offline administration of a store file. Takes the same exclusive lock
//! as the server, so it refuses to run against a store that is being served.

use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use ruledb::{Config, Rule, RuleRepository, Store};
use tracing_subscriber::{fmt, EnvFilter};

/// ruledb CLI
#[derive(Parser, Debug)]
#[command(name = "ruledb-cli")]
#[command(about = "CLI for a ruledb store file")]
struct Args {
    /// Store file
    #[arg(short, long, default_value = "./ruledb.db")]
    db_path: PathBuf,

    /// Bucket holding the rules
    #[arg(short, long, default_value = ruledb::DEFAULT_BUCKET)]
    bucket: String,

    /// How long to wait for the store file lock (milliseconds)
    #[arg(long, default_value = "1000")]
    lock_timeout_ms: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List every rule
    List {
        /// Print stored values verbatim instead of decoding them
        #[arg(long)]
        raw: bool,
    },

    /// Create or replace a rule
    Set {
        /// The ip the rule applies to
        ip: String,

        /// Drop traffic from the ip (default: allow)
        #[arg(long)]
        drop: bool,

        /// Organization tag
        #[arg(long)]
        org: Option<String>,
    },

    /// Delete a rule
    Del {
        /// The ip to delete
        ip: String,
    },

    /// Write a snapshot of the store to a file
    Backup {
        /// Output file
        out: PathBuf,
    },

    /// Show bucket and file statistics
    Stats,

    /// Rewrite the store file without superseded commits
    Compact,
}

fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    fmt().with_env_filter(filter).with_target(false).init();

    let args = Args::parse();

    if let Err(e) = run(args) {
        eprintln!("error: {}", e);
        process::exit(1);
    }
}

fn run(args: Args) -> ruledb::Result<()> {
    let config = Config::builder()
        .db_path(&args.db_path)
        .lock_timeout(Duration::from_millis(args.lock_timeout_ms))
        .default_bucket(&args.bucket)
        .build();

    let store = Arc::new(Store::open(config)?);
    let repo = RuleRepository::new(Arc::clone(&store));

    match args.command {
        Commands::List { raw: true } => {
            for (key, value) in repo.list_all()? {
                println!("{}\t{}", key, String::from_utf8_lossy(&value));
            }
        }
        Commands::List { raw: false } => {
            let listing = repo.list_rules()?;
            for rule in &listing.rules {
                println!(
                    "{}\t{}\t{}",
                    rule.ip,
                    if rule.is_drop { "drop" } else { "allow" },
                    rule.org_id.as_deref().unwrap_or("-")
                );
            }
            for e in &listing.errors {
                eprintln!("skipped: {}", e);
            }
        }
        Commands::Set { ip, drop, org } => {
            let mut rule = Rule::new(ip, drop);
            rule.org_id = org;
            repo.create_or_replace(&rule)?;
            println!("OK");
        }
        Commands::Del { ip } => {
            repo.delete(&ip)?;
            println!("OK");
        }
        Commands::Backup { out } => {
            let mut sink = BufWriter::new(File::create(&out)?);
            let written = repo.backup(&mut sink)?;
            println!("wrote {} bytes to {}", written, out.display());
        }
        Commands::Stats => {
            let stats = store.stats()?;
            println!("file:  {} ({} bytes)", stats.path.display(), stats.file_size);
            println!("txid:  {}", stats.txid);
            for (name, keys) in &stats.buckets {
                println!("bucket {}: {} keys", name, keys);
            }
        }
        Commands::Compact => {
            let result = store.compact()?;
            println!("{} -> {} bytes", result.bytes_before, result.bytes_after);
        }
    }

    store.close()
}
