//! Operational CLI for the aggregate cache.
//!
//! External caller of the core: key inspection, per-user purge, and the
//! destructive flush actions, the latter gated behind `--yes`.

use clap::{Parser, Subcommand};

use acorn_cache::{AggregateCache, CacheConfig, Value};

#[derive(Parser)]
#[command(name = "acornctl", about = "Aggregate cache operations tool", version)]
struct Args {
  /// Backend host
  #[arg(short = 'H', long, default_value = "localhost", env = "ACORN_HOST")]
  host: String,

  /// Backend port
  #[arg(short = 'p', long, default_value = "6379", env = "ACORN_PORT")]
  port: u16,

  /// Backend password
  #[arg(long, env = "ACORN_PASSWORD")]
  password: Option<String>,

  /// Backend database number
  #[arg(long, default_value = "0")]
  database: u8,

  /// Read connection settings from a YAML file instead of flags
  #[arg(short, long)]
  config: Option<String>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand)]
enum Command {
  /// Check the backend is reachable
  Ping,
  /// Get a value by key
  Get {
    /// The cache key
    key: String,
  },
  /// Set a value with optional TTL
  Set {
    /// The cache key
    key: String,
    /// The value; parsed as JSON when possible, stored as text otherwise
    value: String,
    /// TTL in seconds (0 = no expiry; omit for the configured default)
    #[arg(short, long)]
    ttl: Option<u64>,
  },
  /// Delete a key
  Del {
    /// The cache key
    key: String,
  },
  /// List keys matching a glob pattern
  Keys {
    /// Pattern to match (e.g., "user_*")
    #[arg(default_value = "*")]
    pattern: String,
  },
  /// Show store-wide stats (key count, memory, hit rate)
  Info,
  /// Flush the entire store
  Flush {
    /// Confirm the destructive flush
    #[arg(long)]
    yes: bool,
  },
  /// Delete every key matching a glob pattern
  FlushPattern {
    /// Pattern to match (e.g., "user_*")
    pattern: String,
    /// Confirm the destructive eviction
    #[arg(long)]
    yes: bool,
  },
  /// Drop the cached records for one user to force recomputation
  PurgeUser {
    /// The user id
    id: u64,
  },
}

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
  tracing_subscriber::fmt()
    .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
    .init();

  let args = Args::parse();
  let config = match &args.config {
    Some(path) => CacheConfig::load(path)?,
    None => CacheConfig {
      host: args.host.clone(),
      port: args.port,
      password: args.password.clone(),
      database: args.database,
      ..CacheConfig::default()
    },
  };

  let cache = AggregateCache::connect(&config).await.map_err(|e| {
    anyhow::anyhow!(
      "failed to connect to cache backend at {}:{}: {}",
      config.host,
      config.port,
      e
    )
  })?;

  run(&cache, &args.command).await
}

async fn run(cache: &AggregateCache, command: &Command) -> Result<(), anyhow::Error> {
  match command {
    Command::Ping => {
      cache.ping().await?;
      println!("PONG");
    }
    Command::Get { key } => match cache.get(key).await? {
      Some(value) => println!("{}", serde_json::to_string_pretty(&value)?),
      None => println!("(nil)"),
    },
    Command::Set { key, value, ttl } => {
      cache.set(key, &Value::parse(value), *ttl).await?;
      println!("OK");
    }
    Command::Del { key } => {
      if cache.delete(key).await? {
        println!("deleted {}", key);
      } else {
        println!("{} not found", key);
      }
    }
    Command::Keys { pattern } => {
      let mut keys = cache.keys(pattern).await?;
      keys.sort();
      for key in keys {
        println!("{}", key);
      }
    }
    Command::Info => {
      let stats = cache.stats().await?;
      println!("keys:         {}", stats.keys);
      println!("memory_used:  {}", stats.memory_used);
      println!("memory_limit: {}", stats.memory_limit);
      println!("get_attempts: {}", stats.get_attempts());
      println!("hits:         {}", stats.hits);
      println!("misses:       {}", stats.misses);
      println!("hit_rate:     {:.1}%", stats.hit_rate() * 100.0);
    }
    Command::Flush { yes } => {
      if !*yes {
        anyhow::bail!("refusing to flush the entire store without --yes");
      }
      cache.flush_all().await?;
      println!("OK");
    }
    Command::FlushPattern { pattern, yes } => {
      if !*yes {
        anyhow::bail!("refusing pattern eviction without --yes");
      }
      let removed = cache.flush_pattern(pattern).await?;
      println!("removed {} keys", removed);
    }
    Command::PurgeUser { id } => {
      for key in user_cache_keys(*id) {
        if cache.delete(&key).await? {
          println!("  {}: cleared", key);
        } else {
          println!("  {}: not found", key);
        }
      }
    }
  }
  Ok(())
}

/// The fixed key set cached per user; purging all of them forces the next
/// request to recompute from the database.
fn user_cache_keys(id: u64) -> [String; 3] {
  [
    format!("user_{}", id),
    format!("user_stats_{}", id),
    format!("user_session_{}", id),
  ]
}
