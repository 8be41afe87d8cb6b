// Copyright (c) Meta Platforms, Inc. and affiliates.

// This software may be used and distributed according to the terms of the
// GNU General Public License version 2.

use anyhow::bail;
use anyhow::Context;
use anyhow::Result;
use clap::Parser;
use clap::Subcommand;
use clap::ValueEnum;
use log::debug;
use log::info;
use tracing_subscriber::filter::EnvFilter;

use rdt_utils::config;
use rdt_utils::parse_validated;
use rdt_utils::AllocCaps;
use rdt_utils::Bitmask;
use rdt_utils::CacheAllocation;
use rdt_utils::Capability;
use rdt_utils::Caps;
use rdt_utils::Config;
use rdt_utils::Constraints;
use rdt_utils::NewPool;

#[derive(Debug, Parser)]
#[command(name = "rdtctl")]
#[command(version)]
#[command(
    about = "Check core lists and cache allocation bitmasks before sending them to the RDT backend"
)]
struct Opts {
    /// Specify the logging level. Accepts rust's envfilter syntax for modular
    /// logging: https://docs.rs/tracing-subscriber/latest/tracing_subscriber/filter/struct.EnvFilter.html#example-syntax. Examples: ["info", "warn,rdt_utils=debug"]
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Read limits from this file instead of /etc/rdt_utils/config.toml or
    /// /etc/rdt_utils.toml.
    #[arg(long)]
    config: Option<String>,

    #[command(subcommand)]
    command: SubCmd,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ListKind {
    Cores,
    Pids,
}

#[derive(Debug, Subcommand)]
enum SubCmd {
    /// Validate a core or PID list and print it expanded
    Parse(ParseArgs),

    /// Show a CBM one cache way at a time, optionally flipping ways
    Cbm(CbmArgs),

    /// Print the body of a pool creation request
    NewPool(NewPoolArgs),
}

#[derive(Debug, Parser)]
struct ParseArgs {
    /// Range list, e.g. 0-3,8
    list: String,

    #[arg(long, value_enum, default_value_t = ListKind::Cores)]
    kind: ListKind,
}

#[derive(Debug, Parser)]
struct CbmArgs {
    /// CBM in decimal or 0x-prefixed hexadecimal
    value: String,

    /// Number of cache ways
    #[arg(long)]
    ways: usize,

    /// Way index to flip, 0 being the highest way. May be repeated.
    #[arg(long = "toggle")]
    toggles: Vec<usize>,
}

#[derive(Debug, Parser)]
struct NewPoolArgs {
    #[arg(long)]
    name: String,

    /// Range list of the pool's cores
    #[arg(long)]
    cores: String,

    /// Number of L3 cache ways, enables L3 CAT
    #[arg(long)]
    l3_ways: Option<usize>,

    /// L3 CDP is enabled
    #[arg(long)]
    l3_cdp: bool,

    /// Number of L2 cache ways, enables L2 CAT
    #[arg(long)]
    l2_ways: Option<usize>,

    /// L2 CDP is enabled
    #[arg(long)]
    l2_cdp: bool,

    /// MBA is supported
    #[arg(long)]
    mba: bool,

    /// The MBA controller is enabled, bandwidth is set in MBps
    #[arg(long)]
    mba_ctrl: bool,
}

fn init_log(log_level: &str) {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| match EnvFilter::try_new(log_level) {
            Ok(filter) => Ok(filter),
            Err(e) => {
                eprintln!(
                    "invalid log envvar: {}, using info, err is: {}",
                    log_level, e
                );
                EnvFilter::try_new("info")
            }
        })
        .unwrap_or_else(|_| EnvFilter::new("info"));

    match tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .try_init()
    {
        Ok(()) => {}
        Err(e) => eprintln!("failed to init logger: {}", e),
    }
}

fn parse_cbm(value: &str) -> Result<u64> {
    let cbm = match value.strip_prefix("0x") {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => value.parse::<u64>(),
    };
    cbm.with_context(|| format!("Failed to parse CBM {}", value))
}

fn cmd_parse(args: &ParseArgs, config: &Config) -> Result<()> {
    let constraints = match args.kind {
        ListKind::Cores => Constraints::cores(config),
        ListKind::Pids => Constraints::pids(config),
    };

    let list = match parse_validated(&args.list, &constraints) {
        Ok(list) => list,
        Err(res) => bail!("Invalid {} list '{}': {}", constraints.what, args.list, res),
    };

    info!("{} {}", list.len(), constraints.what);
    println!("{}", serde_json::to_string(&list)?);
    println!("{}", list);
    Ok(())
}

fn cmd_cbm(args: &CbmArgs) -> Result<()> {
    let mut mask = Bitmask::from_cbm(parse_cbm(&args.value)?, args.ways)?;
    println!("{}", mask);

    for &index in args.toggles.iter() {
        if index >= mask.width() {
            bail!("Way index {} out of range for {} ways", index, mask.width());
        }
        mask.toggle(index);
        debug!("toggled way {}: {}", index, mask);
    }

    if !args.toggles.is_empty() {
        println!("{}", mask);
    }
    println!("{} ({:#x})", mask.to_cbm(), mask.to_cbm());
    Ok(())
}

fn cache_allocation(ways: usize, cdp: bool) -> CacheAllocation {
    CacheAllocation {
        cw_num: ways,
        cdp_enabled: cdp,
        cdp_supported: cdp,
        ..Default::default()
    }
}

fn cmd_new_pool(args: &NewPoolArgs, config: &Config) -> Result<()> {
    let mut capabilities = vec![];
    if args.l3_ways.is_some() {
        capabilities.push(Capability::L3cat.as_str().to_string());
    }
    if args.l2_ways.is_some() {
        capabilities.push(Capability::L2cat.as_str().to_string());
    }
    if args.mba || args.mba_ctrl {
        capabilities.push(Capability::Mba.as_str().to_string());
    }

    let caps = AllocCaps {
        caps: Caps { capabilities },
        l3cat: args.l3_ways.map(|ways| cache_allocation(ways, args.l3_cdp)),
        l2cat: args.l2_ways.map(|ways| cache_allocation(ways, args.l2_cdp)),
        mba_ctrl_enabled: args.mba_ctrl,
    };

    let pool = NewPool::build(&args.name, &args.cores, &caps, config)?;
    println!("{}", serde_json::to_string_pretty(&pool)?);
    Ok(())
}

fn main() -> Result<()> {
    let opts = Opts::parse();
    init_log(&opts.log_level);
    debug!("opts={:?}", &opts);

    let config = match &opts.config {
        Some(path) => config::parse_config_file(path)?,
        None => config::init_config()?,
    };

    match &opts.command {
        SubCmd::Parse(args) => cmd_parse(args, &config),
        SubCmd::Cbm(args) => cmd_cbm(args),
        SubCmd::NewPool(args) => cmd_new_pool(args, &config),
    }
}
