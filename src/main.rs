//! trainbuf - drives the buffer manager with a random fix/unfix workload

use anyhow::{Context, Result};
use clap::Parser as ClapParser;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::path::PathBuf;
use trainbuf::storage::{
    BufferConfig, BufferError, BufferKind, BufferManager, FileStore, MemoryStore, TrainGuard,
    TrainId, TrainStore,
};

/// trainbuf - clock buffer pool workload runner
#[derive(ClapParser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Frames in the page pool
    #[arg(long, default_value = "64")]
    page_buffers: usize,

    /// Frames in the large-object train pool
    #[arg(long, default_value = "16")]
    train_buffers: usize,

    /// Data directory; trains are kept in memory when omitted
    #[arg(short = 'D', long)]
    data_dir: Option<PathBuf>,

    /// Number of fix operations to run
    #[arg(short = 'n', long, default_value = "10000")]
    ops: usize,

    /// Distinct trains touched per pool
    #[arg(short = 'w', long, default_value = "256")]
    working_set: u32,

    /// Trains held pinned at once per pool
    #[arg(long, default_value = "4")]
    max_pinned: usize,

    /// Random seed
    #[arg(short, long, default_value = "42")]
    seed: u64,

    /// Request bulk flush mode (unsupported, for checking the failure path)
    #[arg(long)]
    bulk_flush: bool,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = if args.debug { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();

    let config = BufferConfig::new(args.page_buffers, args.train_buffers)
        .with_bulk_flush(args.bulk_flush);

    let store: Box<dyn TrainStore> = match &args.data_dir {
        Some(dir) => {
            println!("📁 Data directory: {}", dir.display());
            Box::new(FileStore::open(dir).context("Failed to open data directory")?)
        }
        None => {
            println!("🧠 Keeping trains in memory");
            Box::new(MemoryStore::new())
        }
    };

    let manager = BufferManager::new(config, store);
    run_workload(&manager, &args)?;
    manager.flush_all().context("Failed to flush buffers")?;

    for kind in BufferKind::ALL {
        let stats = manager.stats(kind);
        println!("📊 {} pool:", kind);
        println!("   - Hits: {}", stats.hits);
        println!("   - Misses: {}", stats.misses);
        println!("   - Evictions: {}", stats.evictions);
        println!("   - Flushes: {}", stats.flushes);
    }

    Ok(())
}

fn run_workload(manager: &BufferManager, args: &Args) -> Result<()> {
    let mut rng = StdRng::seed_from_u64(args.seed);
    let working_set = args.working_set.max(1);
    let mut created = [
        vec![false; working_set as usize],
        vec![false; working_set as usize],
    ];
    let mut held: [Vec<TrainGuard>; 2] = [Vec::new(), Vec::new()];
    let mut busy = 0usize;

    for _ in 0..args.ops {
        let slot = rng.gen_range(0..2);
        let kind = BufferKind::ALL[slot];

        let full = held[slot].len() >= args.max_pinned.max(1);
        if full || (!held[slot].is_empty() && rng.gen_bool(0.5)) {
            let index = rng.gen_range(0..held[slot].len());
            drop(held[slot].swap_remove(index));
            continue;
        }

        let page_no = rng.gen_range(0..working_set);
        let key = train_key(page_no, kind)?;
        let result = if created[slot][page_no as usize] {
            manager.pin(key, kind)
        } else {
            manager.pin_new(key, kind)
        };

        let guard = match result {
            Ok(guard) => guard,
            Err(BufferError::NoUnfixedBuffer { .. }) => {
                busy += 1;
                continue;
            }
            Err(e) => return Err(e).with_context(|| format!("Failed to fix {} ({})", key, kind)),
        };

        if !created[slot][page_no as usize] {
            guard.write(|data| data[..4].copy_from_slice(&page_no.to_le_bytes()))?;
            created[slot][page_no as usize] = true;
        } else {
            let stored =
                guard.read(|data| u32::from_le_bytes([data[0], data[1], data[2], data[3]]))?;
            anyhow::ensure!(stored == page_no, "train {} holds {} instead", key, stored);
        }
        held[slot].push(guard);
    }

    if busy > 0 {
        log::warn!("{} fix requests found every frame pinned", busy);
    }
    Ok(())
}

/// Key of the `index`-th train of `kind` on volume 0.
fn train_key(index: u32, kind: BufferKind) -> Result<TrainId> {
    let page_no = index
        .checked_mul(kind.pages_per_train() as u32)
        .with_context(|| format!("Train {} of kind {} is past the last page", index, kind))?;
    Ok(TrainId::new(0, page_no))
}
