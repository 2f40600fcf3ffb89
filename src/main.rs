//! Demonstration binary for the persistent indexed storage core.
//!
//! The line-oriented command scanner and the ticketing business logic it
//! would dispatch to are explicit non-goals of this crate (see SPEC_FULL.md
//! §1, §6). What is exercised here instead is the engine itself, end to end:
//! a user-lookup index (unique tree, `FixedString` key) and a station→train
//! inverted index (multi tree, composite key) built directly on
//! `storage_engine`, in the shape of the teacher's own `benchmarking/src/main.rs`.

use std::path::PathBuf;

use clap::Parser;
use common::fixed::FixedString;
use storage_engine::{BPlusTree, MultiBPlusTree};

type Username = FixedString<20>;
type StationName = FixedString<20>;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Directory to create the index files in.
    #[arg(short, long, default_value = "demo_data")]
    data_dir: PathBuf,

    /// Remove the data directory's contents before running.
    #[arg(short, long)]
    clean: bool,
}

fn main() {
    env_logger::init();
    let args = Args::parse();

    if args.clean && args.data_dir.exists() {
        std::fs::remove_dir_all(&args.data_dir).expect("failed to clean data directory");
    }
    std::fs::create_dir_all(&args.data_dir).expect("failed to create data directory");

    if let Err(e) = run(&args.data_dir) {
        log::error!("demonstration run failed: {e}");
        eprintln!("fatal: {e}");
        std::process::exit(1);
    }
}

fn run(data_dir: &std::path::Path) -> common::error::Result<()> {
    demo_user_index(data_dir)?;
    demo_station_index(data_dir)?;
    Ok(())
}

/// A user-lookup index: unique `username -> privilege` map, mirroring the
/// wrapper shape `original_source/src/userSystem.h` builds around one `BPT`.
fn demo_user_index(data_dir: &std::path::Path) -> common::error::Result<()> {
    println!("--- unique index: users ---");
    let users: BPlusTree<Username, i64> = BPlusTree::open(data_dir, "users")?;

    for (name, privilege) in [("alice", 10i64), ("bob", 3), ("carol", 7)] {
        users.assign(Username::new(name), privilege)?;
    }
    // Re-assigning an existing key overwrites in place; size is unaffected.
    users.assign(Username::new("bob"), 5)?;

    for name in ["alice", "bob", "carol", "dave"] {
        match users.find(&Username::new(name))? {
            Some(privilege) => println!("  {name}: privilege={privilege}"),
            None => println!("  {name}: not found"),
        }
    }
    println!("  size={}", users.size());

    users.erase(&Username::new("carol"))?;
    println!("  after erase(carol): size={}", users.size());

    println!("  forEach:");
    users.for_each(|name, privilege| {
        println!("    {} -> {privilege}", name.as_str());
        Ok(())
    })?;

    Ok(())
}

/// A station -> train inverted index: multi tree keyed by `(station, train)`,
/// mirroring the station lookup described in SPEC_FULL.md §1.
fn demo_station_index(data_dir: &std::path::Path) -> common::error::Result<()> {
    println!("--- multi index: station -> trains ---");
    let stations: MultiBPlusTree<StationName, i32> =
        MultiBPlusTree::open(data_dir, "station_trains")?;

    let routes = [
        ("Beijing", 101),
        ("Beijing", 102),
        ("Shanghai", 201),
        ("Beijing", 103),
        ("Shanghai", 201), // duplicate pair: insert is idempotent
    ];
    for (station, train) in routes {
        stations.insert(StationName::new(station), train)?;
    }

    for station in ["Beijing", "Shanghai", "Nanjing"] {
        let trains = stations.find(&StationName::new(station))?;
        println!("  {station}: {trains:?}");
    }
    println!("  size={}", stations.size());

    stations.erase(&StationName::new("Beijing"), &102)?;
    println!(
        "  after erase(Beijing, 102): {:?}",
        stations.find(&StationName::new("Beijing"))?
    );

    Ok(())
}
