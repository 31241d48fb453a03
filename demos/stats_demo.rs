use std::collections::hash_map::DefaultHasher;
use std::hash::Hash;
use std::hash::Hasher;

use clap::Parser;
use robin_arena::HashMap;
use robin_arena::layout::map_buffer_size;

#[derive(Parser, Debug)]
struct Args {
    #[arg(short = 'c', long = "target_capacity", default_value_t = 1000)]
    target_capacity: usize,

    /// Fraction of entries removed and reinserted under fresh keys after the
    /// initial fill.
    #[arg(short = 'r', long = "churn", default_value_t = 0.0)]
    churn: f64,
}

fn hash_u64(value: u64) -> u32 {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish() as u32
}

fn main() {
    let args = Args::parse();

    println!(
        "Creating HashMap with target capacity: {}",
        args.target_capacity
    );

    let mut buffer = vec![0u8; map_buffer_size::<u64, u64>(args.target_capacity)];
    let mut map: HashMap<'_, u64, u64> = HashMap::new(&mut buffer);

    println!("Actual capacity: {}", map.capacity());
    println!("Filling map with u64 values...");

    let mut num_failures = 0;
    let num_values = args.target_capacity as u64;
    for key in 0..num_values {
        if map.insert(hash_u64(key), key, key * 2).is_err() {
            num_failures += 1;
        }
    }

    let churned = (num_values as f64 * args.churn) as u64;
    for key in 0..churned {
        map.remove(hash_u64(key), &key);
        let fresh = num_values + key;
        if map.insert(hash_u64(fresh), fresh, fresh * 2).is_err() {
            num_failures += 1;
        }
    }

    println!("Inserted {} values into map", map.len());
    println!(
        "Final load factor: {:.2}% (migration due: {})",
        map.load_factor() * 100.0,
        map.needs_migration()
    );

    map.as_table().probe_histogram().print();
    map.as_table().debug_stats().print();
    println!(
        "Number of failed inserts: {} ({:.02}%)",
        num_failures,
        num_failures as f64 / (num_values + churned).max(1) as f64 * 100.0
    );

    if churned > 0 {
        let mut fresh = vec![0u8; map_buffer_size::<u64, u64>(args.target_capacity)];
        match map.copy_to(&mut fresh) {
            Ok(migrated) => {
                println!("After migration:");
                migrated.as_table().debug_stats().print();
            }
            Err(err) => println!("Migration failed: {err}"),
        }
    }
}
