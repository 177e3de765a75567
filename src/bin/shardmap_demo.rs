//! Exercises a `HashTableMap` end to end: config load, inserts,
//! a table-wide observer, a removal, and a short iteration pass.

use shardmap::{Config, Event, HashTableMap, Map};
use std::sync::Arc;

fn main() {
    let config = Config::new();
    env_logger::Builder::new()
        .parse_filters(&config.log_level)
        .init();
    log::info!("shardmap-demo: starting with max_size={}", config.max_size);

    let map: HashTableMap<u64> = HashTableMap::with_config(&config);
    log::info!(
        "shardmap-demo: table ready, order={}, buckets={}",
        map.order(),
        map.bucket_count()
    );

    map.notify_add(
        None,
        Event::INSERTED | Event::DELETED | Event::REPLACED,
        Arc::new(|event, key, old, new, _| {
            log::info!(
                "shardmap-demo: {:?} key={:?} old={:?} new={:?}",
                event,
                String::from_utf8_lossy(key),
                old,
                new
            );
        }),
        (),
    )
    .expect("table-wide observer registration should succeed on a fresh table");

    for i in 0..8u64 {
        map.put(format!("key-{i}").as_bytes(), i * i);
    }
    log::info!("shardmap-demo: count after inserts = {}", map.count());

    map.put(b"key-0", 100);
    map.rm(b"key-1");

    let mut iter = map.iter(None);
    let mut visited = 0;
    while let Some((key, value)) = iter.next() {
        log::info!("shardmap-demo: visiting {:?} -> {value}", String::from_utf8_lossy(&key));
        visited += 1;
    }
    drop(iter);
    log::info!("shardmap-demo: visited {visited} entries, final count = {}", map.count());

    map.destroy();
}
