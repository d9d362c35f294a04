#![allow(dead_code)]

use bruteguard::prelude::*;
use std::sync::Arc;

pub struct Fixture {
    pub engine: Arc<DecisionEngine<MemorySink>>,
    pub lists: InMemoryListStore,
    pub counters: InMemoryCounterStore,
    pub events: MemorySink,
}

pub fn fixture(thresholds: Thresholds) -> Fixture {
    let lists = InMemoryListStore::new();
    let counters = InMemoryCounterStore::new();
    let events = MemorySink::new();
    let engine = DecisionEngine::new(Arc::new(lists.clone()), Arc::new(counters.clone()), thresholds)
        .with_sink(events.clone());
    Fixture { engine: Arc::new(engine), lists, counters, events }
}
