use std::sync::Arc;
use std::thread;

use log::info;
use rand::Rng;

use super::Shared;

/// Uniform instruction count in `[min, max]`.
pub(crate) fn random_instructions(min: u64, max: u64) -> u64 {
    rand::rng().random_range(min..=max)
}

/// Memory footprint `2^k` with k uniform over the exponent range of the
/// configured power-of-two bounds.
pub(crate) fn random_memory(min: u64, max: u64) -> u64 {
    let exp = rand::rng().random_range(min.ilog2()..=max.ilog2());
    1u64 << exp
}

/// Long-running producer: a batch of synthetic processes per tick, one
/// tick per configured delay. Exits when generation or the whole
/// scheduler is stopped.
pub(crate) fn generator_loop(shared: Arc<Shared>) {
    info!(
        "generator: {} processes per {:?} tick",
        shared.gen.batch_freq, shared.delay
    );
    while !shared.stopping() && !shared.generation_stopped() {
        for _ in 0..shared.gen.batch_freq {
            let lines = random_instructions(shared.gen.min_ins, shared.gen.max_ins);
            let memory = random_memory(shared.gen.min_mem, shared.gen.max_mem);
            shared.submit(None, lines, memory);
        }
        thread::sleep(shared.delay);
    }
    info!("generator: stopped");
}
