#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &str| {
    let _: eyre::Result<batcher_config::BatchFile> = batcher_config::load_batch_toml(data);
});
