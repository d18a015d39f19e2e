#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &str| {
    // Plant config: parse errors and validation errors are fine, panics are not
    if let Ok(cfg) = toml::from_str::<batcher_config::Config>(data) {
        let _ = cfg.validate();
    }
});
