//! Environment variable source: FLEET__ prefix with __ separator

use config::builder::DefaultState;
use config::ConfigBuilder;
use config::Environment;

/// Keys holding lists; their values are comma separated
const LIST_KEYS: [&str; 3] = [
    "decode.loopback_interfaces",
    "decode.excluded_addresses",
    "notify.urls",
];

/// Add environment variable overlay to builder.
///
/// `FLEET__POLLING__MAX_CYCLES=20` sets `polling.max_cycles`.
pub fn add_to_builder(builder: ConfigBuilder<DefaultState>) -> ConfigBuilder<DefaultState> {
    builder.add_source(source())
}

fn source() -> Environment {
    let env = Environment::with_prefix("FLEET")
        .prefix_separator("__")
        .separator("__")
        .try_parsing(true)
        .list_separator(",");
    LIST_KEYS.iter().fold(env, |env, key| env.with_list_parse_key(key))
}
