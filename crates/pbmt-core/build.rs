const SETTINGS_PATH: &str = "src/default_settings.toml";

/// `section.key` pairs the embedded settings must define.
const REQUIRED: &[(&str, &str)] = &[
    ("search", "strategy"),
    ("search", "beam_size"),
    ("search", "max_distortion"),
    ("search", "itg_constraints"),
    ("search", "strict"),
    ("recombination", "mode"),
    ("nbest", "scan_factor"),
    ("nbest", "time_budget_ms"),
    ("nbest", "distinct_surface"),
    ("engine", "threads"),
];

fn main() {
    println!("cargo:rerun-if-changed={SETTINGS_PATH}");
    check_settings(SETTINGS_PATH, include_str!("src/default_settings.toml"));
}

fn check_settings(path: &str, content: &str) {
    let value = match content.parse::<toml::Value>() {
        Ok(v) => v,
        Err(e) => panic!("{path} contains invalid TOML: {e}"),
    };
    for &(section, key) in REQUIRED {
        let Some(table) = value.get(section).and_then(toml::Value::as_table) else {
            panic!("{path} is missing the [{section}] section");
        };
        if !table.contains_key(key) {
            panic!("{path} is missing {section}.{key}");
        }
    }
}
