use std::path::Path;

use pbmt_core::search::explain::{explain, format_text};
use pbmt_core::DecodeConstraints;

use super::{load_config, tokenize, SearchOverrides};
use crate::fixture::Fixture;

pub struct ExplainOptions<'a> {
    pub fixture_file: &'a str,
    pub sentence: &'a str,
    pub settings: Option<&'a str>,
    pub overrides: SearchOverrides,
    pub n: usize,
    /// Forced-decoding references.
    pub force: &'a [String],
    /// Output must start with this target prefix.
    pub prefix: Option<&'a str>,
    /// Keep only derivations whose output contains this string.
    pub target: Option<&'a str>,
    pub json: bool,
}

pub fn explain_cmd(opts: ExplainOptions<'_>) {
    let fixture = die!(
        Fixture::open(Path::new(opts.fixture_file)),
        "Error loading fixture: {}"
    );
    let (config, _) = die!(
        load_config(opts.settings, &opts.overrides),
        "Error loading settings: {}"
    );
    let decoder = die!(fixture.decoder(config), "Error building decoder: {}");

    let source = tokenize(opts.sentence).unwrap_or_default();
    let mut constraints = if opts.force.is_empty() {
        DecodeConstraints::none()
    } else {
        DecodeConstraints::forced(opts.force.iter().filter_map(|r| tokenize(r)).collect())
    };
    constraints.target_prefix = opts.prefix.and_then(tokenize);

    // Over-fetch when filtering by target
    let fetch_n = if opts.target.is_some() { opts.n.max(20) } else { opts.n };
    let mut result = die!(
        explain(&decoder, &source, 0, &constraints, fetch_n),
        "Error decoding: {}"
    );
    if let Some(filter) = opts.target {
        result.derivations.retain(|d| d.target.contains(filter));
        result.derivations.truncate(opts.n);
    }

    if opts.json {
        let json = die!(
            serde_json::to_string_pretty(&result),
            "Error serializing result: {}"
        );
        println!("{json}");
    } else {
        print!("{}", format_text(&result));
    }
}
