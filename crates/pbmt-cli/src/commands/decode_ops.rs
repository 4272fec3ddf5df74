use std::fs;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use pbmt_engine::{BatchSentence, Engine, EngineError, NbestList};
use serde::Serialize;

use super::{load_config, tokenize, SearchOverrides};
use crate::fixture::Fixture;

pub struct DecodeOptions<'a> {
    pub fixture_file: &'a str,
    /// One sentence per line; `-` reads stdin.
    pub input_file: &'a str,
    pub settings: Option<&'a str>,
    pub overrides: SearchOverrides,
    pub n: usize,
    pub threads: Option<usize>,
    pub json: bool,
}

/// One JSONL output record.
#[derive(Debug, Serialize)]
struct DecodeRecord<'a> {
    sentence_id: usize,
    source: String,
    #[serde(flatten)]
    result: &'a NbestList,
}

#[derive(Debug, Serialize)]
struct DecodeFailure {
    sentence_id: usize,
    source: String,
    error: String,
}

pub fn decode_cmd(opts: DecodeOptions<'_>) {
    let fixture = die!(
        Fixture::open(Path::new(opts.fixture_file)),
        "Error loading fixture: {}"
    );
    let (config, threads) = die!(
        load_config(opts.settings, &opts.overrides),
        "Error loading settings: {}"
    );
    let decoder = die!(fixture.decoder(config), "Error building decoder: {}");
    let engine = die!(
        Engine::new(decoder, opts.threads.unwrap_or(threads)),
        "Error starting decode pool: {}"
    );

    let sentences = die!(read_sentences(opts.input_file), "Error reading input: {}");
    let sources: Vec<String> = sentences.iter().map(|s| s.source.join(" ")).collect();
    let results = engine.nbest_batch(sentences, opts.n.max(1));

    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    let mut failures = 0;
    for (id, (source, result)) in sources.into_iter().zip(results).enumerate() {
        let written = match result {
            Ok(list) => write_result(&mut out, id, source, &list, opts.n, opts.json),
            Err(e) => {
                failures += 1;
                write_failure(&mut out, id, source, &e, opts.json)
            }
        };
        die!(written, "Error writing output: {}");
    }
    die!(out.flush(), "Error writing output: {}");
    if failures > 0 {
        eprintln!("{failures} sentence(s) failed");
        std::process::exit(2);
    }
}

fn read_sentences(input_file: &str) -> io::Result<Vec<BatchSentence>> {
    let reader: Box<dyn BufRead> = if input_file == "-" {
        Box::new(BufReader::new(io::stdin()))
    } else {
        Box::new(BufReader::new(fs::File::open(input_file)?))
    };
    let mut sentences = Vec::new();
    for line in reader.lines() {
        if let Some(tokens) = tokenize(&line?) {
            sentences.push(BatchSentence::new(sentences.len(), tokens));
        }
    }
    Ok(sentences)
}

fn write_result(
    out: &mut impl Write,
    id: usize,
    source: String,
    list: &NbestList,
    n: usize,
    json: bool,
) -> io::Result<()> {
    if json {
        let record = DecodeRecord {
            sentence_id: id,
            source,
            result: list,
        };
        let line = serde_json::to_string(&record).map_err(io::Error::other)?;
        return writeln!(out, "{line}");
    }

    if list.is_empty() {
        return writeln!(out, "{id}\t(no translation)");
    }
    if n <= 1 {
        return writeln!(out, "{id}\t{}", list.translations[0].text());
    }
    for (rank, t) in list.translations.iter().enumerate() {
        writeln!(out, "{id}\t#{:>2}\t{:.4}\t{}", rank + 1, t.score, t.text())?;
    }
    if let Some(d) = &list.diagnostic {
        writeln!(
            out,
            "{id}\t# stopped early ({:?}): {} of {} after {} paths",
            d.stop, d.returned, d.requested, d.scanned
        )?;
    }
    Ok(())
}

fn write_failure(
    out: &mut impl Write,
    id: usize,
    source: String,
    error: &EngineError,
    json: bool,
) -> io::Result<()> {
    if json {
        let record = DecodeFailure {
            sentence_id: id,
            source,
            error: error.to_string(),
        };
        let line = serde_json::to_string(&record).map_err(io::Error::other)?;
        return writeln!(out, "{line}");
    }
    writeln!(out, "{id}\t(error: {error})")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_sentences_skips_blank_and_comments() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "das haus\n\n# skip\nhaus").unwrap();
        let sentences = read_sentences(file.path().to_str().unwrap()).unwrap();
        assert_eq!(sentences.len(), 2);
        assert_eq!(sentences[0].sentence_id, 0);
        assert_eq!(sentences[1].sentence_id, 1);
        assert_eq!(sentences[1].source, vec!["haus".to_string()]);
    }

    #[test]
    fn test_write_empty_result() {
        let mut buf = Vec::new();
        write_result(&mut buf, 4, "x".to_string(), &NbestList::default(), 1, false).unwrap();
        assert_eq!(String::from_utf8(buf).unwrap(), "4\t(no translation)\n");
    }

    #[test]
    fn test_write_json_result() {
        let mut buf = Vec::new();
        write_result(&mut buf, 0, "x".to_string(), &NbestList::default(), 3, true).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&buf).unwrap();
        assert_eq!(value["sentence_id"], 0);
        assert_eq!(value["source"], "x");
        assert!(value["translations"].as_array().unwrap().is_empty());
        assert!(value["diagnostic"].is_null());
    }
}
