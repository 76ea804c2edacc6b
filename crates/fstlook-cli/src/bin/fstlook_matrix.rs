// fstlook-matrix: collect structural matrices for weighted-FSA training.
//
// For every input word, each accepted analysis is written as a sparse
// transition-count row. Input lines may carry a tab-separated weight
// (1.0 by default); weights of recognized words go to PREFIX.prob,
// the rest to PREFIX.unrecognized.

use std::fs::File;
use std::io::{self, BufRead, BufReader};

use fstlook::FstError;
use fstlook::encoding::LineReader;
use fstlook::lookup::Lookup;
use fstlook::matrix::{MatrixCollector, split_weighted_word};
use fstlook_cli::{Config, fatal, load_transducer, wants_help};

fn main() {
    let args: Vec<String> = std::env::args().skip(1).collect();
    if wants_help(&args) {
        help();
        return;
    }
    let config = Config::parse(&args).unwrap_or_else(|e| fatal(&e));
    if let Err(e) = run(&config) {
        fatal(&e.to_string());
    }
}

fn help() {
    println!("fstlook-matrix: collect structural matrices for weighted FSA training.");
    println!();
    println!("Usage: fstlook-matrix [OPTIONS] TRANSDUCER");
    println!();
    println!("Writes PREFIX.P, PREFIX.M, PREFIX.prob and PREFIX.unrecognized.");
    println!();
    println!("Options:");
    println!("  -i, --input FILE        input words, one per line, optional tab + weight");
    println!("  -o, --output PREFIX     output model name, \"out\" if absent");
    println!("  -t, --time SECONDS      time limit per word, unlimited if 0");
    println!("  -n, --max-results N     max number of results per word, unlimited if 0");
    println!("  -d, --depth N           max lookup depth, unlimited if 0");
    println!("  -f, --flag N            flag diacritics: 0 ignore, 1 obey, 2 negative");
    println!("  -e, --encoding N        0 ascii, 1 octet, 2 utf8, 3 ucs2, 4 utf16, 5 utf32");
    println!("  -w, --width N           storage width, 32 or 64");
    println!("  -s, --separator CHAR    AT&T column separator, tab by default");
    println!("  -bi, --binary-input     read the transducer as a binary snapshot");
    println!("  -h, --help              print this help");
}

fn run(config: &Config) -> Result<(), FstError> {
    let fst = load_transducer(config)?;
    eprintln!(
        "Transducer states: {}\nTransitions: {}\nMemory (bytes): {}",
        fst.num_states(),
        fst.num_transitions(),
        fst.allocated_bytes()
    );

    let input: Box<dyn BufRead> = match &config.input {
        Some(path) => Box::new(BufReader::new(File::open(path)?)),
        None => Box::new(BufReader::new(io::stdin())),
    };
    let mut reader = LineReader::new(input, config.encoding);
    if config.bom {
        reader.consume_bom()?;
    }

    let prefix = config.output.clone().unwrap_or_else(|| "out".to_string());
    let mut collector = MatrixCollector::create(&prefix)?;

    let mut lookup = Lookup::new(&fst);
    lookup.strategy = config.strategy;
    lookup.max_results = config.max_results;
    lookup.max_depth = config.max_depth;
    lookup.time_limit = config.time_limit;

    while let Some(line) = reader.read_line()? {
        let (word, weight) = split_weighted_word(&line);
        lookup.analyze(word, |path, _| collector.collect(path));
        collector.finish_word(weight)?;
        if collector.words_processed() & 0xFFF == 0 {
            eprint!("\r{}", collector.report());
        }
    }
    collector.flush()?;
    eprintln!("\r{}", collector.report());
    Ok(())
}
