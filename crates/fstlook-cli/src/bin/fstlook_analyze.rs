// fstlook-analyze: enumerate the analyses of words from stdin.
//
// Reads one word per line and prints every analysis path the transducer
// accepts for it, one per line, followed by a blank line per word. Words
// with no analysis print a single `?`.

use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};

use fstlook::encoding::LineReader;
use fstlook::lookup::Lookup;
use fstlook::{FstError, snapshot};
use fstlook_cli::print::Printer;
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
    println!("fstlook-analyze: lookup words in an AT&T format transducer.");
    println!();
    println!("Usage: fstlook-analyze [OPTIONS] TRANSDUCER");
    println!();
    println!("Options:");
    println!("  -i, --input FILE        input words, one per line; stdin if absent");
    println!("  -o, --output FILE       output file; stdout if absent");
    println!("  -t, --time SECONDS      time limit per word, unlimited if 0");
    println!("  -n, --max-results N     max number of results per word, unlimited if 0");
    println!("  -d, --depth N           max lookup depth, unlimited if 0");
    println!("  -f, --flag N            flag diacritics: 0 ignore, 1 obey, 2 negative");
    println!("  -e, --encoding N        0 ascii, 1 octet, 2 utf8, 3 ucs2, 4 utf16, 5 utf32");
    println!("  -w, --width N           storage width, 32 or 64");
    println!("  -s, --separator CHAR    AT&T column separator, tab by default");
    println!("  -p, --print N           print mode 0..=9 (tapes, weights, transition IDs)");
    println!("      --bitfield          append flag feature values to each analysis");
    println!("      --bom               consume/produce byte-order marks on streams");
    println!("  -bi, --binary-input     read the transducer as a binary snapshot");
    println!("  -bo, --binary-output F  compile to a binary snapshot and exit");
    println!("  -h, --help              print this help");
}

fn run(config: &Config) -> Result<(), FstError> {
    let fst = load_transducer(config)?;
    eprintln!(
        "Transducer states: {}\ntransitions: {}\nmemory: {} bytes",
        fst.num_states(),
        fst.num_transitions(),
        fst.allocated_bytes()
    );

    if let Some(path) = &config.binary_output {
        let mut out = BufWriter::new(File::create(path)?);
        snapshot::write_snapshot(&fst, config.encoding, &mut out)?;
        out.flush()?;
        return Ok(());
    }

    let input: Box<dyn BufRead> = match &config.input {
        Some(path) => Box::new(BufReader::new(File::open(path)?)),
        None => Box::new(BufReader::new(io::stdin())),
    };
    let mut output: Box<dyn Write> = match &config.output {
        Some(path) => Box::new(BufWriter::new(File::create(path)?)),
        None => Box::new(BufWriter::new(io::stdout())),
    };

    let mut reader = LineReader::new(input, config.encoding);
    if config.bom {
        reader.consume_bom()?;
        output.write_all(config.encoding.bom())?;
    }

    let printer = Printer::new(&fst, config.print, config.bitfield);
    let mut lookup = Lookup::new(&fst);
    lookup.strategy = config.strategy;
    lookup.max_results = config.max_results;
    lookup.max_depth = config.max_depth;
    lookup.time_limit = config.time_limit;

    while let Some(word) = reader.read_line()? {
        let mut write_err: Option<io::Error> = None;
        lookup.analyze(&word, |path, segments| {
            if write_err.is_some() {
                return;
            }
            let mut line = printer.render(path, segments);
            line.push('\n');
            if let Err(e) = output.write_all(&config.encoding.encode(&line)) {
                write_err = Some(e);
            }
        });
        if let Some(e) = write_err {
            return Err(e.into());
        }
        if lookup.result_count() == 0 {
            output.write_all(&config.encoding.encode("?\n"))?;
        }
        output.write_all(&config.encoding.encode("\n"))?;
    }
    output.flush()?;
    Ok(())
}
