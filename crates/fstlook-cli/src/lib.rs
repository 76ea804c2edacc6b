// fstlook-cli: shared option parsing for the lookup tools.

pub mod print;

use std::process;

use fstlook::{Encoding, FlagStrategy, FstError, LoadOptions, Transducer, Width, snapshot};

/// Options shared by the lookup front-ends; one field per configuration
/// knob the engine consumes.
#[derive(Debug, Clone)]
pub struct Config {
    /// AT&T text (or snapshot) transducer file.
    pub transducer: String,
    /// Input word list; stdin if empty.
    pub input: Option<String>,
    /// Output file or training prefix; stdout if empty.
    pub output: Option<String>,
    pub time_limit: f64,
    pub max_results: usize,
    pub max_depth: usize,
    pub strategy: FlagStrategy,
    pub encoding: Encoding,
    pub width: Width,
    pub separator: char,
    pub bom: bool,
    pub binary_input: bool,
    pub binary_output: Option<String>,
    pub print: u8,
    pub bitfield: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            transducer: String::new(),
            input: None,
            output: None,
            time_limit: 0.0,
            max_results: 0,
            max_depth: 0,
            strategy: FlagStrategy::Obey,
            encoding: Encoding::Utf8,
            width: Width::W32,
            separator: '\t',
            bom: false,
            binary_input: false,
            binary_output: None,
            print: 1,
            bitfield: false,
        }
    }
}

impl Config {
    /// Parse command-line arguments. The transducer filename is the one
    /// positional argument.
    pub fn parse(args: &[String]) -> Result<Self, String> {
        let mut config = Self::default();
        let mut i = 0;
        while i < args.len() {
            let arg = args[i].as_str();
            match arg {
                "-i" | "--input" => config.input = Some(value(args, &mut i)?),
                "-o" | "--output" => config.output = Some(value(args, &mut i)?),
                "-t" | "--time" => {
                    config.time_limit = parse_number(arg, &value(args, &mut i)?)?;
                }
                "-n" | "--max-results" => {
                    config.max_results = parse_number(arg, &value(args, &mut i)?)?;
                }
                "-d" | "--depth" => {
                    config.max_depth = parse_number(arg, &value(args, &mut i)?)?;
                }
                "-f" | "--flag" => {
                    config.strategy = match value(args, &mut i)?.as_str() {
                        "0" | "ignore" => FlagStrategy::Ignore,
                        "1" | "obey" => FlagStrategy::Obey,
                        "2" | "negative" => FlagStrategy::Negative,
                        other => return Err(format!("unknown flag strategy {other:?}")),
                    };
                }
                "-e" | "--enc" | "--encoding" => {
                    config.encoding = match value(args, &mut i)?.as_str() {
                        "0" | "ascii" => Encoding::Ascii,
                        "1" | "cp" | "octet" => Encoding::Octet,
                        "2" | "utf8" => Encoding::Utf8,
                        "3" | "ucs2" => Encoding::Ucs2,
                        "4" | "utf16" => Encoding::Utf16,
                        "5" | "utf32" => Encoding::Utf32,
                        other => return Err(format!("unknown encoding {other:?}")),
                    };
                }
                "-w" | "--width" => {
                    config.width = match value(args, &mut i)?.as_str() {
                        "32" => Width::W32,
                        "64" => Width::W64,
                        other => return Err(format!("width must be 32 or 64, got {other:?}")),
                    };
                }
                "-s" | "--separator" => {
                    let v = value(args, &mut i)?;
                    let mut chars = v.chars();
                    match (chars.next(), chars.next()) {
                        (Some(c), None) => config.separator = c,
                        _ => return Err(format!("separator must be one character, got {v:?}")),
                    }
                }
                "-p" | "--print" => {
                    let v: usize = parse_number(arg, &value(args, &mut i)?)?;
                    if v > 9 {
                        return Err(format!("print mode must be 0..=9, got {v}"));
                    }
                    config.print = v as u8;
                }
                "--bom" => config.bom = true,
                "-bi" | "--binary-input" => config.binary_input = true,
                "-bo" | "--binary-output" => {
                    config.binary_output = Some(value(args, &mut i)?);
                }
                "--bitfield" => config.bitfield = true,
                _ if arg.starts_with('-') && arg.len() > 1 => {
                    return Err(format!("unknown option {arg:?}"));
                }
                _ => {
                    if config.transducer.is_empty() {
                        config.transducer = arg.to_string();
                    } else {
                        return Err(format!("unexpected argument {arg:?}"));
                    }
                }
            }
            i += 1;
        }
        if config.transducer.is_empty() {
            return Err("missing transducer filename".to_string());
        }
        Ok(config)
    }
}

fn value(args: &[String], i: &mut usize) -> Result<String, String> {
    *i += 1;
    args.get(*i)
        .cloned()
        .ok_or_else(|| format!("{} requires a value", args[*i - 1]))
}

fn parse_number<T: std::str::FromStr>(opt: &str, v: &str) -> Result<T, String> {
    v.parse()
        .map_err(|_| format!("{opt} expects a number, got {v:?}"))
}

/// Load the transducer named by the configuration, from AT&T text or
/// from a binary snapshot.
pub fn load_transducer(config: &Config) -> Result<Transducer, FstError> {
    let data = std::fs::read(&config.transducer)?;
    if config.binary_input {
        snapshot::read_snapshot(&data, config.encoding, config.width)
    } else {
        let opts = LoadOptions {
            encoding: config.encoding,
            separator: config.separator,
            width: config.width,
            bom: config.bom,
        };
        Transducer::from_att_bytes(&data, &opts)
    }
}

/// Print an error message and exit with code 1.
pub fn fatal(msg: &str) -> ! {
    eprintln!("error: {msg}");
    process::exit(1);
}

/// Check if `--help` or `-h` is in the args.
pub fn wants_help(args: &[String]) -> bool {
    args.iter().any(|a| a == "--help" || a == "-h")
}
