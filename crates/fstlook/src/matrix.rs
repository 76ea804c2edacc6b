// Sparse transition-histogram sink for weighted-FSA training.
//
// Every accepted analysis is compressed into a sparse count vector over
// transition IDs and appended to the `.P` file; the `.M` file records
// which analyses belong to which input word. Word weights (an optional
// tab-separated column after the input word, 1.0 by default) end up in
// `.prob` for recognized words and `.unrecognized` for the rest.

use std::fs::File;
use std::io::{self, BufWriter, Write};

use crate::FstError;
use crate::lookup::PathValue;

pub struct MatrixCollector {
    p_file: BufWriter<File>,
    m_file: BufWriter<File>,
    prob_file: BufWriter<File>,
    unrecognized_file: BufWriter<File>,
    /// Sorted (transition ID, count) run of the current analysis.
    row: Vec<(u32, u32)>,
    /// Cumulative analysis counter, the column index of the M matrix.
    n_paths: u64,
    /// Analyses of the current word.
    n_analyses: u64,
    n_input: u64,
    n_recognized: u64,
    total_weight: f64,
    recognized_weight: f64,
    /// First write error; the sink interface cannot propagate it, so it
    /// surfaces from the next `finish_word` call.
    error: Option<io::Error>,
}

impl MatrixCollector {
    /// Open the four output files `prefix.P`, `prefix.M`, `prefix.prob`
    /// and `prefix.unrecognized`.
    pub fn create(prefix: &str) -> Result<Self, FstError> {
        let open = |suffix: &str| -> Result<BufWriter<File>, FstError> {
            Ok(BufWriter::new(File::create(format!("{prefix}.{suffix}"))?))
        };
        Ok(Self {
            p_file: open("P")?,
            m_file: open("M")?,
            prob_file: open("prob")?,
            unrecognized_file: open("unrecognized")?,
            row: Vec::new(),
            n_paths: 0,
            n_analyses: 0,
            n_input: 0,
            n_recognized: 0,
            total_weight: 0.0,
            recognized_weight: 0.0,
            error: None,
        })
    }

    /// The sink body: record one accepted analysis path.
    pub fn collect(&mut self, path: &[PathValue]) {
        self.row.clear();
        for v in path {
            sorted_insert(&mut self.row, v.id);
        }
        let mut write = || -> io::Result<()> {
            for &(id, count) in &self.row {
                write!(self.p_file, "{id} {count} ")?;
            }
            writeln!(self.p_file)?;
            write!(self.m_file, "{} 1 ", self.n_paths)?;
            Ok(())
        };
        if self.error.is_none() {
            if let Err(e) = write() {
                self.error = Some(e);
            }
        }
        self.n_paths += 1;
        self.n_analyses += 1;
    }

    /// Close out one input word carrying `weight`. Returns whether the
    /// word was recognized (had at least one analysis).
    pub fn finish_word(&mut self, weight: f64) -> Result<bool, FstError> {
        if let Some(e) = self.error.take() {
            return Err(e.into());
        }
        self.n_input += 1;
        self.total_weight += weight;
        let recognized = self.n_analyses > 0;
        self.n_analyses = 0;
        if recognized {
            self.n_recognized += 1;
            self.recognized_weight += weight;
            writeln!(self.prob_file, "{weight}")?;
            // one M line per recognized word delineates its analyses
            writeln!(self.m_file)?;
        } else {
            writeln!(self.unrecognized_file, "{weight}")?;
        }
        Ok(recognized)
    }

    pub fn words_processed(&self) -> u64 {
        self.n_input
    }

    /// Running recognition statistics for the progress display.
    pub fn report(&self) -> String {
        let rate = if self.n_input > 0 {
            100.0 * self.n_recognized as f64 / self.n_input as f64
        } else {
            0.0
        };
        let mass = if self.total_weight > 0.0 {
            100.0 * self.recognized_weight / self.total_weight
        } else {
            0.0
        };
        format!(
            "{} words processed, {rate:6.2}% of them were recognized, probability of recognition is {mass:6.2}%",
            self.n_input
        )
    }

    pub fn flush(&mut self) -> Result<(), FstError> {
        if let Some(e) = self.error.take() {
            return Err(e.into());
        }
        self.p_file.flush()?;
        self.m_file.flush()?;
        self.prob_file.flush()?;
        self.unrecognized_file.flush()?;
        Ok(())
    }
}

/// Bump `id` in a sorted run of (id, count) pairs.
fn sorted_insert(row: &mut Vec<(u32, u32)>, id: u32) {
    let idx = row.partition_point(|&(k, _)| k < id);
    if idx < row.len() && row[idx].0 == id {
        row[idx].1 += 1;
    } else {
        row.insert(idx, (id, 1));
    }
}

/// Split an input line into the word and its optional tab-separated
/// weight; a missing or unparseable weight counts as 1.0.
pub fn split_weighted_word(line: &str) -> (&str, f64) {
    match line.split_once('\t') {
        Some((word, w)) => (word, w.trim().parse().unwrap_or(1.0)),
        None => (line, 1.0),
    }
}
