// Rendering of analysis paths for the analyze front-end.

use fstlook::Transducer;
use fstlook::lookup::{self, PathValue};

/// Formats one accepted path per line according to the print mode:
///
/// 0. output tape
/// 1. output tape with the summed weight
/// 2. interpreted output tape (identity resolved, flags dropped)
/// 3. interpreted output tape with weight
/// 4. 1-based transition IDs along the path
/// 5. transition IDs with weight
/// 6. input tape, symbols joined by `|`
/// 7. input tape with weight
/// 8. input tape with flag diacritics stripped
/// 9. stripped input tape with weight
pub struct Printer<'a> {
    fst: &'a Transducer,
    mode: u8,
    bitfield: bool,
}

impl<'a> Printer<'a> {
    pub fn new(fst: &'a Transducer, mode: u8, bitfield: bool) -> Self {
        Self { fst, mode, bitfield }
    }

    pub fn render(&self, path: &[PathValue], segments: &[String]) -> String {
        let mut line = match self.mode {
            0 => lookup::output_text(self.fst, path),
            1 => with_weight(lookup::output_text(self.fst, path), path),
            2 => lookup::interpret_output(self.fst, path, segments),
            3 => with_weight(lookup::interpret_output(self.fst, path, segments), path),
            4 => ids(path),
            5 => with_weight(ids(path), path),
            6 => lookup::input_text(self.fst, path, false),
            7 => with_weight(lookup::input_text(self.fst, path, false), path),
            8 => lookup::input_text(self.fst, path, true),
            _ => with_weight(lookup::input_text(self.fst, path, true), path),
        };
        if self.bitfield {
            let state = path.last().map(|v| v.flags).unwrap_or_default();
            line.push('\t');
            let values = self.fst.flags().values(state);
            for (k, v) in values.iter().enumerate() {
                if k > 0 {
                    line.push(' ');
                }
                line.push_str(&v.to_string());
            }
        }
        line
    }
}

fn ids(path: &[PathValue]) -> String {
    let mut out = String::new();
    for (k, v) in path.iter().enumerate() {
        if k > 0 {
            out.push(' ');
        }
        out.push_str(&(v.id + 1).to_string());
    }
    out
}

fn with_weight(mut line: String, path: &[PathValue]) -> String {
    line.push('\t');
    line.push_str(&lookup::path_weight(path).to_string());
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use fstlook::lookup::Lookup;
    use fstlook::{FlagStrategy, Width};

    fn sample() -> Transducer {
        let text = concat!(
            "0\t1\t@P.F.x@\t@P.F.x@\n",
            "1\t2\ta\tA\t0.5\n",
            "2\t0.25\n",
        );
        Transducer::parse_att(text, '\t', Width::W32).unwrap()
    }

    fn render_one(fst: &Transducer, mode: u8, bitfield: bool) -> String {
        let mut lookup = Lookup::new(fst);
        lookup.strategy = FlagStrategy::Obey;
        let printer = Printer::new(fst, mode, bitfield);
        let mut line = String::new();
        lookup.analyze("a", |p, s| line = printer.render(p, s));
        line
    }

    #[test]
    fn output_modes() {
        let fst = sample();
        assert_eq!(render_one(&fst, 0, false), "@P.F.x@A");
        assert_eq!(render_one(&fst, 1, false), "@P.F.x@A\t0.75");
        assert_eq!(render_one(&fst, 2, false), "A");
        assert_eq!(render_one(&fst, 3, false), "A\t0.75");
    }

    #[test]
    fn id_modes_are_one_based() {
        let fst = sample();
        assert_eq!(render_one(&fst, 4, false), "1 2 3");
        assert_eq!(render_one(&fst, 5, false), "1 2 3\t0.75");
    }

    #[test]
    fn input_modes() {
        let fst = sample();
        assert_eq!(render_one(&fst, 6, false), "@P.F.x@|a|");
        assert_eq!(render_one(&fst, 8, false), "|a|");
        assert_eq!(render_one(&fst, 9, false), "|a|\t0.75");
    }

    #[test]
    fn bitfield_appends_feature_values() {
        let fst = sample();
        assert_eq!(render_one(&fst, 2, true), "A\t1");
    }
}
