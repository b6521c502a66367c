//! Chunk-boundary independence of parsing and ripping.
//!
//! Every input is fed once whole and then through readers split at fixed
//! sizes and at pseudo-random boundaries; the serialized tree and the text
//! units must not change. Set `HTMLRIP_STREAMING_PARITY_SEEDS` to widen the
//! random sweep locally.

use std::io::{self, Read};

use rip_test_support::ChunkedReader;

use crate::builder::TreeBuilder;
use crate::input::MarkupInput;
use crate::rippers::TextRipper;
use crate::serialize::as_xml;
use crate::tag_stack::StackView;

const DEFAULT_SEEDS_CI: usize = 25;
const DEFAULT_SEEDS_LOCAL: usize = 100;
const SEED_MIX: u64 = 0x9e3779b97f4a7c15;

const CASES: &[&str] = &[
    "<p>plain ascii</p>",
    "<p>café au lait</p><p>crème brûlée</p>",
    "<div>e\u{0301} and 😀<br>next line</div>",
    "<html><head><title>T&amp;C</title><script>if (a < b) {}</script></head>\
     <body><ul><li>one<li>two</ul></body></html>",
    "<dl><dt>term<dd>définition<dt>other</dl>",
    "line one\r\nline two\r<b>bold</b>",
    "<a href='x?y=1&amp;z=2' title=\"quoted\" bare>link</a>",
    "<!-- comment > with gt --><p>after</p>",
];

#[test]
fn parse_is_independent_of_chunk_boundaries() {
    for (case_idx, input) in CASES.iter().enumerate() {
        let bytes = input.as_bytes();
        let expected = parse_xml(&mut MarkupInput::new(bytes));
        for size in [1usize, 2, 3, 4, 7, 16] {
            let got = parse_xml(&mut MarkupInput::new(ChunkedReader::new(bytes, size)));
            assert_eq!(got, expected, "case={case_idx} chunk={size}");
        }
        for (seed, boundaries) in seeded_boundaries(case_idx, bytes.len()) {
            let got = parse_xml(&mut MarkupInput::new(SplitReader::new(bytes, &boundaries)));
            assert_eq!(
                got, expected,
                "case={case_idx} seed=0x{seed:016x} boundaries={boundaries:?}"
            );
        }
    }
}

#[test]
fn text_units_are_independent_of_chunk_boundaries() {
    for (case_idx, input) in CASES.iter().enumerate() {
        let bytes = input.as_bytes();
        let expected = text_units(TextRipper::html(bytes));
        assert!(!expected.is_empty(), "case={case_idx} produced no text");
        for size in [1usize, 3, 5] {
            let got = text_units(TextRipper::html(ChunkedReader::new(bytes, size)));
            assert_eq!(got, expected, "case={case_idx} chunk={size}");
        }
        for (seed, boundaries) in seeded_boundaries(case_idx, bytes.len()) {
            let got = text_units(TextRipper::html(SplitReader::new(bytes, &boundaries)));
            assert_eq!(
                got, expected,
                "case={case_idx} seed=0x{seed:016x} boundaries={boundaries:?}"
            );
        }
    }
}

#[test]
fn invalid_utf8_is_replaced_at_any_split() {
    let bytes = [b'<', b'p', b'>', 0xFF, b'f', 0xC3, b'<', b'/', b'p', b'>'];
    for size in 1..=bytes.len() {
        let mut input = MarkupInput::new(ChunkedReader::new(&bytes, size));
        let got = parse_xml(&mut input);
        assert_eq!(got, "<p>\u{FFFD}f\u{FFFD}</p>\n", "chunk={size}");
        assert!(input.take_encoding_error(), "chunk={size}");
    }
}

fn parse_xml<R: Read>(input: &mut MarkupInput<R>) -> String {
    match TreeBuilder::html().parse(input).unwrap() {
        Some(tree) => as_xml(&tree, tree.root(), false),
        None => String::new(),
    }
}

fn text_units<R: Read>(ripper: TextRipper<R>) -> Vec<(String, String)> {
    ripper
        .map(|unit| {
            let unit = unit.unwrap();
            (unit.text, unit.tags.path_key().to_string())
        })
        .collect()
}

fn seeded_boundaries(case_idx: usize, len: usize) -> Vec<(u64, Vec<usize>)> {
    let base_seed = 0x68746d6c72697021 ^ case_idx as u64;
    (0..seed_count())
        .map(|iter| {
            let seed = base_seed ^ (iter as u64 + 1).wrapping_mul(SEED_MIX);
            let mut rng = LcgRng::new(seed);
            (seed, random_boundaries(&mut rng, len))
        })
        .collect()
}

fn seed_count() -> usize {
    if let Ok(value) = std::env::var("HTMLRIP_STREAMING_PARITY_SEEDS")
        && let Ok(parsed) = value.parse::<usize>()
        && parsed > 0
    {
        return parsed;
    }
    if std::env::var("CI").is_ok() {
        DEFAULT_SEEDS_CI
    } else {
        DEFAULT_SEEDS_LOCAL
    }
}

fn random_boundaries(rng: &mut LcgRng, len: usize) -> Vec<usize> {
    if len <= 1 {
        return Vec::new();
    }
    let count = rng.gen_range_usize(0, (len - 1).min(32) + 1);
    let mut out: Vec<usize> = (0..count).map(|_| rng.gen_range_usize(1, len)).collect();
    out.sort_unstable();
    out.dedup();
    out
}

/// Reader returning exactly the byte ranges between the given boundaries.
struct SplitReader<'a> {
    bytes: &'a [u8],
    ends: Vec<usize>,
    pos: usize,
}

impl<'a> SplitReader<'a> {
    fn new(bytes: &'a [u8], boundaries: &[usize]) -> Self {
        let mut ends = boundaries.to_vec();
        ends.push(bytes.len());
        ends.reverse();
        Self { bytes, ends, pos: 0 }
    }
}

impl Read for SplitReader<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        while let Some(&end) = self.ends.last() {
            if end > self.pos {
                let n = (end - self.pos).min(buf.len());
                buf[..n].copy_from_slice(&self.bytes[self.pos..self.pos + n]);
                self.pos += n;
                return Ok(n);
            }
            self.ends.pop();
        }
        Ok(0)
    }
}

struct LcgRng {
    state: u64,
}

impl LcgRng {
    fn new(seed: u64) -> Self {
        let state = if seed == 0 { SEED_MIX } else { seed };
        Self { state }
    }

    fn next_u64(&mut self) -> u64 {
        self.state = self
            .state
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        self.state
    }

    fn gen_range_usize(&mut self, start: usize, end: usize) -> usize {
        assert!(start < end, "invalid range: {start}..{end}");
        let span = (end - start) as u64;
        start + (self.next_u64() % span) as usize
    }
}
