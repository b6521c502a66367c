#![no_main]

use htmlrip::{ContentBlockRipper, StackView, TextRipper};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let mut ripper = TextRipper::html(data);
    while let Some(Ok(unit)) = ripper.next() {
        assert!(!unit.text.is_empty());
        assert!(unit.tags.depth() <= data.len());
    }

    for group in ContentBlockRipper::html(data) {
        let Ok(group) = group else { break };
        assert!(!group.is_empty());
    }
});
