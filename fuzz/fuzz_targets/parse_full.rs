#![no_main]

use htmlrip::{MarkupInput, TreeBuilder, as_xml};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    for mut builder in [TreeBuilder::html(), TreeBuilder::xml()] {
        let Ok(Some(tree)) = builder.parse(&mut MarkupInput::new(data)) else {
            continue;
        };
        let xml = as_xml(&tree, tree.root(), true);
        // Serialized output must itself parse.
        let mut reparse = TreeBuilder::xml();
        let _ = reparse.parse(&mut MarkupInput::new(xml.as_bytes()));
    }
});
