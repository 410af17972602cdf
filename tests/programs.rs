//! Sweep over the embedded corpus: everything under `tests/good` must
//! compile (and survive a printer round trip), everything under
//! `tests/bad` must be rejected.

use include_dir::{include_dir, Dir};

use catac::frontend::printer::print_item;

static GOOD_DIR: Dir<'_> = include_dir!("$CARGO_MANIFEST_DIR/tests/good");
static BAD_DIR: Dir<'_> = include_dir!("$CARGO_MANIFEST_DIR/tests/bad");

fn corpus(dir: &'static Dir<'static>) -> impl Iterator<Item = (&'static str, &'static str)> {
    dir.files().filter_map(|file| {
        let path = file.path().to_str()?;
        if !path.ends_with(".cata") {
            return None;
        }
        Some((path, file.contents_utf8().expect("corpus file is not UTF-8")))
    })
}

#[test]
fn good_programs_compile() {
    let mut failed_cases: Vec<String> = vec![];
    for (name, source) in corpus(&GOOD_DIR) {
        match catac::compile(source) {
            Ok(ir) => {
                assert!(ir.contains("; ModuleID = 'main'"), "{}: bad module header", name);
            }
            Err(e) => failed_cases.push(format!("{}: {}", name, e)),
        }
    }
    assert_eq!(failed_cases.len(), 0usize, "{:?}", failed_cases);
}

#[test]
fn bad_programs_are_rejected() {
    let mut failed_cases: Vec<String> = vec![];
    for (name, source) in corpus(&BAD_DIR) {
        if catac::compile(source).is_ok() {
            failed_cases.push(String::from(name));
        }
    }
    assert_eq!(
        failed_cases.len(),
        0usize,
        "Following files were incorrectly accepted: {:?}",
        failed_cases
    );
}

#[test]
fn good_programs_round_trip_through_the_printer() {
    for (name, source) in corpus(&GOOD_DIR) {
        let items = catac::parse(source).expect(name);
        let printed = items
            .iter()
            .map(print_item)
            .collect::<Vec<_>>()
            .join("\n\n");
        let reparsed = catac::parse(&printed)
            .unwrap_or_else(|e| panic!("{}: printed form does not parse: {}\n{}", name, e, printed));
        assert_eq!(items, reparsed, "{}: round trip diverged\n{}", name, printed);
    }
}

#[test]
fn printed_programs_compile_to_the_same_module() {
    for (name, source) in corpus(&GOOD_DIR) {
        let direct = catac::compile(source).expect(name);
        let printed = catac::parse(source)
            .expect(name)
            .iter()
            .map(print_item)
            .collect::<Vec<_>>()
            .join("\n\n");
        let via_printer = catac::compile(&printed).expect(name);
        assert_eq!(direct, via_printer, "{}: IR changed across round trip", name);
    }
}
