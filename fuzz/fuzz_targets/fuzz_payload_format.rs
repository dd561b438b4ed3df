#![no_main]

use arbitrary::Arbitrary;
use cfgsync::source::PayloadFormat;
use libfuzzer_sys::fuzz_target;

#[derive(Arbitrary, Debug)]
enum Format {
    Json,
    Toml,
    Yaml,
}

#[derive(Arbitrary, Debug)]
struct Input<'a> {
    format: Format,
    content: &'a str,
}

fuzz_target!(|input: Input<'_>| {
    let format = match input.format {
        Format::Json => PayloadFormat::Json,
        Format::Toml => PayloadFormat::Toml,
        Format::Yaml => PayloadFormat::Yaml,
    };

    match format.parse_named("fuzz", input.content) {
        // === Every format normalizes to a JSON payload ===
        Ok(value) => {
            assert!(value.verify());
            let reparsed = PayloadFormat::Json.parse(value.payload()).unwrap();
            assert_eq!(reparsed.checksum(), value.checksum());
        }
        // === Error rendering must not panic on any input ===
        Err(e) => {
            let _ = e.to_string();
            let _ = e.message();
            let _ = format!("{e:?}");
        }
    }
});
