use crate::parser::{opener_from_path, ParserRegistry};
use crate::source::Source;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use tracing::{info, warn};

/// Parses a local log file and prints one JSON object per record.
///
/// The file path doubles as the source URI unless one is given, so a
/// Sitecore file name like `log.20160613.172034.txt` supplies the date.
pub fn run(
    path: &Path,
    parser_name: &str,
    source_uri: Option<&str>,
    type_key: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let parsers = ParserRegistry::with_builtins();
    let parser = parsers.get(parser_name).ok_or_else(|| {
        format!(
            "Unknown parser '{}'. Available parsers: {}",
            parser_name,
            parsers.names().collect::<Vec<_>>().join(", ")
        )
    })?;

    let uri = source_uri
        .map(str::to_string)
        .unwrap_or_else(|| path.display().to_string());
    let source = Source::new(type_key, "");

    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    let mut records = 0usize;
    let mut failed = 0usize;

    for record in parser.parse(opener_from_path(path), Some(&uri), &source) {
        match record {
            Ok(record) => {
                serde_json::to_writer(&mut out, &record)?;
                out.write_all(b"\n")?;
                records += 1;
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to read records");
                failed += 1;
            }
        }
    }
    out.flush()?;

    info!(path = %path.display(), records, "Parsed log file");
    if failed > 0 {
        return Err(format!("{} read error(s) while parsing {}", failed, path.display()).into());
    }
    Ok(())
}
