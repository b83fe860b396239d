use anyhow::Context;
use clap::{ArgAction, Parser as _};
use log::{LevelFilter, Log, Metadata, Record};
use qtatoms::{BoxId, FourCC, KnownBox, ParseResult, Parser, json_api};

#[derive(clap::Parser, Debug)]
#[command(version, about = "QuickTime/MP4 atom tree explorer")]
struct Args {
    /// QuickTime/MP4 file path
    path: String,

    /// Only print the subtree at a dotted path (e.g. moov.trak[1].mdia.minf.stbl)
    #[arg(long = "filter")]
    filter: Option<String>,

    /// Dump the raw payload of every atom of this 4CC (e.g. --raw stsd)
    #[arg(long = "raw")]
    raw: Option<String>,

    /// Limit the depth printed below each target
    #[arg(long, default_value_t = 64)]
    max_depth: usize,

    /// Bytes to show per raw dump (0 means the entire payload)
    #[arg(long, default_value_t = 0)]
    bytes: usize,

    /// Emit JSON instead of a human-readable tree
    #[arg(long, action = ArgAction::SetTrue)]
    json: bool,

    /// Log every atom as it is read
    #[arg(short, long, action = ArgAction::SetTrue)]
    verbose: bool,
}

struct StderrLogger;

static LOGGER: StderrLogger = StderrLogger;

impl Log for StderrLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            eprintln!("[{}] {}", record.level(), record.args());
        }
    }

    fn flush(&self) {}
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let level = if args.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Warn
    };
    log::set_logger(&LOGGER).map(|()| log::set_max_level(level))?;

    let data = std::fs::read(&args.path).with_context(|| format!("reading {}", args.path))?;

    // a failed parse still prints what was decoded before the error
    let (tree, failure) = match Parser::default().parse(&data) {
        Ok(tree) => (tree, None),
        Err(f) => (f.partial, Some(f.error)),
    };

    report(&args, &tree, &data)?;

    match failure {
        Some(e) => Err(anyhow::Error::new(e).context(format!("parsing {}", args.path))),
        None => Ok(()),
    }
}

fn report(args: &Args, tree: &ParseResult, data: &[u8]) -> anyhow::Result<()> {
    let targets: Vec<BoxId> = match &args.filter {
        Some(path) => {
            let found: Vec<BoxId> = tree.get_id(path).into_iter().collect();
            if found.is_empty() {
                log::warn!("no atom at `{}`", path);
            }
            found
        }
        None => tree.root_ids().to_vec(),
    };

    // JSON mode: no tree or raw dump, to keep the output parseable
    if args.json {
        let atoms: Vec<_> = targets
            .iter()
            .filter_map(|&id| json_api::json_atom(tree, id, args.max_depth))
            .collect();
        println!("{}", serde_json::to_string_pretty(&atoms)?);
        return Ok(());
    }

    for &id in &targets {
        print_tree(tree, id, args.max_depth)?;
    }

    if let Some(sel) = &args.raw {
        dump_raw(tree, data, sel, args.bytes)?;
    }
    Ok(())
}

// ---------- Human-readable tree ----------

fn print_tree(tree: &ParseResult, id: BoxId, max_depth: usize) -> anyhow::Result<()> {
    for (depth, b) in tree.walk_from(id) {
        if depth > max_depth {
            continue;
        }
        let indent = "  ".repeat(depth);
        let kind = if b.children.is_empty() { "" } else { " (container)" };
        println!(
            "{indent}{:>8} {:>10} {}{} {}",
            format!("{:#x}", b.offset),
            b.size,
            b.typ.as_str_lossy(),
            kind,
            KnownBox::from(b.typ).full_name()
        );
        if let Some(payload) = &b.payload {
            for (name, value) in payload.iter() {
                let shown = match &value.decoded {
                    Some(decoded) => serde_json::to_string(decoded)?,
                    None => serde_json::to_string(&value.raw)?,
                };
                println!("{indent}          -> {}: {}", name, shown);
            }
        }
    }
    Ok(())
}

// ---------- Raw dump ----------

fn dump_raw(tree: &ParseResult, data: &[u8], sel: &str, limit: usize) -> anyhow::Result<()> {
    let typ: FourCC = sel.parse().with_context(|| format!("--raw {}", sel))?;
    let matches = tree.walk().map(|(_, b)| b).filter(|b| b.typ == typ);

    for (i, b) in matches.enumerate() {
        let start = b.content_offset() as usize;
        let len = match limit {
            0 => b.content_len as usize,
            n => n.min(b.content_len as usize),
        };
        let bytes = data.get(start..start + len).unwrap_or_default();
        println!(
            "\n== Dump {} ({}) payload: offset={:#x}, len={} ==",
            i,
            b.typ.as_str_lossy(),
            start,
            len
        );
        print!("{}", hex_dump(bytes, start));
    }
    Ok(())
}

fn hex_dump(bytes: &[u8], start: usize) -> String {
    let mut out = String::new();
    for (i, chunk) in bytes.chunks(16).enumerate() {
        let encoded = hex::encode(chunk);
        let pairs: Vec<&str> = (0..chunk.len()).map(|j| &encoded[j * 2..j * 2 + 2]).collect();
        let ascii: String = chunk
            .iter()
            .map(|&c| if (32..=126).contains(&c) { c as char } else { '.' })
            .collect();
        out.push_str(&format!(
            "{:08x}  {:<47}  |{}|\n",
            start + i * 16,
            pairs.join(" "),
            ascii
        ));
    }
    out
}
