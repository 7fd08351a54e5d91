// tools/frametap_cli/main.rs
//
// Decode a captured serial stream (file or stdin) and print every outcome.
//
//   frametap_cli capture.log
//   cat /dev/ttyUSB0 | frametap_cli --json
//   frametap_cli --dump-config > frametap.toml

use std::fs::File;
use std::io::{self, Read, Write};
use std::path::PathBuf;
use std::sync::mpsc;
use std::sync::PoisonError;
use std::thread;

use clap::Parser;

use frametap::{
    spawn_pipeline, tlog, DecoderSettings, DecodingOutcome, FanoutSink, FrameKind,
    PipelineStats, SeriesRouter, SeriesSink,
};

#[derive(Parser, Debug)]
#[command(name = "frametap_cli", about = "Decode START/value/END frames from a serial capture")]
struct Args {
    /// Capture file to read (stdin when omitted)
    input: Option<PathBuf>,

    /// TOML decoder settings
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Print outcomes as JSON lines
    #[arg(long)]
    json: bool,

    /// Forward tokens without frame checking
    #[arg(long)]
    no_frame_check: bool,

    /// Bytes per read, to mimic transport chunking
    #[arg(long, default_value_t = 4096)]
    chunk_size: usize,

    /// Also write logs to a timestamped file in this directory
    #[arg(long)]
    log_dir: Option<PathBuf>,

    /// Print the effective settings as TOML and exit
    #[arg(long)]
    dump_config: bool,

    /// Print the latest values per frame kind after the stream ends
    #[arg(long)]
    summary: bool,
}

fn main() {
    let args = Args::parse();
    if let Err(e) = run(args) {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}

fn run(args: Args) -> Result<(), String> {
    if let Some(dir) = &args.log_dir {
        let path = frametap::logging::init_file_logging(dir)?;
        tlog!("[cli] Logging to {}", path.display());
    }

    let mut settings = match &args.config {
        Some(path) => DecoderSettings::load(path).map_err(|e| e.to_string())?,
        None => DecoderSettings::default(),
    };
    if args.no_frame_check {
        settings.frame_check = false;
    }

    if args.dump_config {
        print!("{}", settings.to_toml_string().map_err(|e| e.to_string())?);
        return Ok(());
    }
    if args.chunk_size == 0 {
        return Err("--chunk-size must be greater than zero".to_string());
    }

    let layout = settings.layout().map_err(|e| e.to_string())?;
    let series = SeriesSink::new(SeriesRouter::new(&layout, settings.series_window));
    let router = series.router();

    let (tx, rx) = mpsc::channel::<DecodingOutcome>();
    let sink = FanoutSink::new().with(series).with(tx);
    let (mut feeder, handle) = spawn_pipeline(&settings, sink).map_err(|e| e.to_string())?;

    let json = args.json;
    let printer = thread::spawn(move || print_outcomes(rx, json));

    let mut input: Box<dyn Read> = match &args.input {
        Some(path) => Box::new(
            File::open(path).map_err(|e| format!("{}: {}", path.display(), e))?,
        ),
        None => Box::new(io::stdin().lock()),
    };

    let mut buf = vec![0u8; args.chunk_size];
    loop {
        let n = match input.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                tlog!("[cli] Read error: {}", e);
                // Anything half-read is unreliable
                feeder.reset().map_err(|e| e.to_string())?;
                break;
            }
        };
        feeder.feed(&buf[..n]).map_err(|e| e.to_string())?;
    }
    feeder.flush().map_err(|e| e.to_string())?;

    let stats = handle.join().map_err(|e| e.to_string())?;
    printer
        .join()
        .map_err(|_| "output thread panicked".to_string())?
        .map_err(|e| format!("failed to write output: {}", e))?;

    if args.summary {
        let router = router.lock().unwrap_or_else(PoisonError::into_inner);
        for (i, marker) in layout.markers().iter().enumerate() {
            let name = marker.label.as_deref().unwrap_or(&marker.token);
            match router.latest(FrameKind(i)) {
                Some(values) => eprintln!("{}: {:?}", name, values),
                None => eprintln!("{}: no frames", name),
            }
        }
    }
    print_stats(&stats, json)
}

fn print_outcomes(rx: mpsc::Receiver<DecodingOutcome>, json: bool) -> io::Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    for outcome in rx {
        if json {
            let line = match &outcome {
                Ok(event) => serde_json::to_string(event),
                Err(error) => serde_json::to_string(error),
            }
            .map_err(io::Error::other)?;
            writeln!(out, "{}", line)?;
        } else {
            match &outcome {
                Ok(event) => writeln!(out, "{}", event)?,
                Err(error) => writeln!(out, "Error: {}", error)?,
            }
        }
    }
    out.flush()
}

fn print_stats(stats: &PipelineStats, json: bool) -> Result<(), String> {
    if json {
        let line = serde_json::to_string(stats).map_err(|e| e.to_string())?;
        eprintln!("{}", line);
    } else {
        eprintln!(
            "{} bytes, {} tokens, {} frames, {} errors, {} passthrough",
            stats.bytes_received,
            stats.tokens_staged,
            stats.frames_completed,
            stats.decode_errors,
            stats.passthrough
        );
    }
    Ok(())
}
