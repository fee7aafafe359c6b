//! CP-OFDM Symbol Synchronizer
//!
//! Reads a two-channel I/Q WAV file, runs blind symbol timing and carrier
//! offset acquisition over it and reports every symbol found.
//!
//! Usage:
//!   cargo run --bin ofdmsync -- [OPTIONS] <input.wav>
//!
//! Options:
//!   -n, --fft <N>          FFT length (default: 2048)
//!   -c, --cp <N>           Cyclic prefix length (default: 64)
//!   -t, --tones <N>        Occupied subcarriers (default: 1705)
//!   -s, --snr <dB>         Assumed SNR (default: 10)
//!   -m, --misses <N>       Tracking misses tolerated before re-acquisition (default: 0)
//!   -o, --output <file>    Write the derotated symbols as I/Q WAV
//!   -h, --help             Show this help message

use rustyofdm::iq;
use rustyofdm::tracing_init;
use rustyofdm::{SymbolAcquisition, SyncConfig};

struct SyncArgs {
    input_path: String,
    output_path: Option<String>,
    config: SyncConfig,
}

fn value<'a>(args: &'a [String], i: usize, name: &str) -> Result<&'a str, String> {
    args.get(i)
        .map(String::as_str)
        .ok_or_else(|| format!("Missing value for {}", name))
}

impl SyncArgs {
    fn parse_args() -> Result<Self, String> {
        let args: Vec<String> = std::env::args().collect();

        let mut config = SyncConfig::default();
        let mut input_path = None;
        let mut output_path = None;

        let mut i = 1;
        while i < args.len() {
            match args[i].as_str() {
                "-n" | "--fft" => {
                    i += 1;
                    let v = value(&args, i, "--fft")?;
                    config.fft_length = v.parse().map_err(|_| format!("Invalid FFT length: {}", v))?;
                }
                "-c" | "--cp" => {
                    i += 1;
                    let v = value(&args, i, "--cp")?;
                    config.cp_length = v.parse().map_err(|_| format!("Invalid CP length: {}", v))?;
                }
                "-t" | "--tones" => {
                    i += 1;
                    let v = value(&args, i, "--tones")?;
                    config.occupied_tones = v.parse().map_err(|_| format!("Invalid tone count: {}", v))?;
                }
                "-s" | "--snr" => {
                    i += 1;
                    let v = value(&args, i, "--snr")?;
                    config.snr_db = v.parse().map_err(|_| format!("Invalid SNR value: {}", v))?;
                }
                "-m" | "--misses" => {
                    i += 1;
                    let v = value(&args, i, "--misses")?;
                    config.miss_timeout = v.parse().map_err(|_| format!("Invalid miss timeout: {}", v))?;
                }
                "-o" | "--output" => {
                    i += 1;
                    output_path = Some(value(&args, i, "--output")?.to_string());
                }
                "-h" | "--help" => {
                    print_help(&args[0]);
                    std::process::exit(0);
                }
                arg if !arg.starts_with('-') => {
                    if input_path.is_none() {
                        input_path = Some(arg.to_string());
                    } else {
                        return Err(format!("Unexpected argument: {}", arg));
                    }
                }
                arg => return Err(format!("Unknown option: {}", arg)),
            }
            i += 1;
        }

        let input_path = input_path.ok_or("Missing input file argument")?;

        Ok(SyncArgs {
            input_path,
            output_path,
            config,
        })
    }
}

fn print_help(program: &str) {
    eprintln!("CP-OFDM Symbol Synchronizer");
    eprintln!();
    eprintln!("Usage: {} [OPTIONS] <input.wav>", program);
    eprintln!();
    eprintln!("Options:");
    eprintln!("  -n, --fft <N>          FFT length (default: 2048)");
    eprintln!("  -c, --cp <N>           Cyclic prefix length (default: 64)");
    eprintln!("  -t, --tones <N>        Occupied subcarriers (default: 1705)");
    eprintln!("  -s, --snr <dB>         Assumed SNR (default: 10)");
    eprintln!("  -m, --misses <N>       Tracking misses tolerated before re-acquisition (default: 0)");
    eprintln!("  -o, --output <file>    Write the derotated symbols as I/Q WAV");
    eprintln!("  -h, --help             Show this help message");
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_init::init_tracing();
    let args = SyncArgs::parse_args()?;

    let recording = iq::read_iq(&args.input_path)?;
    let mut acquisition = SymbolAcquisition::new(args.config.clone())?;
    let summary = acquisition.run(&recording.samples)?;

    let n = args.config.fft_length as f32;
    println!("CP-OFDM Symbol Synchronizer");
    println!("===========================");
    println!("Input:           {} ({} samples at {} Hz)", args.input_path, recording.samples.len(), recording.sample_rate);
    println!("Calls:           {}", summary.calls);
    println!("Symbols:         {}", summary.symbols.len());
    println!("Misses:          {}", summary.misses);
    println!("Re-acquisitions: {}", summary.reacquisitions);
    for tag in &summary.tags {
        println!("Tag:             {} at item {}", tag.key, tag.offset);
    }
    println!();
    println!("  #   boundary   cfo (subcarriers)");
    for (index, symbol) in summary.symbols.iter().enumerate() {
        let subcarriers = symbol.frequency_offset * n / core::f32::consts::TAU;
        println!("{:>3} {:>10} {:>+18.4}", index, symbol.stream_boundary, subcarriers);
    }

    if let Some(path) = &args.output_path {
        let derotated: Vec<_> = summary
            .symbols
            .iter()
            .flat_map(|s| s.samples.iter().copied())
            .collect();
        iq::write_iq(path, &derotated, recording.sample_rate)?;
        println!();
        println!("Wrote {} derotated samples to {}", derotated.len(), path);
    }

    Ok(())
}
