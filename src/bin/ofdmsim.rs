//! CP-OFDM Signal Simulator
//!
//! Writes a random QPSK CP-OFDM burst to a two-channel I/Q WAV file with
//! optional timing offset, carrier offset and AWGN.
//!
//! Usage:
//!   cargo run --bin ofdmsim -- [OPTIONS] <output.wav>
//!
//! Options:
//!   -n, --fft <N>          FFT length (default: 2048)
//!   -c, --cp <N>           Cyclic prefix length (default: 64)
//!   -t, --tones <N>        Occupied subcarriers (default: 1705)
//!   -k, --symbols <N>      Number of symbols (default: 20)
//!   -f, --cfo <frac>       Carrier offset in subcarrier spacings (default: 0.0)
//!   -d, --delay <N>        Leading silence in samples (default: 0)
//!   -s, --snr <dB>         Add AWGN at this SNR
//!   -r, --rate <Hz>        Sample rate written to the header (default: 9142857)
//!   --seed <N>             Random seed (default: 1)
//!   -h, --help             Show this help message
//!
//! Examples:
//!   # DVB-T 2K, 1/32 guard, a third of a subcarrier off, 10 dB SNR
//!   ofdmsim -f 0.33 -d 700 -s 10 dvbt.wav

use num::complex::Complex32;
use rustyofdm::iq;
use rustyofdm::simulation::{add_awgn, apply_frequency_offset, OfdmGenerator, OfdmParams};
use rustyofdm::tracing_init;
use tracing::info;

struct SimConfig {
    output_path: String,
    params: OfdmParams,
    symbols: usize,
    cfo: f32,
    delay: usize,
    snr_db: Option<f32>,
    sample_rate: u32,
    seed: u64,
}

fn value<'a>(args: &'a [String], i: usize, name: &str) -> Result<&'a str, String> {
    args.get(i)
        .map(String::as_str)
        .ok_or_else(|| format!("Missing value for {}", name))
}

impl SimConfig {
    fn parse_args() -> Result<Self, String> {
        let args: Vec<String> = std::env::args().collect();

        let mut params = OfdmParams {
            fft_length: 2048,
            cp_length: 64,
            occupied_tones: 1705,
        };
        let mut symbols = 20;
        let mut cfo = 0.0;
        let mut delay = 0;
        let mut snr_db = None;
        let mut sample_rate = 9_142_857;
        let mut seed = 1;
        let mut output_path = None;

        let mut i = 1;
        while i < args.len() {
            match args[i].as_str() {
                "-n" | "--fft" => {
                    i += 1;
                    let v = value(&args, i, "--fft")?;
                    params.fft_length = v.parse().map_err(|_| format!("Invalid FFT length: {}", v))?;
                }
                "-c" | "--cp" => {
                    i += 1;
                    let v = value(&args, i, "--cp")?;
                    params.cp_length = v.parse().map_err(|_| format!("Invalid CP length: {}", v))?;
                }
                "-t" | "--tones" => {
                    i += 1;
                    let v = value(&args, i, "--tones")?;
                    params.occupied_tones = v.parse().map_err(|_| format!("Invalid tone count: {}", v))?;
                }
                "-k" | "--symbols" => {
                    i += 1;
                    let v = value(&args, i, "--symbols")?;
                    symbols = v.parse().map_err(|_| format!("Invalid symbol count: {}", v))?;
                }
                "-f" | "--cfo" => {
                    i += 1;
                    let v = value(&args, i, "--cfo")?;
                    cfo = v.parse().map_err(|_| format!("Invalid carrier offset: {}", v))?;
                }
                "-d" | "--delay" => {
                    i += 1;
                    let v = value(&args, i, "--delay")?;
                    delay = v.parse().map_err(|_| format!("Invalid delay: {}", v))?;
                }
                "-s" | "--snr" => {
                    i += 1;
                    let v = value(&args, i, "--snr")?;
                    snr_db = Some(v.parse().map_err(|_| format!("Invalid SNR value: {}", v))?);
                }
                "-r" | "--rate" => {
                    i += 1;
                    let v = value(&args, i, "--rate")?;
                    sample_rate = v.parse().map_err(|_| format!("Invalid sample rate: {}", v))?;
                }
                "--seed" => {
                    i += 1;
                    let v = value(&args, i, "--seed")?;
                    seed = v.parse().map_err(|_| format!("Invalid seed: {}", v))?;
                }
                "-h" | "--help" => {
                    print_help(&args[0]);
                    std::process::exit(0);
                }
                arg if !arg.starts_with('-') => {
                    if output_path.is_none() {
                        output_path = Some(arg.to_string());
                    } else {
                        return Err(format!("Unexpected argument: {}", arg));
                    }
                }
                arg => return Err(format!("Unknown option: {}", arg)),
            }
            i += 1;
        }

        let output_path = output_path.ok_or("Missing output file argument")?;

        Ok(SimConfig {
            output_path,
            params,
            symbols,
            cfo,
            delay,
            snr_db,
            sample_rate,
            seed,
        })
    }
}

fn print_help(program: &str) {
    eprintln!("CP-OFDM Signal Simulator");
    eprintln!();
    eprintln!("Usage: {} [OPTIONS] <output.wav>", program);
    eprintln!();
    eprintln!("Options:");
    eprintln!("  -n, --fft <N>          FFT length (default: 2048)");
    eprintln!("  -c, --cp <N>           Cyclic prefix length (default: 64)");
    eprintln!("  -t, --tones <N>        Occupied subcarriers (default: 1705)");
    eprintln!("  -k, --symbols <N>      Number of symbols (default: 20)");
    eprintln!("  -f, --cfo <frac>       Carrier offset in subcarrier spacings (default: 0.0)");
    eprintln!("  -d, --delay <N>        Leading silence in samples (default: 0)");
    eprintln!("  -s, --snr <dB>         Add AWGN at this SNR");
    eprintln!("  -r, --rate <Hz>        Sample rate written to the header (default: 9142857)");
    eprintln!("  --seed <N>             Random seed (default: 1)");
    eprintln!("  -h, --help             Show this help message");
    eprintln!();
    eprintln!("Examples:");
    eprintln!("  {} -f 0.33 -d 700 -s 10 dvbt.wav", program);
    eprintln!("  {} -n 64 -c 16 -t 48 -k 50 small.wav", program);
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_init::init_tracing();
    let config = SimConfig::parse_args()?;

    let mut generator = OfdmGenerator::new(config.params, config.seed)?;
    let mut signal = vec![Complex32::new(0.0, 0.0); config.delay];
    signal.extend(generator.symbols(config.symbols));

    let radians_per_sample = core::f32::consts::TAU * config.cfo / config.params.fft_length as f32;
    apply_frequency_offset(&mut signal, radians_per_sample);

    if let Some(snr_db) = config.snr_db {
        let noise_power = add_awgn(&mut signal, snr_db, config.seed.wrapping_add(1))?;
        info!(snr_db, noise_power, "added noise");
    }

    iq::write_iq(&config.output_path, &signal, config.sample_rate)?;

    let first_boundary = config.delay + config.params.symbol_length() - 1;
    println!("CP-OFDM Signal Simulator");
    println!("========================");
    println!("FFT length:      {}", config.params.fft_length);
    println!("CP length:       {}", config.params.cp_length);
    println!("Occupied tones:  {}", config.params.occupied_tones);
    println!("Symbols:         {}", config.symbols);
    println!("Carrier offset:  {:.4} subcarriers ({:.6} rad/sample)", config.cfo, radians_per_sample);
    println!("First boundary:  {}", first_boundary);
    println!("Samples written: {} -> {}", signal.len(), config.output_path);

    Ok(())
}
