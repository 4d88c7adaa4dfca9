use clap::Parser;
use rv32i_dv::asm::assemble;
use rv32i_dv::image;
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

/// Assemble RV32I source into a $readmemh-compatible hex image
#[derive(Parser, Debug)]
#[command(author, version, about, long_about)]
struct Args {
    /// Path to input assembly file
    input: PathBuf,

    /// Path to output hex file (printed to stdout if omitted)
    #[arg(short, long)]
    output: Option<PathBuf>,
}

fn main() -> ExitCode {
    env_logger::init();
    let args = Args::parse();

    let source = match fs::read_to_string(&args.input) {
        Ok(source) => source,
        Err(e) => {
            eprintln!("{}: {e}", args.input.display());
            return ExitCode::FAILURE;
        }
    };

    let words = match assemble(&source) {
        Ok(words) => words,
        Err(e) => {
            eprintln!("{}: {e}", args.input.display());
            return ExitCode::FAILURE;
        }
    };

    match &args.output {
        Some(path) => {
            if let Err(e) = image::write_hex_file(path, &words) {
                eprintln!("{}: {e}", path.display());
                return ExitCode::FAILURE;
            }
        }
        None => print!("{}", image::to_hex(&words)),
    }
    ExitCode::SUCCESS
}
