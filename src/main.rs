use std::fs;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use colored::Colorize;
use miette::{IntoDiagnostic, Result};

use ember::{assemble, Cpu, Memory};

/// Ember is an assembler & emulator toolchain for the EM-16 virtual machine.
#[derive(Parser)]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Assemble a `.asm` source file into a flat binary image
    Assemble {
        /// `.asm` file to assemble
        name: PathBuf,
        /// Destination path, `<name>.bin` by default
        dest: Option<PathBuf>,
    },
    /// Execute a binary image, or assemble and run a `.asm` file directly
    Run {
        /// `.bin` image or `.asm` source to run
        name: PathBuf,
        /// Trace every instruction with registers and flags
        #[arg(short, long)]
        debug: bool,
        /// Dump the first 256 bytes of memory after execution
        #[arg(short, long)]
        memdump: bool,
    },
    /// Assemble a `.asm` file without writing any output
    Check {
        /// File to check
        name: PathBuf,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();

    let Some(command) = args.command else {
        println!("{SHORT_INFO}");
        return Ok(());
    };

    match command {
        Command::Assemble { name, dest } => {
            let src = fs::read_to_string(&name).into_diagnostic()?;
            println!(
                "{:>12} target {}",
                "Assembling".green().bold(),
                name.display()
            );
            let image = assemble(&src)?;
            let dest = dest.unwrap_or_else(|| name.with_extension("bin"));
            fs::write(&dest, &image).into_diagnostic()?;
            println!(
                "{:>12} {} bytes to {}",
                "Saved".green().bold(),
                image.len(),
                dest.display()
            );
            Ok(())
        }
        Command::Run {
            name,
            debug,
            memdump,
        } => {
            let image = if name.extension().is_some_and(|ext| ext == "asm") {
                let src = fs::read_to_string(&name).into_diagnostic()?;
                println!(
                    "{:>12} target {}",
                    "Assembling".green().bold(),
                    name.display()
                );
                assemble(&src)?
            } else {
                fs::read(&name).into_diagnostic()?
            };

            let mut mem = Memory::new();
            mem.load_program(&image, 0x0000)?;
            let mut cpu = Cpu::new(mem);
            cpu.set_debug(debug);

            println!("{:>12} binary\n", "Running".green().bold());
            cpu.run();

            println!(
                "\n{:>12} after {} instructions",
                "Halted".cyan().bold(),
                cpu.instruction_count()
            );
            cpu.print_registers();
            cpu.print_flags();

            if memdump {
                println!("\n{}", cpu.mem().dump(0x0000, 0x00FF));
            }
            Ok(())
        }
        Command::Check { name } => {
            let src = fs::read_to_string(&name).into_diagnostic()?;
            println!(
                "{:>12} target {}",
                "Checking".green().bold(),
                name.display()
            );
            assemble(&src)?;
            println!("{:>12} with 0 errors", "Finished".green().bold());
            Ok(())
        }
    }
}

const SHORT_INFO: &str = r"
Welcome to ember, an assembler & emulator toolchain for the EM-16,
a 16-bit RISC virtual machine.
Please use `-h` or `--help` to access the usage instructions.
";
