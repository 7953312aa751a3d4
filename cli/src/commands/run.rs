use std::fs::File;
use std::io::{self, BufReader, Read};
use std::process::exit;

use anyhow::Context;
use camino::Utf8PathBuf;
use clap::{ArgAction, Parser, ValueHint};
use tracing::{debug, info};
use vm16_emulator::loader::{self, OversizePolicy};
use vm16_emulator::runtime::{InvalidOpcodePolicy, StreamConsole};
use vm16_emulator::Computer;

#[derive(Parser, Debug)]
pub struct RunOpt {
    /// Program image
    #[clap(value_parser, value_hint = ValueHint::FilePath)]
    program: Utf8PathBuf,

    /// What to do with an image larger than the memory (reject, truncate)
    #[clap(long, value_parser, default_value_t)]
    oversized: OversizePolicy,

    /// Stop on invalid opcodes instead of skipping them
    #[clap(long, action = ArgAction::SetTrue)]
    strict: bool,

    /// Read the program input from a file instead of the standard input
    #[clap(long, value_parser, value_hint = ValueHint::FilePath)]
    input: Option<Utf8PathBuf>,
}

impl RunOpt {
    fn invalid_opcode_policy(&self) -> InvalidOpcodePolicy {
        if self.strict {
            InvalidOpcodePolicy::Abort
        } else {
            InvalidOpcodePolicy::Skip
        }
    }

    fn open_input(&self) -> anyhow::Result<Box<dyn Read>> {
        let Some(path) = &self.input else {
            return Ok(Box::new(io::stdin()));
        };

        debug!(%path, "Reading input from file");
        let file = File::open(path).with_context(|| format!("could not open input file {path}"))?;
        Ok(Box::new(BufReader::new(file)))
    }

    pub fn exec(self) -> anyhow::Result<()> {
        info!(path = %self.program, "Reading program");
        let program = match loader::read(&self.program, self.oversized) {
            Ok(p) => p,
            Err(e) => {
                let report = miette::Report::new(e);
                eprintln!("{report:?}");
                exit(1);
            }
        };

        let policy = self.invalid_opcode_policy();
        debug!(words = program.len(), %policy, "Building computer");
        let mut computer = Computer::new(&program)?.with_invalid_opcode_policy(policy);

        let mut console = StreamConsole::new(self.open_input()?, io::stdout().lock());

        info!("Running program");
        let res = computer.run(&mut console);
        console.finish()?;
        let termination = res?;

        info!(
            %termination,
            registers = %computer.registers,
            stack = ?computer.stack.iter().collect::<Vec<_>>(),
            "End of program"
        );

        Ok(())
    }
}
