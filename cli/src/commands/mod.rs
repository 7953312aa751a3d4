mod run;

#[derive(clap::Subcommand, Debug)]
pub enum Subcommand {
    /// Load and run a program image
    Run(self::run::RunOpt),
}

impl Subcommand {
    /// Run a subcommand
    pub fn exec(self) -> anyhow::Result<()> {
        match self {
            Self::Run(opt) => opt.exec(),
        }
    }
}
