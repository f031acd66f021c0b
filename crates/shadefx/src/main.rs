mod cli;
mod paths;
mod prefs;
mod run;

use anyhow::Result;
use cli::{Command, PrefsAction};
use paths::AppPaths;

fn main() -> Result<()> {
    let cli = cli::parse();
    run::initialise_tracing();

    match cli.command {
        Some(Command::Effects(args)) => run::list_effects(args.json),
        Some(Command::Prefs(prefs_cmd)) => handle_prefs_command(prefs_cmd.action),
        None => run::run(cli.run),
    }
}

fn handle_prefs_command(action: PrefsAction) -> Result<()> {
    let paths = AppPaths::discover()?;
    match action {
        PrefsAction::Where => {
            run::prefs_where(&paths);
            Ok(())
        }
        PrefsAction::Show => run::prefs_show(&paths),
    }
}
