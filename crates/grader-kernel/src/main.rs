use anyhow::Context;
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use grader_kernel::{
    lock_store, run_unlock, GraderConfig, GraderError, HashKey, LockedStore, Orchestrator,
    StdioInteraction, UnlockGate, UnlockedStore, EXIT_MESSAGE,
};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

fn cli() -> Command {
    Command::new("grader")
        .version(grader_kernel::VERSION)
        .about("Run unlocked tests or unlock locked ones")
        .arg(
            Arg::new("unlock")
                .short('u')
                .long("unlock")
                .value_name("NAME")
                .help("Unlock the tests of one question"),
        )
        .arg(
            Arg::new("question")
                .short('q')
                .long("question")
                .value_name("NAME")
                .help("Run the tests of one question"),
        )
        .arg(
            Arg::new("all")
                .short('a')
                .long("all")
                .action(ArgAction::SetTrue)
                .help("Keep running later tests after a failure"),
        )
        .arg(
            Arg::new("interactive")
                .short('i')
                .long("interactive")
                .action(ArgAction::SetTrue)
                .help("Open a console after a failed case"),
        )
        .arg(
            Arg::new("timeout")
                .short('t')
                .long("timeout")
                .value_name("SECS")
                .default_value("10")
                .value_parser(value_parser!(u64))
                .help("Seconds each evaluation may take"),
        )
        .arg(
            Arg::new("locked")
                .long("locked")
                .value_name("PATH")
                .default_value("locked_tests.json")
                .value_parser(value_parser!(PathBuf))
                .help("Locked test store"),
        )
        .arg(
            Arg::new("unlocked")
                .long("unlocked")
                .value_name("PATH")
                .default_value("unlocked_tests.json")
                .value_parser(value_parser!(PathBuf))
                .help("Unlocked test store"),
        )
        .arg(
            Arg::new("root")
                .long("root")
                .value_name("DIR")
                .default_value(".")
                .value_parser(value_parser!(PathBuf))
                .help("Directory student modules are imported from"),
        )
        .arg(
            Arg::new("lock")
                .long("lock")
                .value_name("AUTHORED")
                .value_parser(value_parser!(PathBuf))
                .conflicts_with_all(["unlock", "question"])
                .help("Lock an authored store into the --locked and --unlocked paths"),
        )
}

fn config_from(matches: &ArgMatches) -> GraderConfig {
    let mut config = GraderConfig::new()
        .with_continue_on_failure(matches.get_flag("all"))
        .with_interactive(matches.get_flag("interactive"));
    if let Some(secs) = matches.get_one::<u64>("timeout") {
        config = config.with_timeout(Duration::from_secs(*secs));
    }
    if let Some(path) = matches.get_one::<PathBuf>("locked") {
        config = config.with_locked_path(path);
    }
    if let Some(path) = matches.get_one::<PathBuf>("unlocked") {
        config = config.with_unlocked_path(path);
    }
    if let Some(root) = matches.get_one::<PathBuf>("root") {
        config = config.with_module_root(root);
    }
    config
}

fn save_pair(
    config: &GraderConfig,
    locked: &LockedStore,
    unlocked: &UnlockedStore,
) -> grader_kernel::GraderResult<()> {
    locked.save(&config.locked_path)?;
    unlocked.save(&config.unlocked_path)
}

fn lock(config: &GraderConfig, authored: &Path) -> anyhow::Result<ExitCode> {
    let store = UnlockedStore::load(authored)
        .with_context(|| format!("loading authored store {}", authored.display()))?;
    let key = store.hash_key.clone().unwrap_or_else(HashKey::generate);
    let (locked, unlocked) = lock_store(&store, &key)?;
    save_pair(config, &locked, &unlocked).context("writing locked stores")?;
    println!(
        "Locked {} tests into {} and {}",
        locked.tests.len(),
        config.locked_path.display(),
        config.unlocked_path.display()
    );
    Ok(ExitCode::SUCCESS)
}

/// Ctrl-C at a prompt ends the session cleanly; every unlocked case has
/// already been written by then
fn exit_on_interrupt() -> anyhow::Result<()> {
    ctrlc::set_handler(|| {
        tracing::info!("unlocker interrupted");
        println!();
        println!("{EXIT_MESSAGE}");
        std::process::exit(0);
    })
    .context("installing the interrupt handler")
}

fn unlock(config: &GraderConfig, name: &str) -> anyhow::Result<ExitCode> {
    let mut locked = LockedStore::load(&config.locked_path).context("loading locked store")?;
    let mut unlocked =
        UnlockedStore::load(&config.unlocked_path).context("loading unlocked store")?;
    let mut gate = match UnlockGate::open(&mut locked, &mut unlocked, name) {
        Ok(gate) => gate,
        Err(err @ GraderError::UnknownTest(_)) => {
            println!("{err}");
            return Ok(ExitCode::from(1));
        }
        Err(err) => return Err(err.into()),
    };
    exit_on_interrupt()?;
    let mut stdout = std::io::stdout();
    let state = run_unlock(
        &mut gate,
        &mut StdioInteraction::new(),
        &mut stdout,
        &mut |locked: &LockedStore, unlocked: &UnlockedStore| {
            save_pair(config, locked, unlocked)
        },
    )?;
    let (locked, unlocked) = gate.stores();
    save_pair(config, locked, unlocked).context("saving stores")?;
    tracing::info!(?state, "unlocker finished");
    Ok(ExitCode::SUCCESS)
}

fn run_tests(config: GraderConfig, question: Option<&str>) -> anyhow::Result<ExitCode> {
    let store = UnlockedStore::load(&config.unlocked_path).context("loading unlocked store")?;
    let mut console = StdioInteraction::new();
    let mut orchestrator = Orchestrator::new(config).with_console(&mut console);
    let mut stdout = std::io::stdout();
    match orchestrator.run_tests(&store, question, &mut stdout) {
        Ok(batch) => {
            tracing::info!(tests = batch.tests.len(), passed = batch.passed(), "run finished");
            Ok(ExitCode::SUCCESS)
        }
        Err(err @ GraderError::UnknownTest(_)) => {
            println!("{err}");
            Ok(ExitCode::from(1))
        }
        Err(err) => Err(err.into()),
    }
}

fn run(matches: &ArgMatches) -> anyhow::Result<ExitCode> {
    let config = config_from(matches);
    if let Some(authored) = matches.get_one::<PathBuf>("lock") {
        return lock(&config, authored);
    }
    if let Some(name) = matches.get_one::<String>("unlock") {
        return unlock(&config, name);
    }
    let question = matches.get_one::<String>("question").map(String::as_str);
    run_tests(config, question)
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let matches = cli().get_matches();
    match run(&matches) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::from(2)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_fill_the_config() {
        let matches = cli().get_matches_from([
            "grader", "-q", "q1", "-a", "-t", "3", "--root", "hw", "--unlocked", "u.json",
        ]);
        let config = config_from(&matches);
        assert!(config.continue_on_failure);
        assert!(!config.interactive);
        assert_eq!(config.timeout, Duration::from_secs(3));
        assert_eq!(config.module_root, PathBuf::from("hw"));
        assert_eq!(config.unlocked_path, PathBuf::from("u.json"));
        assert_eq!(config.locked_path, PathBuf::from("locked_tests.json"));
        assert_eq!(matches.get_one::<String>("question").map(String::as_str), Some("q1"));
    }

    #[test]
    fn lock_conflicts_with_unlock() {
        assert!(cli()
            .try_get_matches_from(["grader", "--lock", "a.json", "-u", "q1"])
            .is_err());
    }

    #[test]
    fn command_is_well_formed() {
        cli().debug_assert();
    }
}
