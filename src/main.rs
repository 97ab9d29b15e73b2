use std::io::{IsTerminal, Write};
use std::process;

use clap::FromArgMatches;
use stacktrunk::config::set_config_path;
use stacktrunk::error::{StackError, exit_code};
use stacktrunk::git::set_base_path;
use stacktrunk::stack::Lifecycle;
use stacktrunk::styling::{eprintln, error_message, strip_ansi};

mod cli;
mod commands;

use cli::{Cli, Commands};
use commands::Session;

/// Log to stderr: `-v` shows debug, `-vv` also shows every command's trace
/// line. `RUST_LOG` overrides both.
fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let color = std::io::stderr().is_terminal();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format(move |buf, record| {
            let msg = record.args().to_string();
            if color {
                writeln!(buf, "{msg}")
            } else {
                writeln!(buf, "{}", strip_ansi(&msg))
            }
        })
        .init();
}

fn dispatch(command: Commands) -> anyhow::Result<()> {
    if let Commands::Guide { topic } = &command {
        return commands::handle_guide(topic.as_deref());
    }

    let session = Session::load()?;
    match command {
        Commands::New { branch, parent } => {
            commands::handle_new(&session, &branch, parent.as_deref())
        }
        Commands::List => commands::handle_list(&session),
        Commands::Cd { branch } => commands::handle_cd(&session, &branch),
        Commands::Clean { branch, yes } => commands::handle_clean(&session, branch, yes),
        Commands::Stack => commands::handle_stack(&session),
        Commands::SyncAll => commands::handle_sync_all(&session),
        Commands::LocalMerge { branch } => commands::handle_local_merge(&session, branch),
        Commands::LocalSyncAll => commands::handle_local_sync_all(&session),
        Commands::Ship { branch } => commands::handle_ship(&session, branch),
        Commands::ShipAll => commands::handle_ship_all(&session),
        Commands::Park { branch } => commands::handle_lifecycle(&session, branch, Lifecycle::Parked),
        Commands::Observe { branch } => {
            commands::handle_lifecycle(&session, branch, Lifecycle::Observed)
        }
        Commands::Contribute { branch } => {
            commands::handle_lifecycle(&session, branch, Lifecycle::Contributing)
        }
        Commands::Prototype { branch } => {
            commands::handle_lifecycle(&session, branch, Lifecycle::Prototype)
        }
        Commands::MergeBranch { branch } => commands::handle_merge_branch(&session, &branch),
        Commands::AutoClean => commands::handle_auto_clean(&session),
        Commands::AgentStart { issue } => commands::handle_agent_start(&session, issue),
        Commands::AgentHere => commands::handle_agent_here(&session),
        Commands::AgentStatus => commands::handle_agent_status(&session),
        Commands::IssueToPr { issue } => commands::handle_issue_to_pr(&session, issue),
        Commands::Mcp(command) => commands::handle_mcp(&session, command),
        Commands::StackStatus => commands::handle_stack_status(&session),
        Commands::StackTest => commands::handle_stack_test(&session),
        Commands::GtSetup => commands::handle_gt_setup(&session),
        Commands::DevSetup => commands::handle_dev_setup(&session),
        Commands::Guide { .. } => Ok(()),
    }
}

fn main() {
    let matches = cli::build_command().get_matches();
    let cli = Cli::from_arg_matches(&matches).unwrap_or_else(|e| e.exit());

    init_logging(cli.verbose);

    if let Some(dir) = cli.directory {
        let dir = dunce::canonicalize(&dir).unwrap_or(dir);
        if let Err(e) = std::env::set_current_dir(&dir) {
            eprintln!(
                "{}",
                error_message(format!("Cannot change to {}: {e}", dir.display()))
            );
            process::exit(1);
        }
        set_base_path(dir);
    }
    if let Some(config) = cli.config {
        set_config_path(config);
    }

    // Flags without a subcommand get the same help as a bare `st`
    let Some(command) = cli.command else {
        let help = cli::build_command().render_help();
        eprintln!("{}", help.ansi());
        process::exit(2);
    };

    if let Err(e) = dispatch(command) {
        match e.downcast_ref::<StackError>() {
            Some(StackError::AlreadyDisplayed { .. }) => {}
            Some(err) => eprintln!("{err}"),
            None => eprintln!("{}", error_message(format!("{e:#}"))),
        }
        process::exit(exit_code(&e));
    }
}
