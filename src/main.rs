use chronicle::cli::{parse_args, run_cli_command, usage, CliCommand, VERSION};
use chronicle::error::SyncError;
use chronicle::startup::{init_tracing, Engine, EngineConfig};

use color_eyre::Result;

fn main() -> Result<()> {
    let command = parse_args(std::env::args());

    // Commands that need no engine
    match &command {
        CliCommand::Version => {
            println!("chronicle {}", VERSION);
            return Ok(());
        }
        CliCommand::Help => {
            println!("{}", usage());
            return Ok(());
        }
        CliCommand::Invalid(reason) => {
            eprintln!("Error: {}\n\n{}", reason, usage());
            std::process::exit(2);
        }
        _ => {}
    }

    color_eyre::install()?;
    init_tracing();

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async move {
        let engine = Engine::from_config(EngineConfig::from_env())?;

        match run_cli_command(&engine, command).await {
            Some(Ok(output)) => {
                println!("{}", output);
                Ok(())
            }
            Some(Err(e)) => {
                match e.downcast_ref::<SyncError>() {
                    Some(sync_error) => eprintln!("Error: {}", sync_error.user_message()),
                    None => eprintln!("Error: {}", e),
                }
                tracing::debug!("{:?}", e);
                std::process::exit(1);
            }
            None => {
                let shutdown = async {
                    if let Err(e) = tokio::signal::ctrl_c().await {
                        tracing::error!("Failed to listen for ctrl-c: {}", e);
                    }
                };
                engine.run(None, shutdown).await?;
                Ok(())
            }
        }
    })
}
