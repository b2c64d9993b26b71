use clap::Parser;
use std::process;

use ibdp::cli;
use ibdp::cli::app::{Cli, Commands};
use ibdp::IbdError;

fn init_tracing(debug: bool) {
    use tracing_subscriber::EnvFilter;

    let env_debug = std::env::var("IB_PARSER_DEBUG").map(|v| v == "1").unwrap_or(false);
    let default_level = if debug || env_debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run(command: Commands) -> Result<(), IbdError> {
    match command {
        Commands::Decrypt {
            key_id,
            server_uuid,
            keyring,
            input,
            output,
        } => {
            cli::decrypt::execute(&cli::decrypt::DecryptOptions {
                key_id,
                server_uuid,
                keyring,
                input,
                output,
                decompress: false,
            })?;
        }

        Commands::Decompress { input, output } => {
            cli::decompress::execute(&cli::decompress::DecompressOptions { input, output })?;
        }

        Commands::Parse {
            input,
            sdi_json,
            index,
            list_indexes,
            format,
            output,
            with_meta,
            lob_max_bytes,
            raw_integers,
            skip_xdes,
        } => {
            cli::parse::execute(&cli::parse::ParseOptions {
                input,
                sdi_json,
                index,
                list_indexes,
                format,
                output,
                with_meta,
                lob_max_bytes,
                raw_integers,
                skip_xdes,
            })?;
        }

        Commands::DecryptDecompress {
            key_id,
            server_uuid,
            keyring,
            input,
            output,
        } => {
            cli::decrypt::execute(&cli::decrypt::DecryptOptions {
                key_id,
                server_uuid,
                keyring,
                input,
                output,
                decompress: true,
            })?;
        }

        Commands::Rebuild {
            input,
            output,
            sdi_json,
            target_sdi_json,
            index_id_map,
            cfg_out,
            use_target_sdi_root,
            use_source_sdi_root,
            target_sdi_root,
            target_ibd,
            validate_remap,
        } => {
            cli::rebuild::execute(&cli::rebuild::RebuildCliOptions {
                input,
                output,
                sdi_json,
                target_sdi_json,
                index_id_map,
                cfg_out,
                use_target_sdi_root,
                use_source_sdi_root,
                target_sdi_root,
                target_ibd,
                validate_remap,
            })?;
        }
    }
    Ok(())
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.debug);

    if let Err(e) = run(cli.command) {
        eprintln!("error: {}", e);
        process::exit(1);
    }
}
