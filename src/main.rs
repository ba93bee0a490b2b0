use clap::{Arg, Command};
use std::error::Error;
use std::path;

use peersync::config::NodeConfig;
use peersync::logging::init_tracing;
use peersync::node;

fn load_config(matches: &clap::ArgMatches) -> Result<NodeConfig, Box<dyn Error>> {
	let file = matches.get_one::<String>("config").ok_or("--config argument required")?;
	Ok(NodeConfig::load(path::Path::new(file))?)
}

fn config_arg() -> Arg {
	Arg::new("config")
		.short('c')
		.long("config")
		.value_name("FILE")
		.required(true)
		.help("Node configuration (JSON, JSON5 or TOML)")
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
	let matches = Command::new("peersync")
		.version(env!("CARGO_PKG_VERSION"))
		.about("Peer-to-peer directory sync over UDP")
		.subcommand_required(true)
		.arg(
			Arg::new("log-level")
				.short('l')
				.long("log-level")
				.value_name("LEVEL")
				.global(true)
				.help("Log level when RUST_LOG is not set (overrides the config)"),
		)
		.subcommand(Command::new("run").about("Serve and sync a directory").arg(config_arg()))
		.subcommand(
			Command::new("index").about("Scan once and print the file index").arg(config_arg()),
		)
		.get_matches();

	let log_level = matches.get_one::<String>("log-level").cloned();

	if let Some(sub_matches) = matches.subcommand_matches("run") {
		let config = load_config(sub_matches)?;
		init_tracing(log_level.as_deref().unwrap_or(&config.log_level));
		node::run(config).await?;
	} else if let Some(sub_matches) = matches.subcommand_matches("index") {
		let config = load_config(sub_matches)?;
		init_tracing(log_level.as_deref().unwrap_or("warn"));
		let index = node::index(&config)?;
		println!("{}", serde_json::to_string_pretty(&index)?);
	}

	Ok(())
}

// vim: ts=4
