//! Binary entry point for the cloudvol CLI.

use std::collections::BTreeMap;
use std::io::{self, Write};
use std::process;

use clap::Parser;
use thiserror::Error;

use cloudvol::{
    ComputeProvider, ComputeProviderError, DriverConfig, DriverError, HostFilesystem, VolumeDriver,
};

mod cli;

use cli::{Cli, CreateCommand, NameArg};

#[derive(Debug, Error)]
enum CliError {
    #[error("configuration error: {0}")]
    Config(String),
    #[error("provider error: {0}")]
    Provider(String),
    #[error(transparent)]
    Driver(#[from] DriverError<ComputeProviderError>),
    #[error("volume {0:?} not found")]
    NotFound(String),
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let exit_code = match dispatch(cli).await {
        Ok(code) => code,
        Err(err) => {
            report_error(&err);
            1
        }
    };

    process::exit(exit_code);
}

async fn dispatch(cli: Cli) -> Result<i32, CliError> {
    let config =
        DriverConfig::load_without_cli_args().map_err(|err| CliError::Config(err.to_string()))?;
    let provider =
        ComputeProvider::new(&config).map_err(|err| CliError::Provider(err.to_string()))?;
    let driver = VolumeDriver::new(
        config.root_path(),
        provider,
        HostFilesystem::with_process_runner(),
    );

    let mut stdout = io::stdout();
    match cli {
        Cli::Create(command) => {
            let (name, options) = create_request(command);
            driver.create(&name, &options).await?;
        }
        Cli::List => {
            for volume in driver.list().await? {
                writeln!(stdout, "{}", volume.name).ok();
            }
        }
        Cli::Get(NameArg { name }) => {
            let volume = driver
                .get(&name)
                .await?
                .ok_or_else(|| CliError::NotFound(name.clone()))?;
            let mountpoint = volume
                .mountpoint
                .map(|path| path.into_string())
                .unwrap_or_default();
            writeln!(stdout, "{}\t{mountpoint}", volume.name).ok();
        }
        Cli::Path(NameArg { name }) => {
            let mountpoint = driver.path(&name).await?;
            writeln!(stdout, "{mountpoint}").ok();
        }
        Cli::Mount(NameArg { name }) => {
            let mountpoint = driver.mount(&name).await?;
            writeln!(stdout, "{mountpoint}").ok();
        }
        Cli::Unmount(NameArg { name }) => {
            driver.unmount(&name).await?;
        }
        Cli::Remove(NameArg { name }) => {
            driver.remove(&name).await?;
        }
        Cli::Capabilities => {
            let capability = driver.capabilities();
            writeln!(stdout, "scope: {}", capability.scope).ok();
        }
    }

    Ok(0)
}

fn create_request(command: CreateCommand) -> (String, BTreeMap<String, String>) {
    let mut options = BTreeMap::new();
    if let Some(value) = command.disk_type {
        options.insert(String::from("Type"), value);
    }
    if let Some(value) = command.size_gb {
        options.insert(String::from("SizeGb"), value);
    }
    if let Some(value) = command.source_snapshot {
        options.insert(String::from("SourceSnapshot"), value);
    }
    if let Some(value) = command.source_image {
        options.insert(String::from("SourceImage"), value);
    }
    (command.name, options)
}

fn report_error(err: &CliError) {
    write_error(io::stderr(), err);
}

fn write_error(mut target: impl Write, err: &CliError) {
    writeln!(target, "{err}").ok();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_request_maps_flags_to_option_keys() {
        let command = CreateCommand {
            name: String::from("vol1"),
            disk_type: Some(String::from("pd-ssd")),
            size_gb: Some(String::from("10")),
            source_snapshot: None,
            source_image: None,
        };

        let (name, options) = create_request(command);

        assert_eq!(name, "vol1");
        assert_eq!(options.get("Type"), Some(&String::from("pd-ssd")));
        assert_eq!(options.get("SizeGb"), Some(&String::from("10")));
        assert!(!options.contains_key("SourceSnapshot"));
    }

    #[test]
    fn write_error_writes_cli_error() {
        let mut buf = Vec::new();
        let err = CliError::NotFound(String::from("vol1"));
        write_error(&mut buf, &err);
        let rendered = String::from_utf8(buf).expect("utf8");
        assert!(
            rendered.contains("volume \"vol1\" not found"),
            "rendered: {rendered}"
        );
    }
}
