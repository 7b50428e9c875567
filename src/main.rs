//! Binary entry point for the `vcloud-disks` CLI.

use std::io::{self, Write};
use std::process;

use clap::Parser;
use thiserror::Error;
use tracing_subscriber::EnvFilter;

use vcloud_disks::{
    Tags, VcloudConfig, VcloudVolumeAdapter, Volume, VolumeCreateOptions, VolumeError,
    VolumeFormat, VolumeStatus, VolumeSupport,
};

mod cli;

use cli::{AttachCommand, Cli, CreateCommand, DetachCommand, FormatArg};

#[derive(Debug, Error)]
enum CliError {
    #[error("configuration error: {0}")]
    Config(String),
    #[error("volume operation failed: {0}")]
    Volume(#[from] VolumeError),
    #[error("volume {0} not found")]
    VolumeMissing(String),
    #[error("failed to write output: {0}")]
    Output(#[from] io::Error),
}

#[tokio::main]
async fn main() {
    init_tracing();
    let cli = Cli::parse();
    let exit_code = match dispatch(cli).await {
        Ok(()) => 0,
        Err(err) => {
            report_error(&err);
            1
        }
    };

    process::exit(exit_code);
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

async fn dispatch(cli: Cli) -> Result<(), CliError> {
    let config = load_config()?;
    let adapter = VcloudVolumeAdapter::from_config(&config)?;
    let mut stdout = io::stdout();

    match cli {
        Cli::List => {
            for volume in adapter.list().await? {
                write_volume_line(&mut stdout, &volume)?;
            }
        }
        Cli::Status => {
            for status in adapter.list_status().await? {
                write_status_line(&mut stdout, &status)?;
            }
        }
        Cli::Get(args) => {
            let Some(volume) = adapter.get(&args.volume_id).await? else {
                return Err(CliError::VolumeMissing(args.volume_id));
            };
            write_volume_detail(&mut stdout, &volume)?;
        }
        Cli::Create(command) => {
            let options = create_options(command)?;
            let volume_id = adapter.create(&options).await?;
            writeln!(stdout, "{volume_id}")?;
        }
        Cli::Attach(AttachCommand {
            volume_id,
            server_id,
            device_id,
        }) => adapter.attach(&volume_id, &server_id, &device_id).await?,
        Cli::Detach(DetachCommand { volume_id, force }) => {
            adapter.detach(&volume_id, force).await?;
        }
        Cli::Remove(args) => adapter.remove(&args.volume_id).await?,
        Cli::SetTags(command) => {
            let tags: Tags = command.tags.into_iter().collect();
            adapter.set_tags_many(&command.volume_ids, &tags).await?;
        }
        Cli::UpdateTags(command) => {
            let tags: Tags = command.tags.into_iter().collect();
            adapter.update_tags_many(&command.volume_ids, &tags).await?;
        }
        Cli::RemoveTags(command) => {
            adapter
                .remove_tags_many(&command.volume_ids, &command.keys)
                .await?;
        }
    }
    Ok(())
}

fn load_config() -> Result<VcloudConfig, CliError> {
    let config =
        VcloudConfig::load_without_cli_args().map_err(|err| CliError::Config(err.to_string()))?;
    config
        .validate()
        .map_err(|err| CliError::Config(err.to_string()))?;
    Ok(config)
}

fn create_options(command: CreateCommand) -> Result<VolumeCreateOptions, CliError> {
    let format = match command.format {
        FormatArg::Block => VolumeFormat::Block,
        FormatArg::Nfs => VolumeFormat::Nfs,
    };
    command
        .tags
        .into_iter()
        .fold(
            VolumeCreateOptions::builder()
                .name(command.name)
                .description(command.description.unwrap_or_default())
                .size_gib(command.size_gib)
                .format(format)
                .snapshot_id(command.snapshot)
                .data_center_id(command.data_center)
                .device_id(command.device_id)
                .attach_to(command.attach_to),
            |builder, (key, value)| builder.metadata(key, value),
        )
        .build()
        .map_err(|err| CliError::Volume(VolumeError::from(err)))
}

fn write_volume_line(mut target: impl Write, volume: &Volume) -> io::Result<()> {
    writeln!(
        target,
        "{}\t{}\t{}\t{}\t{}",
        volume.id,
        volume.state,
        volume.size_bytes,
        volume.attached_server_id.as_deref().unwrap_or("-"),
        volume.name
    )
}

fn write_status_line(mut target: impl Write, status: &VolumeStatus) -> io::Result<()> {
    writeln!(target, "{}\t{}", status.id, status.state)
}

fn write_volume_detail(mut target: impl Write, volume: &Volume) -> io::Result<()> {
    writeln!(target, "id: {}", volume.id)?;
    writeln!(target, "name: {}", volume.name)?;
    writeln!(target, "description: {}", volume.description)?;
    writeln!(target, "state: {}", volume.state)?;
    writeln!(target, "size_bytes: {}", volume.size_bytes)?;
    writeln!(target, "region: {}", volume.region_id)?;
    writeln!(target, "data_center: {}", volume.data_center_id)?;
    writeln!(
        target,
        "attached_to: {}",
        volume.attached_server_id.as_deref().unwrap_or("-")
    )?;
    writeln!(
        target,
        "device_id: {}",
        volume.device_id.as_deref().unwrap_or("-")
    )?;
    if let Some(created_at) = volume.created_at {
        writeln!(target, "created_at: {}", created_at.to_rfc3339())?;
    }
    for (key, value) in &volume.tags {
        writeln!(target, "tag: {key}={value}")?;
    }
    Ok(())
}

fn report_error(err: &CliError) {
    write_error(io::stderr(), err);
}

fn write_error(mut target: impl Write, err: &CliError) {
    writeln!(target, "{err}").ok();
}
