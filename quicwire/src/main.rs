use anyhow::Context;
use clap::Parser;
use std::io::{self, BufWriter, Read, Write};
use std::path::Path;
use tracing::info;

use quicwire::config::loader::default_config_toml;
use quicwire::config::{load_config, CliArgs};
use quicwire::netio::{parse_hex_datagrams, IterSource};
use quicwire::telemetry;
use quicwire::{ParsedPacket, Pipeline};

fn main() -> anyhow::Result<()> {
    let cli = CliArgs::parse();

    if cli.print_default_config {
        print!("{}", default_config_toml()?);
        return Ok(());
    }

    let config = load_config(&cli)?;

    if cli.validate {
        println!("Configuration is valid");
        return Ok(());
    }

    telemetry::init_logging(&config.logging).context("failed to initialize logging")?;
    info!("Configuration loaded successfully");

    let input = read_input(cli.input.as_deref())?;
    let datagrams = parse_hex_datagrams(&input)?;
    info!(datagrams = datagrams.len(), "Decoding datagrams");

    let pipeline = Pipeline::spawn(&config, IterSource::new(datagrams))
        .context("failed to spawn receive pipeline")?;

    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    for parsed in pipeline.packets().iter() {
        writeln!(out, "{}", describe(&parsed))?;
    }
    out.flush()?;

    let report = pipeline.join();
    if !report.is_clean() {
        anyhow::bail!(
            "receive pipeline failed (receive: {:?}, parse: {:?})",
            report.receive,
            report.parse
        );
    }

    info!("Shutdown complete");
    Ok(())
}

/// Input file, or stdin for `-` / no path.
fn read_input(path: Option<&Path>) -> anyhow::Result<String> {
    match path {
        Some(p) if p != Path::new("-") => std::fs::read_to_string(p)
            .with_context(|| format!("failed to read {}", p.display())),
        _ => {
            let mut buf = String::new();
            io::stdin()
                .read_to_string(&mut buf)
                .context("failed to read stdin")?;
            Ok(buf)
        }
    }
}

fn describe(parsed: &ParsedPacket) -> String {
    let packet = &parsed.packet;
    let pn = packet
        .packet_number()
        .map_or_else(|| "-".to_string(), |pn| pn.to_string());
    format!(
        "datagram={} type={:?} dcid={} pn={} len={} frames={}",
        parsed.datagram_sequence,
        packet.packet_type(),
        packet.dcid(),
        pn,
        packet.packet_length(),
        packet.frames().len()
    )
}
