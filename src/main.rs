// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2025 William Bro-Jørgensen
// Copyright (c) 2020 Guillaume Fraux and contributors
//
// See LICENSE at the project root for full text.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser};
use log::{error, info};

use molgraph::{read_path, write_path};

/// Converts a molecule between file formats, picked from the file
/// extensions.
#[derive(Parser)]
#[command(name = "molgraph", version, about)]
struct Cli {
    #[command(flatten)]
    io: IoOptions,
}

#[derive(Args)]
struct IoOptions {
    /// File to read
    #[arg(value_name = "INPUT")]
    input: PathBuf,

    /// File to write
    #[arg(value_name = "OUTPUT")]
    output: PathBuf,

    /// Do not print the summary line
    #[arg(short, long)]
    quiet: bool,
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let Cli { io } = Cli::parse();

    info!("reading {}", io.input.display());
    let result = read_path(&io.input).and_then(|molecule| {
        info!("writing {}", io.output.display());
        write_path(&io.output, &molecule)?;
        Ok(molecule)
    });
    match result {
        Ok(molecule) => {
            if !io.quiet {
                println!(
                    "{} -> {}: {} atoms, {} bonds, {} frames",
                    io.input.display(),
                    io.output.display(),
                    molecule.atom_count(),
                    molecule.bond_count(),
                    molecule.coordinate_3d_count()
                );
            }
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!("{}: {err}", io.input.display());
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn command_line() {
        Cli::command().debug_assert();

        let cli = Cli::try_parse_from(["molgraph", "in.trr", "out.xyz", "-q"]).unwrap();
        assert_eq!(cli.io.input, PathBuf::from("in.trr"));
        assert_eq!(cli.io.output, PathBuf::from("out.xyz"));
        assert!(cli.io.quiet);

        assert!(Cli::try_parse_from(["molgraph", "in.trr"]).is_err());
        assert!(Cli::try_parse_from(["molgraph", "a", "b", "c"]).is_err());
    }
}
