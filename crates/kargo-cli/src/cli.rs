//! CLI argument definitions for Kargo.
//!
//! Uses `clap` derive macros to define the command surface. Each command
//! corresponds to a handler in the [`super::commands`] module.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "kargo",
    version,
    about = "Publish Maven artifacts to Maven Central",
    long_about = "Kargo stages the Maven output directories of a build into one shared \
                  staging session (legacy Nexus/OSSRH or the Central Portal) and releases it \
                  once every directory has been handed over."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Publish to a Maven Central staging service
    Publish {
        #[command(subcommand)]
        action: PublishAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum PublishAction {
    /// Stage directories into one Nexus staging repository, then close and release it
    Nexus {
        /// Maven-layout output directory (repeat for every module)
        #[arg(short, long = "dir", required = true)]
        dirs: Vec<PathBuf>,
        #[command(flatten)]
        nexus: NexusArgs,
    },
    /// Upload directories as one Central Portal deployment and wait for validation
    Portal {
        /// Maven-layout output directory (repeat for every module)
        #[arg(short, long = "dir", required = true)]
        dirs: Vec<PathBuf>,
        /// Central Portal base URL
        #[arg(long)]
        url: Option<String>,
        /// Publish automatically once validated
        #[arg(long)]
        auto_publish: bool,
        #[command(flatten)]
        credentials: CredentialArgs,
    },
    /// Close and release the single existing staging repository of a group
    Release {
        #[command(flatten)]
        nexus: NexusArgs,
    },
    /// Drop a staging repository
    Drop {
        /// Staging repository id, e.g. iogithubexample-1001
        repository_id: String,
        #[command(flatten)]
        nexus: NexusArgs,
    },
}

#[derive(Args, Debug)]
pub struct NexusArgs {
    /// Nexus staging API base URL
    #[arg(long)]
    pub url: Option<String>,
    /// Artifact group used to select the staging profile
    #[arg(short, long)]
    pub group: Option<String>,
    #[command(flatten)]
    pub credentials: CredentialArgs,
}

#[derive(Args, Debug)]
pub struct CredentialArgs {
    /// Account or user-token name
    #[arg(long, env = "KARGO_PUBLISH_USERNAME")]
    pub username: Option<String>,
    /// Account password or user-token secret
    #[arg(long, env = "KARGO_PUBLISH_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,
}

pub fn parse() -> Cli {
    Cli::parse()
}
