// Copyright (C) 2025  Tom Waddington
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published
// by the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use autoclick::config::Settings;
use autoclick::permissions::Role;
use autoclick::script::{ProfileFile, ScriptFile};
use autoclick::{DryRunExecutor, PlaybackController, PlaybackEvent, PlaybackRun, Randomizer};

#[derive(Parser)]
#[command(
    name = "autoclick",
    version,
    about = "Replay recorded mouse and keyboard macros"
)]
struct Cli {
    /// Settings file (JSON)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Role whose permissions apply, overriding the settings file
    #[arg(long, global = true, value_enum)]
    role: Option<Role>,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Args)]
struct RandomizeArgs {
    /// Randomize delays between actions
    #[arg(long)]
    randomize: bool,

    /// Timing jitter bound as a fraction, e.g. 0.1 for +/-10%
    #[arg(long)]
    randomize_factor: Option<f64>,

    /// Seed for reproducible jitter
    #[arg(long)]
    seed: Option<u64>,
}

#[derive(Subcommand)]
enum Commands {
    /// Play a script file
    Play {
        script: PathBuf,

        /// Playback speed multiplier
        #[arg(short, long)]
        speed: Option<f64>,

        /// Number of times to play the script
        #[arg(short, long)]
        repeat: Option<u32>,

        #[command(flatten)]
        randomize: RandomizeArgs,
    },
    /// Run a profile's scripts in execution order
    Profile {
        profile: PathBuf,

        #[command(flatten)]
        randomize: RandomizeArgs,
    },
    /// List a script's actions
    Show { script: PathBuf },
}

fn init_tracing(verbose: bool) {
    let default = if verbose {
        "autoclick=debug"
    } else {
        "autoclick=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| default.into());
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn apply_randomize(settings: &mut Settings, args: &RandomizeArgs) {
    if args.randomize {
        settings.playback.randomize_enabled = true;
    }
    if let Some(factor) = args.randomize_factor {
        settings.playback.randomize_factor = factor;
    }
}

fn controller_for(settings: &Settings, seed: Option<u64>) -> Result<PlaybackController> {
    let randomizer = seed.map(Randomizer::seeded).unwrap_or_default();
    let permissions = settings.role.default_permissions();
    let controller = PlaybackController::with_randomizer(permissions, randomizer);

    let c = controller.clone();
    ctrlc::set_handler(move || {
        eprintln!("\nReceived Ctrl-C, stopping playback...");
        c.stop();
    })?;

    Ok(controller)
}

async fn follow(mut run: PlaybackRun) -> Result<()> {
    while let Some(event) = run.events().recv().await {
        match event {
            PlaybackEvent::StepStarted { step } => debug!("Step {} started", step + 1),
            PlaybackEvent::ActionPlayed { index } => debug!("Action {} played", index),
            PlaybackEvent::Finished(_) => break,
        }
    }
    let status = run.wait().await.context("Playback task failed")?;
    println!("Playback {}", status);
    Ok(())
}

fn show(path: &Path) -> Result<()> {
    let script = ScriptFile::load(path)?;
    println!("{} ({} actions)", script.name, script.actions.len());
    if !script.description.is_empty() {
        println!("{}", script.description);
    }
    for (i, action) in script.actions.iter().enumerate() {
        println!("{:>4}  {}", i, action);
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut settings = match &cli.config {
        Some(path) => Settings::load(path)?,
        None => Settings::default(),
    };
    if let Some(role) = cli.role {
        settings.role = role;
    }

    match cli.command {
        Commands::Play {
            script,
            speed,
            repeat,
            randomize,
        } => {
            if let Some(speed) = speed {
                settings.playback.speed_factor = speed;
            }
            if let Some(repeat) = repeat {
                settings.playback.repeat_count = repeat;
            }
            apply_randomize(&mut settings, &randomize);
            settings.validate()?;

            let script = ScriptFile::load(&script)?;
            info!("Playing '{}'", script.name);
            let controller = controller_for(&settings, randomize.seed)?;
            let config = settings.run_config();
            let run = controller.start_script(script.actions, config, DryRunExecutor::new())?;
            follow(run).await
        }
        Commands::Profile { profile, randomize } => {
            apply_randomize(&mut settings, &randomize);
            settings.validate()?;

            let file = ProfileFile::load(&profile)?;
            let base_dir = profile.parent().unwrap_or_else(|| Path::new("."));
            let steps = file.materialize(base_dir)?;
            info!("Running profile '{}' ({} steps)", file.name, steps.len());
            let controller = controller_for(&settings, randomize.seed)?;
            let config = settings.chain_config();
            let run = controller.start_profile(steps, config, DryRunExecutor::new())?;
            follow(run).await
        }
        Commands::Show { script } => show(&script),
    }
}
