mod commands;
mod config;
mod drive;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

use crate::commands::{
    Options, RecipeFields, Workspace, cmd_add, cmd_delete, cmd_edit, cmd_export, cmd_image,
    cmd_import, cmd_ingredient_add, cmd_ingredient_remove, cmd_list, cmd_login, cmd_logout,
    cmd_phase_add, cmd_phase_remove, cmd_restore, cmd_show, cmd_units, cmd_whoami,
};
use crate::config::Config;
use crate::drive::UploadMode;

#[derive(Parser)]
#[command(
    name = "recipebox",
    version,
    about = "Keep your recipes in Google Drive",
    long_about = "Keep your recipes in Google Drive.\n\n\
        Recipes live in a single recipes.json file in your Drive, shared with the \
        recipebox app. Photos are uploaded next to it."
)]
struct Cli {
    /// How new files are uploaded to Drive
    #[arg(long, global = true, value_enum, default_value_t = UploadMode::Multipart)]
    upload_mode: UploadMode,
    /// Wait this long after the last change before writing to Drive
    #[arg(long, global = true, default_value = "2000", value_name = "MS")]
    quiet_period_ms: u64,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Save a Google access token (with the drive.file scope) for later commands
    Login {
        /// OAuth access token
        #[arg(long, env = "RECIPEBOX_ACCESS_TOKEN", hide_env_values = true)]
        token: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Forget the saved access token
    Logout {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show who is logged in
    Whoami {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print the cooking units offered for ingredients
    Units {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Download an image referenced by a recipe
    Image {
        /// Image reference (e.g. "google-drive-id:1AbC...")
        reference: String,
        /// Write to this file instead of stdout
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
    #[command(flatten)]
    Recipes(RecipeCommands),
}

/// Commands that load the recipe list from Drive.
#[derive(Subcommand)]
enum RecipeCommands {
    /// List recipes
    List {
        /// Include recipes marked as deleted
        #[arg(long)]
        all: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show one recipe (by id, id prefix or title)
    Show {
        /// Recipe id, id prefix or title
        recipe: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Add a recipe
    Add {
        /// Recipe title
        #[arg(long)]
        title: String,
        #[command(flatten)]
        fields: RecipeFields,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Change a recipe's fields
    Edit {
        /// Recipe id, id prefix or title
        recipe: String,
        /// New title
        #[arg(long)]
        title: Option<String>,
        #[command(flatten)]
        fields: RecipeFields,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete a recipe
    Delete {
        /// Recipe id, id prefix or title
        recipe: String,
        /// Only mark it as deleted (the app hides it but keeps the data)
        #[arg(long)]
        soft: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Manage a recipe's ingredients
    Ingredient {
        #[command(subcommand)]
        command: IngredientCommands,
    },
    /// Manage a recipe's phases (steps)
    Phase {
        #[command(subcommand)]
        command: PhaseCommands,
    },
    /// Import a recipe from a Cooklang (.cook) file
    Import {
        /// Path to the .cook file
        file: PathBuf,
        /// Title override (defaults to metadata title or filename)
        #[arg(long)]
        title: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Replace all recipes with the contents of a JSON backup
    Restore {
        /// Path to a file written by `export`
        file: PathBuf,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Write all recipes as JSON
    Export {
        /// Write to this file instead of stdout
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum IngredientCommands {
    /// Add an ingredient to a recipe
    Add {
        /// Recipe id, id prefix or title
        recipe: String,
        /// Ingredient name
        name: String,
        /// Quantity (a number like "250", or free text like "a pinch")
        quantity: String,
        /// Unit (see `recipebox units`, default: g)
        #[arg(short, long)]
        unit: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Remove an ingredient (also unlinks it from phases)
    Remove {
        /// Recipe id, id prefix or title
        recipe: String,
        /// Ingredient id, id prefix or name
        ingredient: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum PhaseCommands {
    /// Append a phase to a recipe
    Add {
        /// Recipe id, id prefix or title
        recipe: String,
        /// Phase name
        name: String,
        /// Instructions for this phase
        #[arg(short, long, default_value = "")]
        instructions: String,
        /// Ingredient used in this phase (id, id prefix or name; repeatable)
        #[arg(long = "ingredient", value_name = "INGREDIENT")]
        ingredients: Vec<String>,
        /// Photo for this phase (repeatable)
        #[arg(long = "photo", value_name = "PATH")]
        photos: Vec<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Remove a phase
    Remove {
        /// Recipe id, id prefix or title
        recipe: String,
        /// Phase id or id prefix
        phase: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::load()?;
    tracing::debug!(data_dir = %config.data_dir.display(), "loaded config");
    let opts = Options {
        upload_mode: cli.upload_mode,
        quiet_period: Duration::from_millis(cli.quiet_period_ms),
    };

    match cli.command {
        Commands::Login { token, json } => cmd_login(&config, &opts, &token, json).await,
        Commands::Logout { json } => cmd_logout(&config, json),
        Commands::Whoami { json } => cmd_whoami(&config, json),
        Commands::Units { json } => cmd_units(json),
        Commands::Image { reference, output } => {
            cmd_image(&config, &opts, &reference, output.as_deref()).await
        }
        Commands::Recipes(command) => {
            let ws = Workspace::open(&config, &opts).await?;
            run_recipe_command(&ws, command).await?;
            ws.save().await
        }
    }
}

async fn run_recipe_command(ws: &Workspace, command: RecipeCommands) -> Result<()> {
    match command {
        RecipeCommands::List { all, json } => cmd_list(ws, all, json),
        RecipeCommands::Show { recipe, json } => cmd_show(ws, &recipe, json),
        RecipeCommands::Add {
            title,
            fields,
            json,
        } => cmd_add(ws, &title, fields, json).await,
        RecipeCommands::Edit {
            recipe,
            title,
            fields,
            json,
        } => cmd_edit(ws, &recipe, title, fields, json).await,
        RecipeCommands::Delete { recipe, soft, json } => cmd_delete(ws, &recipe, soft, json).await,
        RecipeCommands::Ingredient { command } => match command {
            IngredientCommands::Add {
                recipe,
                name,
                quantity,
                unit,
                json,
            } => cmd_ingredient_add(ws, &recipe, &name, &quantity, unit.as_deref(), json).await,
            IngredientCommands::Remove {
                recipe,
                ingredient,
                json,
            } => cmd_ingredient_remove(ws, &recipe, &ingredient, json).await,
        },
        RecipeCommands::Phase { command } => match command {
            PhaseCommands::Add {
                recipe,
                name,
                instructions,
                ingredients,
                photos,
                json,
            } => {
                cmd_phase_add(
                    ws,
                    &recipe,
                    &name,
                    &instructions,
                    &ingredients,
                    &photos,
                    json,
                )
                .await
            }
            PhaseCommands::Remove {
                recipe,
                phase,
                json,
            } => cmd_phase_remove(ws, &recipe, &phase, json).await,
        },
        RecipeCommands::Import { file, title, json } => cmd_import(ws, &file, title, json).await,
        RecipeCommands::Restore { file, json } => cmd_restore(ws, &file, json),
        RecipeCommands::Export { output } => cmd_export(ws, output.as_deref()),
    }
}
