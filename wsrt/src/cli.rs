// CLI argument parsing and definitions

use clap::{Args as ClapArgs, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Clone, Parser)]
#[command(name = "wsrt")]
#[command(about = "Validate, order and run multi-container workspace environments")]
#[command(version)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Path to an engine configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable debug output
    #[arg(short, long, global = true)]
    pub debug: bool,
}

/// Where the recipe comes from and how to read it.
#[derive(Debug, Clone, ClapArgs)]
pub struct RecipeArgs {
    /// Recipe file; for `dockerimage` the file holds the image reference
    pub recipe: PathBuf,

    /// Recipe type (compose, dockerfile, dockerimage, openshift)
    #[arg(short = 't', long = "type", default_value = "compose")]
    pub recipe_type: String,

    /// Content type of the recipe; guessed from the type when omitted
    #[arg(long)]
    pub content_type: Option<String>,

    /// YAML file mapping machine names to servers, installers and attributes
    #[arg(short, long)]
    pub machines: Option<PathBuf>,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Parse and validate a recipe, printing any warnings
    Validate {
        #[command(flatten)]
        recipe: RecipeArgs,
    },

    /// Print the machine start order, one name per line
    Order {
        #[command(flatten)]
        recipe: RecipeArgs,
    },

    /// Print the normalized runtime model as YAML
    Show {
        #[command(flatten)]
        recipe: RecipeArgs,
    },

    /// Start the environment on Docker and keep it running until interrupted
    Start {
        #[command(flatten)]
        recipe: RecipeArgs,

        /// Workspace id; a random one is generated when omitted
        #[arg(long)]
        workspace_id: Option<String>,

        /// Environment name within the workspace
        #[arg(long, default_value = "default")]
        env_name: String,

        /// Owner of the runtime
        #[arg(long, default_value = "wsrt")]
        owner: String,

        /// Print machine events as JSON lines
        #[arg(long)]
        json: bool,
    },

    /// Remove every Docker resource left behind by a workspace
    Cleanup {
        /// Workspace id whose resources are removed
        workspace_id: String,

        /// Environment name the runtime was started with
        #[arg(long, default_value = "default")]
        env_name: String,
    },

    /// List the enabled recipe types
    Types,
}
