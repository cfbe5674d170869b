//! KodeSync - repository sync and deployment CLI
//!
//! The `kodesync` command drives a project's version-control lifecycle
//! against a sandbox root and publishes its file tree to a hosting
//! provider.
//!
//! ## Commands
//!
//! - `init` / `clone`: create or fetch repository metadata
//! - `add` / `commit` / `push` / `pull`: synchronize with a remote
//! - `status` / `log` / `branch`: inspect repository state
//! - `remote add`: register a remote
//! - `create-repo`: create a repository on the source host
//! - `deploy` / `deploy-status`: publish and track deployments

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::Level;

use kodesync_core::{
    init_tracing, DeployOrchestrator, FileSnapshot, Identity, RepoHostClient, RepoSession,
};

#[derive(Parser)]
#[command(name = "kodesync")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Repository sync and deployment for Kode projects", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    /// Sandbox root (default: current directory)
    #[arg(short = 'C', long, global = true, default_value = ".")]
    root: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Author/credential flags shared by every remote-touching command.
#[derive(clap::Args)]
struct IdentityArgs {
    /// Commit author name
    #[arg(long, env = "KODESYNC_NAME", default_value = "Kode User")]
    name: String,

    /// Commit author email
    #[arg(long, env = "KODESYNC_EMAIL", default_value = "user@kode.dev")]
    email: String,

    /// Bearer token for the remote
    #[arg(long, env = "KODESYNC_TOKEN", default_value = "")]
    token: String,
}

impl IdentityArgs {
    fn identity(&self) -> Identity {
        Identity::new(&self.name, &self.email, &self.token)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a repository with `main` as the primary branch
    Init {
        #[command(flatten)]
        identity: IdentityArgs,
    },

    /// Clone a remote's default branch into an empty root (shallow)
    Clone {
        /// Remote URL
        url: String,

        #[command(flatten)]
        identity: IdentityArgs,
    },

    /// Stage paths (default: entire tree)
    Add {
        /// Paths to stage
        paths: Vec<String>,
    },

    /// Commit the staging area
    Commit {
        /// Commit message
        #[arg(short, long)]
        message: String,

        #[command(flatten)]
        identity: IdentityArgs,
    },

    /// Push a branch to a remote
    Push {
        /// Remote name or URL
        #[arg(default_value = "origin")]
        remote: String,

        /// Branch to push
        #[arg(default_value = "main")]
        branch: String,

        #[command(flatten)]
        identity: IdentityArgs,
    },

    /// Pull a branch from a remote
    Pull {
        /// Remote name or URL
        #[arg(default_value = "origin")]
        remote: String,

        /// Branch to pull
        #[arg(default_value = "main")]
        branch: String,

        #[command(flatten)]
        identity: IdentityArgs,
    },

    /// Show modified paths
    Status,

    /// Show commit history
    Log {
        /// Maximum number of commits
        #[arg(short = 'n', long, default_value_t = 10)]
        depth: usize,
    },

    /// Show the current branch
    Branch,

    /// Manage remotes
    Remote {
        #[command(subcommand)]
        action: RemoteAction,
    },

    /// Create a repository on the source host
    CreateRepo {
        /// Repository name
        name: String,

        /// Repository description
        #[arg(short, long, default_value = "")]
        description: String,

        /// Create as private
        #[arg(long)]
        private: bool,

        /// Bearer token for the source host API
        #[arg(long, env = "KODESYNC_TOKEN")]
        token: String,
    },

    /// Publish the file tree to a hosting provider
    Deploy {
        /// Provider name (vercel, netlify)
        provider: String,

        /// Bearer token for the provider API
        #[arg(long, env = "KODESYNC_DEPLOY_TOKEN")]
        token: String,

        /// Site/project name (provider generates one when omitted)
        #[arg(long)]
        target: Option<String>,
    },

    /// Poll a deployment's status
    DeployStatus {
        /// Provider name (vercel, netlify)
        provider: String,

        /// Deployment id returned by `deploy`
        id: String,

        /// Bearer token for the provider API
        #[arg(long, env = "KODESYNC_DEPLOY_TOKEN")]
        token: String,
    },
}

#[derive(Subcommand)]
enum RemoteAction {
    /// Register a named remote
    Add {
        /// Remote name
        name: String,
        /// Remote URL
        url: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    init_tracing(cli.json, level);

    let session = RepoSession::new(&cli.root);

    match cli.command {
        Commands::Init { identity } => {
            session.init(&identity.identity()).await?;
            println!("Initialized repository on branch 'main'");
        }
        Commands::Clone { url, identity } => {
            session.clone_from(&url, &identity.identity()).await?;
            println!("Cloned {url}");
        }
        Commands::Add { paths } => {
            session.add_files(&paths).await?;
        }
        Commands::Commit { message, identity } => {
            let record = session.commit(&message, &identity.identity()).await?;
            println!("[{}] {}", &record.oid[..7.min(record.oid.len())], record.message);
        }
        Commands::Push {
            remote,
            branch,
            identity,
        } => {
            session.push(&remote, &branch, &identity.identity()).await?;
            println!("Pushed {branch} to {remote}");
        }
        Commands::Pull {
            remote,
            branch,
            identity,
        } => {
            session.pull(&remote, &branch, &identity.identity()).await?;
            println!("Pulled {branch} from {remote}");
        }
        Commands::Status => {
            let entries = session.status().await;
            if entries.is_empty() {
                println!("working tree clean");
            }
            for entry in entries {
                println!("M  {}", entry.path);
            }
        }
        Commands::Log { depth } => {
            for record in session.log(depth).await? {
                println!(
                    "{}  {}  {} <{}>  {}",
                    &record.oid[..7.min(record.oid.len())],
                    record.timestamp.format("%Y-%m-%d %H:%M"),
                    record.author.name,
                    record.author.email,
                    record.message,
                );
            }
        }
        Commands::Branch => {
            println!("{}", session.current_branch().await);
        }
        Commands::Remote { action } => match action {
            RemoteAction::Add { name, url } => {
                session.add_remote(&name, &url).await?;
                println!("Added remote {name}");
            }
        },
        Commands::CreateRepo {
            name,
            description,
            private,
            token,
        } => {
            let repo = RepoHostClient::new()
                .create_repo(&name, &description, private, &token)
                .await?;
            println!("{}", repo.html_url);
            println!("clone url: {}", repo.clone_url);
        }
        Commands::Deploy {
            provider,
            token,
            target,
        } => {
            let snapshot = FileSnapshot::from_dir(&cli.root)?;
            let orchestrator = DeployOrchestrator::new();
            let deployment = orchestrator
                .submit(&provider, snapshot, &token, target)
                .await?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&deployment)?);
            } else if let Some(message) = &deployment.error_message {
                bail!("deployment failed: {message}");
            } else {
                println!("deployment {} is {}", deployment.id, deployment.state);
                if let Some(url) = &deployment.url {
                    println!("url: https://{}", url.trim_start_matches("https://"));
                }
            }
        }
        Commands::DeployStatus {
            provider,
            id,
            token,
        } => {
            let orchestrator = DeployOrchestrator::new();
            match orchestrator.poll_status(&provider, &id, &token).await? {
                Some(deployment) => {
                    if cli.json {
                        println!("{}", serde_json::to_string_pretty(&deployment)?);
                    } else {
                        println!("deployment {} is {}", deployment.id, deployment.state);
                        if let Some(message) = deployment.error_message {
                            println!("error: {message}");
                        }
                    }
                }
                None => bail!("deployment {id} not found (expired or invalid id)"),
            }
        }
    }

    Ok(())
}
