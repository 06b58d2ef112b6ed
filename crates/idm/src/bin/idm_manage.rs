// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0
//! Identity management command line tool.
use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use color_eyre::Report;
use eyre::{WrapErr, eyre};
use secrecy::ExposeSecret;
use tracing::info;
use tracing_subscriber::{
    filter::{LevelFilter, Targets},
    prelude::*,
};

use sea_orm::ConnectOptions;
use sea_orm::Database;

use sea_orm_migration::prelude::*;

use idm::PartitionManager;
use idm::config::Config;
use idm::credential::{
    CredentialHandlerRegistry, Credentials, Password, UsernamePasswordCredentials,
};
use idm::db_migration::Migrator;
use idm::manager::{IdentityManager, IdmConfiguration};
use idm::plugin_manager::PluginManager;
use idm::store::{DefaultContextFactory, FileIdentityStore, FileStoreConfiguration};
use idm::types::{IdentityType, Partition, PartitionKind};

#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
    /// Path to the idm config file.
    #[arg(short, long, default_value = "/etc/idm/idm.conf")]
    config: PathBuf,

    /// Verbosity level. Repeat to increase level.
    #[arg(short, long, global=true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage the database schema of the `sql` driver.
    Migrate {
        #[command(subcommand)]
        command: MigrateCommands,
    },
    /// Manage realms.
    Realm {
        #[command(subcommand)]
        command: RealmCommands,
    },
    /// Manage tiers.
    Tier {
        #[command(subcommand)]
        command: TierCommands,
    },
    /// Manage users.
    User {
        #[command(subcommand)]
        command: UserCommands,
    },
    /// Manage passwords.
    Password {
        #[command(subcommand)]
        command: PasswordCommands,
    },
    /// Validate a password and print the credential status.
    Authenticate {
        login_name: String,
        #[arg(long)]
        password: String,
        /// Realm of the user. The default realm when omitted.
        #[arg(long)]
        realm: Option<String>,
    },
}

#[derive(Subcommand)]
enum MigrateCommands {
    /// Apply pending migrations.
    Up {
        /// Number of pending migrations to apply.
        #[arg(short('n'))]
        steps: Option<u32>,
    },
    /// Rollback applied migrations.
    Down {
        /// Number of migrations to rollback.
        #[arg(short('n'))]
        steps: Option<u32>,
    },
    /// Check the status of all migrations.
    Status,
}

#[derive(Subcommand)]
enum RealmCommands {
    Add {
        name: String,
        /// Identity configuration serving the realm.
        #[arg(long, default_value = "default")]
        configuration: String,
    },
    List,
    Remove { name: String },
}

#[derive(Subcommand)]
enum TierCommands {
    Add {
        name: String,
        /// Name of the parent tier.
        #[arg(long)]
        parent: Option<String>,
        #[arg(long, default_value = "default")]
        configuration: String,
    },
    List,
    Remove { name: String },
}

#[derive(Subcommand)]
enum UserCommands {
    Add {
        login_name: String,
        #[arg(long)]
        realm: Option<String>,
        #[arg(long)]
        first_name: Option<String>,
        #[arg(long)]
        last_name: Option<String>,
        #[arg(long)]
        email: Option<String>,
    },
}

#[derive(Subcommand)]
enum PasswordCommands {
    Set {
        login_name: String,
        #[arg(long)]
        password: String,
        #[arg(long)]
        realm: Option<String>,
    },
}

#[allow(clippy::print_stdout)]
async fn migrate(cfg: &Config, command: MigrateCommands) -> Result<(), Report> {
    let connection = cfg
        .database
        .get_connection()
        .ok_or_else(|| eyre!("[database] connection is not configured"))?;
    let opt: ConnectOptions = ConnectOptions::new(connection.expose_secret())
        // Prevent dumping the password in plaintext.
        .sqlx_logging(false)
        .to_owned();

    info!("Establishing the database connection...");
    let conn = Database::connect(opt)
        .await
        .wrap_err("Database connection failed")?;

    match command {
        MigrateCommands::Up { steps } => {
            Migrator::up(&conn, steps).await?;
        }
        MigrateCommands::Down { steps } => {
            Migrator::down(&conn, steps).await?;
        }
        MigrateCommands::Status => {
            let migrations = Migrator::get_pending_migrations(&conn).await?;
            if migrations.is_empty() {
                println!("No pending migrations!");
            } else {
                println!("Pending migrations:");
                for mig in migrations {
                    println!("{}", mig.name());
                }
            }
            let migrations = Migrator::get_applied_migrations(&conn).await?;
            println!("Applied migrations:");
            for mig in migrations {
                println!("{}", mig.name());
            }
        }
    }
    Ok(())
}

async fn identity_manager(
    pm: &PartitionManager,
    realm: Option<&str>,
) -> Result<IdentityManager, Report> {
    Ok(match realm {
        Some(name) => pm.for_realm(name).await?,
        None => pm.create_identity_manager().await?,
    })
}

async fn find_user(im: &IdentityManager, login_name: &str) -> Result<IdentityType, Report> {
    im.get_agent(login_name)
        .await?
        .ok_or_else(|| eyre!("no account {login_name} in {}", im.partition()))
}

#[allow(clippy::print_stdout)]
async fn manage(pm: &PartitionManager, command: Commands) -> Result<(), Report> {
    match command {
        Commands::Migrate { .. } => {}
        Commands::Realm { command } => match command {
            RealmCommands::Add {
                name,
                configuration,
            } => {
                let realm = pm
                    .add_partition(Partition::realm(name), &configuration)
                    .await?;
                println!("{} {}", realm.id, realm.name);
            }
            RealmCommands::List => {
                for realm in pm.list_partitions(Some(PartitionKind::Realm)).await? {
                    println!("{} {} {}", realm.id, realm.name, realm.configuration_name);
                }
            }
            RealmCommands::Remove { name } => {
                let realm = pm
                    .get_partition(PartitionKind::Realm, &name)
                    .await?
                    .ok_or_else(|| eyre!("realm {name} not found"))?;
                pm.remove_partition(&realm).await?;
            }
        },
        Commands::Tier { command } => match command {
            TierCommands::Add {
                name,
                parent,
                configuration,
            } => {
                let parent = match parent {
                    Some(parent) => Some(
                        pm.get_partition(PartitionKind::Tier, &parent)
                            .await?
                            .ok_or_else(|| eyre!("tier {parent} not found"))?,
                    ),
                    None => None,
                };
                let tier = pm
                    .add_partition(Partition::tier(name, parent.as_ref()), &configuration)
                    .await?;
                println!("{} {}", tier.id, tier.name);
            }
            TierCommands::List => {
                for tier in pm.list_partitions(Some(PartitionKind::Tier)).await? {
                    println!(
                        "{} {} {}",
                        tier.id,
                        tier.name,
                        tier.parent_id.as_deref().unwrap_or("-")
                    );
                }
            }
            TierCommands::Remove { name } => {
                let tier = pm
                    .get_partition(PartitionKind::Tier, &name)
                    .await?
                    .ok_or_else(|| eyre!("tier {name} not found"))?;
                pm.remove_partition(&tier).await?;
            }
        },
        Commands::User { command } => match command {
            UserCommands::Add {
                login_name,
                realm,
                first_name,
                last_name,
                email,
            } => {
                let im = identity_manager(pm, realm.as_deref()).await?;
                let user = im
                    .add(IdentityType::user(login_name).with_user_details(
                        first_name.as_deref(),
                        last_name.as_deref(),
                        email.as_deref(),
                    ))
                    .await?;
                println!("{}", user.id);
            }
        },
        Commands::Password { command } => match command {
            PasswordCommands::Set {
                login_name,
                password,
                realm,
            } => {
                let im = identity_manager(pm, realm.as_deref()).await?;
                let user = find_user(&im, &login_name).await?;
                im.update_credential(&user, &Password::new(password))
                    .await?;
            }
        },
        Commands::Authenticate {
            login_name,
            password,
            realm,
        } => {
            let im = identity_manager(pm, realm.as_deref()).await?;
            let mut credentials =
                Credentials::new(UsernamePasswordCredentials::new(login_name, password));
            im.validate_credentials(&mut credentials).await?;
            println!("{:?}", credentials.status());
        }
    }
    Ok(())
}

#[allow(clippy::print_stdout)]
#[tokio::main]
async fn main() -> Result<(), Report> {
    color_eyre::install()?;
    let cli = Cli::parse();

    let filter = Targets::new().with_default(match cli.verbose {
        0 => LevelFilter::WARN,
        1 => LevelFilter::INFO,
        2 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    });

    let log_layer = tracing_subscriber::fmt::layer()
        .with_writer(io::stderr)
        .with_filter(filter);

    // build the tracing registry
    tracing_subscriber::registry().with(log_layer).init();
    let cfg = Config::new(cli.config)?;

    let command = match cli.command {
        Commands::Migrate { command } => return migrate(&cfg, command).await,
        other => other,
    };

    let mut plugin_manager = PluginManager::default();
    // Keep a handle on the file store to wait for its background writes.
    let file_store = (cfg.identity.driver == "file").then(|| {
        Arc::new(FileIdentityStore::new(FileStoreConfiguration::from(
            &cfg.file_store,
        )))
    });
    if let Some(store) = &file_store {
        plugin_manager.register_identity_store("file", store.clone());
    }
    let mut handlers = CredentialHandlerRegistry::from_config(&cfg.identity)?;
    plugin_manager.extend_credential_handlers(&mut handlers)?;
    let context_factory =
        DefaultContextFactory::from_config(&cfg)?.with_credential_handlers(handlers);

    let configuration = IdmConfiguration::from_config(&cfg, &plugin_manager).await?;
    let pm = PartitionManager::new();
    pm.bootstrap(configuration, Arc::new(context_factory))
        .await?;

    let res = manage(&pm, command).await;
    if let Some(store) = file_store {
        store.flush().await;
    }
    res
}
