//! Charge Worlds room service binary.
//!
//! # Usage
//!
//! ```bash
//! # Register a world and a player
//! charge-worlds create-world --id clx9q2m0b --name "Ashes of Vel"
//! charge-worlds add-member --world clx9q2m0b --user 1234 --role player
//!
//! # Talk to the room service (secret from the environment)
//! export LIVEBLOCKS_SECRET_KEY=sk_...
//! charge-worlds provision --world clx9q2m0b
//! charge-worlds authorize --room world:clx9q2m0b --user 1234
//! charge-worlds archive --world clx9q2m0b
//!
//! # Weekly snapshots of every world until interrupted
//! charge-worlds schedule
//! ```

use std::{path::PathBuf, time::Duration};

use charge_core::{MemberRole, Membership, RoomId, World, WorldId};
use charge_server::{
    ArchiveOutcome, ArchiveScheduler, LiveblocksClient, RedbStorage, RoomAuthorizer,
    RoomProvisioner, RoomServiceConfig, ServerError, ServiceConfig, SnapshotArchiver, Storage,
    StorageError, SystemEnv,
    config::DEFAULT_SNAPSHOT_RETENTION,
    room_service::DEFAULT_BASE_URL,
};
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Charge Worlds room service
#[derive(Parser, Debug)]
#[command(name = "charge-worlds")]
#[command(about = "Room provisioning, authorization and snapshot archiving for Charge Worlds")]
#[command(version)]
struct Args {
    /// Path to the world database
    #[arg(long, env = "CHARGE_WORLDS_DB", default_value = "charge-worlds.redb")]
    db: PathBuf,

    /// Room service API base URL
    #[arg(long, env = "LIVEBLOCKS_BASE_URL", default_value = DEFAULT_BASE_URL)]
    liveblocks_url: String,

    /// Room service secret key
    #[arg(long, env = "LIVEBLOCKS_SECRET_KEY", hide_env_values = true)]
    liveblocks_secret: Option<String>,

    /// Per-request timeout for the room service, in seconds
    #[arg(long, default_value = "30")]
    request_timeout_secs: u64,

    /// Snapshots kept per world (at least 1)
    #[arg(long, default_value_t = DEFAULT_SNAPSHOT_RETENTION, value_parser = parse_retention)]
    retention: usize,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Register a new world
    CreateWorld {
        /// World id
        #[arg(long)]
        id: String,
        /// Display name
        #[arg(long)]
        name: String,
    },

    /// Add a user to a world, or change their role
    AddMember {
        /// World id
        #[arg(long)]
        world: String,
        /// User id
        #[arg(long)]
        user: String,
        /// Role within the world
        #[arg(long, value_enum, default_value = "player")]
        role: RoleArg,
    },

    /// Ensure a world's room exists with the current access policy
    Provision {
        /// World id
        #[arg(long)]
        world: String,
    },

    /// Authorize a user for a room and print the room token
    Authorize {
        /// Room id (world:<worldId>)
        #[arg(long)]
        room: String,
        /// User id
        #[arg(long)]
        user: String,
    },

    /// Snapshot one world's room storage now
    Archive {
        /// World id
        #[arg(long)]
        world: String,
    },

    /// List a world's stored snapshots, newest first
    Snapshots {
        /// World id
        #[arg(long)]
        world: String,
    },

    /// Snapshot every world on a fixed interval until interrupted
    Schedule {
        /// Seconds between passes (default: one week)
        #[arg(long)]
        interval_secs: Option<u64>,
    },
}

fn parse_retention(value: &str) -> Result<usize, String> {
    match value.parse::<usize>() {
        Ok(0) => Err("must keep at least one snapshot".to_string()),
        Ok(n) => Ok(n),
        Err(e) => Err(e.to_string()),
    }
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum RoleArg {
    Owner,
    Player,
    Spectator,
}

impl From<RoleArg> for MemberRole {
    fn from(role: RoleArg) -> Self {
        match role {
            RoleArg::Owner => Self::Owner,
            RoleArg::Player => Self::Player,
            RoleArg::Spectator => Self::Spectator,
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    run(args).await?;

    Ok(())
}

fn service_config(args: &Args) -> ServiceConfig {
    ServiceConfig {
        room_service: RoomServiceConfig {
            base_url: args.liveblocks_url.clone(),
            secret_key: args.liveblocks_secret.clone().unwrap_or_default(),
            request_timeout: Duration::from_secs(args.request_timeout_secs),
        },
        snapshot_retention: args.retention,
        ..ServiceConfig::default()
    }
}

fn room_client(config: &ServiceConfig) -> Result<LiveblocksClient, ServerError> {
    let service = &config.room_service;
    if service.secret_key.is_empty() {
        return Err(ServerError::Config("LIVEBLOCKS_SECRET_KEY is not set".to_string()));
    }

    Ok(LiveblocksClient::new(&service.base_url, &service.secret_key, service.request_timeout)?)
}

#[allow(clippy::print_stdout)]
async fn run(args: Args) -> Result<(), ServerError> {
    let config = service_config(&args);
    tracing::debug!(?config, db = %args.db.display(), "configuration loaded");

    let storage = RedbStorage::open(&args.db)?;
    let env = SystemEnv::new();

    match args.command {
        Command::CreateWorld { id, name } => {
            let world = World::new(WorldId::new(id)?, name);
            storage.create_world(&world)?;
            tracing::info!(world_id = %world.id, "world created");
        },

        Command::AddMember { world, user, role } => {
            let world_id = WorldId::new(world)?;
            if storage.load_world(&world_id)?.is_none() {
                return Err(world_not_found(world_id));
            }
            storage.store_membership(&Membership {
                world_id,
                user_id: user,
                role: role.into(),
            })?;
        },

        Command::Provision { world } => {
            let world_id = WorldId::new(world)?;
            let provisioner =
                RoomProvisioner::new(storage, room_client(&config)?, config.policy.clone());

            let outcome =
                provisioner.ensure_room_provisioned(&world_id, &RoomId::for_world(&world_id)).await?;
            println!("{outcome:?}");
        },

        Command::Authorize { room, user } => {
            let rooms = room_client(&config)?;
            let provisioner =
                RoomProvisioner::new(storage.clone(), rooms.clone(), config.policy.clone());
            let authorizer = RoomAuthorizer::new(storage, rooms, provisioner);

            let token = authorizer.authorize(&user, &room).await?;
            println!("{}", token.0);
        },

        Command::Archive { world } => {
            let world_id = WorldId::new(world)?;
            let world = storage
                .load_world(&world_id)?
                .ok_or_else(|| world_not_found(world_id))?;
            let archiver =
                SnapshotArchiver::new(storage, room_client(&config)?, env, config.snapshot_retention);

            match archiver.archive_world_snapshot(&world).await? {
                ArchiveOutcome::Archived { snapshot_id, size, pruned } => {
                    println!("archived {snapshot_id} ({size} bytes, pruned {pruned})");
                },
                ArchiveOutcome::Skipped => println!("skipped: room has no storage"),
            }
        },

        Command::Snapshots { world } => {
            let world_id = WorldId::new(world)?;
            for snapshot in storage.load_snapshots(&world_id)? {
                println!("{}\t{}\t{}", snapshot.id, snapshot.created_at_ms, snapshot.name);
            }
        },

        Command::Schedule { interval_secs } => {
            let interval = interval_secs.map_or(config.archive_interval, Duration::from_secs);
            let archiver = SnapshotArchiver::new(
                storage.clone(),
                room_client(&config)?,
                env.clone(),
                config.snapshot_retention,
            );
            let scheduler = ArchiveScheduler::new(storage, archiver, env, interval);

            scheduler
                .run(async {
                    if let Err(e) = tokio::signal::ctrl_c().await {
                        tracing::error!(error = %e, "failed to listen for shutdown signal");
                    }
                })
                .await;
        },
    }

    Ok(())
}

fn world_not_found(world_id: WorldId) -> ServerError {
    ServerError::Storage(StorageError::WorldNotFound(world_id))
}
