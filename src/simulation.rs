//! Venue driver
//!
//! Builds one server, starts the admin and every user as independent tasks,
//! and waits for all of them. A failing actor is logged and reported; it
//! never stops the others.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::admin::Admin;
use crate::config::Config;
use crate::error::{ActorExit, ChatError};
use crate::event::SharedSink;
use crate::server::{ChatServer, ServerHandle};
use crate::types::UserId;
use crate::user::User;

/// Outcome of one user actor
#[derive(Debug, Clone, PartialEq)]
pub struct UserReport {
    pub id: UserId,
    pub exit: Result<ActorExit, ChatError>,
}

/// Outcome of a whole run
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationReport {
    pub admin: Result<ActorExit, ChatError>,
    pub users: Vec<UserReport>,
}

impl SimulationReport {
    /// Users that ran their protocol to the end
    pub fn completed_users(&self) -> usize {
        self.users
            .iter()
            .filter(|u| u.exit == Ok(ActorExit::Completed))
            .count()
    }

    /// Users stopped by cancellation
    pub fn interrupted_users(&self) -> usize {
        self.users
            .iter()
            .filter(|u| u.exit == Ok(ActorExit::Interrupted))
            .count()
    }
}

/// Run a full venue and return once every actor has stopped
///
/// `rng` seeds the server, the admin and every user, and draws user IDs and
/// desires, so a seeded RNG gives a reproducible set of actors.
pub async fn run<R: Rng>(
    config: &Config,
    sink: SharedSink,
    cancel: CancellationToken,
    rng: &mut R,
) -> Result<SimulationReport, ChatError> {
    config.validate()?;
    let server = ChatServer::spawn(
        config.server_config(),
        sink,
        StdRng::seed_from_u64(rng.gen()),
    )?;
    run_on(config, &server, cancel, rng).await
}

/// Run the admin and users against an existing server
pub async fn run_on<R: Rng>(
    config: &Config,
    server: &ServerHandle,
    cancel: CancellationToken,
    rng: &mut R,
) -> Result<SimulationReport, ChatError> {
    config.validate()?;

    let mut admin = Admin::with_rng(
        config.admin_name.clone(),
        server.clone(),
        cancel.child_token(),
        StdRng::seed_from_u64(rng.gen()),
    )
    .action_count(config.admin_actions)
    .pacing_scale(config.pacing_scale);
    let admin_name = admin.name().to_string();
    let admin_task = tokio::spawn(async move { admin.run().await });

    let mut users = Vec::with_capacity(config.user_count);
    for _ in 0..config.user_count {
        let id = UserId(rng.gen_range(1..=config.max_user_id));
        let desire = f64::from(rng.gen_range(config.desire_range.clone()));
        let mut user = User::with_rng(
            id,
            desire,
            server.clone(),
            cancel.child_token(),
            StdRng::seed_from_u64(rng.gen()),
        )
        .pacing_scale(config.pacing_scale);

        users.push((user.id(), tokio::spawn(async move { user.run().await })));
    }
    info!("Started admin {} and {} users", admin_name, users.len());

    let users = collect_users(users).await;

    let admin = match admin_task.await {
        Ok(exit) => exit,
        Err(e) => Err(ChatError::TaskFailed(e.to_string())),
    };
    if let Err(e) = &admin {
        error!("Admin {} failed: {}", admin_name, e);
    }

    Ok(SimulationReport { admin, users })
}

/// Await every user task, reporting a panicked or aborted task as `TaskFailed`
async fn collect_users(
    tasks: Vec<(UserId, JoinHandle<Result<ActorExit, ChatError>>)>,
) -> Vec<UserReport> {
    let mut reports = Vec::with_capacity(tasks.len());
    for (id, task) in tasks {
        let exit = match task.await {
            Ok(exit) => exit,
            Err(e) => Err(ChatError::TaskFailed(e.to_string())),
        };
        if let Err(e) = &exit {
            error!("User {} failed: {}", id, e);
        }
        reports.push(UserReport { id, exit });
    }
    reports
}
