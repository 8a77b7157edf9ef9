//! Worker capabilities.
//!
//! Read access and account management are split into two traits so that a
//! caller which only lists workers never holds the power to change them.
//! Both are implemented by [`WorkshopDb`].

use crate::errors::{Result, WorkshopError};
use crate::workshop::db::WorkshopDb;
use crate::workshop::models::{
    ProductionLog, Worker, WorkerRequest, WorkerRole, WorkerTaskGroup,
};

#[cfg(not(test))]
const HASH_COST: u32 = bcrypt::DEFAULT_COST;
#[cfg(test)]
const HASH_COST: u32 = 4;

pub trait WorkerDirectory {
    fn worker(&self, worker_id: i64) -> Result<Worker>;
    fn workers(&self) -> Result<Vec<Worker>>;
    fn worker_logs(&self, worker_id: i64) -> Result<Vec<ProductionLog>>;
    fn worker_task_groups(&self, worker_id: i64) -> Result<Vec<WorkerTaskGroup>>;
}

pub trait WorkerAdmin {
    fn register_worker(&self, req: &WorkerRequest) -> Result<Worker>;
    fn update_worker_profile(&self, worker_id: i64, req: &WorkerRequest) -> Result<Worker>;
    fn remove_worker(&self, worker_id: i64) -> Result<()>;
    /// Change a password on behalf of `actor`, the role of the caller.
    fn change_password(
        &self,
        actor: Option<WorkerRole>,
        worker_id: i64,
        password: &str,
    ) -> Result<()>;
}

pub fn hash_password(password: &str) -> Result<String> {
    bcrypt::hash(password, HASH_COST)
        .map_err(|e| WorkshopError::Other(anyhow::Error::new(e).context("Failed to hash password")))
}

/// Admins may change anyone's password; managers only those of workers and
/// pattern makers.
pub fn check_password_change(actor: Option<WorkerRole>, target: WorkerRole) -> Result<()> {
    match actor {
        Some(WorkerRole::Admin) => Ok(()),
        Some(WorkerRole::Manager) if matches!(target, WorkerRole::Worker | WorkerRole::PatternMaker) => {
            Ok(())
        }
        Some(WorkerRole::Manager) => Err(WorkshopError::forbidden(format!(
            "a manager cannot change the password of a {}",
            target
        ))),
        _ => Err(WorkshopError::forbidden(
            "only an admin or manager can change passwords",
        )),
    }
}

fn require_password(password: &str) -> Result<()> {
    if password.is_empty() {
        return Err(WorkshopError::validation("password is required"));
    }
    Ok(())
}

impl WorkerDirectory for WorkshopDb {
    fn worker(&self, worker_id: i64) -> Result<Worker> {
        self.get_worker(worker_id)
    }

    fn workers(&self) -> Result<Vec<Worker>> {
        self.get_workers()
    }

    fn worker_logs(&self, worker_id: i64) -> Result<Vec<ProductionLog>> {
        self.get_worker_logs(worker_id)
    }

    fn worker_task_groups(&self, worker_id: i64) -> Result<Vec<WorkerTaskGroup>> {
        self.get_worker_task_groups(worker_id)
    }
}

impl WorkerAdmin for WorkshopDb {
    fn register_worker(&self, req: &WorkerRequest) -> Result<Worker> {
        let password_hash = match req.password.as_deref() {
            Some(p) if !p.is_empty() => Some(hash_password(p)?),
            _ if req.role == WorkerRole::Admin => {
                return Err(WorkshopError::validation(
                    "an admin account requires a password",
                ));
            }
            _ => None,
        };
        self.create_worker(req, password_hash)
    }

    fn update_worker_profile(&self, worker_id: i64, req: &WorkerRequest) -> Result<Worker> {
        self.update_worker(worker_id, req)
    }

    fn remove_worker(&self, worker_id: i64) -> Result<()> {
        self.delete_worker(worker_id)
    }

    fn change_password(
        &self,
        actor: Option<WorkerRole>,
        worker_id: i64,
        password: &str,
    ) -> Result<()> {
        require_password(password)?;
        let target = self.get_worker(worker_id)?;
        if let Err(e) = check_password_change(actor, target.role) {
            tracing::warn!(worker_id, actor = ?actor, "password change refused");
            return Err(e);
        }
        let hash = hash_password(password)?;
        self.set_worker_password(worker_id, &hash)
    }
}

/// Create the first admin account when none exists. Returns the new account.
pub fn ensure_admin(db: &WorkshopDb, name: &str, password: &str) -> Result<Option<Worker>> {
    if db.has_worker_with_role(WorkerRole::Admin)? {
        return Ok(None);
    }
    let admin = db.register_worker(&WorkerRequest {
        name: name.to_string(),
        notes: "bootstrap account".to_string(),
        role: WorkerRole::Admin,
        is_active: true,
        worker_group: None,
        password: Some(password.to_string()),
    })?;
    tracing::info!(worker_id = admin.worker_id, name = %admin.name, "bootstrapped admin account");
    Ok(Some(admin))
}
