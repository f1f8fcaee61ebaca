//! Owner accounts: registration, password login and bearer sessions.

use std::sync::Arc;
use std::time::{Duration, Instant};

use almacen_common::owner::{fields as owner_fields, Owner, OwnerProfile};
use dashmap::DashMap;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{info, warn};

use crate::db::{collections, fetch_one, to_fields, DocumentStore, Filter, Query};
use crate::error::AppError;

pub const SESSION_TTL: Duration = Duration::from_secs(60 * 60);

const SALT_LEN: usize = 16;
const TOKEN_LEN: usize = 32;

#[derive(Debug, Clone, Deserialize)]
pub struct Registration {
    #[serde(rename = "nombre")]
    pub name: String,
    #[serde(rename = "correo")]
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Credentials {
    #[serde(rename = "correo")]
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Registered {
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Login {
    pub token: String,
}

/// Salted SHA-256, stored as `salt$digest` in hex.
fn hash_password(password: &str) -> String {
    let mut salt = [0u8; SALT_LEN];
    rand::thread_rng().fill_bytes(&mut salt);
    format!("{}${}", hex::encode(salt), hex::encode(digest(&salt, password)))
}

fn digest(salt: &[u8], password: &str) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(salt);
    hasher.update(password.as_bytes());
    hasher.finalize().into()
}

fn verify_password(stored: &str, password: &str) -> bool {
    let Some((salt, expected)) = stored.split_once('$') else {
        return false;
    };
    match (hex::decode(salt), hex::decode(expected)) {
        (Ok(salt), Ok(expected)) => constant_time_eq(&digest(&salt, password), &expected),
        _ => false,
    }
}

/// Byte equality whose running time depends only on the lengths.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[derive(Debug, Clone)]
struct Session {
    email: String,
    expires_at: Instant,
}

#[derive(Clone)]
pub struct Owners {
    store: Arc<dyn DocumentStore>,
    sessions: Arc<DashMap<String, Session>>,
    ttl: Duration,
}

impl Owners {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self::with_ttl(store, SESSION_TTL)
    }

    pub fn with_ttl(store: Arc<dyn DocumentStore>, ttl: Duration) -> Self {
        Owners {
            store,
            sessions: Arc::new(DashMap::new()),
            ttl,
        }
    }

    async fn find(&self, email: &str) -> Result<Option<Owner>, AppError> {
        let query = Query::new(collections::OWNERS).filter(Filter::eq(owner_fields::EMAIL, email));
        Ok(fetch_one::<Owner>(self.store.as_ref(), query)
            .await?
            .map(|s| s.value))
    }

    pub async fn register(&self, input: Registration) -> Result<Registered, AppError> {
        if input.name.trim().is_empty() || input.email.trim().is_empty() {
            return Err(AppError::validation("nombre and correo are required"));
        }
        if input.password.is_empty() {
            return Err(AppError::validation("password is required"));
        }
        if self.find(&input.email).await?.is_some() {
            warn!(email = %input.email, "duplicate owner rejected");
            return Err(AppError::validation(format!(
                "an owner with correo '{}' already exists",
                input.email
            )));
        }
        let owner = Owner {
            name: input.name,
            email: input.email,
            password_hash: hash_password(&input.password),
        };
        self.store
            .insert(collections::OWNERS, to_fields(&owner)?)
            .await?;
        info!(email = %owner.email, "owner registered");
        Ok(Registered {
            message: "owner registered".into(),
        })
    }

    /// Unknown email and wrong password are indistinguishable to the caller.
    pub async fn login(&self, credentials: Credentials) -> Result<Login, AppError> {
        let owner = self
            .find(&credentials.email)
            .await?
            .filter(|owner| verify_password(&owner.password_hash, &credentials.password));
        let Some(owner) = owner else {
            warn!(email = %credentials.email, "login rejected");
            return Err(AppError::validation("invalid credentials"));
        };

        let now = Instant::now();
        self.sessions.retain(|_, session| session.expires_at > now);

        let mut token = [0u8; TOKEN_LEN];
        rand::thread_rng().fill_bytes(&mut token);
        let token = hex::encode(token);
        self.sessions.insert(
            token.clone(),
            Session {
                email: owner.email.clone(),
                expires_at: now + self.ttl,
            },
        );
        info!(email = %owner.email, "owner logged in");
        Ok(Login { token })
    }

    pub async fn profile(&self, token: Option<&str>) -> Result<OwnerProfile, AppError> {
        let token = token.ok_or(AppError::Unauthorized)?;
        let session = self.sessions.get(token).map(|s| s.value().clone());
        let email = match session {
            Some(session) if session.expires_at > Instant::now() => session.email,
            Some(_) => {
                self.sessions.remove(token);
                return Err(AppError::Unauthorized);
            }
            None => return Err(AppError::Unauthorized),
        };
        let owner = self.find(&email).await?.ok_or(AppError::Unauthorized)?;
        Ok(OwnerProfile::from(&owner))
    }
}
