use thiserror::Error;

#[derive(Debug, Error)]
pub enum HashError {
    #[error("password hashing task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("bcrypt failed: {0}")]
    Bcrypt(#[from] bcrypt::BcryptError),
}

/// bcrypt hashing with a configurable cost. Hashing runs on the blocking
/// pool so a login never stalls the runtime workers.
#[derive(Debug, Clone, Copy)]
pub struct PasswordHasher {
    cost: u32,
}

impl PasswordHasher {
    pub fn new(cost: u32) -> Self {
        Self { cost }
    }

    pub async fn hash(&self, password: String) -> Result<String, HashError> {
        let cost = self.cost;
        let hashed = tokio::task::spawn_blocking(move || bcrypt::hash(password, cost)).await??;
        Ok(hashed)
    }

    /// A malformed stored hash counts as a mismatch.
    pub async fn verify(&self, password: String, hash: String) -> Result<bool, HashError> {
        let matched =
            tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash).unwrap_or(false))
                .await?;
        Ok(matched)
    }
}
