use std::convert::TryInto;
use std::path::PathBuf;
use std::{env, fs};

use crate::error::SecurityError;

const PASSWORD_SALT: &str = "password.salt";
const JWT_SECRET: &str = "jwt.secret";

pub type Salt = [u8; 16];

/// Secret material shared by password hashing and token signing.
#[derive(Clone)]
pub struct Security {
    pub salt: Salt,
    pub jwt_secret: Vec<u8>,
}

impl std::fmt::Debug for Security {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Security")
    }
}

#[inline]
fn security_dir() -> PathBuf {
    PathBuf::from(env::var("SECURITY_DIR").unwrap_or("./security".to_string()))
}

impl Security {
    pub fn load() -> Result<Security, SecurityError> {
        let dir = security_dir();

        if cfg!(feature = "generate-security") {
            fs::create_dir_all(&dir)?;
        }

        tracing::info!("Loading password salt...");
        let salt_path = dir.join(PASSWORD_SALT);
        let salt: Salt = match fs::read(&salt_path) {
            Ok(bytes) => {
                tracing::info!("Salt found and loaded.");
                bytes
                    .try_into()
                    .map_err(|_| SecurityError::BadSalt(salt_path.clone()))?
            }
            Err(_) if cfg!(feature = "generate-security") => {
                tracing::info!("Salt not found in '{}'. Generating a new one.", salt_path.display());
                let salt: Salt = rand::random();
                fs::write(&salt_path, salt)?;
                salt
            }
            Err(_) => return Err(SecurityError::Missing(salt_path)),
        };

        tracing::info!("Loading JWT signing secret...");
        let jwt_secret = match env::var("JWT_SECRET") {
            Ok(secret) if !secret.is_empty() => {
                tracing::info!("Using JWT secret from environment.");
                secret.into_bytes()
            }
            _ => {
                let secret_path = dir.join(JWT_SECRET);
                match fs::read(&secret_path) {
                    Ok(secret) if !secret.is_empty() => secret,
                    _ if cfg!(feature = "generate-security") => {
                        tracing::info!("Generating a new JWT secret.");
                        let secret: [u8; 32] = rand::random();
                        fs::write(&secret_path, secret)?;
                        secret.to_vec()
                    }
                    _ => return Err(SecurityError::Missing(secret_path)),
                }
            }
        };

        Ok(Security { salt, jwt_secret })
    }

    /// Fresh random material that is never written to disk.
    pub fn ephemeral() -> Security {
        let secret: [u8; 32] = rand::random();
        Security {
            salt: rand::random(),
            jwt_secret: secret.to_vec(),
        }
    }
}
