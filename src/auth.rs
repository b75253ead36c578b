use rand::RngCore;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use uuid::Uuid;

use crate::error::GrievanceError;
use crate::models::{Role, User};

pub const MIN_PASSWORD_LEN: usize = 6;

const HASH_SCHEME: &str = "sha256";
const SALT_LEN: usize = 16;
/// Rounds of SHA-256 applied to new hashes. Stored per hash, so raising it
/// keeps older hashes verifiable.
pub const HASH_ROUNDS: u32 = 100_000;

/// The identity a single command runs as. Built once after login and passed
/// to every handler that needs it.
#[derive(Debug, Clone)]
pub struct Session {
    pub user_id: Uuid,
    pub username: String,
    pub role: Role,
}

impl Session {
    pub fn require_staff(&self) -> Result<(), GrievanceError> {
        if self.role.is_staff() {
            Ok(())
        } else {
            Err(GrievanceError::AccessDenied)
        }
    }

    /// Submitter filter for "my grievances": admins see every case.
    pub fn visible_submitter(&self) -> Option<Uuid> {
        match self.role {
            Role::Admin => None,
            Role::Staff | Role::Student => Some(self.user_id),
        }
    }
}

impl From<User> for Session {
    fn from(user: User) -> Self {
        Self {
            user_id: user.id,
            username: user.username,
            role: user.role,
        }
    }
}

pub fn validate_registration(password: &str, confirm: &str) -> Result<(), GrievanceError> {
    if password != confirm {
        return Err(GrievanceError::PasswordMismatch);
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(GrievanceError::PasswordTooShort {
            min: MIN_PASSWORD_LEN,
        });
    }
    Ok(())
}

pub fn hash_password(password: &str) -> String {
    hash_with_rounds(password, HASH_ROUNDS)
}

fn hash_with_rounds(password: &str, rounds: u32) -> String {
    let mut salt = [0u8; SALT_LEN];
    rand::thread_rng().fill_bytes(&mut salt);
    format!(
        "{HASH_SCHEME}${rounds}${}${}",
        hex::encode(salt),
        hex::encode(digest(&salt, password, rounds))
    )
}

pub fn verify_password(password: &str, stored: &str) -> bool {
    let mut parts = stored.splitn(4, '$');
    let (Some(scheme), Some(rounds), Some(salt), Some(expected)) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return false;
    };
    if scheme != HASH_SCHEME {
        return false;
    }
    let Ok(rounds) = rounds.parse::<u32>() else {
        return false;
    };
    if rounds == 0 {
        return false;
    }
    let (Ok(salt), Ok(expected)) = (hex::decode(salt), hex::decode(expected)) else {
        return false;
    };

    digest(&salt, password, rounds).ct_eq(expected.as_slice()).into()
}

fn digest(salt: &[u8], password: &str, rounds: u32) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(salt);
    hasher.update(password.as_bytes());
    let mut output = hasher.finalize();

    for _ in 1..rounds {
        let mut hasher = Sha256::new();
        hasher.update(output);
        hasher.update(salt);
        output = hasher.finalize();
    }
    output.to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registration_rejects_mismatch_before_length() {
        assert!(matches!(
            validate_registration("abc", "abd"),
            Err(GrievanceError::PasswordMismatch)
        ));
        assert!(matches!(
            validate_registration("abc", "abc"),
            Err(GrievanceError::PasswordTooShort { min: 6 })
        ));
        assert!(validate_registration("hunter22", "hunter22").is_ok());
    }

    #[test]
    fn hashed_password_verifies() {
        let stored = hash_password("correct horse");
        assert!(stored.starts_with("sha256$"));
        assert!(verify_password("correct horse", &stored));
        assert!(!verify_password("wrong horse", &stored));
    }

    #[test]
    fn hashes_record_their_round_count() {
        let stored = hash_password("correct horse");
        assert!(stored.starts_with(&format!("sha256${HASH_ROUNDS}$")));

        let cheaper = hash_with_rounds("correct horse", 10);
        assert!(cheaper.starts_with("sha256$10$"));
        assert!(verify_password("correct horse", &cheaper));

        let single = hash_with_rounds("correct horse", 1);
        assert!(verify_password("correct horse", &single));
        assert!(!verify_password("wrong horse", &single));
    }

    #[test]
    fn hashes_are_salted() {
        assert_ne!(hash_password("same-password"), hash_password("same-password"));
    }

    #[test]
    fn malformed_hashes_never_verify() {
        assert!(!verify_password("pw", ""));
        assert!(!verify_password("pw", "md5$00$00"));
        assert!(!verify_password("pw", "sha256$zz$zz"));
        assert!(!verify_password("pw", "sha256$0$00$00"));
        assert!(!verify_password("pw", "sha256$many$00$00"));
    }

    #[test]
    fn only_staff_roles_pass_staff_check() {
        let mut session = Session {
            user_id: Uuid::new_v4(),
            username: "sam".to_string(),
            role: Role::Student,
        };
        assert!(matches!(session.require_staff(), Err(GrievanceError::AccessDenied)));
        assert_eq!(session.visible_submitter(), Some(session.user_id));

        session.role = Role::Staff;
        assert!(session.require_staff().is_ok());

        session.role = Role::Admin;
        assert!(session.require_staff().is_ok());
        assert_eq!(session.visible_submitter(), None);
    }
}
