//! Vault names: globally unique DNS labels, 3-24 characters of ASCII letters,
//! digits and non-consecutive hyphens, starting with a letter.

use crate::KeyVaultError;
use rand::distributions::Alphanumeric;
use rand::Rng;

const VAULT_NAME_PREFIX: &str = "kv-sample-";
const RANDOM_SUFFIX_LEN: usize = 10;

/// A random vault name, e.g. `kv-sample-x3k9q0m2zt`.
pub fn generate_vault_name() -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(RANDOM_SUFFIX_LEN)
        .map(|b| char::from(b).to_ascii_lowercase())
        .collect();
    format!("{}{}", VAULT_NAME_PREFIX, suffix)
}

pub fn validate_vault_name(name: &str) -> Result<(), KeyVaultError> {
    let valid = (3..=24).contains(&name.len())
        && name.starts_with(|c: char| c.is_ascii_alphabetic())
        && !name.ends_with('-')
        && !name.contains("--")
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '-');
    if valid {
        Ok(())
    } else {
        Err(KeyVaultError::malformed("vault name", name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_names_are_valid_and_distinct() {
        let a = generate_vault_name();
        let b = generate_vault_name();
        assert!(validate_vault_name(&a).is_ok(), "{}", a);
        assert!(a.starts_with("kv-sample-"));
        assert_eq!(a.len(), 20);
        assert_ne!(a, b);
    }

    #[test]
    fn rejects_invalid_names() {
        for name in &["kv", "1vault", "vault-", "my--vault", "vault_name", "a-very-long-vault-name-indeed"] {
            assert!(validate_vault_name(name).is_err(), "{}", name);
        }
        assert!(validate_vault_name("test-keyvault").is_ok());
    }
}
