//! Compile-time macro support.
//!
//! Macros expand to literals during elaboration; nothing macro-shaped
//! survives into code generation.

use sha3::{Digest, Keccak256};

/// Derive the deterministic on-chain address of a module.
///
/// The address is the Keccak-256 digest of the module's name under a fixed
/// domain prefix, matching how the platform derives contract identities.
pub fn module_address(name: &str) -> Vec<u8> {
    let mut hasher = Keccak256::new();
    hasher.update(b"tomb.module:");
    hasher.update(name.as_bytes());
    hasher.finalize().to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_is_deterministic() {
        assert_eq!(module_address("bank"), module_address("bank"));
        assert_ne!(module_address("bank"), module_address("vault"));
        assert_eq!(module_address("bank").len(), 32);
    }
}
