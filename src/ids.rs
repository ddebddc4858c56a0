//! Telemetry identifier generation.
//!
//! Four identifier shapes are produced, all from a cryptographically secure
//! source. A failure to obtain random bytes is returned as
//! [`Error::Entropy`]; there is no fallback to a weaker generator.
//!
//! | kind           | shape                                                  |
//! |----------------|--------------------------------------------------------|
//! | `machineID`    | hex(`auth0\|user_`) + 64 hex chars                      |
//! | `macMachineID` | 64 hex chars                                           |
//! | `deviceID`     | `xxxxxxxx-xxxx-xxxx-xxxx-xxxxxxxxxxxx`                 |
//! | `sqmID`        | `{xxxxxxxx-xxxx-xxxx-xxxx-xxxxxxxxxxxx}`               |

use std::fmt;
use std::str::FromStr;

use rand::rngs::OsRng;
use rand::TryRngCore;

use crate::error::{Error, Result};

const MACHINE_ID_PREFIX: &[u8] = b"auth0|user_";
const RANDOM_HEX_LEN: usize = 64;
const UUID_LEN: usize = 36;
const UUID_HYPHENS: [usize; 4] = [8, 13, 18, 23];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IdKind {
    MachineId,
    MacMachineId,
    DeviceId,
    SqmId,
}

impl IdKind {
    pub const ALL: [IdKind; 4] = [
        IdKind::MachineId,
        IdKind::MacMachineId,
        IdKind::DeviceId,
        IdKind::SqmId,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            IdKind::MachineId => "machineID",
            IdKind::MacMachineId => "macMachineID",
            IdKind::DeviceId => "deviceID",
            IdKind::SqmId => "sqmID",
        }
    }
}

impl fmt::Display for IdKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IdKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        IdKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| format!("unknown identifier kind: {s}"))
    }
}

/// Source of random bytes for [`IdGenerator`].
pub trait EntropySource: Send + Sync {
    fn fill(&self, buf: &mut [u8]) -> std::result::Result<(), String>;
}

/// The operating system's CSPRNG.
#[derive(Debug, Clone, Copy, Default)]
pub struct OsEntropy;

impl EntropySource for OsEntropy {
    fn fill(&self, buf: &mut [u8]) -> std::result::Result<(), String> {
        OsRng.try_fill_bytes(buf).map_err(|e| e.to_string())
    }
}

/// Stateless identifier generator. Safe to share between threads.
#[derive(Debug, Clone, Default)]
pub struct IdGenerator<E = OsEntropy> {
    entropy: E,
}

impl IdGenerator {
    pub fn new() -> Self {
        Self { entropy: OsEntropy }
    }
}

impl<E: EntropySource> IdGenerator<E> {
    pub fn with_entropy(entropy: E) -> Self {
        Self { entropy }
    }

    fn random_hex<const N: usize>(&self) -> Result<String> {
        let mut buf = [0u8; N];
        self.entropy.fill(&mut buf).map_err(Error::Entropy)?;
        Ok(hex::encode(buf))
    }

    /// Hex-encoded `auth0|user_` prefix followed by 32 random bytes as hex.
    pub fn machine_id(&self) -> Result<String> {
        let random = self.random_hex::<32>()?;
        Ok(format!("{}{}", hex::encode(MACHINE_ID_PREFIX), random))
    }

    pub fn mac_machine_id(&self) -> Result<String> {
        self.random_hex::<32>()
    }

    /// UUID-shaped (8-4-4-4-12). No version or variant bits are set.
    pub fn device_id(&self) -> Result<String> {
        let id = self.random_hex::<16>()?;
        Ok(format!(
            "{}-{}-{}-{}-{}",
            &id[0..8],
            &id[8..12],
            &id[12..16],
            &id[16..20],
            &id[20..32]
        ))
    }

    pub fn sqm_id(&self) -> Result<String> {
        Ok(format!("{{{}}}", self.device_id()?))
    }

    pub fn generate(&self, kind: IdKind) -> Result<String> {
        match kind {
            IdKind::MachineId => self.machine_id(),
            IdKind::MacMachineId => self.mac_machine_id(),
            IdKind::DeviceId => self.device_id(),
            IdKind::SqmId => self.sqm_id(),
        }
    }
}

/// Checks the shape of `id` for `kind`: length, hyphen positions and hex
/// charset. Used for self-checks only; generation never consults it.
pub fn validate(id: &str, kind: IdKind) -> bool {
    match kind {
        IdKind::MachineId => {
            id.len() == MACHINE_ID_PREFIX.len() * 2 + RANDOM_HEX_LEN && is_hex(id)
        }
        IdKind::MacMachineId => id.len() == RANDOM_HEX_LEN && is_hex(id),
        IdKind::DeviceId => is_uuid_shaped(id),
        IdKind::SqmId => id
            .strip_prefix('{')
            .and_then(|rest| rest.strip_suffix('}'))
            .is_some_and(is_uuid_shaped),
    }
}

fn is_hex(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_hexdigit())
}

fn is_uuid_shaped(s: &str) -> bool {
    s.len() == UUID_LEN
        && s.bytes().enumerate().all(|(i, b)| {
            if UUID_HYPHENS.contains(&i) {
                b == b'-'
            } else {
                b.is_ascii_hexdigit()
            }
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn is_lower_hex(s: &str) -> bool {
        s.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
    }

    struct FailingEntropy;

    impl EntropySource for FailingEntropy {
        fn fill(&self, _buf: &mut [u8]) -> std::result::Result<(), String> {
            Err("entropy pool unavailable".into())
        }
    }

    struct FixedEntropy(u8);

    impl EntropySource for FixedEntropy {
        fn fill(&self, buf: &mut [u8]) -> std::result::Result<(), String> {
            buf.fill(self.0);
            Ok(())
        }
    }

    #[test]
    fn device_ids_are_uuid_shaped_lowercase() {
        let gen = IdGenerator::new();
        for _ in 0..10_000 {
            let id = gen.device_id().unwrap();
            assert!(validate(&id, IdKind::DeviceId), "rejected {id}");
            assert_eq!(id.len(), 36);
            for (i, part) in id.split('-').enumerate() {
                assert_eq!(part.len(), [8, 4, 4, 4, 12][i]);
                assert!(is_lower_hex(part), "not lowercase hex: {id}");
            }
        }
    }

    #[test]
    fn machine_id_has_prefix_and_64_char_suffix() {
        let gen = IdGenerator::new();
        let id = gen.machine_id().unwrap();
        let prefix = hex::encode("auth0|user_");
        assert_eq!(prefix, "61757468307c757365725f");
        let suffix = id.strip_prefix(&prefix).expect("prefix");
        assert_eq!(suffix.len(), 64);
        assert!(is_lower_hex(suffix));
        assert!(validate(&id, IdKind::MachineId));
    }

    #[test]
    fn mac_machine_id_is_64_lowercase_hex() {
        let gen = IdGenerator::new();
        for _ in 0..100 {
            let id = gen.mac_machine_id().unwrap();
            assert_eq!(id.len(), 64);
            assert!(is_lower_hex(&id));
            assert!(validate(&id, IdKind::MacMachineId));
        }
    }

    #[test]
    fn sqm_id_is_braced_device_id() {
        let gen = IdGenerator::new();
        let id = gen.sqm_id().unwrap();
        assert!(id.starts_with('{') && id.ends_with('}'));
        assert!(validate(&id[1..id.len() - 1], IdKind::DeviceId));
        assert!(validate(&id, IdKind::SqmId));
    }

    #[test]
    fn consecutive_ids_differ() {
        let gen = IdGenerator::new();
        assert_ne!(gen.machine_id().unwrap(), gen.machine_id().unwrap());
        assert_ne!(gen.device_id().unwrap(), gen.device_id().unwrap());
    }

    #[test]
    fn fixed_entropy_produces_expected_layout() {
        let gen = IdGenerator::with_entropy(FixedEntropy(0xab));
        assert_eq!(
            gen.device_id().unwrap(),
            "abababab-abab-abab-abab-abababababab"
        );
        assert_eq!(gen.mac_machine_id().unwrap(), "ab".repeat(32));
    }

    #[test]
    fn entropy_failure_is_surfaced() {
        let gen = IdGenerator::with_entropy(FailingEntropy);
        for kind in IdKind::ALL {
            let err = gen.generate(kind).unwrap_err();
            assert!(matches!(err, Error::Entropy(_)), "{kind}: {err}");
        }
    }

    #[test]
    fn validate_rejects_malformed_ids() {
        assert!(!validate("", IdKind::DeviceId));
        assert!(!validate("abababab-abab-abab-abab-ababababab", IdKind::DeviceId));
        assert!(!validate("abababababab-abab-abab-abab-abababab", IdKind::DeviceId));
        assert!(!validate("abababab-abab-abab-abab-abababababag", IdKind::DeviceId));
        assert!(!validate("abababab-abab-abab-abab-abababababab", IdKind::SqmId));
        assert!(!validate("{abababab-abab-abab-abab-abababababab", IdKind::SqmId));
        assert!(!validate(&"a".repeat(63), IdKind::MacMachineId));
        assert!(!validate(&format!("{}z", "a".repeat(63)), IdKind::MacMachineId));
        assert!(!validate(&"a".repeat(64), IdKind::MachineId));
    }

    #[test]
    fn kind_parses_from_name() {
        for kind in IdKind::ALL {
            assert_eq!(kind.as_str().parse::<IdKind>().unwrap(), kind);
        }
        assert!("uuid".parse::<IdKind>().is_err());
    }
}
