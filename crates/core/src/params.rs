//! Immutable network parameters, carried through constructors instead of a
//! global settings singleton (per the source's mainnet/testnet/regtest
//! selection, generalized here the way the teacher's `defaults::network`
//! module carries per-network constants as associated values).

use crate::hashes::Hash32;

/// Which Bitcoin-compatible network a set of parameters describes.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum NetworkId {
    /// Mainnet.
    Main,
    /// Testnet3.
    Testnet3,
    /// Regtest.
    Regtest,
    /// Signet.
    Signet,
}

/// A height/hash pair a header chain must match at the given height, used
/// to reject deep reorganizations around historically significant points.
pub type Checkpoint = (u32, Hash32);

/// Immutable per-network parameters threaded through header/block
/// acceptance and the wire-message framing layer.
#[derive(Clone, Debug)]
pub struct NetworkParams {
    /// Which network this describes.
    pub id: NetworkId,
    /// Four-byte wire magic identifying this network.
    pub magic: [u8; 4],
    /// Default P2P listen port.
    pub default_port: u16,
    /// Proof-of-work limit (highest-difficulty `bits` value accepted).
    pub pow_limit_bits: u32,
    /// Known-good checkpoints, ascending by height.
    pub checkpoints: Vec<Checkpoint>,
}

impl NetworkParams {
    /// Bitcoin mainnet parameters.
    pub fn mainnet() -> Self {
        Self {
            id: NetworkId::Main,
            magic: [0xF9, 0xBE, 0xB4, 0xD9],
            default_port: 8333,
            pow_limit_bits: 0x1d00_ffff,
            checkpoints: vec![(
                0,
                Hash32::from_reversed_hex(
                    "000000000019d6689c085ae165831e934ff763ae46a2a6c172b3f1b60a8ce26",
                )
                .expect("valid genesis hash literal"),
            )],
        }
    }

    /// Testnet3 parameters.
    pub fn testnet3() -> Self {
        Self {
            id: NetworkId::Testnet3,
            magic: [0x0B, 0x11, 0x09, 0x07],
            default_port: 18333,
            pow_limit_bits: 0x1d00_ffff,
            checkpoints: vec![],
        }
    }

    /// Regtest parameters.
    pub fn regtest() -> Self {
        Self {
            id: NetworkId::Regtest,
            magic: [0xFA, 0xBF, 0xB5, 0xDA],
            default_port: 18444,
            pow_limit_bits: 0x207f_ffff,
            checkpoints: vec![],
        }
    }

    /// Signet parameters.
    pub fn signet() -> Self {
        Self {
            id: NetworkId::Signet,
            magic: [0x0A, 0x03, 0xCF, 0x40],
            default_port: 38333,
            pow_limit_bits: 0x1e00_ffff,
            checkpoints: vec![],
        }
    }

    /// Look up the checkpoint hash required at `height`, if any.
    pub fn checkpoint_at(&self, height: u32) -> Option<Hash32> {
        self.checkpoints
            .iter()
            .find(|(h, _)| *h == height)
            .map(|(_, hash)| *hash)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn mainnet_magic_matches_wire_spec() {
        assert_eq!(NetworkParams::mainnet().magic, [0xF9, 0xBE, 0xB4, 0xD9]);
        assert_eq!(NetworkParams::testnet3().magic, [0x0B, 0x11, 0x09, 0x07]);
        assert_eq!(NetworkParams::regtest().magic, [0xFA, 0xBF, 0xB5, 0xDA]);
        assert_eq!(NetworkParams::signet().magic, [0x0A, 0x03, 0xCF, 0x40]);
    }
}
