//! Transaction parsing and serialization for versions 1 (legacy) through 4
//! (Sapling), including the Sprout JoinSplit section carried by versions >= 2.
//!
//! Wire constants (`KOTO_NOTECIPHERTEXT_SIZE` and friends) are taken from
//! `original_source/electrum/transaction.py`, which this module's layout follows
//! field-for-field.

use koto_types::hash::H256;

use crate::error::{Result, TxError};
use crate::stream::{write_compact_size, write_var_bytes, Reader};

pub const COIN: i64 = 100_000_000;
pub const TOTAL_SUPPLY: i64 = 21_000_000_000;
pub const MAX_MONEY: i64 = COIN * TOTAL_SUPPLY;

pub const OVERWINTER_VERSION_GROUP_ID: u32 = 0x03C4_8270;
pub const SAPLING_VERSION_GROUP_ID: u32 = 0x892F_2085;

const OVERWINTERED_BIT: u32 = 0x8000_0000;

pub const GROTH_PROOF_SIZE: usize = 48 + 96 + 48;
pub const PHGR_PROOF_SIZE: usize = 33 + 33 + 65 + 33 + 33 + 33 + 33 + 33;

pub const KOTO_NOTECIPHERTEXT_SIZE: usize = 1 + 8 + 32 + 32 + 512 + 16;
pub const KOTO_SAPLING_ENCPLAINTEXT_SIZE: usize = 1 + 11 + 8 + 32 + 512;
pub const KOTO_SAPLING_ENCCIPHERTEXT_SIZE: usize = KOTO_SAPLING_ENCPLAINTEXT_SIZE + 16;
pub const KOTO_SAPLING_OUTPLAINTEXT_SIZE: usize = 32 + 32;
pub const KOTO_SAPLING_OUTCIPHERTEXT_SIZE: usize = KOTO_SAPLING_OUTPLAINTEXT_SIZE + 16;

/// A JoinSplit's zero-knowledge proof: a 192-byte Groth16 proof (version >= 4) or
/// the older 296-byte PHGR13 bundle (version < 4). Neither variant is interpreted;
/// bytes are preserved exactly for re-serialization.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum JoinSplitProof {
    Groth(Vec<u8>),
    Phgr(Vec<u8>),
}

impl JoinSplitProof {
    fn bytes(&self) -> &[u8] {
        match self {
            JoinSplitProof::Groth(b) | JoinSplitProof::Phgr(b) => b,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct JoinSplitDescription {
    pub vpub_old: u64,
    pub vpub_new: u64,
    pub anchor: [u8; 32],
    pub nullifiers: [[u8; 32]; 2],
    pub commitments: [[u8; 32]; 2],
    pub ephemeral_key: [u8; 32],
    pub random_seed: [u8; 32],
    pub macs: [[u8; 32]; 2],
    pub proof: JoinSplitProof,
    pub ciphertexts: [Vec<u8>; 2],
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ShieldedSpend {
    pub cv: [u8; 32],
    pub anchor: [u8; 32],
    pub nullifier: [u8; 32],
    pub rk: [u8; 32],
    pub zkproof: Vec<u8>,
    pub spend_auth_sig: [u8; 64],
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ShieldedOutput {
    pub cv: [u8; 32],
    pub cm: [u8; 32],
    pub ephemeral_key: [u8; 32],
    pub enc_ciphertext: Vec<u8>,
    pub out_ciphertext: Vec<u8>,
    pub zkproof: Vec<u8>,
}

#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct SaplingBundle {
    pub value_balance: i64,
    pub spends: Vec<ShieldedSpend>,
    pub outputs: Vec<ShieldedOutput>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TxIn {
    pub prevout_hash: H256,
    pub prevout_n: u32,
    pub script_sig: Vec<u8>,
    pub sequence: u32,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TxOut {
    pub value: i64,
    pub script_pubkey: Vec<u8>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Transaction {
    pub version: u32,
    pub overwintered: bool,
    pub version_group_id: Option<u32>,
    pub inputs: Vec<TxIn>,
    pub outputs: Vec<TxOut>,
    pub lock_time: u32,
    pub expiry_height: Option<u32>,
    pub sapling: Option<SaplingBundle>,
    pub join_splits: Vec<JoinSplitDescription>,
    pub join_split_pubkey: Option<[u8; 32]>,
    pub join_split_sig: Option<[u8; 64]>,
    pub binding_sig: Option<[u8; 64]>,
}

/// Magic prefix marking a not-yet-fully-signed transaction's partial-serialization
/// envelope.
pub const PARTIAL_TX_MAGIC: [u8; 5] = *b"EPTF\xff";
pub const PARTIAL_TX_VERSION: u8 = 0x00;

impl Transaction {
    pub fn deserialize(bytes: &[u8]) -> Result<Self> {
        if bytes.len() >= PARTIAL_TX_MAGIC.len() && bytes[..PARTIAL_TX_MAGIC.len()] == PARTIAL_TX_MAGIC {
            let version_byte = bytes[PARTIAL_TX_MAGIC.len()];
            if version_byte != PARTIAL_TX_VERSION {
                return Err(TxError::SerializationError(format!(
                    "unknown partial transaction format version {version_byte:#04x}"
                )));
            }
            return Self::deserialize(&bytes[PARTIAL_TX_MAGIC.len() + 1..]);
        }

        let mut r = Reader::new(bytes);
        let tx = Self::parse(&mut r)?;
        if !r.is_exhausted() {
            return Err(TxError::SerializationError(format!(
                "{} trailing bytes after transaction",
                r.remaining()
            )));
        }
        Ok(tx)
    }

    fn parse(r: &mut Reader<'_>) -> Result<Self> {
        let version_word = r.read_u32()?;
        let overwintered = version_word & OVERWINTERED_BIT != 0;
        let version = version_word & !OVERWINTERED_BIT;

        let version_group_id = if version >= 3 {
            Some(r.read_u32()?)
        } else {
            None
        };

        let n_inputs = r.read_compact_size()?;
        let mut inputs = Vec::with_capacity(n_inputs as usize);
        for _ in 0..n_inputs {
            let prevout_hash = H256(r.read_array()?);
            let prevout_n = r.read_u32()?;
            let script_sig = r.read_var_bytes()?.to_vec();
            let sequence = r.read_u32()?;
            inputs.push(TxIn {
                prevout_hash,
                prevout_n,
                script_sig,
                sequence,
            });
        }

        let n_outputs = r.read_compact_size()?;
        let mut outputs = Vec::with_capacity(n_outputs as usize);
        for _ in 0..n_outputs {
            let value = r.read_i64()?;
            if !(0..=MAX_MONEY).contains(&value) {
                return Err(TxError::SerializationError(format!(
                    "output value {value} out of range"
                )));
            }
            let script_pubkey = r.read_var_bytes()?.to_vec();
            outputs.push(TxOut {
                value,
                script_pubkey,
            });
        }

        let lock_time = r.read_u32()?;
        let expiry_height = if version >= 3 { Some(r.read_u32()?) } else { None };

        let sapling = if version >= 4 {
            Some(parse_sapling_bundle(r)?)
        } else {
            None
        };

        let n_join_splits = if version >= 2 { r.read_compact_size()? } else { 0 };
        let mut join_splits = Vec::with_capacity(n_join_splits as usize);
        for _ in 0..n_join_splits {
            join_splits.push(parse_join_split(r, version)?);
        }

        let (join_split_pubkey, join_split_sig) = if n_join_splits > 0 {
            (Some(r.read_array()?), Some(r.read_array()?))
        } else {
            (None, None)
        };

        let has_shielded = sapling
            .as_ref()
            .is_some_and(|s| !s.spends.is_empty() || !s.outputs.is_empty());
        let binding_sig = if version >= 4 && has_shielded {
            Some(r.read_array()?)
        } else {
            None
        };

        Ok(Transaction {
            version,
            overwintered,
            version_group_id,
            inputs,
            outputs,
            lock_time,
            expiry_height,
            sapling,
            join_splits,
            join_split_pubkey,
            join_split_sig,
            binding_sig,
        })
    }

    #[must_use]
    pub fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::new();
        let version_word = if self.overwintered {
            self.version | OVERWINTERED_BIT
        } else {
            self.version
        };
        out.extend_from_slice(&version_word.to_le_bytes());
        if let Some(group_id) = self.version_group_id {
            out.extend_from_slice(&group_id.to_le_bytes());
        }

        write_compact_size(&mut out, self.inputs.len() as u64);
        for txin in &self.inputs {
            out.extend_from_slice(&txin.prevout_hash.0);
            out.extend_from_slice(&txin.prevout_n.to_le_bytes());
            write_var_bytes(&mut out, &txin.script_sig);
            out.extend_from_slice(&txin.sequence.to_le_bytes());
        }

        write_compact_size(&mut out, self.outputs.len() as u64);
        for txout in &self.outputs {
            out.extend_from_slice(&txout.value.to_le_bytes());
            write_var_bytes(&mut out, &txout.script_pubkey);
        }

        out.extend_from_slice(&self.lock_time.to_le_bytes());
        if let Some(expiry) = self.expiry_height {
            out.extend_from_slice(&expiry.to_le_bytes());
        }

        if let Some(sapling) = &self.sapling {
            serialize_sapling_bundle(&mut out, sapling);
        }

        if !self.join_splits.is_empty() {
            write_compact_size(&mut out, self.join_splits.len() as u64);
            for js in &self.join_splits {
                serialize_join_split(&mut out, js);
            }
            if let Some(pubkey) = &self.join_split_pubkey {
                out.extend_from_slice(pubkey);
            }
            if let Some(sig) = &self.join_split_sig {
                out.extend_from_slice(sig);
            }
        }

        if let Some(sig) = &self.binding_sig {
            out.extend_from_slice(sig);
        }

        out
    }

    /// Wraps this transaction in the not-yet-fully-signed partial envelope.
    #[must_use]
    pub fn serialize_partial(&self) -> Vec<u8> {
        let mut out = Vec::from(PARTIAL_TX_MAGIC);
        out.push(PARTIAL_TX_VERSION);
        out.extend(self.serialize());
        out
    }

    #[must_use]
    pub fn txid(&self) -> H256 {
        koto_types::hash::double_sha256(&self.serialize())
    }
}

fn parse_sapling_bundle(r: &mut Reader<'_>) -> Result<SaplingBundle> {
    let value_balance = r.read_i64()?;

    let n_spends = r.read_compact_size()?;
    let mut spends = Vec::with_capacity(n_spends as usize);
    for _ in 0..n_spends {
        spends.push(ShieldedSpend {
            cv: r.read_array()?,
            anchor: r.read_array()?,
            nullifier: r.read_array()?,
            rk: r.read_array()?,
            zkproof: r.read_bytes(GROTH_PROOF_SIZE)?.to_vec(),
            spend_auth_sig: r.read_array()?,
        });
    }

    let n_outputs = r.read_compact_size()?;
    let mut outputs = Vec::with_capacity(n_outputs as usize);
    for _ in 0..n_outputs {
        outputs.push(ShieldedOutput {
            cv: r.read_array()?,
            cm: r.read_array()?,
            ephemeral_key: r.read_array()?,
            enc_ciphertext: r.read_bytes(KOTO_SAPLING_ENCCIPHERTEXT_SIZE)?.to_vec(),
            out_ciphertext: r.read_bytes(KOTO_SAPLING_OUTCIPHERTEXT_SIZE)?.to_vec(),
            zkproof: r.read_bytes(GROTH_PROOF_SIZE)?.to_vec(),
        });
    }

    Ok(SaplingBundle {
        value_balance,
        spends,
        outputs,
    })
}

fn serialize_sapling_bundle(out: &mut Vec<u8>, bundle: &SaplingBundle) {
    out.extend_from_slice(&bundle.value_balance.to_le_bytes());

    write_compact_size(out, bundle.spends.len() as u64);
    for spend in &bundle.spends {
        out.extend_from_slice(&spend.cv);
        out.extend_from_slice(&spend.anchor);
        out.extend_from_slice(&spend.nullifier);
        out.extend_from_slice(&spend.rk);
        out.extend_from_slice(&spend.zkproof);
        out.extend_from_slice(&spend.spend_auth_sig);
    }

    write_compact_size(out, bundle.outputs.len() as u64);
    for output in &bundle.outputs {
        out.extend_from_slice(&output.cv);
        out.extend_from_slice(&output.cm);
        out.extend_from_slice(&output.ephemeral_key);
        out.extend_from_slice(&output.enc_ciphertext);
        out.extend_from_slice(&output.out_ciphertext);
        out.extend_from_slice(&output.zkproof);
    }
}

fn parse_join_split(r: &mut Reader<'_>, version: u32) -> Result<JoinSplitDescription> {
    let vpub_old = r.read_u64()?;
    let vpub_new = r.read_u64()?;
    let anchor = r.read_array()?;
    let nullifiers = [r.read_array()?, r.read_array()?];
    let commitments = [r.read_array()?, r.read_array()?];
    let ephemeral_key = r.read_array()?;
    let random_seed = r.read_array()?;
    let macs = [r.read_array()?, r.read_array()?];

    let proof = if version >= 4 {
        JoinSplitProof::Groth(r.read_bytes(GROTH_PROOF_SIZE)?.to_vec())
    } else {
        JoinSplitProof::Phgr(r.read_bytes(PHGR_PROOF_SIZE)?.to_vec())
    };

    let ciphertexts = [
        r.read_bytes(KOTO_NOTECIPHERTEXT_SIZE)?.to_vec(),
        r.read_bytes(KOTO_NOTECIPHERTEXT_SIZE)?.to_vec(),
    ];

    Ok(JoinSplitDescription {
        vpub_old,
        vpub_new,
        anchor,
        nullifiers,
        commitments,
        ephemeral_key,
        random_seed,
        macs,
        proof,
        ciphertexts,
    })
}

pub(crate) fn serialize_join_split(out: &mut Vec<u8>, js: &JoinSplitDescription) {
    out.extend_from_slice(&js.vpub_old.to_le_bytes());
    out.extend_from_slice(&js.vpub_new.to_le_bytes());
    out.extend_from_slice(&js.anchor);
    for n in &js.nullifiers {
        out.extend_from_slice(n);
    }
    for c in &js.commitments {
        out.extend_from_slice(c);
    }
    out.extend_from_slice(&js.ephemeral_key);
    out.extend_from_slice(&js.random_seed);
    for m in &js.macs {
        out.extend_from_slice(m);
    }
    out.extend_from_slice(js.proof.bytes());
    for ct in &js.ciphertexts {
        out.extend_from_slice(ct);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn legacy_tx() -> Transaction {
        Transaction {
            version: 1,
            overwintered: false,
            version_group_id: None,
            inputs: vec![TxIn {
                prevout_hash: H256([7u8; 32]),
                prevout_n: 0,
                script_sig: vec![0x76, 0xa9],
                sequence: 0xffff_ffff,
            }],
            outputs: vec![TxOut {
                value: 5_000_000,
                script_pubkey: vec![0x76, 0xa9, 0x14],
            }],
            lock_time: 0,
            expiry_height: None,
            sapling: None,
            join_splits: vec![],
            join_split_pubkey: None,
            join_split_sig: None,
            binding_sig: None,
        }
    }

    #[test]
    fn legacy_round_trips() {
        let tx = legacy_tx();
        let bytes = tx.serialize();
        let decoded = Transaction::deserialize(&bytes).unwrap();
        assert_eq!(decoded, tx);
    }

    #[test]
    fn overwinter_round_trips() {
        let mut tx = legacy_tx();
        tx.version = 3;
        tx.overwintered = true;
        tx.version_group_id = Some(OVERWINTER_VERSION_GROUP_ID);
        tx.expiry_height = Some(123);
        let bytes = tx.serialize();
        let decoded = Transaction::deserialize(&bytes).unwrap();
        assert_eq!(decoded, tx);
    }

    #[test]
    fn sapling_with_shielded_output_round_trips() {
        let mut tx = legacy_tx();
        tx.version = 4;
        tx.overwintered = true;
        tx.version_group_id = Some(SAPLING_VERSION_GROUP_ID);
        tx.expiry_height = Some(0);
        tx.sapling = Some(SaplingBundle {
            value_balance: -1000,
            spends: vec![],
            outputs: vec![ShieldedOutput {
                cv: [1u8; 32],
                cm: [2u8; 32],
                ephemeral_key: [3u8; 32],
                enc_ciphertext: vec![4u8; KOTO_SAPLING_ENCCIPHERTEXT_SIZE],
                out_ciphertext: vec![5u8; KOTO_SAPLING_OUTCIPHERTEXT_SIZE],
                zkproof: vec![6u8; GROTH_PROOF_SIZE],
            }],
        });
        tx.binding_sig = Some([9u8; 64]);

        let bytes = tx.serialize();
        let decoded = Transaction::deserialize(&bytes).unwrap();
        assert_eq!(decoded, tx);
    }

    #[test]
    fn partial_envelope_round_trips() {
        let tx = legacy_tx();
        let partial = tx.serialize_partial();
        let decoded = Transaction::deserialize(&partial).unwrap();
        assert_eq!(decoded, tx);
    }

    #[test]
    fn unknown_partial_version_is_rejected() {
        let mut bytes = Vec::from(PARTIAL_TX_MAGIC);
        bytes.push(0x01);
        assert!(Transaction::deserialize(&bytes).is_err());
    }

    #[test]
    fn trailing_bytes_are_rejected() {
        let tx = legacy_tx();
        let mut bytes = tx.serialize();
        bytes.push(0xAB);
        assert!(Transaction::deserialize(&bytes).is_err());
    }

    #[test]
    fn out_of_range_output_value_is_rejected() {
        let mut tx = legacy_tx();
        tx.outputs[0].value = -1;
        let bytes = tx.serialize();
        assert!(Transaction::deserialize(&bytes).is_err());
    }
}
