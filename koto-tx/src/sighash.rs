//! Signature hash preimage construction and BLAKE2b-personalized digesting, for
//! both the pre-Overwinter legacy layout and the ZIP-243-style layout Overwinter
//! and Sapling transactions use (`original_source/electrum/
//! transaction.py::sighash_with_script_code`).

use blake2b_simd::Params;
use koto_types::hash::H256;

use crate::codec::Transaction;
use crate::error::{Result, TxError};
use crate::stream::write_var_bytes;

pub const SIGHASH_ALL: u32 = 1;

const PERSONAL_PREVOUTS: &[u8; 16] = b"ZcashPrevoutHash";
const PERSONAL_SEQUENCE: &[u8; 16] = b"ZcashSequencHash";
const PERSONAL_OUTPUTS: &[u8; 16] = b"ZcashOutputsHash";
const PERSONAL_JOINSPLITS: &[u8; 16] = b"ZcashJSplitsHash";
const PERSONAL_SHIELDED_SPENDS: &[u8; 16] = b"ZcashSSpendsHash";
const PERSONAL_SHIELDED_OUTPUTS: &[u8; 16] = b"ZcashSOutputHash";

/// Overwinter's consensus branch id, little-endian, appended to the
/// `"ZcashSigHash"` 12-byte prefix to form the 16-byte BLAKE2b personalization.
const OVERWINTER_PERSONAL: &[u8; 16] = b"ZcashSigHash\x19\x1b\xa8\x5b";
/// Sapling's consensus branch id, little-endian, appended the same way.
const SAPLING_PERSONAL: &[u8; 16] = b"ZcashSigHash\xbb\x09\xb8\x76";

fn blake2b_personal(personal: &[u8; 16], data: &[u8]) -> [u8; 32] {
    Params::new()
        .hash_length(32)
        .personal(personal)
        .to_state()
        .update(data)
        .finalize()
        .as_bytes()
        .try_into()
        .unwrap()
}

fn zero_hash_if_empty(items_empty: bool, personal: &[u8; 16], data: &[u8]) -> [u8; 32] {
    if items_empty {
        [0u8; 32]
    } else {
        blake2b_personal(personal, data)
    }
}

/// The pre-Overwinter legacy sighash preimage: the whole transaction reserialized
/// with every input's scriptSig emptied except `input_index`, which gets
/// `script_code` substituted in, followed by a little-endian `SIGHASH_ALL` word.
pub fn legacy_preimage(tx: &Transaction, input_index: usize, script_code: &[u8]) -> Result<Vec<u8>> {
    if input_index >= tx.inputs.len() {
        return Err(TxError::SerializationError(format!(
            "input index {input_index} out of range"
        )));
    }

    let mut out = Vec::new();
    out.extend_from_slice(&tx.version.to_le_bytes());

    crate::stream::write_compact_size(&mut out, tx.inputs.len() as u64);
    for (i, txin) in tx.inputs.iter().enumerate() {
        out.extend_from_slice(&txin.prevout_hash.0);
        out.extend_from_slice(&txin.prevout_n.to_le_bytes());
        if i == input_index {
            write_var_bytes(&mut out, script_code);
        } else {
            write_var_bytes(&mut out, &[]);
        }
        out.extend_from_slice(&txin.sequence.to_le_bytes());
    }

    crate::stream::write_compact_size(&mut out, tx.outputs.len() as u64);
    for txout in &tx.outputs {
        out.extend_from_slice(&txout.value.to_le_bytes());
        write_var_bytes(&mut out, &txout.script_pubkey);
    }

    out.extend_from_slice(&tx.lock_time.to_le_bytes());
    out.extend_from_slice(&SIGHASH_ALL.to_le_bytes());
    Ok(out)
}

/// The ZIP-243-style preimage for Overwinter/Sapling transactions, and the final
/// personalized digest over it. Returns `(preimage, digest)`; callers typically
/// only need `digest`, but the preimage is useful for tests asserting byte-level
/// sensitivity.
pub fn zip243_preimage_and_digest(
    tx: &Transaction,
    input_index: usize,
    script_code: &[u8],
    input_value: i64,
) -> Result<(Vec<u8>, H256)> {
    if !tx.overwintered {
        return Err(TxError::SerializationError(
            "zip243 preimage requires an overwintered transaction".into(),
        ));
    }
    if input_index >= tx.inputs.len() {
        return Err(TxError::SerializationError(format!(
            "input index {input_index} out of range"
        )));
    }
    let saplinged = tx.version >= 4;

    let mut prevouts_data = Vec::new();
    let mut sequence_data = Vec::new();
    for txin in &tx.inputs {
        prevouts_data.extend_from_slice(&txin.prevout_hash.0);
        prevouts_data.extend_from_slice(&txin.prevout_n.to_le_bytes());
        sequence_data.extend_from_slice(&txin.sequence.to_le_bytes());
    }
    let hash_prevouts = blake2b_personal(PERSONAL_PREVOUTS, &prevouts_data);
    let hash_sequence = blake2b_personal(PERSONAL_SEQUENCE, &sequence_data);

    let mut outputs_data = Vec::new();
    for txout in &tx.outputs {
        outputs_data.extend_from_slice(&txout.value.to_le_bytes());
        write_var_bytes(&mut outputs_data, &txout.script_pubkey);
    }
    let hash_outputs = blake2b_personal(PERSONAL_OUTPUTS, &outputs_data);

    let mut join_splits_data = Vec::new();
    for js in &tx.join_splits {
        crate::codec::serialize_join_split(&mut join_splits_data, js);
    }
    let hash_join_splits = zero_hash_if_empty(
        tx.join_splits.is_empty(),
        PERSONAL_JOINSPLITS,
        &join_splits_data,
    );

    let mut preimage = Vec::new();
    let version_word = tx.version | 0x8000_0000;
    preimage.extend_from_slice(&version_word.to_le_bytes());
    preimage.extend_from_slice(&tx.version_group_id.unwrap_or_default().to_le_bytes());
    preimage.extend_from_slice(&hash_prevouts);
    preimage.extend_from_slice(&hash_sequence);
    preimage.extend_from_slice(&hash_outputs);
    preimage.extend_from_slice(&hash_join_splits);

    if saplinged {
        let spends_empty = tx.sapling.as_ref().is_none_or(|s| s.spends.is_empty());
        let outputs_empty = tx.sapling.as_ref().is_none_or(|s| s.outputs.is_empty());

        let mut spends_data = Vec::new();
        let mut outputs_sapling_data = Vec::new();
        if let Some(bundle) = &tx.sapling {
            for spend in &bundle.spends {
                spends_data.extend_from_slice(&spend.cv);
                spends_data.extend_from_slice(&spend.anchor);
                spends_data.extend_from_slice(&spend.nullifier);
                spends_data.extend_from_slice(&spend.rk);
                spends_data.extend_from_slice(&spend.zkproof);
            }
            for output in &bundle.outputs {
                outputs_sapling_data.extend_from_slice(&output.cv);
                outputs_sapling_data.extend_from_slice(&output.cm);
                outputs_sapling_data.extend_from_slice(&output.ephemeral_key);
                outputs_sapling_data.extend_from_slice(&output.enc_ciphertext);
                outputs_sapling_data.extend_from_slice(&output.out_ciphertext);
                outputs_sapling_data.extend_from_slice(&output.zkproof);
            }
        }

        let hash_shielded_spends =
            zero_hash_if_empty(spends_empty, PERSONAL_SHIELDED_SPENDS, &spends_data);
        let hash_shielded_outputs =
            zero_hash_if_empty(outputs_empty, PERSONAL_SHIELDED_OUTPUTS, &outputs_sapling_data);
        preimage.extend_from_slice(&hash_shielded_spends);
        preimage.extend_from_slice(&hash_shielded_outputs);
    }

    preimage.extend_from_slice(&tx.lock_time.to_le_bytes());
    preimage.extend_from_slice(&tx.expiry_height.unwrap_or_default().to_le_bytes());

    if saplinged {
        let value_balance = tx.sapling.as_ref().map_or(0, |s| s.value_balance);
        preimage.extend_from_slice(&value_balance.to_le_bytes());
    }

    preimage.extend_from_slice(&SIGHASH_ALL.to_le_bytes());

    let txin = &tx.inputs[input_index];
    preimage.extend_from_slice(&txin.prevout_hash.0);
    preimage.extend_from_slice(&txin.prevout_n.to_le_bytes());
    write_var_bytes(&mut preimage, script_code);
    preimage.extend_from_slice(&input_value.to_le_bytes());
    preimage.extend_from_slice(&txin.sequence.to_le_bytes());

    let personal = if saplinged {
        SAPLING_PERSONAL
    } else {
        OVERWINTER_PERSONAL
    };
    let digest = blake2b_personal(personal, &preimage);

    Ok((preimage, H256(digest)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{SaplingBundle, ShieldedOutput, TxIn, TxOut, GROTH_PROOF_SIZE, KOTO_SAPLING_ENCCIPHERTEXT_SIZE, KOTO_SAPLING_OUTCIPHERTEXT_SIZE, SAPLING_VERSION_GROUP_ID};

    fn sapling_tx() -> Transaction {
        Transaction {
            version: 4,
            overwintered: true,
            version_group_id: Some(SAPLING_VERSION_GROUP_ID),
            inputs: vec![TxIn {
                prevout_hash: H256([1u8; 32]),
                prevout_n: 0,
                script_sig: vec![],
                sequence: 0xffff_ffff,
            }],
            outputs: vec![TxOut {
                value: 1_000_000,
                script_pubkey: vec![0x76, 0xa9, 0x14],
            }],
            lock_time: 0,
            expiry_height: Some(0),
            sapling: Some(SaplingBundle {
                value_balance: 0,
                spends: vec![],
                outputs: vec![ShieldedOutput {
                    cv: [2u8; 32],
                    cm: [3u8; 32],
                    ephemeral_key: [4u8; 32],
                    enc_ciphertext: vec![5u8; KOTO_SAPLING_ENCCIPHERTEXT_SIZE],
                    out_ciphertext: vec![6u8; KOTO_SAPLING_OUTCIPHERTEXT_SIZE],
                    zkproof: vec![7u8; GROTH_PROOF_SIZE],
                }],
            }),
            join_splits: vec![],
            join_split_pubkey: None,
            join_split_sig: None,
            binding_sig: Some([8u8; 64]),
        }
    }

    #[test]
    fn sapling_digest_is_deterministic() {
        let tx = sapling_tx();
        let script_code = vec![0x76, 0xa9, 0x14];
        let (_, digest_a) = zip243_preimage_and_digest(&tx, 0, &script_code, 2_000_000).unwrap();
        let (_, digest_b) = zip243_preimage_and_digest(&tx, 0, &script_code, 2_000_000).unwrap();
        assert_eq!(digest_a, digest_b);
    }

    #[test]
    fn changing_outpoint_changes_digest() {
        let tx = sapling_tx();
        let mut tx2 = tx.clone();
        tx2.inputs[0].prevout_n = 1;

        let script_code = vec![0x76, 0xa9, 0x14];
        let (_, digest_a) = zip243_preimage_and_digest(&tx, 0, &script_code, 2_000_000).unwrap();
        let (_, digest_b) = zip243_preimage_and_digest(&tx2, 0, &script_code, 2_000_000).unwrap();
        assert_ne!(digest_a, digest_b);
    }

    #[test]
    fn legacy_preimage_ends_with_sighash_all() {
        let mut tx = sapling_tx();
        tx.overwintered = false;
        tx.version = 1;
        tx.version_group_id = None;
        tx.expiry_height = None;
        tx.sapling = None;
        tx.binding_sig = None;
        let preimage = legacy_preimage(&tx, 0, &[0x76, 0xa9]).unwrap();
        assert_eq!(&preimage[preimage.len() - 4..], &1u32.to_le_bytes());
    }
}
