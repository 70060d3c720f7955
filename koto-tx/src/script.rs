//! Standard scriptPubKey / scriptSig / redeem-script recognition, following the
//! template-matching approach of `original_source/electrum/
//! transaction.py::match_script_against_template`. A script this module cannot
//! classify degrades to `ScriptType::Unknown` rather than aborting the
//! surrounding transaction parse (see `koto_chain`'s error-handling policy).

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScriptType {
    P2pk,
    P2pkh,
    P2sh,
    P2wpkh,
    P2wsh,
    MultisigRedeem,
    Unknown,
}

// Opcodes relevant to template matching.
const OP_DUP: u8 = 0x76;
const OP_HASH160: u8 = 0xa9;
const OP_EQUALVERIFY: u8 = 0x88;
const OP_CHECKSIG: u8 = 0xac;
const OP_EQUAL: u8 = 0x87;
const OP_CHECKMULTISIG: u8 = 0xae;
const OP_0: u8 = 0x00;
const OP_1: u8 = 0x51;
const OP_16: u8 = 0x60;

/// A recognized script, tagged with the type it matched. `address_payload` is the
/// hash/key bytes an address would be derived from; callers needing the
/// human-readable address apply their own base58/bech32 encoding (out of scope
/// here, as in spec.md §1's Non-goals).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecognizedScript {
    pub script_type: ScriptType,
    pub address_payload: Vec<u8>,
}

/// Classifies a scriptPubKey. Never fails: scripts matching no known template
/// return `ScriptType::Unknown` with an empty payload.
#[must_use]
pub fn classify_script_pubkey(script: &[u8]) -> RecognizedScript {
    if let Some(hash) = match_p2pkh(script) {
        return recognized(ScriptType::P2pkh, hash);
    }
    if let Some(hash) = match_p2sh(script) {
        return recognized(ScriptType::P2sh, hash);
    }
    if let Some(hash) = match_p2wpkh(script) {
        return recognized(ScriptType::P2wpkh, hash);
    }
    if let Some(hash) = match_p2wsh(script) {
        return recognized(ScriptType::P2wsh, hash);
    }
    if let Some(pubkey) = match_p2pk(script) {
        return recognized(ScriptType::P2pk, pubkey);
    }
    recognized(ScriptType::Unknown, Vec::new())
}

/// Classifies a multisig redeem script (`OP_M <pubkey>... OP_N OP_CHECKMULTISIG`).
/// Unlike `classify_script_pubkey`, a redeem script is only ever consulted once a
/// caller already believes it's P2SH/P2WSH-wrapped multisig, so a script that
/// doesn't match the template is a real error, not a fallback case.
pub fn classify_multisig_redeem(script: &[u8]) -> crate::error::Result<RecognizedScript> {
    match match_multisig_redeem(script) {
        Some(pubkeys) => Ok(RecognizedScript {
            script_type: ScriptType::MultisigRedeem,
            address_payload: pubkeys.concat(),
        }),
        None => Err(crate::error::TxError::NotRecognizedRedeemScript),
    }
}

fn recognized(script_type: ScriptType, address_payload: Vec<u8>) -> RecognizedScript {
    RecognizedScript {
        script_type,
        address_payload,
    }
}

fn match_p2pkh(script: &[u8]) -> Option<Vec<u8>> {
    if script.len() == 25
        && script[0] == OP_DUP
        && script[1] == OP_HASH160
        && script[2] == 0x14
        && script[23] == OP_EQUALVERIFY
        && script[24] == OP_CHECKSIG
    {
        Some(script[3..23].to_vec())
    } else {
        None
    }
}

fn match_p2sh(script: &[u8]) -> Option<Vec<u8>> {
    if script.len() == 23 && script[0] == OP_HASH160 && script[1] == 0x14 && script[22] == OP_EQUAL
    {
        Some(script[2..22].to_vec())
    } else {
        None
    }
}

fn match_p2wpkh(script: &[u8]) -> Option<Vec<u8>> {
    if script.len() == 22 && script[0] == OP_0 && script[1] == 0x14 {
        Some(script[2..22].to_vec())
    } else {
        None
    }
}

fn match_p2wsh(script: &[u8]) -> Option<Vec<u8>> {
    if script.len() == 34 && script[0] == OP_0 && script[1] == 0x20 {
        Some(script[2..34].to_vec())
    } else {
        None
    }
}

fn match_p2pk(script: &[u8]) -> Option<Vec<u8>> {
    if script.len() == 35 && script[0] == 0x21 && script[34] == OP_CHECKSIG {
        Some(script[1..34].to_vec())
    } else if script.len() == 67 && script[0] == 0x41 && script[66] == OP_CHECKSIG {
        Some(script[1..66].to_vec())
    } else {
        None
    }
}

fn match_multisig_redeem(script: &[u8]) -> Option<Vec<Vec<u8>>> {
    if script.len() < 3 {
        return None;
    }
    let m_op = script[0];
    if !(OP_1..=OP_16).contains(&m_op) {
        return None;
    }

    let mut pos = 1;
    let mut pubkeys = Vec::new();
    while pos < script.len() {
        let len = script[pos] as usize;
        if len == 33 || len == 65 {
            if pos + 1 + len > script.len() {
                return None;
            }
            pubkeys.push(script[pos + 1..pos + 1 + len].to_vec());
            pos += 1 + len;
        } else {
            break;
        }
    }

    if pos + 2 != script.len() {
        return None;
    }
    let n_op = script[pos];
    if !(OP_1..=OP_16).contains(&n_op) {
        return None;
    }
    if script[pos + 1] != OP_CHECKMULTISIG {
        return None;
    }
    let n = (n_op - OP_1 + 1) as usize;
    if pubkeys.len() != n {
        return None;
    }

    Some(pubkeys)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognizes_p2pkh() {
        let mut script = vec![OP_DUP, OP_HASH160, 0x14];
        script.extend_from_slice(&[0xAAu8; 20]);
        script.push(OP_EQUALVERIFY);
        script.push(OP_CHECKSIG);
        let r = classify_script_pubkey(&script);
        assert_eq!(r.script_type, ScriptType::P2pkh);
        assert_eq!(r.address_payload.len(), 20);
    }

    #[test]
    fn recognizes_p2sh() {
        let mut script = vec![OP_HASH160, 0x14];
        script.extend_from_slice(&[0xBBu8; 20]);
        script.push(OP_EQUAL);
        let r = classify_script_pubkey(&script);
        assert_eq!(r.script_type, ScriptType::P2sh);
    }

    #[test]
    fn unrecognized_script_falls_back_to_unknown() {
        let script = vec![0xde, 0xad, 0xbe, 0xef];
        let r = classify_script_pubkey(&script);
        assert_eq!(r.script_type, ScriptType::Unknown);
        assert!(r.address_payload.is_empty());
    }

    #[test]
    fn recognizes_2_of_3_multisig_redeem() {
        let mut script = vec![OP_1 + 1]; // OP_2
        for b in [0xAAu8, 0xBB, 0xCC] {
            script.push(33);
            script.extend_from_slice(&[b; 33]);
        }
        script.push(OP_1 + 2); // OP_3
        script.push(OP_CHECKMULTISIG);
        let r = classify_multisig_redeem(&script).unwrap();
        assert_eq!(r.script_type, ScriptType::MultisigRedeem);
        assert_eq!(r.address_payload.len(), 33 * 3);
    }

    #[test]
    fn unrecognized_redeem_script_is_an_error() {
        let script = vec![0xde, 0xad, 0xbe, 0xef];
        assert_eq!(
            classify_multisig_redeem(&script).unwrap_err(),
            crate::error::TxError::NotRecognizedRedeemScript
        );
    }
}
